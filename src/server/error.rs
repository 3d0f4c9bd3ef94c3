use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::error;
use serde_json::json;

use crate::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

/// token 错误
#[derive(Debug, thiserror::Error)]
#[error("token 错误")]
pub struct Unauthorized;

/// API错误类型
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// 根据核心错误类型选择状态码，其余错误一律视为服务器内部错误
    pub fn status(&self) -> StatusCode {
        if self.0.is::<Unauthorized>() {
            return StatusCode::UNAUTHORIZED;
        }
        match self.0.downcast_ref::<Error>() {
            Some(Error::EmptyInput | Error::DimensionMismatch { .. } | Error::InvalidK) => {
                StatusCode::BAD_REQUEST
            }
            Some(Error::EmptyCorpus) => StatusCode::CONFLICT,
            Some(Error::Extraction(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Some(Error::IndexNotLoaded) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("请求处理失败: {:?}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[rstest]
    #[case(Error::EmptyInput, StatusCode::BAD_REQUEST)]
    #[case(Error::DimensionMismatch { expected: 2, found: 3 }, StatusCode::BAD_REQUEST)]
    #[case(Error::InvalidK, StatusCode::BAD_REQUEST)]
    #[case(Error::EmptyCorpus, StatusCode::CONFLICT)]
    #[case(Error::Extraction("bad npy".into()), StatusCode::UNPROCESSABLE_ENTITY)]
    #[case(Error::IndexNotLoaded, StatusCode::SERVICE_UNAVAILABLE)]
    #[case(Error::index_load("index.kdt", "校验和不匹配"), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(Error::Corrupt("x".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    fn test_status(#[case] err: Error, #[case] expected: StatusCode) {
        assert_eq!(AppError::from(err).status(), expected);
        let other = AppError::from(anyhow::anyhow!("other"));
        assert_eq!(other.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_unauthorized() {
        assert_eq!(AppError::from(Unauthorized).status(), StatusCode::UNAUTHORIZED);
    }
}
