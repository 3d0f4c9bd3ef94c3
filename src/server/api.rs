use std::sync::Arc;
use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, header};
use axum_auth::AuthBearer;
use axum_typed_multipart::TypedMultipart;
use log::info;
use tokio::task::block_in_place;

use super::error::{Result, Unauthorized};
use super::state::AppState;
use super::types::*;
use crate::db::Repository;
use crate::extract::FeatureExtractor;
use crate::metrics;

/// 检查请求中的 token
fn check_token(state: &AppState, token: &str) -> Result<()> {
    if token == state.token { Ok(()) } else { Err(Unauthorized.into()) }
}

/// 搜索与查询描述符最相似的视频
#[utoipa::path(
    post,
    path = "/search",
    request_body(content = SearchForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, body = SearchResponse),
        (status = 400, description = "查询描述符维度错误或 count 为 0"),
        (status = 422, description = "无法解码查询描述符"),
        (status = 503, description = "索引尚未加载"),
    )
)]
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    data: TypedMultipart<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let count = data.count.unwrap_or(state.search.count);
    let start = Instant::now();

    info!("正在搜索上传的描述符");

    let descriptor = block_in_place(|| state.extractor.extract(&data.file))?;
    let outcome = state.service.search(&descriptor, count).await?;

    let elapsed = start.elapsed();
    let host = headers.get(header::HOST).and_then(|h| h.to_str().ok());
    metrics::inc_search_count(count);
    metrics::inc_search_duration(count, elapsed.as_secs_f32());
    if let Some(best) = outcome.hits.first() {
        metrics::inc_search_best_distance(count, best.distance);
    }
    if let Some(e) = outcome.insufficient() {
        info!("{}", e);
        metrics::inc_search_insufficient(count);
    }

    Ok(Json(SearchResponse {
        time: elapsed.as_millis() as u64,
        complete: outcome.is_complete(),
        requested: outcome.requested,
        result: outcome
            .hits
            .into_iter()
            .map(|hit| {
                let url = state.video_url(&hit.path, host);
                SearchResult::new(hit, url)
            })
            .collect(),
    }))
}

/// 从索引文件重新加载索引
#[utoipa::path(
    post,
    path = "/reload",
    responses(
        (status = 200, body = IndexInfo),
        (status = 401, description = "token 错误"),
    ),
    security(("bearer" = []))
)]
pub async fn reload_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
) -> Result<Json<IndexInfo>> {
    check_token(&state, &token)?;
    let index = block_in_place(|| state.service.load(&state.index_path))?;
    Ok(Json(IndexInfo::from(&*index)))
}

/// 使用数据库中的全部窗口描述符重新构建索引
///
/// 新索引构建完成后先保存到索引文件再替换当前索引，构建期间的查询继续使用旧索引。
#[utoipa::path(
    post,
    path = "/build",
    responses(
        (status = 200, body = IndexInfo),
        (status = 401, description = "token 错误"),
        (status = 409, description = "数据库中没有任何描述符"),
    ),
    security(("bearer" = []))
)]
pub async fn build_handler(
    State(state): State<Arc<AppState>>,
    AuthBearer(token): AuthBearer,
) -> Result<Json<IndexInfo>> {
    check_token(&state, &token)?;
    let index = state.service.prepare().await?;
    block_in_place(|| index.save_atomic(&state.index_path, &state.index_tmp))?;
    let index = state.service.replace(index);
    Ok(Json(IndexInfo::from(&*index)))
}

/// 获取数据库与索引统计信息
#[utoipa::path(
    get,
    path = "/stats",
    responses(
        (status = 200, body = StatsResponse),
    )
)]
pub async fn stats_handler(State(state): State<Arc<AppState>>) -> Result<Json<StatsResponse>> {
    let (videos, windows) = state.service.repository().count().await?;
    let index = state.service.current().ok().map(|index| IndexInfo::from(&*index));
    Ok(Json(StatsResponse { videos, windows, index }))
}
