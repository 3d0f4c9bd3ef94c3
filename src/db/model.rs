use serde::{Deserialize, Serialize};

use crate::descriptor::Descriptor;
use crate::error::{Error, Result};

/// 视频记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct VideoRecord {
    /// 视频 ID
    pub id: i64,
    /// 视频源路径
    pub path: String,
}

/// 一个时间窗口的代表描述符
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// 所属视频 ID
    pub video_id: i64,
    /// 窗口序号，同一视频内从 0 开始递增
    pub window_index: u32,
    /// 代表描述符
    pub descriptor: Descriptor,
}

/// frame 表中的一行
#[derive(sqlx::FromRow)]
pub(crate) struct FrameRow {
    pub video_id: i64,
    pub window_index: i64,
    /// 描述符维度
    pub dim: i64,
    /// 小端序 f32 数组
    pub descriptor: Vec<u8>,
}

impl TryFrom<FrameRow> for FrameRecord {
    type Error = Error;

    fn try_from(row: FrameRow) -> Result<Self> {
        let window_index = u32::try_from(row.window_index)
            .map_err(|_| Error::Corrupt(format!("窗口序号 {} 无效", row.window_index)))?;
        Ok(Self {
            video_id: row.video_id,
            window_index,
            descriptor: Descriptor::from_le_bytes(&row.descriptor, stored_dim(row.dim)?)?,
        })
    }
}

/// 数据库中保存的描述符维度
pub(crate) fn stored_dim(dim: i64) -> Result<usize> {
    usize::try_from(dim).map_err(|_| Error::Corrupt(format!("描述符维度 {dim} 无效")))
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    fn row(window_index: i64, dim: i64) -> FrameRow {
        FrameRow {
            video_id: 1,
            window_index,
            dim,
            descriptor: Descriptor::new(vec![1., 2.]).to_le_bytes(),
        }
    }

    #[test]
    fn test_decode_row() {
        let record = FrameRecord::try_from(row(3, 2)).unwrap();
        assert_eq!(record.window_index, 3);
        assert_eq!(record.descriptor.as_slice(), &[1., 2.]);
    }

    #[rstest]
    #[case::negative_window(-1, 2)]
    #[case::huge_window(1 << 40, 2)]
    #[case::negative_dim(0, -1)]
    #[case::wrong_dim(0, 3)]
    fn test_corrupt_row(#[case] window_index: i64, #[case] dim: i64) {
        assert!(matches!(FrameRecord::try_from(row(window_index, dim)), Err(Error::Corrupt(_))));
    }
}
