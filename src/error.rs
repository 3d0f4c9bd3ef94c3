use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// 索引构建、查询与存储过程中可能出现的错误
#[derive(Debug, Error)]
pub enum Error {
    /// 聚合或入库时传入了空的描述符序列
    #[error("描述符序列为空")]
    EmptyInput,

    /// 构建索引时语料为空
    #[error("语料为空，无法构建索引")]
    EmptyCorpus,

    /// 描述符维度不一致
    #[error("描述符维度不一致: 期望 {expected}，实际 {found}")]
    DimensionMismatch { expected: usize, found: usize },

    /// k 必须大于 0
    #[error("k 必须大于 0")]
    InvalidK,

    /// 服务尚未加载任何索引
    #[error("索引尚未加载")]
    IndexNotLoaded,

    /// 找到的不同视频数量少于请求数量，调用方可以选择展示部分结果
    #[error("结果不足: 请求 {requested} 个视频，仅找到 {found} 个")]
    InsufficientResults { requested: usize, found: usize },

    /// 索引文件读取或校验失败
    #[error("无法加载索引 {}: {reason}", path.display())]
    IndexLoad { path: PathBuf, reason: String },

    /// 外部特征提取器返回的错误
    #[error("特征提取失败: {0}")]
    Extraction(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// 数据库中存储的描述符无法解码
    #[error("数据损坏: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// 后台计算任务异常退出
    #[error("后台任务异常退出: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    pub(crate) fn index_load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::IndexLoad { path: path.into(), reason: reason.to_string() }
    }

    /// 是否为可恢复的错误，即调用方仍然可以使用部分结果
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InsufficientResults { .. })
    }
}
