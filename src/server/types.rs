use axum::body::Bytes;
use axum_typed_multipart::TryFromMultipart;
use serde::Serialize;
use utoipa::ToSchema;

use crate::kdtree::SpatialIndex;
use crate::service::SearchHit;

/// 搜索请求参数
#[derive(TryFromMultipart)]
pub struct SearchRequest {
    pub file: Bytes,
    pub count: Option<usize>,
}

/// 搜索表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct SearchForm {
    /// 查询描述符，`.npy` 格式的一维数组或 1 × D 矩阵
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// 返回的视频数量，默认为 3
    pub count: Option<usize>,
}

/// 搜索响应
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    /// 搜索耗时，单位为毫秒
    pub time: u64,
    /// 是否找到了足够的视频
    pub complete: bool,
    /// 请求的视频数量
    pub requested: usize,
    /// 按距离升序排列的结果
    pub result: Vec<SearchResult>,
}

/// 单个视频的搜索结果
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResult {
    /// 视频源路径
    pub path: String,
    /// 视频的访问地址，仅在服务器提供视频文件或设置了 base-url 时存在
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// 命中的窗口序号
    pub time: u32,
    /// 欧氏距离
    pub distance: f32,
}

impl SearchResult {
    pub fn new(hit: SearchHit, url: Option<String>) -> Self {
        Self { path: hit.path, url, time: hit.window_index, distance: hit.distance }
    }
}

/// 索引信息
#[derive(Debug, Serialize, ToSchema)]
pub struct IndexInfo {
    /// 记录数量
    pub records: usize,
    /// 视频数量
    pub videos: usize,
    /// 描述符维度
    pub dim: usize,
    /// 树深度
    pub depth: usize,
}

impl From<&SpatialIndex> for IndexInfo {
    fn from(index: &SpatialIndex) -> Self {
        Self {
            records: index.len(),
            videos: index.video_count(),
            dim: index.dim(),
            depth: index.depth(),
        }
    }
}

/// 数据库与索引统计信息
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    /// 数据库中的视频数量
    pub videos: usize,
    /// 数据库中的窗口数量
    pub windows: usize,
    /// 当前使用的索引，未加载时为空
    pub index: Option<IndexInfo>,
}
