use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, info};
use serde::Serialize;
use tokio::task::spawn_blocking;

use crate::db::Repository;
use crate::descriptor::check_dim;
use crate::error::{Error, Result};
use crate::kdtree::{Neighbor, SpatialIndex};
use crate::pipeline::IndexingPipeline;
use crate::ranker::select_top;

/// 查询服务的配置
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// 初次查询的近邻数量为 `n * overfetch`，未设置时直接查询全部语料
    pub overfetch: Option<usize>,
    /// 要求查询描述符与索引都是指定维度
    pub expected_dim: Option<usize>,
}

/// 一条检索结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub video_id: i64,
    /// 视频源路径
    pub path: String,
    /// 命中的窗口序号
    pub window_index: u32,
    /// 与查询描述符的欧氏距离
    pub distance: f32,
}

/// 一次检索的结果，按距离升序排列，每个视频最多出现一次
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub hits: Vec<SearchHit>,
    /// 请求的视频数量
    pub requested: usize,
}

impl SearchOutcome {
    /// 是否找到了足够的视频
    pub fn is_complete(&self) -> bool {
        self.hits.len() >= self.requested
    }

    /// 结果不足时返回对应的错误，结果本身仍然可用
    pub fn insufficient(&self) -> Option<Error> {
        (!self.is_complete()).then(|| Error::InsufficientResults {
            requested: self.requested,
            found: self.hits.len(),
        })
    }

    /// 将结果不足视为错误
    pub fn into_result(self) -> Result<Vec<SearchHit>> {
        match self.insufficient() {
            Some(e) => Err(e),
            None => Ok(self.hits),
        }
    }
}

/// 在线查询服务
///
/// 持有当前使用的索引实例。替换索引时正在进行的查询继续使用旧实例，直到查询结束。
pub struct QueryService<R> {
    repo: Arc<R>,
    options: QueryOptions,
    index: RwLock<Option<Arc<SpatialIndex>>>,
}

impl<R: Repository> QueryService<R> {
    pub fn new(repo: Arc<R>, options: QueryOptions) -> Self {
        Self { repo, options, index: RwLock::new(None) }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repo
    }

    /// 从文件加载索引并替换当前索引
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Arc<SpatialIndex>> {
        let path = path.as_ref();
        info!("正在加载索引: {}", path.display());
        let index = SpatialIndex::load(path, self.options.expected_dim)?;
        info!("索引加载完成，共 {} 条记录，{} 个视频", index.len(), index.video_count());
        Ok(self.replace(index))
    }

    /// 使用存储中的全部窗口描述符构建新索引，不替换当前索引
    pub async fn prepare(&self) -> Result<SpatialIndex> {
        let index = IndexingPipeline::new(self.repo.clone()).build_index().await?;
        if let Some(dim) = self.options.expected_dim {
            check_dim(dim, index.dim())?;
        }
        Ok(index)
    }

    /// 使用存储中的全部窗口描述符构建新索引并替换当前索引
    pub async fn build(&self) -> Result<Arc<SpatialIndex>> {
        let index = self.prepare().await?;
        Ok(self.replace(index))
    }

    /// 替换当前索引
    pub fn replace(&self, index: impl Into<Arc<SpatialIndex>>) -> Arc<SpatialIndex> {
        let index = index.into();
        *self.index.write().unwrap_or_else(PoisonError::into_inner) = Some(index.clone());
        index
    }

    /// 当前使用的索引
    pub fn current(&self) -> Result<Arc<SpatialIndex>> {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        index.clone().ok_or(Error::IndexNotLoaded)
    }

    /// 检索与 `descriptor` 最相似的 `n` 个不同视频
    ///
    /// 找到的不同视频少于 `n` 个时仍然返回，通过 [`SearchOutcome::insufficient`] 判断。
    pub async fn search(&self, descriptor: &[f32], n: usize) -> Result<SearchOutcome> {
        let index = self.current()?;
        if n == 0 {
            return Err(Error::InvalidK);
        }
        if let Some(dim) = self.options.expected_dim {
            check_dim(dim, descriptor.len())?;
        }

        let overfetch = self.options.overfetch;
        let target = descriptor.to_vec();
        let top = {
            let index = index.clone();
            spawn_blocking(move || nearest_videos(&index, &target, n, overfetch)).await??
        };

        let mut hits = Vec::with_capacity(top.len());
        for neighbor in top {
            let record = index.record(neighbor.record);
            let video = self
                .repo
                .get_video_record(record.video_id)
                .await?
                .ok_or_else(|| Error::Corrupt(format!("视频 {} 不存在", record.video_id)))?;
            hits.push(SearchHit {
                video_id: video.id,
                path: video.path,
                window_index: record.window_index,
                distance: neighbor.distance,
            });
        }

        Ok(SearchOutcome { hits, requested: n })
    }
}

/// 查询 k 个近邻并按视频去重，不同视频不足 `n` 个时倍增 k 直到覆盖全部语料
fn nearest_videos(
    index: &SpatialIndex,
    target: &[f32],
    n: usize,
    overfetch: Option<usize>,
) -> Result<Vec<Neighbor>> {
    let total = index.len();
    let mut k = match overfetch {
        Some(factor) => n.saturating_mul(factor.max(1)).min(total),
        None => total,
    };
    loop {
        let neighbors = index.query(target, k)?;
        let top = select_top(index, &neighbors, n);
        if top.len() >= n || k >= total {
            return Ok(top);
        }
        debug!("k = {} 时只找到 {} 个视频，扩大查询范围", k, top.len());
        k = k.saturating_mul(2).min(total);
    }
}
