use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};
use rayon::prelude::*;
use tokio::task::spawn_blocking;

use crate::aggregate::select_representative;
use crate::db::{FrameRecord, Repository, VideoRecord};
use crate::descriptor::{Descriptor, check_dim};
use crate::error::{Error, Result};
use crate::kdtree::SpatialIndex;

/// 默认每 6 帧为一个窗口
pub const DEFAULT_WINDOW_SIZE: usize = 6;

/// 单个视频的入库结果
#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    /// 新增视频，以及生成的窗口数量
    Added { video: VideoRecord, windows: usize },
    /// 相同源路径的视频已经存在，整个视频被跳过
    Skipped(VideoRecord),
}

/// 离线入库流程：逐帧描述符 -> 按窗口聚合 -> 写入存储，最后批量构建索引
pub struct IndexingPipeline<R> {
    repo: Arc<R>,
    window_size: usize,
    expected_dim: Option<usize>,
}

impl<R: Repository> IndexingPipeline<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo, window_size: DEFAULT_WINDOW_SIZE, expected_dim: None }
    }

    /// 每个窗口包含的帧数，至少为 1
    pub fn window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size.max(1);
        self
    }

    /// 要求所有描述符都是指定维度
    pub fn expected_dim(mut self, dim: Option<usize>) -> Self {
        self.expected_dim = dim;
        self
    }

    /// 将一个视频的逐帧描述符按窗口聚合后入库
    ///
    /// 如果相同源路径的视频已经存在则整体跳过，不会重复或部分入库。
    /// 描述符维度必须与已入库的语料一致。
    pub async fn ingest(&self, path: &str, frames: &[Descriptor]) -> Result<IngestOutcome> {
        if let Some(video) = self.repo.find_video_by_path(path).await? {
            debug!("跳过已入库视频: {}", path);
            return Ok(IngestOutcome::Skipped(video));
        }

        let corpus_dim = self.repo.corpus_dim().await?;
        if let (Some(expected), Some(corpus)) = (self.expected_dim, corpus_dim) {
            check_dim(expected, corpus)?;
        }
        let dim = self.expected_dim.or(corpus_dim);
        let windows = aggregate_windows(frames, self.window_size, dim)?;
        let video = self.repo.add_video_with_frames(path, &windows).await?;
        debug!("视频 {} 入库完成: {} 帧, {} 个窗口", path, frames.len(), windows.len());

        Ok(IngestOutcome::Added { video, windows: windows.len() })
    }

    /// 按入库顺序读取当前全部窗口描述符
    pub async fn snapshot(&self) -> Result<Vec<FrameRecord>> {
        self.repo.get_all_frame_records().await
    }

    /// 读取当前全部窗口描述符并构建索引
    pub async fn build_index(&self) -> Result<SpatialIndex> {
        let corpus = self.snapshot().await?;
        info!("正在使用 {} 条窗口描述符构建索引", corpus.len());
        let start = Instant::now();
        let index = spawn_blocking(move || SpatialIndex::build(corpus)).await??;
        info!("索引构建完成，深度 {}，耗时 {:.2}s", index.depth(), start.elapsed().as_secs_f32());
        Ok(index)
    }
}

/// 将连续的 `window_size` 帧划为一个窗口，最后一个窗口可以不足 `window_size` 帧
///
/// 各窗口并行聚合，输出顺序与窗口顺序一致。
pub fn aggregate_windows(
    frames: &[Descriptor],
    window_size: usize,
    expected_dim: Option<usize>,
) -> Result<Vec<Descriptor>> {
    let first = frames.first().ok_or(Error::EmptyInput)?;
    let dim = expected_dim.unwrap_or(first.dim());
    for frame in frames {
        check_dim(dim, frame.dim())?;
    }
    frames.par_chunks(window_size.max(1)).map(select_representative).collect()
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;
    use crate::db::MemoryRepository;

    fn frames(n: usize) -> Vec<Descriptor> {
        (0..n).map(|i| Descriptor::new(vec![i as f32, (i % 3) as f32])).collect()
    }

    #[rstest]
    #[case(12, 6, 2)]
    #[case(13, 6, 3)]
    #[case(5, 6, 1)]
    #[case(1, 1, 1)]
    #[case(7, 0, 7)]
    fn test_window_count(#[case] n: usize, #[case] size: usize, #[case] expected: usize) {
        assert_eq!(aggregate_windows(&frames(n), size, None).unwrap().len(), expected);
    }

    #[test]
    fn test_windows_in_order() {
        let frames = frames(13);
        let windows = aggregate_windows(&frames, 6, None).unwrap();
        for (i, window) in windows.iter().enumerate() {
            let chunk = &frames[i * 6..(i * 6 + 6).min(frames.len())];
            assert_eq!(window, &select_representative(chunk).unwrap());
            assert!(chunk.contains(window));
        }
        // 最后一个窗口只有一帧
        assert_eq!(windows[2], frames[12]);
    }

    #[test]
    fn test_empty_frames() {
        assert!(matches!(aggregate_windows(&[], 6, None), Err(Error::EmptyInput)));
    }

    #[test]
    fn test_expected_dim() {
        assert!(matches!(
            aggregate_windows(&frames(3), 6, Some(4)),
            Err(Error::DimensionMismatch { expected: 4, found: 2 })
        ));
    }

    #[tokio::test]
    async fn test_ingest_idempotent() {
        let repo = Arc::new(MemoryRepository::new());
        let pipeline = IndexingPipeline::new(repo.clone());

        let outcome = pipeline.ingest("videos/a.mp4", &frames(20)).await.unwrap();
        let IngestOutcome::Added { video, windows } = outcome else {
            panic!("视频应当被添加");
        };
        assert_eq!(windows, 4);

        let outcome = pipeline.ingest("videos/a.mp4", &frames(3)).await.unwrap();
        assert_eq!(outcome, IngestOutcome::Skipped(video));
        assert_eq!(repo.count().await.unwrap(), (1, 4));
    }

    #[tokio::test]
    async fn test_ingest_keeps_corpus_dim() {
        let repo = Arc::new(MemoryRepository::new());
        let pipeline = IndexingPipeline::new(repo.clone());
        pipeline.ingest("a.mp4", &frames(6)).await.unwrap();

        let wide = (0..6).map(|i| Descriptor::new(vec![i as f32, 0., 1.])).collect::<Vec<_>>();
        assert!(matches!(
            pipeline.ingest("b.mp4", &wide).await,
            Err(Error::DimensionMismatch { expected: 2, found: 3 })
        ));
        assert_eq!(repo.count().await.unwrap(), (1, 1));
        assert!(pipeline.build_index().await.is_ok());

        // 指定的维度与已入库语料不一致时同样拒绝
        let pipeline = IndexingPipeline::new(repo.clone()).expected_dim(Some(3));
        assert!(matches!(
            pipeline.ingest("c.mp4", &wide).await,
            Err(Error::DimensionMismatch { expected: 3, found: 2 })
        ));
        assert_eq!(repo.count().await.unwrap(), (1, 1));
    }

    #[tokio::test]
    async fn test_ingest_failure_writes_nothing() {
        let repo = Arc::new(MemoryRepository::new());
        let pipeline = IndexingPipeline::new(repo.clone());
        let mut bad = frames(8);
        bad.push(Descriptor::new(vec![1.]));
        assert!(pipeline.ingest("videos/bad.mp4", &bad).await.is_err());
        assert!(pipeline.ingest("videos/empty.mp4", &[]).await.is_err());
        assert_eq!(repo.count().await.unwrap(), (0, 0));
    }

    #[tokio::test]
    async fn test_build_index() {
        let repo = Arc::new(MemoryRepository::new());
        let pipeline = IndexingPipeline::new(repo.clone()).window_size(2);
        assert!(matches!(pipeline.build_index().await, Err(Error::EmptyCorpus)));

        pipeline.ingest("a.mp4", &frames(4)).await.unwrap();
        pipeline.ingest("b.mp4", &frames(5)).await.unwrap();
        let snapshot = pipeline.snapshot().await.unwrap();
        let index = pipeline.build_index().await.unwrap();
        assert_eq!(index.records(), &snapshot[..]);
        assert_eq!(index.len(), 5);
        assert_eq!(index.video_count(), 2);
        assert_eq!(index.record(4).window_index, 2);
    }
}
