use std::future::Future;
use std::path::Path;

use log::{debug, info};
use sqlx::{SqlitePool, sqlite::*};

pub mod crud;
mod memory;
pub mod model;

pub use memory::*;
pub use model::*;

use crate::descriptor::Descriptor;
use crate::error::Result;

pub type Database = SqlitePool;

pub async fn init_db(filename: impl AsRef<Path>) -> Result<Database> {
    let filename = filename.as_ref();
    info!("初始化数据库连接: {}", filename.display());

    let options = SqliteConnectOptions::new()
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .filename(filename)
        .create_if_missing(true);

    let pool = SqlitePool::connect_with(options).await?;

    info!("检查数据库迁移");
    sqlx::migrate!().run(&pool).await?;

    Ok(pool)
}

/// 视频与窗口描述符的存储接口
///
/// 核心逻辑只依赖这些操作，不关心具体的存储方式。
pub trait Repository: Send + Sync {
    /// 根据 ID 获取视频记录
    fn get_video_record(&self, id: i64) -> impl Future<Output = Result<Option<VideoRecord>>> + Send;

    /// 根据源路径获取视频记录
    fn find_video_by_path(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<Option<VideoRecord>>> + Send;

    /// 按插入顺序返回全部窗口描述符，作为构建索引的语料快照
    fn get_all_frame_records(&self) -> impl Future<Output = Result<Vec<FrameRecord>>> + Send;

    /// 已入库描述符的维度，语料为空时返回 None
    fn corpus_dim(&self) -> impl Future<Output = Result<Option<usize>>> + Send;

    /// 添加视频记录
    fn add_video_record(&self, path: &str) -> impl Future<Output = Result<VideoRecord>> + Send;

    /// 添加一个窗口描述符
    fn add_frame_record(&self, record: &FrameRecord) -> impl Future<Output = Result<()>> + Send;

    /// 原子地添加视频及其全部窗口描述符，第 i 个描述符的窗口序号为 i
    fn add_video_with_frames(
        &self,
        path: &str,
        windows: &[Descriptor],
    ) -> impl Future<Output = Result<VideoRecord>> + Send;

    /// 视频数量与窗口数量
    fn count(&self) -> impl Future<Output = Result<(usize, usize)>> + Send;
}

/// 基于 SQLite 的存储
#[derive(Clone)]
pub struct SqliteRepository {
    pool: Database,
}

impl SqliteRepository {
    pub async fn open(filename: impl AsRef<Path>) -> Result<Self> {
        Ok(Self { pool: init_db(filename).await? })
    }

    pub fn pool(&self) -> &Database {
        &self.pool
    }
}

impl Repository for SqliteRepository {
    async fn get_video_record(&self, id: i64) -> Result<Option<VideoRecord>> {
        Ok(crud::get_video(&self.pool, id).await?)
    }

    async fn find_video_by_path(&self, path: &str) -> Result<Option<VideoRecord>> {
        Ok(crud::get_video_by_path(&self.pool, path).await?)
    }

    async fn get_all_frame_records(&self) -> Result<Vec<FrameRecord>> {
        let rows = crud::get_frames(&self.pool).await?;
        debug!("读取了 {} 条窗口描述符", rows.len());
        rows.into_iter().map(FrameRecord::try_from).collect()
    }

    async fn corpus_dim(&self) -> Result<Option<usize>> {
        crud::get_corpus_dim(&self.pool).await?.map(stored_dim).transpose()
    }

    async fn add_video_record(&self, path: &str) -> Result<VideoRecord> {
        let id = crud::add_video(&self.pool, path).await?;
        Ok(VideoRecord { id, path: path.to_owned() })
    }

    async fn add_frame_record(&self, record: &FrameRecord) -> Result<()> {
        Ok(crud::add_frame(&self.pool, record).await?)
    }

    async fn add_video_with_frames(
        &self,
        path: &str,
        windows: &[Descriptor],
    ) -> Result<VideoRecord> {
        let mut tx = self.pool.begin().await?;
        let id = crud::add_video(&mut *tx, path).await?;
        for (i, descriptor) in windows.iter().enumerate() {
            let record =
                FrameRecord { video_id: id, window_index: i as u32, descriptor: descriptor.clone() };
            crud::add_frame(&mut *tx, &record).await?;
        }
        tx.commit().await?;
        Ok(VideoRecord { id, path: path.to_owned() })
    }

    async fn count(&self) -> Result<(usize, usize)> {
        let (videos, frames) = crud::get_count(&self.pool).await?;
        Ok((videos as usize, frames as usize))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::Error;

    async fn open() -> (TempDir, SqliteRepository) {
        let dir = TempDir::new().unwrap();
        let repo = SqliteRepository::open(dir.path().join("test.db")).await.unwrap();
        (dir, repo)
    }

    #[tokio::test]
    async fn test_video_crud() {
        let (_dir, repo) = open().await;
        let video = repo.add_video_record("videos/a.mp4").await.unwrap();
        assert_eq!(repo.get_video_record(video.id).await.unwrap(), Some(video.clone()));
        assert_eq!(repo.find_video_by_path("videos/a.mp4").await.unwrap(), Some(video));
        assert_eq!(repo.find_video_by_path("videos/b.mp4").await.unwrap(), None);
        assert_eq!(repo.get_video_record(12345).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_path() {
        let (_dir, repo) = open().await;
        repo.add_video_record("videos/a.mp4").await.unwrap();
        assert!(matches!(repo.add_video_record("videos/a.mp4").await, Err(Error::Database(_))));
    }

    #[tokio::test]
    async fn test_frames_in_order() {
        let (_dir, repo) = open().await;
        let a = repo
            .add_video_with_frames(
                "a.mp4",
                &[Descriptor::new(vec![1., 2.]), Descriptor::new(vec![3., 4.])],
            )
            .await
            .unwrap();
        let b = repo.add_video_record("b.mp4").await.unwrap();
        let record = FrameRecord {
            video_id: b.id,
            window_index: 0,
            descriptor: Descriptor::new(vec![-1.5, 0.25]),
        };
        repo.add_frame_record(&record).await.unwrap();

        let frames = repo.get_all_frame_records().await.unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].video_id, a.id);
        assert_eq!(frames[0].window_index, 0);
        assert_eq!(frames[1].window_index, 1);
        assert_eq!(frames[1].descriptor.as_slice(), &[3., 4.]);
        assert_eq!(frames[2], record);

        assert_eq!(repo.count().await.unwrap(), (2, 3));
    }

    #[tokio::test]
    async fn test_corpus_dim() {
        let (_dir, repo) = open().await;
        assert_eq!(repo.corpus_dim().await.unwrap(), None);
        repo.add_video_record("empty.mp4").await.unwrap();
        assert_eq!(repo.corpus_dim().await.unwrap(), None);
        repo.add_video_with_frames("a.mp4", &[Descriptor::new(vec![1., 2., 3.])]).await.unwrap();
        assert_eq!(repo.corpus_dim().await.unwrap(), Some(3));
    }
}
