use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{FrameRecord, Repository, VideoRecord};
use crate::descriptor::Descriptor;
use crate::error::Result;

/// 内存中的存储，用于测试以及不需要持久化的场景
#[derive(Default)]
pub struct MemoryRepository {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    videos: Vec<VideoRecord>,
    frames: Vec<FrameRecord>,
}

impl MemoryInner {
    fn add_video(&mut self, path: &str) -> VideoRecord {
        let video = VideoRecord { id: self.videos.len() as i64 + 1, path: path.to_owned() };
        self.videos.push(video.clone());
        video
    }
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Repository for MemoryRepository {
    async fn get_video_record(&self, id: i64) -> Result<Option<VideoRecord>> {
        let inner = self.lock();
        Ok(inner.videos.iter().find(|v| v.id == id).cloned())
    }

    async fn find_video_by_path(&self, path: &str) -> Result<Option<VideoRecord>> {
        let inner = self.lock();
        Ok(inner.videos.iter().find(|v| v.path == path).cloned())
    }

    async fn get_all_frame_records(&self) -> Result<Vec<FrameRecord>> {
        Ok(self.lock().frames.clone())
    }

    async fn corpus_dim(&self) -> Result<Option<usize>> {
        Ok(self.lock().frames.first().map(|f| f.descriptor.dim()))
    }

    async fn add_video_record(&self, path: &str) -> Result<VideoRecord> {
        Ok(self.lock().add_video(path))
    }

    async fn add_frame_record(&self, record: &FrameRecord) -> Result<()> {
        self.lock().frames.push(record.clone());
        Ok(())
    }

    async fn add_video_with_frames(
        &self,
        path: &str,
        windows: &[Descriptor],
    ) -> Result<VideoRecord> {
        let mut inner = self.lock();
        let video = inner.add_video(path);
        inner.frames.extend(windows.iter().enumerate().map(|(i, descriptor)| FrameRecord {
            video_id: video.id,
            window_index: i as u32,
            descriptor: descriptor.clone(),
        }));
        Ok(video)
    }

    async fn count(&self) -> Result<(usize, usize)> {
        let inner = self.lock();
        Ok((inner.videos.len(), inner.frames.len()))
    }
}
