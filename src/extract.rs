use std::fs;
use std::io::Cursor;
use std::path::Path;

use ndarray::ArrayD;
use ndarray_npy::ReadNpyExt;

use crate::descriptor::{Descriptor, check_dim};
use crate::error::{Error, Result};

/// 特征提取器接口
///
/// 视频帧的特征由外部工具计算，这里只负责把它的输出转换为描述符。
pub trait FeatureExtractor: Send + Sync {
    /// 从查询数据中提取一个描述符
    fn extract(&self, bytes: &[u8]) -> Result<Descriptor>;
}

/// 读取外部工具生成的 `.npy` 文件
///
/// 查询文件为一维数组或 `1 × D` 矩阵，视频文件为 `N × D` 矩阵，每行一帧。元素类型为 f32 或 f64。
#[derive(Debug, Clone, Default)]
pub struct NpyExtractor {
    dim: Option<usize>,
}

impl NpyExtractor {
    pub fn new(dim: Option<usize>) -> Self {
        Self { dim }
    }

    /// 读取一个视频的逐帧描述符
    pub fn read_frames(&self, bytes: &[u8]) -> Result<Vec<Descriptor>> {
        let frames = decode_rows(bytes)?;
        if let (Some(dim), Some(first)) = (self.dim, frames.first()) {
            check_dim(dim, first.dim())?;
        }
        Ok(frames)
    }

    /// 读取一个视频的描述符文件
    pub fn read_frames_file(&self, path: impl AsRef<Path>) -> Result<Vec<Descriptor>> {
        self.read_frames(&fs::read(path)?)
    }
}

impl FeatureExtractor for NpyExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Descriptor> {
        let mut rows = decode_rows(bytes)?;
        if rows.len() != 1 {
            return Err(extraction(format!("查询应当只包含一个描述符，实际有 {} 个", rows.len())));
        }
        let descriptor = rows.swap_remove(0);
        if let Some(dim) = self.dim {
            check_dim(dim, descriptor.dim())?;
        }
        Ok(descriptor)
    }
}

fn extraction(e: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Error {
    Error::Extraction(e.into())
}

fn decode_rows(bytes: &[u8]) -> Result<Vec<Descriptor>> {
    let array = match ArrayD::<f32>::read_npy(Cursor::new(bytes)) {
        Ok(array) => array,
        Err(e) => match ArrayD::<f64>::read_npy(Cursor::new(bytes)) {
            Ok(array) => array.mapv(|x| x as f32),
            Err(_) => return Err(extraction(e)),
        },
    };

    if array.iter().any(|x| !x.is_finite()) {
        return Err(extraction("描述符中存在 NaN 或无穷大"));
    }

    let rows = match array.ndim() {
        1 => vec![Descriptor::new(array.iter().copied().collect())],
        2 => array.outer_iter().map(|row| Descriptor::new(row.iter().copied().collect())).collect(),
        n => return Err(extraction(format!("不支持的数组维数 {n}"))),
    };
    if rows.first().is_some_and(|row| row.dim() == 0) {
        return Err(extraction("描述符维度为 0"));
    }
    Ok(rows)
}
