use std::ops::Deref;

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// 定长的图像特征向量，维度由外部特征提取器的配置决定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor(Vec<f32>);

impl Descriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    /// 描述符维度
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }

    /// 到另一个向量的欧氏距离
    pub fn distance(&self, other: &[f32]) -> f32 {
        squared_euclidean(&self.0, other).sqrt()
    }

    /// 编码为小端序 f32 字节流，用于数据库存储
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.0.len() * 4];
        LittleEndian::write_f32_into(&self.0, &mut buf);
        buf
    }

    /// 从小端序 f32 字节流解码，`dim` 为记录中保存的维度
    pub fn from_le_bytes(bytes: &[u8], dim: usize) -> Result<Self> {
        if dim.checked_mul(4) != Some(bytes.len()) {
            return Err(Error::Corrupt(format!(
                "描述符长度为 {} 字节，与维度 {} 不符",
                bytes.len(),
                dim
            )));
        }
        let mut values = vec![0f32; dim];
        LittleEndian::read_f32_into(bytes, &mut values);
        Ok(Self(values))
    }
}

impl From<Vec<f32>> for Descriptor {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

impl Deref for Descriptor {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.0
    }
}

impl AsRef<[f32]> for Descriptor {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

/// 平方欧氏距离，调用方需保证两个向量维度相同
#[inline(always)]
pub fn squared_euclidean(va: &[f32], vb: &[f32]) -> f32 {
    debug_assert_eq!(va.len(), vb.len());
    va.iter().zip(vb).map(|(a, b)| (a - b) * (a - b)).sum()
}

/// 检查维度是否与期望一致
pub fn check_dim(expected: usize, found: usize) -> Result<()> {
    if expected != found {
        return Err(Error::DimensionMismatch { expected, found });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let a = Descriptor::new(vec![0., 0.]);
        assert_eq!(a.distance(&[3., 4.]), 5.);
        assert_eq!(a.distance(&[0., 0.]), 0.);
    }

    #[test]
    fn test_le_bytes() {
        let a = Descriptor::new(vec![1.5, -2.25, 0.]);
        let bytes = a.to_le_bytes();
        assert_eq!(bytes.len(), 12);
        assert_eq!(Descriptor::from_le_bytes(&bytes, 3).unwrap(), a);
    }

    #[test]
    fn test_le_bytes_wrong_dim() {
        let bytes = Descriptor::new(vec![1., 2.]).to_le_bytes();
        assert!(matches!(Descriptor::from_le_bytes(&bytes, 3), Err(Error::Corrupt(_))));
        assert!(matches!(Descriptor::from_le_bytes(&bytes, usize::MAX), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_check_dim() {
        assert!(check_dim(4, 4).is_ok());
        assert!(matches!(
            check_dim(4, 3),
            Err(Error::DimensionMismatch { expected: 4, found: 3 })
        ));
    }
}
