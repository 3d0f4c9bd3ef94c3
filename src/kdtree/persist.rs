//! 索引文件格式
//!
//! ```text
//! 文件头（小端序，32 字节）:
//!   magic     b"VSKD"
//!   version   u16
//!   reserved  u16
//!   dim       u32
//!   records   u64
//!   nodes     u64
//!   body_len  u64
//! 正文: bincode 序列化的 (语料, 节点列表, 根节点)
//! 结尾: 正文的 blake3 哈希（32 字节）
//! ```

use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{Node, SpatialIndex};
use crate::db::FrameRecord;
use crate::error::{Error, Result};

const MAGIC: &[u8; 4] = b"VSKD";
const VERSION: u16 = 1;

#[derive(Serialize)]
struct IndexBodyRef<'a> {
    records: &'a [FrameRecord],
    nodes: &'a [Node],
    root: usize,
}

#[derive(Deserialize)]
struct IndexBody {
    records: Vec<FrameRecord>,
    nodes: Vec<Node>,
    root: usize,
}

impl SpatialIndex {
    /// 将索引写入文件
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let body = bincode::serialize(&IndexBodyRef {
            records: self.records(),
            nodes: self.nodes(),
            root: self.root(),
        })
        .map_err(std::io::Error::other)?;
        let hash = blake3::hash(&body);

        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(MAGIC)?;
        writer.write_u16::<LittleEndian>(VERSION)?;
        writer.write_u16::<LittleEndian>(0)?;
        writer.write_u32::<LittleEndian>(self.dim() as u32)?;
        writer.write_u64::<LittleEndian>(self.len() as u64)?;
        writer.write_u64::<LittleEndian>(self.nodes().len() as u64)?;
        writer.write_u64::<LittleEndian>(body.len() as u64)?;
        writer.write_all(&body)?;
        writer.write_all(hash.as_bytes())?;
        writer.flush()?;

        debug!("索引已写入 {}，正文 {} 字节", path.display(), body.len());
        Ok(())
    }

    /// 先写入临时文件再重命名，读取方永远不会看到写了一半的索引
    pub fn save_atomic(&self, path: impl AsRef<Path>, tmp: impl AsRef<Path>) -> Result<()> {
        self.save(tmp.as_ref())?;
        std::fs::rename(tmp.as_ref(), path.as_ref())?;
        info!("索引已保存到 {}", path.as_ref().display());
        Ok(())
    }

    /// 从文件加载索引并校验其结构
    ///
    /// `expected_dim` 为当前特征提取器的维度，不一致时加载失败。
    pub fn load(path: impl AsRef<Path>, expected_dim: Option<usize>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::index_load(path, e))?;
        let index = read_index(BufReader::new(file)).map_err(|e| Error::index_load(path, e))?;
        if let Some(dim) = expected_dim {
            if dim != index.dim() {
                return Err(Error::index_load(
                    path,
                    format!("索引维度 {} 与特征提取器维度 {} 不一致", index.dim(), dim),
                ));
            }
        }
        debug!("从 {} 加载了 {} 条记录，维度 {}", path.display(), index.len(), index.dim());
        Ok(index)
    }
}

fn read_index(mut reader: impl Read) -> Result<SpatialIndex, String> {
    let io = |e: std::io::Error| format!("读取失败: {e}");

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(io)?;
    if &magic != MAGIC {
        return Err("不是索引文件".to_string());
    }
    let version = reader.read_u16::<LittleEndian>().map_err(io)?;
    if version != VERSION {
        return Err(format!("不支持的索引版本 {version}"));
    }
    let _reserved = reader.read_u16::<LittleEndian>().map_err(io)?;
    let dim = reader.read_u32::<LittleEndian>().map_err(io)? as usize;
    let nrecords = reader.read_u64::<LittleEndian>().map_err(io)? as usize;
    let nnodes = reader.read_u64::<LittleEndian>().map_err(io)? as usize;
    let body_len = reader.read_u64::<LittleEndian>().map_err(io)?;

    let mut body = vec![];
    (&mut reader).take(body_len).read_to_end(&mut body).map_err(io)?;
    if body.len() as u64 != body_len {
        return Err("索引文件被截断".to_string());
    }
    let mut hash = [0u8; 32];
    reader.read_exact(&mut hash).map_err(|_| "索引文件缺少校验和".to_string())?;
    if blake3::hash(&body) != blake3::Hash::from_bytes(hash) {
        return Err("校验和不匹配".to_string());
    }
    if reader.read(&mut [0u8; 1]).map_err(io)? != 0 {
        return Err("索引文件末尾存在多余数据".to_string());
    }

    let body: IndexBody =
        bincode::deserialize(&body).map_err(|e| format!("无法解析索引正文: {e}"))?;
    if body.records.len() != nrecords || body.nodes.len() != nnodes {
        return Err("文件头与正文的记录数量不一致".to_string());
    }
    validate(dim, &body)?;

    Ok(SpatialIndex::from_parts(dim, body.records, body.nodes, body.root))
}

/// 记录在某一维度上的排序键，与构建时选取中位数的顺序一致
type Key = (f32, usize);

fn key_cmp(a: Key, b: Key) -> Ordering {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}

/// 检查节点拓扑：从根节点出发每个节点恰好访问一次，每条记录恰好被一个节点持有。
/// 同时检查 KD 树的顺序：左子树的记录都排在节点之前，右子树的记录都排在节点之后。
fn validate(dim: usize, body: &IndexBody) -> Result<(), String> {
    if dim == 0 {
        return Err("索引维度为 0".to_string());
    }
    if body.records.is_empty() {
        return Err("索引为空".to_string());
    }
    if body.nodes.len() != body.records.len() {
        return Err("节点数量与记录数量不一致".to_string());
    }
    if let Some(r) = body.records.iter().find(|r| r.descriptor.dim() != dim) {
        return Err(format!("记录维度 {} 与索引维度 {} 不一致", r.descriptor.dim(), dim));
    }

    let n = body.nodes.len();
    let mut node_seen = vec![false; n];
    let mut record_seen = vec![false; n];
    // 每个维度上祖先节点给出的 (下界, 上界)
    let mut stack = vec![(body.root, 0usize, vec![(None::<Key>, None::<Key>); dim])];
    while let Some((id, depth, bounds)) = stack.pop() {
        if id >= n || node_seen[id] {
            return Err(format!("节点 {id} 越界或被重复引用"));
        }
        node_seen[id] = true;

        let node = &body.nodes[id];
        if node.record >= n || record_seen[node.record] {
            return Err(format!("节点 {id} 的记录 {} 越界或被重复引用", node.record));
        }
        record_seen[node.record] = true;
        let descriptor = &body.records[node.record].descriptor;
        if node.split_dim != depth % dim || node.split_value != descriptor[node.split_dim] {
            return Err(format!("节点 {id} 的分割维度或分割值错误"));
        }

        for (axis, &(lower, upper)) in bounds.iter().enumerate() {
            let key = (descriptor[axis], node.record);
            let above = lower.is_none_or(|l| key_cmp(key, l) == Ordering::Greater);
            let below = upper.is_none_or(|u| key_cmp(key, u) == Ordering::Less);
            if !above || !below {
                return Err(format!("节点 {id} 不满足 KD 树的顺序"));
            }
        }

        let key = (node.split_value, node.record);
        if let Some(left) = node.left {
            let mut bounds = bounds.clone();
            bounds[node.split_dim].1 = Some(key);
            stack.push((left, depth + 1, bounds));
        }
        if let Some(right) = node.right {
            let mut bounds = bounds;
            bounds[node.split_dim].0 = Some(key);
            stack.push((right, depth + 1, bounds));
        }
    }
    if node_seen.iter().any(|seen| !seen) {
        return Err("存在无法从根节点到达的节点".to_string());
    }
    Ok(())
}
