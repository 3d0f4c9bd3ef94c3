mod persist;

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use serde::{Deserialize, Serialize};

use crate::db::FrameRecord;
use crate::descriptor::{check_dim, squared_euclidean};
use crate::error::{Error, Result};

/// KD 树节点，每个节点恰好持有一条记录
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// 分割维度，等于 depth % dim
    pub split_dim: usize,
    /// 分割值，即该节点记录在分割维度上的分量
    pub split_value: f32,
    /// 节点记录在语料中的位置
    pub record: usize,
    pub left: Option<usize>,
    pub right: Option<usize>,
}

/// 一次查询得到的近邻
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// 记录在语料中的位置，同时也是构建顺序
    pub record: usize,
    /// 欧氏距离
    pub distance: f32,
}

/// 在全部代表描述符上构建的静态 KD 树
///
/// 构建完成后只读，可以在多个线程中同时查询。重建索引会得到一个新的实例。
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    dim: usize,
    records: Vec<FrameRecord>,
    nodes: Vec<Node>,
    root: usize,
}

impl SpatialIndex {
    /// 使用语料快照构建索引
    ///
    /// 每一层按 `depth % dim` 选取分割维度，将子树中的记录按 (分量, 构建顺序) 排序后取中位数
    /// 作为节点，前半部分进入左子树，后半部分进入右子树。
    pub fn build(corpus: Vec<FrameRecord>) -> Result<Self> {
        let first = corpus.first().ok_or(Error::EmptyCorpus)?;
        let dim = first.descriptor.dim();
        if dim == 0 {
            return Err(Error::DimensionMismatch { expected: 1, found: 0 });
        }
        for record in &corpus {
            check_dim(dim, record.descriptor.dim())?;
        }

        let mut order = (0..corpus.len()).collect::<Vec<_>>();
        let mut nodes = Vec::with_capacity(corpus.len());
        let root =
            build_subtree(&corpus, &mut order, 0, dim, &mut nodes).ok_or(Error::EmptyCorpus)?;

        Ok(Self { dim, records: corpus, nodes, root })
    }

    /// 查询距离 `target` 最近的 `k` 条记录，结果按距离升序排列，距离相同时按构建顺序排列
    ///
    /// `k` 超过语料大小时返回全部记录。
    pub fn query(&self, target: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        check_dim(self.dim, target.len())?;
        if k == 0 {
            return Err(Error::InvalidK);
        }
        let mut best = BestK::new(k.min(self.records.len()));
        self.search(self.root, target, &mut best);
        Ok(best.into_sorted())
    }

    fn search(&self, node_id: usize, target: &[f32], best: &mut BestK) {
        let node = &self.nodes[node_id];
        let dis = squared_euclidean(&self.records[node.record].descriptor, target);
        best.offer(Candidate { dis, record: node.record });

        let diff = target[node.split_dim] - node.split_value;
        let (near, far) = if diff <= 0. { (node.left, node.right) } else { (node.right, node.left) };

        if let Some(near) = near {
            self.search(near, target, best);
        }
        // 使用 <= 而不是 <，以免剪掉距离相同但构建顺序更靠前的记录
        if let Some(far) = far {
            if !best.is_full() || diff * diff <= best.worst() {
                self.search(far, target, best);
            }
        }
    }

    /// 线性扫描全部记录，结果与 `query` 一致，用于校验与性能对比
    pub fn brute_force(&self, target: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        check_dim(self.dim, target.len())?;
        if k == 0 {
            return Err(Error::InvalidK);
        }
        let mut all = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| Candidate { dis: squared_euclidean(&r.descriptor, target), record: i })
            .collect::<Vec<_>>();
        all.sort_unstable();
        all.truncate(k);
        Ok(all.into_iter().map(Candidate::into_neighbor).collect())
    }

    /// 使用保存的语料重新构建，并逐个节点比较树结构
    pub fn verify(&self) -> Result<bool> {
        let rebuilt = Self::build(self.records.clone())?;
        Ok(rebuilt.root == self.root && rebuilt.nodes == self.nodes)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    pub fn record(&self, i: usize) -> &FrameRecord {
        &self.records[i]
    }

    /// 语料中不同视频的数量
    pub fn video_count(&self) -> usize {
        self.records.iter().map(|r| r.video_id).collect::<HashSet<_>>().len()
    }

    /// 树的深度，只有一个节点时为 1
    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(self.root, 1)];
        while let Some((id, depth)) = stack.pop() {
            max_depth = max_depth.max(depth);
            let node = &self.nodes[id];
            stack.extend(node.left.map(|c| (c, depth + 1)));
            stack.extend(node.right.map(|c| (c, depth + 1)));
        }
        max_depth
    }

    pub(crate) fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub(crate) fn root(&self) -> usize {
        self.root
    }

    /// 由反序列化得到的各部分组装索引，调用方负责校验
    pub(crate) fn from_parts(
        dim: usize,
        records: Vec<FrameRecord>,
        nodes: Vec<Node>,
        root: usize,
    ) -> Self {
        Self { dim, records, nodes, root }
    }
}

fn build_subtree(
    records: &[FrameRecord],
    order: &mut [usize],
    depth: usize,
    dim: usize,
    nodes: &mut Vec<Node>,
) -> Option<usize> {
    if order.is_empty() {
        return None;
    }

    let axis = depth % dim;
    let mid = order.len() / 2;
    // (分量, 构建顺序) 是全序，因此每个子树的记录集合与中位数都是确定的
    order.select_nth_unstable_by(mid, |&a, &b| {
        records[a].descriptor[axis].total_cmp(&records[b].descriptor[axis]).then(a.cmp(&b))
    });

    let record = order[mid];
    let id = nodes.len();
    nodes.push(Node {
        split_dim: axis,
        split_value: records[record].descriptor[axis],
        record,
        left: None,
        right: None,
    });

    let (left, rest) = order.split_at_mut(mid);
    let left = build_subtree(records, left, depth + 1, dim, nodes);
    let right = build_subtree(records, &mut rest[1..], depth + 1, dim, nodes);
    nodes[id].left = left;
    nodes[id].right = right;

    Some(id)
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    /// 平方距离
    dis: f32,
    record: usize,
}

impl Candidate {
    fn into_neighbor(self) -> Neighbor {
        Neighbor { record: self.record, distance: self.dis.sqrt() }
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dis.total_cmp(&other.dis).then(self.record.cmp(&other.record))
    }
}

/// 容量为 k 的大顶堆，堆顶是当前最差的候选
struct BestK {
    cap: usize,
    heap: BinaryHeap<Candidate>,
}

impl BestK {
    fn new(cap: usize) -> Self {
        Self { cap, heap: BinaryHeap::with_capacity(cap + 1) }
    }

    fn offer(&mut self, candidate: Candidate) {
        if self.heap.len() < self.cap {
            self.heap.push(candidate);
        } else if self.heap.peek().is_some_and(|worst| candidate < *worst) {
            self.heap.pop();
            self.heap.push(candidate);
        }
    }

    fn is_full(&self) -> bool {
        self.heap.len() >= self.cap
    }

    /// 当前第 k 个候选的平方距离
    fn worst(&self) -> f32 {
        self.heap.peek().map_or(f32::INFINITY, |c| c.dis)
    }

    fn into_sorted(self) -> Vec<Neighbor> {
        self.heap.into_sorted_vec().into_iter().map(Candidate::into_neighbor).collect()
    }
}
