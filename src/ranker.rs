use std::collections::HashSet;
use std::hash::Hash;

use crate::kdtree::{Neighbor, SpatialIndex};

/// 按视频去重，保留距离最近的前 `n` 个不同视频
///
/// `neighbors` 需按距离升序排列，输出保持这一顺序。不同视频不足 `n` 个时返回较短的结果，
/// 由调用方决定如何处理。
pub fn select_top(index: &SpatialIndex, neighbors: &[Neighbor], n: usize) -> Vec<Neighbor> {
    select_top_by(neighbors, n, |neighbor| index.record(neighbor.record).video_id)
}

/// 与 [`select_top`] 相同，但使用任意的去重键
pub fn select_top_by<T, K, F>(items: &[T], n: usize, mut key: F) -> Vec<T>
where
    T: Clone,
    K: Eq + Hash,
    F: FnMut(&T) -> K,
{
    let cap = n.min(items.len());
    let mut seen = HashSet::with_capacity(cap);
    let mut result = Vec::with_capacity(cap);
    for item in items {
        if result.len() >= n {
            break;
        }
        if seen.insert(key(item)) {
            result.push(item.clone());
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;
    use crate::kdtree::tests::{frame, random_corpus};

    #[test]
    fn test_dedup() {
        let items = [(1, 0.1), (1, 0.2), (2, 0.3), (3, 0.4), (2, 0.5), (4, 0.6)];
        let r = select_top_by(&items, 3, |x| x.0);
        assert_eq!(r, vec![(1, 0.1), (2, 0.3), (3, 0.4)]);
    }

    #[test]
    fn test_short_result() {
        let items = [(1, 0.1), (1, 0.2), (1, 0.3)];
        let r = select_top_by(&items, 3, |x| x.0);
        assert_eq!(r, vec![(1, 0.1)]);
        assert!(select_top_by::<(i32, f32), _, _>(&[], 3, |x| x.0).is_empty());
        assert!(select_top_by(&items, 0, |x| x.0).is_empty());
    }

    #[test]
    fn test_huge_n() {
        let items = [(1, 0.1), (2, 0.2), (1, 0.3)];
        let r = select_top_by(&items, usize::MAX, |x| x.0);
        assert_eq!(r, vec![(1, 0.1), (2, 0.2)]);
    }

    #[test]
    fn test_scenario() {
        let corpus = vec![
            frame(1, 0, &[0., 0.]),
            frame(1, 1, &[0., 1.]),
            frame(2, 0, &[10., 10.]),
            frame(2, 1, &[10., 11.]),
            frame(2, 2, &[5., 5.]),
        ];
        let index = SpatialIndex::build(corpus).unwrap();
        let neighbors = index.query(&[0., 0.2], index.len()).unwrap();
        let top = select_top(&index, &neighbors, 2);

        assert_eq!(top.len(), 2);
        assert_eq!(index.record(top[0].record).video_id, 1);
        assert_eq!(index.record(top[1].record).video_id, 2);
        assert_eq!(index.record(top[1].record).window_index, 2);
        assert!(top[0].distance <= top[1].distance);
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    #[case(6)]
    #[case(20)]
    fn test_invariants(#[case] n: usize) {
        let index = SpatialIndex::build(random_corpus(31, 200, 3, 6)).unwrap();
        let neighbors = index.query(&[1., 2., 3.], index.len()).unwrap();
        let top = select_top(&index, &neighbors, n);

        let ids = top.iter().map(|x| index.record(x.record).video_id).collect::<Vec<_>>();
        let unique = ids.iter().collect::<HashSet<_>>();
        assert_eq!(unique.len(), ids.len());
        assert_eq!(top.len(), n.min(index.video_count()));
        assert!(top.windows(2).all(|w| w[0].distance <= w[1].distance));
    }
}
