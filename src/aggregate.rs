use ndarray::prelude::*;

use crate::descriptor::{Descriptor, check_dim, squared_euclidean};
use crate::error::{Error, Result};

/// 从一个时间窗口内的多帧描述符中选出最接近均值的那一个
///
/// 返回的是输入中真实存在的描述符而不是均值本身。距离相同时取位置靠前的描述符，
/// 因此对于固定顺序的输入，结果是确定的。
pub fn select_representative(descriptors: &[Descriptor]) -> Result<Descriptor> {
    let first = descriptors.first().ok_or(Error::EmptyInput)?;
    let dim = first.dim();
    for des in descriptors {
        check_dim(dim, des.dim())?;
    }
    if descriptors.len() == 1 {
        return Ok(first.clone());
    }

    let mut data = Array2::<f32>::zeros((descriptors.len(), dim));
    for (mut row, des) in data.rows_mut().into_iter().zip(descriptors) {
        row.assign(&ArrayView1::from(des.as_slice()));
    }
    let mean = data.mean_axis(Axis(0)).ok_or(Error::EmptyInput)?.to_vec();

    let mut best = 0;
    let mut best_dis = f32::INFINITY;
    for (i, des) in descriptors.iter().enumerate() {
        let dis = squared_euclidean(des, &mean);
        // 严格小于，保证距离相同时取第一个
        if dis < best_dis {
            best = i;
            best_dis = dis;
        }
    }

    Ok(descriptors[best].clone())
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    fn des(v: &[f32]) -> Descriptor {
        Descriptor::new(v.to_vec())
    }

    #[test]
    fn test_single() {
        let v = vec![des(&[1., 2., 3.])];
        assert_eq!(select_representative(&v).unwrap(), v[0]);
    }

    #[test]
    fn test_empty() {
        assert!(matches!(select_representative(&[]), Err(Error::EmptyInput)));
    }

    #[test]
    fn test_closest_to_mean() {
        // 均值为 (2, 2)
        let v = vec![des(&[0., 0.]), des(&[2., 1.5]), des(&[4., 4.5])];
        assert_eq!(select_representative(&v).unwrap(), v[1]);
    }

    #[rstest]
    #[case::two(vec![des(&[0., 0.]), des(&[2., 2.])])]
    #[case::symmetric(vec![des(&[-1., 0.]), des(&[1., 0.]), des(&[0., -1.]), des(&[0., 1.])])]
    fn test_tie_first_wins(#[case] v: Vec<Descriptor>) {
        assert_eq!(select_representative(&v).unwrap(), v[0]);
    }

    #[test]
    fn test_deterministic() {
        let v = (0..20)
            .map(|i| des(&[(i * 7 % 13) as f32, (i * 3 % 5) as f32, i as f32 / 4.]))
            .collect::<Vec<_>>();
        let first = select_representative(&v).unwrap();
        for _ in 0..10 {
            assert_eq!(select_representative(&v).unwrap(), first);
        }
        assert!(v.contains(&first));
    }

    #[test]
    fn test_dimension_mismatch() {
        let v = vec![des(&[0., 0.]), des(&[1., 1., 1.])];
        assert!(matches!(
            select_representative(&v),
            Err(Error::DimensionMismatch { expected: 2, found: 3 })
        ));
    }
}
