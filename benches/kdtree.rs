use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vidsearch::db::FrameRecord;
use vidsearch::{Descriptor, SpatialIndex};

// 生成有聚类模式的测试数据，每个视频的窗口描述符分布在各自的中心附近
fn generate_corpus(n: usize, dim: usize, videos: usize) -> Vec<FrameRecord> {
    let mut rng = StdRng::seed_from_u64(42); // 使用固定种子确保结果可重现
    let centers = (0..videos)
        .map(|_| (0..dim).map(|_| rng.random_range(-100.0f32..100.0)).collect::<Vec<_>>())
        .collect::<Vec<_>>();

    (0..n)
        .map(|i| {
            let video = i % videos;
            let v = centers[video].iter().map(|c| c + rng.random_range(-5.0f32..5.0)).collect();
            FrameRecord {
                video_id: video as i64 + 1,
                window_index: (i / videos) as u32,
                descriptor: Descriptor::new(v),
            }
        })
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("kdtree_build");
    for n in [10_000, 100_000] {
        let corpus = generate_corpus(n, 16, 500);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &corpus, |b, corpus| {
            b.iter(|| SpatialIndex::build(corpus.clone()).map(|index| index.depth()));
        });
    }
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("kdtree_query");
    let mut rng = StdRng::seed_from_u64(7);

    for dim in [4, 16, 64] {
        let index = match SpatialIndex::build(generate_corpus(50_000, dim, 500)) {
            Ok(index) => index,
            Err(e) => panic!("构建索引失败: {e}"),
        };
        let queries = (0..64)
            .map(|_| (0..dim).map(|_| rng.random_range(-100.0f32..100.0)).collect::<Vec<_>>())
            .collect::<Vec<_>>();
        let k = black_box(30);

        group.bench_with_input(BenchmarkId::new("kdtree", dim), &queries, |b, queries| {
            b.iter(|| {
                queries
                    .iter()
                    .filter_map(|q| index.query(q, k).ok())
                    .map(|r| r.len())
                    .sum::<usize>()
            });
        });
        group.bench_with_input(BenchmarkId::new("brute_force", dim), &queries, |b, queries| {
            b.iter(|| {
                queries
                    .iter()
                    .filter_map(|q| index.brute_force(q, k).ok())
                    .map(|r| r.len())
                    .sum::<usize>()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_build, bench_query);
criterion_main!(benches);
