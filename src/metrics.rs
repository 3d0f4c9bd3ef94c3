use std::sync::LazyLock;

use prometheus::{
    DEFAULT_BUCKETS, HistogramVec, IntCounterVec, exponential_buckets, register_histogram_vec,
    register_int_counter_vec,
};

static METRIC_SEARCH_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!("vid_search_count", "count of the search requests", &["count"])
        .expect("failed to register vid_search_count")
});

static METRIC_SEARCH_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "vid_search_duration",
        "duration of the per-query search in seconds",
        &["count"]
    )
    .expect("failed to register vid_search_duration")
});

static METRIC_SEARCH_BEST_DISTANCE: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "vid_search_best_distance",
        "distance of the best hit of the per-query search",
        &["count"],
        exponential_buckets(0.01, 2., 16).unwrap_or_else(|_| DEFAULT_BUCKETS.to_vec())
    )
    .expect("failed to register vid_search_best_distance")
});

static METRIC_SEARCH_INSUFFICIENT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "vid_search_insufficient",
        "count of the searches that found fewer videos than requested",
        &["count"]
    )
    .expect("failed to register vid_search_insufficient")
});

/// 增加搜索次数
pub fn inc_search_count(count: usize) {
    METRIC_SEARCH_COUNT.with_label_values(&[to_fixed_count(count)]).inc();
}

pub fn inc_search_duration(count: usize, duration: f32) {
    METRIC_SEARCH_DURATION.with_label_values(&[to_fixed_count(count)]).observe(duration as f64);
}

pub fn inc_search_best_distance(count: usize, distance: f32) {
    METRIC_SEARCH_BEST_DISTANCE
        .with_label_values(&[to_fixed_count(count)])
        .observe(distance as f64);
}

pub fn inc_search_insufficient(count: usize) {
    METRIC_SEARCH_INSUFFICIENT.with_label_values(&[to_fixed_count(count)]).inc();
}

/// 将请求数量归到几个固定区间，避免标签数量无限增长
fn to_fixed_count(count: usize) -> &'static str {
    if count <= 1 {
        "1"
    } else if count <= 3 {
        "3"
    } else if count <= 10 {
        "10"
    } else if count <= 50 {
        "50"
    } else {
        "50+"
    }
}
