//! Routing performance benchmarks
//!
//! Measures the non-I/O routing components: token estimation, candidate
//! ranking, and cache-key hashing. Run with `cargo bench`.

use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::sync::Arc;
use thriftroute::cache::cache_key;
use thriftroute::config::RankingStrategy;
use thriftroute::estimator::estimate_tokens;
use thriftroute::providers::{
    AnalysisRequest, AnalysisResult, ProviderClient, ProviderDescriptor, ProviderError,
};
use thriftroute::router::rank;
use uuid::Uuid;

struct Noop;

#[async_trait]
impl ProviderClient for Noop {
    async fn analyze(&self, _request: &AnalysisRequest) -> Result<AnalysisResult, ProviderError> {
        Err(ProviderError::Message("bench stub".to_string()))
    }
}

fn descriptors(count: usize) -> Vec<ProviderDescriptor> {
    (0..count)
        .map(|i| {
            ProviderDescriptor::new(
                format!("provider-{}", i),
                0.0001 * (i as f64 + 1.0),
                Arc::new(Noop),
            )
        })
        .collect()
}

fn bench_token_estimation(c: &mut Criterion) {
    let mut group = c.benchmark_group("token_estimation");
    for size in [64usize, 1024, 16_384] {
        let text = "a".repeat(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &text, |b, text| {
            b.iter(|| estimate_tokens(text));
        });
    }
    group.finish();
}

fn bench_ranking(c: &mut Criterion) {
    let mut group = c.benchmark_group("ranking");
    for count in [3usize, 10, 50] {
        let candidates = descriptors(count);
        group.bench_with_input(
            BenchmarkId::from_parameter(count),
            &candidates,
            |b, candidates| {
                b.iter(|| rank(candidates, 2048, RankingStrategy::CostThenFailover));
            },
        );
    }
    group.finish();
}

fn bench_cache_key(c: &mut Criterion) {
    let request = AnalysisRequest {
        structured_data: serde_json::json!({
            "region": "emea",
            "revenue": [10, 20, 30, 40],
            "segments": {"smb": 0.4, "enterprise": 0.6}
        }),
        notes: vec!["compare against last quarter".to_string()],
        request_id: Uuid::new_v4(),
    };

    c.bench_function("cache_key", |b| {
        b.iter(|| cache_key(&request));
    });
}

criterion_group!(benches, bench_token_estimation, bench_ranking, bench_cache_key);
criterion_main!(benches);
