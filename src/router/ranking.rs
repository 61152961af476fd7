//! Per-request candidate ordering
//!
//! Ranking is computed fresh for every request (the token estimate varies by
//! prompt) and never mutates shared state. Both strategies are fully
//! deterministic: `sort_by` is stable, so cost ties keep registration order.

use crate::config::RankingStrategy;
use crate::estimator::estimated_cost_usd;
use crate::providers::ProviderDescriptor;

/// Order candidates for one request.
///
/// - `FixedOrder` returns candidates in registration order.
/// - `CostThenFailover` sorts ascending by estimated request cost with
///   registration order as the tie break.
pub fn rank<'a>(
    candidates: &'a [ProviderDescriptor],
    estimated_tokens: u64,
    strategy: RankingStrategy,
) -> Vec<&'a ProviderDescriptor> {
    let mut ordered: Vec<&ProviderDescriptor> = candidates.iter().collect();

    if strategy == RankingStrategy::CostThenFailover {
        ordered.sort_by(|a, b| {
            let cost_a = estimated_cost_usd(estimated_tokens, a.cost_per_1k_tokens());
            let cost_b = estimated_cost_usd(estimated_tokens, b.cost_per_1k_tokens());
            cost_a
                .partial_cmp(&cost_b)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    ordered
}
