//! Prometheus metrics for routing outcomes
//!
//! Exposed at `GET /metrics` in Prometheus text format. Label values are
//! restricted to provider names from configuration and fixed outcome strings,
//! so cardinality is bounded by the registered provider set.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::classify::FailureKind;

/// Terminal outcome of one `route` invocation, for metrics labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Success,
    Exhausted,
    NonRetryable,
}

impl RouteOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteOutcome::Success => "success",
            RouteOutcome::Exhausted => "exhausted",
            RouteOutcome::NonRetryable => "non_retryable",
        }
    }
}

/// Cache lookup outcome, for metrics labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
    Hit,
    Miss,
    Error,
    Store,
}

impl CacheEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheEvent::Hit => "hit",
            CacheEvent::Miss => "miss",
            CacheEvent::Error => "error",
            CacheEvent::Store => "store",
        }
    }
}

/// Metrics registry for the router
pub struct Metrics {
    registry: Registry,
    attempts_total: IntCounterVec,
    quota_rejections_total: IntCounterVec,
    disables_total: IntCounterVec,
    route_outcomes_total: IntCounterVec,
    cache_events_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let attempts_total = IntCounterVec::new(
            Opts::new(
                "thriftroute_provider_attempts_total",
                "Provider call attempts by provider and outcome",
            ),
            &["provider", "outcome"],
        )?;
        registry.register(Box::new(attempts_total.clone()))?;

        let quota_rejections_total = IntCounterVec::new(
            Opts::new(
                "thriftroute_quota_rejections_total",
                "Local quota rejections by provider",
            ),
            &["provider"],
        )?;
        registry.register(Box::new(quota_rejections_total.clone()))?;

        let disables_total = IntCounterVec::new(
            Opts::new(
                "thriftroute_provider_disables_total",
                "Provider disablements (auth/billing failures) by provider",
            ),
            &["provider"],
        )?;
        registry.register(Box::new(disables_total.clone()))?;

        let route_outcomes_total = IntCounterVec::new(
            Opts::new(
                "thriftroute_route_outcomes_total",
                "Terminal routing outcomes",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(route_outcomes_total.clone()))?;

        let cache_events_total = IntCounterVec::new(
            Opts::new("thriftroute_cache_events_total", "Result cache events"),
            &["event"],
        )?;
        registry.register(Box::new(cache_events_total.clone()))?;

        Ok(Self {
            registry,
            attempts_total,
            quota_rejections_total,
            disables_total,
            route_outcomes_total,
            cache_events_total,
        })
    }

    pub fn record_attempt_success(&self, provider: &str) {
        self.attempts_total
            .with_label_values(&[provider, "success"])
            .inc();
    }

    pub fn record_attempt_failure(&self, provider: &str, kind: FailureKind) {
        self.attempts_total
            .with_label_values(&[provider, kind.as_str()])
            .inc();
        if matches!(
            kind,
            FailureKind::Unauthorized | FailureKind::PaymentRequired
        ) {
            self.disables_total.with_label_values(&[provider]).inc();
        }
    }

    pub fn record_quota_rejection(&self, provider: &str) {
        self.quota_rejections_total
            .with_label_values(&[provider])
            .inc();
    }

    pub fn record_route_outcome(&self, outcome: RouteOutcome) {
        self.route_outcomes_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    pub fn record_cache_event(&self, event: CacheEvent) {
        self.cache_events_total
            .with_label_values(&[event.as_str()])
            .inc();
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_without_conflict() {
        // Each instance owns its registry, so tests and multiple routers
        // never collide on metric names.
        let a = Metrics::new().expect("first registry");
        let b = Metrics::new().expect("second registry");
        a.record_attempt_success("claude");
        b.record_attempt_success("claude");
    }

    #[test]
    fn test_gather_includes_recorded_counters() {
        let metrics = Metrics::new().expect("registry");
        metrics.record_attempt_success("openai");
        metrics.record_attempt_failure("claude", FailureKind::RateLimited);
        metrics.record_quota_rejection("claude");
        metrics.record_route_outcome(RouteOutcome::Success);
        metrics.record_cache_event(CacheEvent::Hit);

        let output = metrics.gather().expect("gather");
        assert!(output.contains("thriftroute_provider_attempts_total"));
        assert!(output.contains(r#"provider="openai",outcome="success""#) ||
            output.contains(r#"outcome="success",provider="openai""#));
        assert!(output.contains("thriftroute_quota_rejections_total"));
        assert!(output.contains("thriftroute_cache_events_total"));
    }

    #[test]
    fn test_auth_failure_counts_as_disable() {
        let metrics = Metrics::new().expect("registry");
        metrics.record_attempt_failure("claude", FailureKind::Unauthorized);
        let output = metrics.gather().expect("gather");
        assert!(output.contains("thriftroute_provider_disables_total"));
    }
}
