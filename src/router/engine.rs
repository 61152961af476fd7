//! The failover engine: rank, filter, admit, invoke, interpret, repeat
//!
//! One `route` call walks the ranked candidate list with a short-circuiting
//! sequential scan: the first success wins and aborts the loop, a
//! non-retryable unknown failure aborts it with an error, and everything
//! else becomes a health transition plus a hop to the next candidate.

use crate::classify::{ClassifiedError, FailureKind, classify};
use crate::config::{Config, RankingStrategy};
use crate::estimator::estimate_tokens;
use crate::metrics::{Metrics, RouteOutcome};
use crate::providers::{AnalysisRequest, AnalysisResult, ProviderDescriptor, ProviderError};
use crate::router::health::{HealthPolicy, HealthRegistry, QuotaPolicy};
use crate::router::ranking::rank;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Terminal routing failure surfaced to the caller.
///
/// Everything recoverable (rate limits, auth, billing, timeouts, transient
/// upstream errors) has already been folded into health state by the time
/// one of these is returned.
#[derive(Debug, Error)]
pub enum RouteError {
    /// A provider failed in a way that is neither transient nor one of the
    /// known disable categories; failing over would repeat the failure.
    #[error("non-retryable failure from {}: {}", .0.provider(), .0.message())]
    NonRetryable(ClassifiedError),

    /// Every candidate was skipped or failed.
    #[error("all providers failed or were ineligible")]
    AllProvidersExhausted {
        last_error: Option<ClassifiedError>,
    },
}

/// The multi-upstream failover router.
///
/// Owns the provider list and each provider's health state. One instance per
/// process under normal operation; tests build as many as they like without
/// interference.
pub struct FailoverRouter {
    providers: Vec<ProviderDescriptor>,
    health: Arc<HealthRegistry>,
    strategy: RankingStrategy,
    call_timeout: Duration,
    metrics: Arc<Metrics>,
}

impl FailoverRouter {
    pub fn new(
        providers: Vec<ProviderDescriptor>,
        strategy: RankingStrategy,
        health_policy: HealthPolicy,
        quota_policy: QuotaPolicy,
        call_timeout: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        let health = Arc::new(HealthRegistry::new(
            providers.iter().map(|p| p.name().to_string()),
            health_policy,
            quota_policy,
        ));

        Self {
            providers,
            health,
            strategy,
            call_timeout,
            metrics,
        }
    }

    /// Build a router from validated configuration and a provider list.
    pub fn from_config(
        config: &Config,
        providers: Vec<ProviderDescriptor>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self::new(
            providers,
            config.routing.strategy,
            HealthPolicy::from(&config.health),
            QuotaPolicy::from(&config.quota),
            Duration::from_secs(config.server.request_timeout_seconds),
            metrics,
        )
    }

    pub fn health(&self) -> &Arc<HealthRegistry> {
        &self.health
    }

    pub fn providers(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    /// Route one analysis request to the cheapest healthy provider.
    ///
    /// At most one call per eligible candidate per invocation; the same
    /// provider is never retried within one `route` call. For a fixed
    /// configuration, health state, and prompt, the attempt sequence is
    /// deterministic.
    pub async fn route(
        &self,
        request: &AnalysisRequest,
    ) -> Result<AnalysisResult, RouteError> {
        let estimated_tokens = estimate_tokens(&request.estimation_text());
        let ordered = rank(&self.providers, estimated_tokens, self.strategy);

        tracing::debug!(
            request_id = %request.request_id,
            estimated_tokens,
            strategy = self.strategy.as_str(),
            candidate_order = ?ordered.iter().map(|d| d.name()).collect::<Vec<_>>(),
            "Ranked candidates"
        );

        let mut last_error: Option<ClassifiedError> = None;

        for candidate in ordered {
            let name = candidate.name();

            // Read-only health check: cooling and disabled providers are
            // skipped without touching their state.
            if !self.health.is_eligible(name).await {
                tracing::debug!(
                    request_id = %request.request_id,
                    provider = name,
                    "Skipping ineligible provider"
                );
                continue;
            }

            // Admission control. A refusal is a skip, not a call failure,
            // but it cools the provider down like a vendor 429 would.
            if !self.health.try_consume(name).await {
                self.health.record_quota_rejection(name).await;
                self.metrics.record_quota_rejection(name);
                continue;
            }

            tracing::debug!(
                request_id = %request.request_id,
                provider = name,
                timeout_seconds = self.call_timeout.as_secs(),
                "Attempting provider call"
            );

            let raw_error = match tokio::time::timeout(
                self.call_timeout,
                candidate.client().analyze(request),
            )
            .await
            {
                Ok(Ok(result)) => {
                    self.health.record_success(name).await;
                    self.metrics.record_attempt_success(name);
                    self.metrics.record_route_outcome(RouteOutcome::Success);
                    tracing::info!(
                        request_id = %request.request_id,
                        provider = name,
                        processing_time_ms = result.metadata.processing_time_ms,
                        "Provider call succeeded"
                    );
                    return Ok(result);
                }
                Ok(Err(raw)) => raw,
                Err(_elapsed) => ProviderError::Timeout {
                    timeout_seconds: self.call_timeout.as_secs(),
                },
            };

            let classified = classify(name, &raw_error);
            self.health.record_failure(name, &classified).await;
            self.metrics
                .record_attempt_failure(name, classified.kind());

            tracing::warn!(
                request_id = %request.request_id,
                provider = name,
                kind = classified.kind().as_str(),
                status = classified.status(),
                error = classified.message(),
                "Provider call failed"
            );

            if classified.kind() == FailureKind::NonRetryableUnknown {
                // Failing over would repeat the failure; abort the scan.
                self.metrics
                    .record_route_outcome(RouteOutcome::NonRetryable);
                return Err(RouteError::NonRetryable(classified));
            }

            last_error = Some(classified);
        }

        self.metrics.record_route_outcome(RouteOutcome::Exhausted);
        tracing::error!(
            request_id = %request.request_id,
            last_error = last_error.as_ref().map(|e| e.to_string()),
            "All providers failed or were ineligible"
        );

        Err(RouteError::AllProvidersExhausted { last_error })
    }
}
