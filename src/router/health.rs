//! Per-provider health state: cooldown, disablement, and the local quota
//!
//! Each provider has one mutable health record owned by the router. State is
//! never stored as a flag that must be flipped back: "cooling" and
//! "disabled" are time comparisons against deadlines, so recovery is
//! automatic once the clock passes them.
//!
//! All state transitions are pure functions over an explicit `now` instant;
//! `HealthRegistry` wraps the records in a shared map and supplies
//! `Instant::now()`. Tests drive the pure methods with synthetic instants.

use crate::classify::{ClassifiedError, FailureKind};
use crate::config::{HealthConfig, QuotaConfig};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Cooldown and disable durations applied on classified failures
#[derive(Debug, Clone, Copy)]
pub struct HealthPolicy {
    pub auth_disable: Duration,
    pub payment_disable: Duration,
    pub rate_limit_cooldown: Duration,
    pub error_cooldown: Duration,
}

impl From<&HealthConfig> for HealthPolicy {
    fn from(config: &HealthConfig) -> Self {
        Self {
            auth_disable: config.auth_disable(),
            payment_disable: config.payment_disable(),
            rate_limit_cooldown: config.rate_limit_cooldown(),
            error_cooldown: config.error_cooldown(),
        }
    }
}

/// Sliding-window admission policy
#[derive(Debug, Clone, Copy)]
pub struct QuotaPolicy {
    pub window: Duration,
    pub max_requests: usize,
}

impl From<&QuotaConfig> for QuotaPolicy {
    fn from(config: &QuotaConfig) -> Self {
        Self {
            window: config.window(),
            max_requests: config.max_requests,
        }
    }
}

/// Most recent classified failure, kept for diagnostics only
#[derive(Debug, Clone)]
pub struct LastError {
    pub kind: FailureKind,
    pub status: Option<u16>,
    pub message: String,
    pub at: Instant,
}

/// Health record for a single provider.
///
/// Fields are private; transitions go through the methods below so the
/// deadline-monotonicity invariant cannot be violated from outside.
#[derive(Debug, Clone, Default)]
pub struct ProviderHealth {
    cooldown_until: Option<Instant>,
    disabled_until: Option<Instant>,
    consecutive_failures: u32,
    last_error: Option<LastError>,
    quota_events: VecDeque<Instant>,
}

impl ProviderHealth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Eligible iff `now` has passed both the cooldown and disable deadlines.
    pub fn is_eligible(&self, now: Instant) -> bool {
        !self.is_cooling(now) && !self.is_disabled(now)
    }

    pub fn is_cooling(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    pub fn is_disabled(&self, now: Instant) -> bool {
        self.disabled_until.is_some_and(|until| now < until)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn cooldown_until(&self) -> Option<Instant> {
        self.cooldown_until
    }

    pub fn disabled_until(&self) -> Option<Instant> {
        self.disabled_until
    }

    pub fn last_error(&self) -> Option<&LastError> {
        self.last_error.as_ref()
    }

    /// Success clears the cooldown and the failure counter. Disablement is
    /// deliberately left untouched: only deadline expiry re-enables a
    /// provider that was disabled for auth or billing reasons.
    pub fn record_success(&mut self, _now: Instant) {
        self.cooldown_until = None;
        self.consecutive_failures = 0;
    }

    /// Fold a classified failure into the record and apply the matching
    /// cooldown or disable transition.
    ///
    /// Returns the transition taken, so the caller can log it with context.
    pub fn record_failure(
        &mut self,
        now: Instant,
        error: &ClassifiedError,
        policy: &HealthPolicy,
    ) -> HealthTransition {
        self.consecutive_failures += 1;
        self.last_error = Some(LastError {
            kind: error.kind(),
            status: error.status(),
            message: error.message().to_string(),
            at: now,
        });

        match error.kind() {
            FailureKind::Unauthorized => {
                self.extend_disable(now + policy.auth_disable);
                HealthTransition::Disabled
            }
            FailureKind::PaymentRequired => {
                self.extend_disable(now + policy.payment_disable);
                HealthTransition::Disabled
            }
            FailureKind::RateLimited => {
                self.extend_cooldown(now + policy.rate_limit_cooldown);
                HealthTransition::Cooling
            }
            FailureKind::Timeout | FailureKind::TransientUpstream => {
                self.extend_cooldown(now + policy.error_cooldown);
                HealthTransition::Cooling
            }
            // The engine aborts the failover loop on these; no transition.
            FailureKind::NonRetryableUnknown => HealthTransition::None,
        }
    }

    /// A local quota rejection is treated like a vendor 429 for cooldown
    /// purposes, but it is a skip, not a call failure: the failure counter
    /// and last_error stay untouched.
    pub fn record_quota_rejection(&mut self, now: Instant, policy: &HealthPolicy) {
        self.extend_cooldown(now + policy.rate_limit_cooldown);
    }

    /// Sliding-window admission check.
    ///
    /// Prunes events older than the window, rejects without mutation when
    /// the cap is reached, otherwise records `now` and admits. The deque can
    /// never exceed `max_requests` entries.
    pub fn try_consume(&mut self, now: Instant, quota: &QuotaPolicy) -> bool {
        let horizon = now.checked_sub(quota.window);
        while let Some(oldest) = self.quota_events.front() {
            match horizon {
                Some(h) if *oldest <= h => {
                    self.quota_events.pop_front();
                }
                _ => break,
            }
        }

        if self.quota_events.len() >= quota.max_requests {
            return false;
        }

        self.quota_events.push_back(now);
        true
    }

    // Deadlines only ever grow: a second failure cannot shorten the window
    // an earlier failure established.
    fn extend_cooldown(&mut self, until: Instant) {
        self.cooldown_until = Some(match self.cooldown_until {
            Some(existing) => existing.max(until),
            None => until,
        });
    }

    fn extend_disable(&mut self, until: Instant) {
        self.disabled_until = Some(match self.disabled_until {
            Some(existing) => existing.max(until),
            None => until,
        });
    }
}

/// Transition taken by `record_failure`, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTransition {
    Cooling,
    Disabled,
    None,
}

/// Serializable snapshot of one provider's health, for the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealthView {
    pub provider: String,
    pub state: &'static str,
    pub consecutive_failures: u32,
    pub cooldown_remaining_ms: Option<u64>,
    pub disabled_remaining_ms: Option<u64>,
    pub last_error: Option<String>,
}

/// Shared health map for all registered providers.
///
/// Owned by the router instance, not process-global, so multiple routers
/// (e.g. in tests) do not interfere. The write lock makes each quota
/// check-and-append atomic per map: two concurrent requests cannot both
/// observe "under quota" when only one slot remains.
pub struct HealthRegistry {
    providers: RwLock<HashMap<String, ProviderHealth>>,
    policy: HealthPolicy,
    quota: QuotaPolicy,
}

impl HealthRegistry {
    pub fn new<I, S>(names: I, policy: HealthPolicy, quota: QuotaPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let providers: HashMap<String, ProviderHealth> = names
            .into_iter()
            .map(|name| (name.into(), ProviderHealth::new()))
            .collect();

        tracing::info!(
            total_providers = providers.len(),
            "Health registry initialized with all providers eligible"
        );

        Self {
            providers: RwLock::new(providers),
            policy,
            quota,
        }
    }

    /// Read-only eligibility check. Unknown providers are ineligible.
    pub async fn is_eligible(&self, name: &str) -> bool {
        let now = Instant::now();
        let providers = self.providers.read().await;
        providers.get(name).is_some_and(|h| h.is_eligible(now))
    }

    /// Atomic quota admission for one provider.
    pub async fn try_consume(&self, name: &str) -> bool {
        let now = Instant::now();
        let mut providers = self.providers.write().await;
        match providers.get_mut(name) {
            Some(health) => health.try_consume(now, &self.quota),
            None => {
                tracing::warn!(provider = name, "Quota check for unknown provider");
                false
            }
        }
    }

    pub async fn record_success(&self, name: &str) {
        let now = Instant::now();
        let mut providers = self.providers.write().await;
        if let Some(health) = providers.get_mut(name) {
            let was_cooling = health.is_cooling(now);
            health.record_success(now);
            if was_cooling {
                tracing::info!(provider = name, "Provider recovered, cooldown cleared");
            }
        } else {
            tracing::warn!(provider = name, "Success recorded for unknown provider");
        }
    }

    pub async fn record_failure(&self, name: &str, error: &ClassifiedError) {
        let now = Instant::now();
        let mut providers = self.providers.write().await;
        let Some(health) = providers.get_mut(name) else {
            tracing::warn!(provider = name, "Failure recorded for unknown provider");
            return;
        };

        let transition = health.record_failure(now, error, &self.policy);
        match transition {
            HealthTransition::Disabled => {
                tracing::warn!(
                    provider = name,
                    kind = error.kind().as_str(),
                    status = error.status(),
                    consecutive_failures = health.consecutive_failures(),
                    "Provider disabled"
                );
            }
            HealthTransition::Cooling => {
                tracing::warn!(
                    provider = name,
                    kind = error.kind().as_str(),
                    status = error.status(),
                    consecutive_failures = health.consecutive_failures(),
                    "Provider placed in cooldown"
                );
            }
            HealthTransition::None => {
                tracing::error!(
                    provider = name,
                    kind = error.kind().as_str(),
                    status = error.status(),
                    error = error.message(),
                    "Non-retryable failure recorded, no health transition"
                );
            }
        }
    }

    /// Apply the rate-limit cooldown after a local quota rejection, so a
    /// provider under sustained local throttling falls to the back of the
    /// rotation instead of being re-checked on every request.
    pub async fn record_quota_rejection(&self, name: &str) {
        let now = Instant::now();
        let mut providers = self.providers.write().await;
        if let Some(health) = providers.get_mut(name) {
            health.record_quota_rejection(now, &self.policy);
            tracing::warn!(
                provider = name,
                cooldown_seconds = self.policy.rate_limit_cooldown.as_secs(),
                "Local quota exhausted, rate-limit cooldown applied"
            );
        }
    }

    /// Snapshot of every provider's health for the health endpoint.
    pub async fn snapshot(&self) -> Vec<ProviderHealthView> {
        let now = Instant::now();
        let providers = self.providers.read().await;
        let mut views: Vec<ProviderHealthView> = providers
            .iter()
            .map(|(name, health)| {
                let state = if health.is_disabled(now) {
                    "disabled"
                } else if health.is_cooling(now) {
                    "cooling"
                } else {
                    "eligible"
                };
                ProviderHealthView {
                    provider: name.clone(),
                    state,
                    consecutive_failures: health.consecutive_failures(),
                    cooldown_remaining_ms: remaining_ms(health.cooldown_until(), now),
                    disabled_remaining_ms: remaining_ms(health.disabled_until(), now),
                    last_error: health.last_error().map(|e| e.message.clone()),
                }
            })
            .collect();
        views.sort_by(|a, b| a.provider.cmp(&b.provider));
        views
    }
}

fn remaining_ms(deadline: Option<Instant>, now: Instant) -> Option<u64> {
    deadline
        .filter(|until| *until > now)
        .map(|until| until.duration_since(now).as_millis() as u64)
}
