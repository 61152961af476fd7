//! Normalization of heterogeneous upstream failures into a fixed taxonomy
//!
//! Vendors disagree about how they fail: some return clean HTTP statuses,
//! some wrap everything in free-text messages, transport errors carry no
//! status at all. The classifier folds all of that into one `ClassifiedError`
//! value the health state machine and the failover engine can branch on.

use crate::providers::ProviderError;
use serde::Serialize;

/// Message fragments that indicate vendor-side throttling.
const RATE_LIMIT_PATTERNS: &[&str] = &[
    "rate limit",
    "rate_limit",
    "too many requests",
    "429",
    "quota exceeded",
    "resource exhausted",
    "usage limit",
    "throttl",
];

/// Message fragments that indicate credential problems.
const AUTH_PATTERNS: &[&str] = &[
    "unauthorized",
    "forbidden",
    "invalid api key",
    "invalid_api_key",
    "incorrect api key",
    "authentication",
    "access denied",
    "401",
    "403",
];

/// Message fragments that indicate exhausted credit or billing problems.
const PAYMENT_PATTERNS: &[&str] = &[
    "payment",
    "insufficient credit",
    "insufficient funds",
    "credit balance",
    "billing",
    "402",
];

/// Failure category in the router's taxonomy.
///
/// The first five are recovered locally (health transition plus a failover
/// attempt). `NonRetryableUnknown` aborts the failover loop and is surfaced
/// to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RateLimited,
    Unauthorized,
    PaymentRequired,
    Timeout,
    TransientUpstream,
    NonRetryableUnknown,
}

impl FailureKind {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::RateLimited => "rate_limited",
            FailureKind::Unauthorized => "unauthorized",
            FailureKind::PaymentRequired => "payment_required",
            FailureKind::Timeout => "timeout",
            FailureKind::TransientUpstream => "transient_upstream",
            FailureKind::NonRetryableUnknown => "non_retryable_unknown",
        }
    }
}

/// One classified failure. Pure value, no identity: created per failed
/// attempt, folded into health state and logs, then discarded.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedError {
    provider: String,
    kind: FailureKind,
    status: Option<u16>,
    message: String,
    retryable: bool,
}

impl ClassifiedError {
    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn retryable(&self) -> bool {
        self.retryable
    }
}

impl std::fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "{} [{}, HTTP {}]: {}",
                self.provider,
                self.kind.as_str(),
                status,
                self.message
            ),
            None => write!(
                f,
                "{} [{}]: {}",
                self.provider,
                self.kind.as_str(),
                self.message
            ),
        }
    }
}

/// Classify a raw provider failure.
///
/// Structured statuses pass through unchanged. Free-text messages are
/// matched case-insensitively against the pattern tables above, in
/// precedence order: rate limit, then auth, then payment. Anything that
/// matches nothing is assumed transient — unknown failures are presumed
/// recoverable, while auth and billing failures are presumed persistent
/// until operator intervention.
pub fn classify(provider: &str, raw: &ProviderError) -> ClassifiedError {
    match raw {
        ProviderError::Status { status, message } => classify_status(provider, *status, message),
        ProviderError::Timeout { timeout_seconds } => ClassifiedError {
            provider: provider.to_string(),
            kind: FailureKind::Timeout,
            status: None,
            message: format!("call timed out after {}s", timeout_seconds),
            retryable: true,
        },
        ProviderError::Network(message) => ClassifiedError {
            provider: provider.to_string(),
            kind: FailureKind::TransientUpstream,
            status: None,
            message: message.clone(),
            retryable: true,
        },
        ProviderError::Message(message) => classify_message(provider, message),
    }
}

fn classify_status(provider: &str, status: u16, message: &str) -> ClassifiedError {
    let (kind, retryable) = match status {
        429 => (FailureKind::RateLimited, true),
        401 | 403 => (FailureKind::Unauthorized, false),
        402 => (FailureKind::PaymentRequired, false),
        408 => (FailureKind::TransientUpstream, true),
        500..=599 => (FailureKind::TransientUpstream, true),
        400..=499 => (FailureKind::NonRetryableUnknown, false),
        // Sub-400 statuses should never reach the error path; treat them
        // as transient rather than fatal.
        _ => (FailureKind::TransientUpstream, true),
    };
    ClassifiedError {
        provider: provider.to_string(),
        kind,
        status: Some(status),
        message: message.to_string(),
        retryable,
    }
}

fn classify_message(provider: &str, message: &str) -> ClassifiedError {
    let lower = message.to_lowercase();

    let (kind, status, retryable) = if contains_any(&lower, RATE_LIMIT_PATTERNS) {
        (FailureKind::RateLimited, Some(429), true)
    } else if contains_any(&lower, AUTH_PATTERNS) {
        (FailureKind::Unauthorized, Some(401), false)
    } else if contains_any(&lower, PAYMENT_PATTERNS) {
        (FailureKind::PaymentRequired, Some(402), false)
    } else {
        (FailureKind::TransientUpstream, None, true)
    };

    ClassifiedError {
        provider: provider.to_string(),
        kind,
        status,
        message: message.to_string(),
        retryable,
    }
}

fn contains_any(haystack: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| haystack.contains(p))
}
