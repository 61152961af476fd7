//! Provider capability trait, descriptors, and the static adapter registry
//!
//! Each concrete provider is a thin adapter translating the `analyze`
//! contract onto one vendor HTTP API. The router is agnostic to vendor wire
//! formats; it only sees `AnalysisResult` or a raw `ProviderError` that the
//! classifier normalizes.

pub mod claude;
pub mod deepseek;
pub mod openai;

pub use claude::ClaudeClient;
pub use deepseek::DeepSeekClient;
pub use openai::OpenAiClient;

use crate::config::{Config, ProviderConfig};
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// One analysis request, passed unchanged to whichever provider is selected.
///
/// Carries no routing state: the router decides *where* it goes, not *what*
/// it says.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Structured payload to analyze (opaque to the router)
    pub structured_data: serde_json::Value,
    /// Free-text notes accompanying the payload
    pub notes: Vec<String>,
    /// Correlation identifier threaded through logs and vendor calls
    pub request_id: Uuid,
}

impl AnalysisRequest {
    /// Text used for token estimation: the serialized payload plus notes.
    ///
    /// Only the *length* matters (relative cost ranking), so lossy
    /// serialization details are irrelevant here.
    pub fn estimation_text(&self) -> String {
        let mut text = self.structured_data.to_string();
        for note in &self.notes {
            text.push('\n');
            text.push_str(note);
        }
        text
    }
}

/// Metadata attached to every analysis result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    /// Provider-reported or fallback confidence in [0, 1]
    pub confidence_score: f64,
    /// Vendor model identifier that produced the result
    pub model_version: String,
    /// Wall-clock duration of the vendor call
    pub processing_time_ms: u64,
    /// Unix epoch milliseconds when the result was produced
    pub timestamp: u64,
}

/// Result of one successful analysis call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: String,
    pub key_insights: Vec<String>,
    pub next_actions: Vec<String>,
    pub metadata: AnalysisMetadata,
    /// Verbatim vendor response body, kept for diagnostics
    pub raw_response: String,
}

/// Raw failure reported by a provider adapter, before classification.
///
/// Adapters report the most structure they have: an HTTP status with the
/// response body when the vendor answered, a transport error when it did
/// not. The engine adds `Timeout` when the per-call deadline elapses.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Vendor responded with a non-success HTTP status
    #[error("upstream returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    /// Per-call deadline elapsed before the vendor answered
    #[error("call timed out after {timeout_seconds}s")]
    Timeout { timeout_seconds: u64 },

    /// Transport-level failure (connect, TLS, DNS, body read)
    #[error("network error: {0}")]
    Network(String),

    /// Free-text failure with no structured status attached
    #[error("{0}")]
    Message(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest's own client timeout; the engine applies its outer
            // deadline separately
            ProviderError::Timeout { timeout_seconds: 0 }
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

/// Capability interface every vendor adapter implements
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Perform one remote analysis call.
    ///
    /// Implementations must make at most one network request and must not
    /// retry internally; failover is the router's job.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, ProviderError>;
}

/// Immutable identity of one registered provider.
///
/// Set once at startup from configuration; never mutated. The nominal cost
/// is used only for ranking, never for billing.
#[derive(Clone)]
pub struct ProviderDescriptor {
    name: String,
    cost_per_1k_tokens: f64,
    client: Arc<dyn ProviderClient>,
}

impl ProviderDescriptor {
    pub fn new(name: String, cost_per_1k_tokens: f64, client: Arc<dyn ProviderClient>) -> Self {
        Self {
            name,
            cost_per_1k_tokens,
            client,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cost_per_1k_tokens(&self) -> f64 {
        self.cost_per_1k_tokens
    }

    pub fn client(&self) -> &Arc<dyn ProviderClient> {
        &self.client
    }
}

impl std::fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("name", &self.name)
            .field("cost_per_1k_tokens", &self.cost_per_1k_tokens)
            .finish_non_exhaustive()
    }
}

/// Build the fixed-at-startup provider list from configuration.
///
/// Provider names form a static registry: unknown names are a configuration
/// error, not a runtime dispatch concern. API keys are resolved from the
/// environment once, here.
pub fn build_providers(config: &Config) -> AppResult<Vec<ProviderDescriptor>> {
    let mut providers = Vec::new();

    for pc in config.enabled_providers() {
        let api_key = resolve_api_key(pc)?;
        let client: Arc<dyn ProviderClient> = match pc.name() {
            "claude" => Arc::new(ClaudeClient::new(
                pc.base_url().to_string(),
                api_key,
                pc.model().to_string(),
            )?),
            "openai" => Arc::new(OpenAiClient::new(
                pc.base_url().to_string(),
                api_key,
                pc.model().to_string(),
            )?),
            "deepseek" => Arc::new(DeepSeekClient::new(
                pc.base_url().to_string(),
                api_key,
                pc.model().to_string(),
            )?),
            other => {
                return Err(AppError::Config(format!(
                    "unknown provider '{}': expected one of claude, openai, deepseek",
                    other
                )));
            }
        };

        tracing::info!(
            provider = pc.name(),
            model = pc.model(),
            cost_per_1k_tokens = pc.cost_per_1k_tokens(),
            "Registered provider"
        );

        providers.push(ProviderDescriptor::new(
            pc.name().to_string(),
            pc.cost_per_1k_tokens(),
            client,
        ));
    }

    if providers.is_empty() {
        return Err(AppError::Config(
            "no enabled providers configured".to_string(),
        ));
    }

    Ok(providers)
}

fn resolve_api_key(pc: &ProviderConfig) -> AppResult<String> {
    std::env::var(pc.api_key_env()).map_err(|_| {
        AppError::Config(format!(
            "provider '{}' requires environment variable '{}' to be set",
            pc.name(),
            pc.api_key_env()
        ))
    })
}

/// Instruction sent to every vendor. The router does not own prompt
/// content; this is the minimal scaffolding the adapters need to get a
/// parseable analysis back.
pub(crate) const ANALYSIS_INSTRUCTION: &str = "You are an analysis assistant. Analyze the \
    provided structured data and notes. Respond with a single JSON object with keys \
    \"summary\" (string), \"key_insights\" (array of strings), \"next_actions\" (array of \
    strings) and \"confidence_score\" (number between 0 and 1). Respond with JSON only.";

/// Shape the adapters ask vendors to produce. Parsing is best-effort: a
/// response that is not valid JSON becomes a plain-text summary with a
/// conservative confidence.
#[derive(Debug, Deserialize)]
struct ParsedAnalysis {
    summary: String,
    #[serde(default)]
    key_insights: Vec<String>,
    #[serde(default)]
    next_actions: Vec<String>,
    #[serde(default = "default_confidence")]
    confidence_score: f64,
}

fn default_confidence() -> f64 {
    0.5
}

/// Assemble an `AnalysisResult` from vendor content.
pub(crate) fn build_result(
    content: &str,
    model_version: &str,
    started: std::time::Instant,
    raw_response: String,
) -> AnalysisResult {
    let (summary, key_insights, next_actions, confidence_score) =
        match serde_json::from_str::<ParsedAnalysis>(content.trim()) {
            Ok(parsed) => (
                parsed.summary,
                parsed.key_insights,
                parsed.next_actions,
                parsed.confidence_score.clamp(0.0, 1.0),
            ),
            Err(_) => (content.trim().to_string(), Vec::new(), Vec::new(), 0.5),
        };

    AnalysisResult {
        summary,
        key_insights,
        next_actions,
        metadata: AnalysisMetadata {
            confidence_score,
            model_version: model_version.to_string(),
            processing_time_ms: started.elapsed().as_millis() as u64,
            timestamp: epoch_millis(),
        },
        raw_response,
    }
}

/// Map a non-success vendor response to a structured `ProviderError`.
///
/// The body is kept (truncated) because free-text classification needs it.
pub(crate) async fn error_from_response(response: reqwest::Response) -> ProviderError {
    const MAX_BODY: usize = 2048;
    let status = response.status().as_u16();
    let mut message = response.text().await.unwrap_or_default();
    if message.len() > MAX_BODY {
        let mut cut = MAX_BODY;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }
    if message.is_empty() {
        message = format!("HTTP {} with empty body", status);
    }
    ProviderError::Status { status, message }
}

/// Current time as unix epoch milliseconds, for result metadata stamps.
pub(crate) fn epoch_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimation_text_includes_notes() {
        let request = AnalysisRequest {
            structured_data: serde_json::json!({"kind": "report"}),
            notes: vec!["first note".to_string(), "second note".to_string()],
            request_id: Uuid::new_v4(),
        };

        let text = request.estimation_text();
        assert!(text.contains("report"));
        assert!(text.contains("first note"));
        assert!(text.contains("second note"));
    }

    #[test]
    fn test_descriptor_accessors() {
        struct Noop;

        #[async_trait]
        impl ProviderClient for Noop {
            async fn analyze(
                &self,
                _request: &AnalysisRequest,
            ) -> Result<AnalysisResult, ProviderError> {
                Err(ProviderError::Message("noop".to_string()))
            }
        }

        let descriptor = ProviderDescriptor::new("claude".to_string(), 0.003, Arc::new(Noop));
        assert_eq!(descriptor.name(), "claude");
        assert_eq!(descriptor.cost_per_1k_tokens(), 0.003);
    }

    #[test]
    fn test_build_result_parses_json_content() {
        let content = r#"{
            "summary": "Revenue is trending up",
            "key_insights": ["Q2 beat forecast"],
            "next_actions": ["Review pricing"],
            "confidence_score": 0.85
        }"#;
        let result = build_result(content, "gpt-4o-mini", std::time::Instant::now(), content.to_string());
        assert_eq!(result.summary, "Revenue is trending up");
        assert_eq!(result.key_insights, vec!["Q2 beat forecast"]);
        assert_eq!(result.next_actions, vec!["Review pricing"]);
        assert_eq!(result.metadata.confidence_score, 0.85);
        assert_eq!(result.metadata.model_version, "gpt-4o-mini");
    }

    #[test]
    fn test_build_result_falls_back_to_plain_text() {
        let content = "The data looks broadly healthy.";
        let result = build_result(content, "m", std::time::Instant::now(), content.to_string());
        assert_eq!(result.summary, content);
        assert!(result.key_insights.is_empty());
        assert_eq!(result.metadata.confidence_score, 0.5);
    }

    #[test]
    fn test_build_result_clamps_confidence() {
        let content = r#"{"summary": "s", "confidence_score": 7.5}"#;
        let result = build_result(content, "m", std::time::Instant::now(), content.to_string());
        assert_eq!(result.metadata.confidence_score, 1.0);
    }

    #[test]
    fn test_provider_error_display_includes_status() {
        let err = ProviderError::Status {
            status: 503,
            message: "overloaded".to_string(),
        };
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("overloaded"));
    }
}
