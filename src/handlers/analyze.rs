//! Analyze endpoint handler
//!
//! Handles POST /analyze: validate, consult the result cache, route through
//! the failover engine on a miss, and convert terminal routing failures into
//! a degraded-but-valid fallback response.

use crate::cache::cache_key;
use crate::handlers::AppState;
use crate::metrics::CacheEvent;
use crate::middleware::RequestId;
use crate::providers::{AnalysisMetadata, AnalysisRequest, AnalysisResult};
use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Maximum number of notes accepted per request
const MAX_NOTES: usize = 64;

/// Maximum length of a single note in characters
const MAX_NOTE_LENGTH: usize = 10_000;

/// Analyze request from a client.
///
/// Validation is enforced during deserialization - invalid instances cannot
/// exist.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeRequest {
    structured_data: serde_json::Value,
    notes: Vec<String>,
}

impl AnalyzeRequest {
    pub fn structured_data(&self) -> &serde_json::Value {
        &self.structured_data
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Attach the request id and produce the value the router consumes.
    pub fn into_analysis_request(self, request_id: Uuid) -> AnalysisRequest {
        AnalysisRequest {
            structured_data: self.structured_data,
            notes: self.notes,
            request_id,
        }
    }
}

impl<'de> Deserialize<'de> for AnalyzeRequest {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawAnalyzeRequest {
            structured_data: serde_json::Value,
            #[serde(default)]
            notes: Vec<String>,
        }

        let raw = RawAnalyzeRequest::deserialize(deserializer)?;

        match &raw.structured_data {
            serde_json::Value::Null => {
                return Err(serde::de::Error::custom("structured_data cannot be null"));
            }
            serde_json::Value::Object(map) if map.is_empty() => {
                return Err(serde::de::Error::custom("structured_data cannot be empty"));
            }
            _ => {}
        }

        if raw.notes.len() > MAX_NOTES {
            return Err(serde::de::Error::custom(format!(
                "at most {} notes are accepted (got {})",
                MAX_NOTES,
                raw.notes.len()
            )));
        }
        for (index, note) in raw.notes.iter().enumerate() {
            if note.trim().is_empty() {
                return Err(serde::de::Error::custom(format!(
                    "note {} is empty or whitespace-only",
                    index
                )));
            }
            let chars = note.chars().count();
            if chars > MAX_NOTE_LENGTH {
                return Err(serde::de::Error::custom(format!(
                    "note {} exceeds maximum length of {} characters (got {})",
                    index, MAX_NOTE_LENGTH, chars
                )));
            }
        }

        Ok(AnalyzeRequest {
            structured_data: raw.structured_data,
            notes: raw.notes,
        })
    }
}

/// Analyze response to the client
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    /// True when the result was served from the cache
    pub cached: bool,
    /// True when every provider failed and this is the fallback summary
    pub degraded: bool,
    pub result: AnalysisResult,
}

/// Fixed low-confidence response returned when routing fails terminally.
///
/// The router surfaces the error; converting it into a valid-but-degraded
/// response is this layer's job.
fn fallback_result() -> AnalysisResult {
    AnalysisResult {
        summary: "Automated analysis is temporarily unavailable. No provider could service \
                  this request; please retry later or review the data manually."
            .to_string(),
        key_insights: Vec::new(),
        next_actions: vec!["Retry the analysis later".to_string()],
        metadata: AnalysisMetadata {
            confidence_score: 0.1,
            model_version: "fallback".to_string(),
            processing_time_ms: 0,
            timestamp: crate::providers::epoch_millis(),
        },
        raw_response: String::new(),
    }
}

/// POST /analyze handler
pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<AnalyzeRequest>,
) -> Json<AnalyzeResponse> {
    let analysis_request = request.into_analysis_request(request_id.as_uuid());
    let key = cache_key(&analysis_request);

    if let Some(cache) = state.cache() {
        match cache.get(&key).await {
            Ok(Some(result)) => {
                state.metrics().record_cache_event(CacheEvent::Hit);
                return Json(AnalyzeResponse {
                    cached: true,
                    degraded: false,
                    result,
                });
            }
            Ok(None) => {
                state.metrics().record_cache_event(CacheEvent::Miss);
            }
            Err(e) => {
                // Cache outages degrade to a miss; the request continues.
                state.metrics().record_cache_event(CacheEvent::Error);
                tracing::warn!(
                    request_id = %request_id,
                    error = %e,
                    "Cache lookup failed, treating as miss"
                );
            }
        }
    }

    match state.router().route(&analysis_request).await {
        Ok(result) => {
            if let Some(cache) = state.cache() {
                match cache.set(&key, &result).await {
                    Ok(()) => state.metrics().record_cache_event(CacheEvent::Store),
                    Err(e) => {
                        state.metrics().record_cache_event(CacheEvent::Error);
                        tracing::warn!(
                            request_id = %request_id,
                            error = %e,
                            "Failed to store result in cache"
                        );
                    }
                }
            }
            Json(AnalyzeResponse {
                cached: false,
                degraded: false,
                result,
            })
        }
        Err(err) => {
            tracing::error!(
                request_id = %request_id,
                error = %err,
                "Routing failed terminally, returning fallback response"
            );
            Json(AnalyzeResponse {
                cached: false,
                degraded: true,
                result: fallback_result(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_request_deserializes() {
        let json = r#"{"structured_data": {"metric": 7}, "notes": ["watch this"]}"#;
        let req: AnalyzeRequest = serde_json::from_str(json).expect("should deserialize");

        assert_eq!(req.structured_data()["metric"], 7);
        assert_eq!(req.notes(), ["watch this"]);
    }

    #[test]
    fn test_analyze_request_notes_default_to_empty() {
        let json = r#"{"structured_data": {"metric": 7}}"#;
        let req: AnalyzeRequest = serde_json::from_str(json).expect("should deserialize");
        assert!(req.notes().is_empty());
    }

    #[test]
    fn test_analyze_request_rejects_null_structured_data() {
        let json = r#"{"structured_data": null}"#;
        let result = serde_json::from_str::<AnalyzeRequest>(json);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("null"));
    }

    #[test]
    fn test_analyze_request_rejects_empty_object() {
        let json = r#"{"structured_data": {}}"#;
        let result = serde_json::from_str::<AnalyzeRequest>(json);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_analyze_request_rejects_blank_note() {
        let json = r#"{"structured_data": {"a": 1}, "notes": ["  "]}"#;
        let result = serde_json::from_str::<AnalyzeRequest>(json);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("whitespace"));
    }

    #[test]
    fn test_analyze_request_rejects_too_many_notes() {
        let notes: Vec<String> = (0..65).map(|i| format!("note {}", i)).collect();
        let json = serde_json::json!({"structured_data": {"a": 1}, "notes": notes}).to_string();
        let result = serde_json::from_str::<AnalyzeRequest>(&json);
        assert!(result.is_err());
    }

    #[test]
    fn test_analyze_request_rejects_oversized_note_by_chars() {
        // CJK characters count as characters, not bytes
        let long_note = "你".repeat(10_001);
        let json =
            serde_json::json!({"structured_data": {"a": 1}, "notes": [long_note]}).to_string();
        let result = serde_json::from_str::<AnalyzeRequest>(&json);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("maximum length"));
    }

    #[test]
    fn test_analyze_request_accepts_note_at_char_limit() {
        let note = "你".repeat(10_000);
        let json = serde_json::json!({"structured_data": {"a": 1}, "notes": [note]}).to_string();
        let result = serde_json::from_str::<AnalyzeRequest>(&json);
        assert!(result.is_ok(), "10K chars should be accepted: {:?}", result.err());
    }

    #[test]
    fn test_fallback_result_is_low_confidence() {
        let result = fallback_result();
        assert_eq!(result.metadata.confidence_score, 0.1);
        assert_eq!(result.metadata.model_version, "fallback");
        assert!(!result.summary.is_empty());
    }

    #[test]
    fn test_into_analysis_request_threads_request_id() {
        let json = r#"{"structured_data": {"a": 1}}"#;
        let req: AnalyzeRequest = serde_json::from_str(json).expect("should deserialize");
        let id = Uuid::new_v4();
        let analysis = req.into_analysis_request(id);
        assert_eq!(analysis.request_id, id);
    }
}
