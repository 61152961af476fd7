//! OpenAI chat-completions adapter
//!
//! The wire types here are shared with the DeepSeek adapter, which speaks
//! the same OpenAI-compatible protocol against a different base URL.

use crate::error::{AppError, AppResult};
use crate::providers::{
    ANALYSIS_INSTRUCTION, AnalysisRequest, AnalysisResult, ProviderClient, ProviderError,
    build_result, error_from_response,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// OpenAI-compatible chat completion request body
#[derive(Debug, Serialize)]
pub(crate) struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f64,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

/// OpenAI-compatible chat completion response body (fields we read)
#[derive(Debug, Deserialize)]
pub(crate) struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoiceMessage {
    pub content: Option<String>,
}

pub(crate) fn chat_request(model: &str, request: &AnalysisRequest) -> ChatCompletionRequest {
    let mut user_content = format!("Structured data:\n{}", request.structured_data);
    if !request.notes.is_empty() {
        user_content.push_str("\n\nNotes:\n");
        user_content.push_str(&request.notes.join("\n"));
    }

    ChatCompletionRequest {
        model: model.to_string(),
        messages: vec![
            ChatMessage {
                role: "system",
                content: ANALYSIS_INSTRUCTION.to_string(),
            },
            ChatMessage {
                role: "user",
                content: user_content,
            },
        ],
        max_tokens: 1024,
        temperature: 0.2,
    }
}

/// Extract assistant content from an OpenAI-compatible response body.
pub(crate) fn extract_content(body: &str) -> Result<String, ProviderError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body).map_err(|e| {
        ProviderError::Message(format!("unexpected completion response shape: {}", e))
    })?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ProviderError::Message("completion response had no content".to_string()))
}

/// Adapter for the OpenAI chat-completions API
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(base_url: String, api_key: String, model: String) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }
}

#[async_trait]
impl ProviderClient for OpenAiClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, ProviderError> {
        let started = Instant::now();
        let url = format!("{}/v1/chat/completions", self.base_url);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("x-request-id", request.request_id.to_string())
            .json(&chat_request(&self.model, request))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body = response.text().await?;
        let content = extract_content(&body)?;
        Ok(build_result(&content, &self.model, started, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_chat_request_includes_payload_and_notes() {
        let request = AnalysisRequest {
            structured_data: serde_json::json!({"region": "emea"}),
            notes: vec!["check churn".to_string()],
            request_id: Uuid::new_v4(),
        };
        let body = chat_request("gpt-4o-mini", &request);
        assert_eq!(body.model, "gpt-4o-mini");
        assert_eq!(body.messages.len(), 2);
        assert!(body.messages[1].content.contains("emea"));
        assert!(body.messages[1].content.contains("check churn"));
    }

    #[test]
    fn test_extract_content_reads_first_choice() {
        let body = r#"{"choices": [{"message": {"content": "hello"}}]}"#;
        assert_eq!(extract_content(body).unwrap(), "hello");
    }

    #[test]
    fn test_extract_content_rejects_empty_choices() {
        let body = r#"{"choices": []}"#;
        let err = extract_content(body).expect_err("should reject");
        assert!(err.to_string().contains("no content"));
    }

    #[test]
    fn test_extract_content_rejects_malformed_body() {
        let err = extract_content("not json").expect_err("should reject");
        assert!(err.to_string().contains("unexpected"));
    }
}
