//! Anthropic messages API adapter

use crate::error::{AppError, AppResult};
use crate::providers::{
    ANALYSIS_INSTRUCTION, AnalysisRequest, AnalysisResult, ProviderClient, ProviderError,
    build_result, error_from_response,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    system: String,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

fn messages_request(model: &str, request: &AnalysisRequest) -> MessagesRequest {
    let mut user_content = format!("Structured data:\n{}", request.structured_data);
    if !request.notes.is_empty() {
        user_content.push_str("\n\nNotes:\n");
        user_content.push_str(&request.notes.join("\n"));
    }

    MessagesRequest {
        model: model.to_string(),
        max_tokens: 1024,
        system: ANALYSIS_INSTRUCTION.to_string(),
        messages: vec![Message {
            role: "user",
            content: user_content,
        }],
    }
}

fn extract_text(body: &str) -> Result<String, ProviderError> {
    let parsed: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::Message(format!("unexpected messages response shape: {}", e)))?;
    let text: String = parsed
        .content
        .iter()
        .filter(|block| block.block_type == "text")
        .map(|block| block.text.as_str())
        .collect();
    if text.is_empty() {
        return Err(ProviderError::Message(
            "messages response had no text content".to_string(),
        ));
    }
    Ok(text)
}

/// Adapter for the Anthropic messages API
pub struct ClaudeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ClaudeClient {
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
impl ProviderClient for ClaudeClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, ProviderError> {
        let started = Instant::now();
        let url = format!("{}/v1/messages", self.base_url);

        let response = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("x-request-id", request.request_id.to_string())
            .json(&messages_request(&self.model, request))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body = response.text().await?;
        let text = extract_text(&body)?;
        Ok(build_result(&text, &self.model, started, body))
    }
}
