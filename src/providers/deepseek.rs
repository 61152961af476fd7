//! DeepSeek adapter
//!
//! DeepSeek exposes an OpenAI-compatible chat-completions API, so this
//! adapter reuses the OpenAI wire types against DeepSeek's endpoint.

use crate::error::{AppError, AppResult};
use crate::providers::openai::{chat_request, extract_content};
use crate::providers::{
    AnalysisRequest, AnalysisResult, ProviderClient, ProviderError, build_result,
    error_from_response,
};
use async_trait::async_trait;
use std::time::Instant;

/// Adapter for the DeepSeek chat-completions API
pub struct DeepSeekClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl DeepSeekClient {
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
impl ProviderClient for DeepSeekClient {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, ProviderError> {
        let started = Instant::now();
        let url = format!("{}/chat/completions", self.base_url);

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
