//! Shared test doubles and builders for router integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thriftroute::config::RankingStrategy;
use thriftroute::metrics::Metrics;
use thriftroute::providers::{
    AnalysisMetadata, AnalysisRequest, AnalysisResult, ProviderClient, ProviderDescriptor,
    ProviderError,
};
use thriftroute::router::{FailoverRouter, HealthPolicy, QuotaPolicy};
use uuid::Uuid;

/// Fixed outcome a stub provider returns on every call
#[derive(Clone, Copy)]
pub enum Outcome {
    Ok(&'static str),
    Status(u16, &'static str),
    Message(&'static str),
}

/// Provider double with a fixed outcome and an invocation counter
pub struct StubClient {
    pub calls: AtomicUsize,
    outcome: Outcome,
}

impl StubClient {
    pub fn new(outcome: Outcome) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            outcome,
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for StubClient {
    async fn analyze(&self, _request: &AnalysisRequest) -> Result<AnalysisResult, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.outcome {
            Outcome::Ok(summary) => Ok(ok_result(summary)),
            Outcome::Status(status, message) => Err(ProviderError::Status {
                status,
                message: message.to_string(),
            }),
            Outcome::Message(message) => Err(ProviderError::Message(message.to_string())),
        }
    }
}

pub fn ok_result(summary: &str) -> AnalysisResult {
    AnalysisResult {
        summary: summary.to_string(),
        key_insights: vec![],
        next_actions: vec![],
        metadata: AnalysisMetadata {
            confidence_score: 0.9,
            model_version: "stub".to_string(),
            processing_time_ms: 1,
            timestamp: 0,
        },
        raw_response: String::new(),
    }
}

pub fn descriptor(name: &str, cost: f64, client: Arc<dyn ProviderClient>) -> ProviderDescriptor {
    ProviderDescriptor::new(name.to_string(), cost, client)
}

pub fn health_policy() -> HealthPolicy {
    HealthPolicy {
        auth_disable: Duration::from_secs(86_400),
        payment_disable: Duration::from_secs(86_400),
        rate_limit_cooldown: Duration::from_secs(60),
        error_cooldown: Duration::from_secs(10),
    }
}

pub fn quota_policy(max_requests: usize) -> QuotaPolicy {
    QuotaPolicy {
        window: Duration::from_secs(60),
        max_requests,
    }
}

/// Router with cost ranking, a generous quota, and a short call timeout
pub fn cost_router(providers: Vec<ProviderDescriptor>) -> FailoverRouter {
    FailoverRouter::new(
        providers,
        RankingStrategy::CostThenFailover,
        health_policy(),
        quota_policy(1000),
        Duration::from_secs(2),
        Arc::new(Metrics::new().expect("metrics registry")),
    )
}

pub fn request() -> AnalysisRequest {
    AnalysisRequest {
        structured_data: serde_json::json!({"subject": "quarterly numbers"}),
        notes: vec!["sanity-check the revenue trend".to_string()],
        request_id: Uuid::new_v4(),
    }
}
