//! OpenAI adapter wire-format tests against a mock server

mod common;

use common::{Outcome, StubClient, descriptor, health_policy, quota_policy, request};
use std::sync::Arc;
use std::time::Duration;
use thriftroute::classify::{FailureKind, classify};
use thriftroute::config::RankingStrategy;
use thriftroute::metrics::Metrics;
use thriftroute::providers::{OpenAiClient, ProviderClient, ProviderError};
use thriftroute::router::FailoverRouter;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion_body(content: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{"message": {"role": "assistant", "content": content}}]
    })
}

#[tokio::test]
async fn test_successful_analysis_parses_json_content() {
    let server = MockServer::start().await;
    let content = r#"{"summary": "margins are stable", "key_insights": ["opex flat"], "next_actions": [], "confidence_score": 0.8}"#;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(content)))
        .mount(&server)
        .await;

    let client = OpenAiClient::new(server.uri(), "test-key".to_string(), "gpt-4o-mini".to_string())
        .expect("client");

    let result = client.analyze(&request()).await.expect("should succeed");
    assert_eq!(result.summary, "margins are stable");
    assert_eq!(result.key_insights, vec!["opex flat"]);
    assert_eq!(result.metadata.model_version, "gpt-4o-mini");
    assert_eq!(result.metadata.confidence_score, 0.8);
    assert!(!result.raw_response.is_empty());
}

#[tokio::test]
async fn test_plain_text_content_becomes_summary() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion_body("Looks healthy overall.")),
        )
        .mount(&server)
        .await;

    let client = OpenAiClient::new(server.uri(), "k".to_string(), "m".to_string()).expect("client");
    let result = client.analyze(&request()).await.expect("should succeed");
    assert_eq!(result.summary, "Looks healthy overall.");
    assert_eq!(result.metadata.confidence_score, 0.5);
}

#[tokio::test]
async fn test_429_maps_to_rate_limited() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_string(r#"{"error": {"message": "Rate limit reached"}}"#),
        )
        .mount(&server)
        .await;

    let client = OpenAiClient::new(server.uri(), "k".to_string(), "m".to_string()).expect("client");
    let err = client.analyze(&request()).await.expect_err("should fail");

    match &err {
        ProviderError::Status { status, message } => {
            assert_eq!(*status, 429);
            assert!(message.contains("Rate limit"));
        }
        other => panic!("expected Status, got {:?}", other),
    }
    assert_eq!(classify("openai", &err).kind(), FailureKind::RateLimited);
}

#[tokio::test]
async fn test_500_maps_to_transient_upstream() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let client = OpenAiClient::new(server.uri(), "k".to_string(), "m".to_string()).expect("client");
    let err = client.analyze(&request()).await.expect_err("should fail");
    let classified = classify("openai", &err);
    assert_eq!(classified.kind(), FailureKind::TransientUpstream);
    assert!(classified.retryable());
}

#[tokio::test]
async fn test_slow_endpoint_times_out_and_fails_over() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_body("too late"))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let slow = OpenAiClient::new(server.uri(), "k".to_string(), "m".to_string()).expect("client");
    let backup = StubClient::new(Outcome::Ok("from backup"));

    let router = FailoverRouter::new(
        vec![
            descriptor("slow", 0.0001, Arc::new(slow)),
            descriptor("backup", 0.001, backup.clone()),
        ],
        RankingStrategy::CostThenFailover,
        health_policy(),
        quota_policy(100),
        Duration::from_millis(200),
        Arc::new(Metrics::new().expect("metrics")),
    );

    let result = router.route(&request()).await.expect("should fail over");
    assert_eq!(result.summary, "from backup");
    // the timed-out provider is cooling now
    assert!(!router.health().is_eligible("slow").await);
}
