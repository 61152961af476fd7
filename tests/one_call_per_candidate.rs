//! The engine never calls the same provider twice in one route invocation
//!
//! Failover walks the ranked list once: each eligible candidate gets at most
//! one call, regardless of how its attempt ends.

mod common;

use common::{Outcome, StubClient, cost_router, descriptor, request};

#[tokio::test]
async fn test_every_failing_candidate_called_exactly_once() {
    let a = StubClient::new(Outcome::Status(503, "down"));
    let b = StubClient::new(Outcome::Status(429, "limited"));
    let c = StubClient::new(Outcome::Message("connection reset by peer"));

    let router = cost_router(vec![
        descriptor("a", 0.0001, a.clone()),
        descriptor("b", 0.0002, b.clone()),
        descriptor("c", 0.0003, c.clone()),
    ]);

    router.route(&request()).await.expect_err("all fail");

    assert_eq!(a.call_count(), 1);
    assert_eq!(b.call_count(), 1);
    assert_eq!(c.call_count(), 1);
}

#[tokio::test]
async fn test_single_candidate_not_retried_within_invocation() {
    let only = StubClient::new(Outcome::Status(503, "down"));
    let router = cost_router(vec![descriptor("only", 0.001, only.clone())]);

    router.route(&request()).await.expect_err("exhausted");
    assert_eq!(only.call_count(), 1);
}

#[tokio::test]
async fn test_call_counts_hold_across_many_invocations() {
    // Three consecutive route calls against a permanently failing pair:
    // the first invocation calls each provider once; the rest skip them
    // while they cool down. Total calls never exceed one per candidate per
    // invocation.
    let a = StubClient::new(Outcome::Status(503, "down"));
    let b = StubClient::new(Outcome::Status(503, "down"));

    let router = cost_router(vec![
        descriptor("a", 0.0001, a.clone()),
        descriptor("b", 0.0002, b.clone()),
    ]);

    for _ in 0..3 {
        router.route(&request()).await.expect_err("exhausted");
    }

    assert!(a.call_count() <= 3);
    assert!(b.call_count() <= 3);
    // With a 10s transient cooldown, the later invocations skip entirely.
    assert_eq!(a.call_count(), 1);
    assert_eq!(b.call_count(), 1);
}
