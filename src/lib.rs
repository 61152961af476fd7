//! Thriftroute - cost-aware multi-provider router for AI analysis requests
//!
//! Dispatches a single logical "analyze" operation to one of several
//! interchangeable AI completion providers, picking the cheapest healthy
//! candidate, classifying failures, and failing over deterministically while
//! protecting each upstream with a local sliding-window quota.

pub mod cache;
pub mod classify;
pub mod cli;
pub mod config;
pub mod error;
pub mod estimator;
pub mod handlers;
pub mod jobs;
pub mod metrics;
pub mod middleware;
pub mod providers;
pub mod router;
pub mod telemetry;
