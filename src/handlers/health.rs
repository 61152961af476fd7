//! Health check endpoint
//!
//! Reports service liveness plus a per-provider health snapshot: which
//! providers are eligible, cooling, or disabled, and why.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::handlers::AppState;
use crate::router::ProviderHealthView;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: &'static str,
    /// Per-provider health snapshot
    pub providers: Vec<ProviderHealthView>,
}

/// GET /health handler
pub async fn handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let providers = state.router().health().snapshot().await;

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "OK",
            providers,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::unreachable_config;

    #[tokio::test]
    async fn test_health_handler_lists_all_providers() {
        let state = AppState::new(unreachable_config()).expect("state");
        let (status, Json(body)) = handler(State(state)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "OK");
        assert_eq!(body.providers.len(), 2);
        assert!(body.providers.iter().all(|p| p.state == "eligible"));
    }
}
