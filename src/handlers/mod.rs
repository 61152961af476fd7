//! HTTP request handlers for the thriftroute API

use crate::cache::ResultCache;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::jobs::JobQueue;
use crate::metrics::Metrics;
use crate::providers::build_providers;
use crate::router::FailoverRouter;
use std::sync::Arc;
use std::time::Duration;

pub mod analyze;
pub mod health;
pub mod jobs;
pub mod metrics;

/// Build the HTTP route tree over a prepared application state.
///
/// Shared between the server binary and integration tests.
pub fn app(state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/analyze", post(analyze::handler))
        .route("/jobs", post(jobs::submit))
        .route("/jobs/{id}", get(jobs::get))
        .route("/health", get(health::handler))
        .route("/metrics", get(metrics::handler))
        .layer(axum::middleware::from_fn(
            crate::middleware::request_id_middleware,
        ))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Application state shared across all handlers
///
/// All fields are Arc'd for cheap cloning across Axum handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    router: Arc<FailoverRouter>,
    cache: Option<Arc<ResultCache>>,
    jobs: Arc<JobQueue>,
    metrics: Arc<Metrics>,
}

impl AppState {
    /// Build the full application state from validated configuration.
    ///
    /// Constructs the provider registry (resolving API keys from the
    /// environment), the failover router, the optional result cache, and
    /// the job queue.
    pub fn new(config: Config) -> AppResult<Self> {
        let config = Arc::new(config);

        let metrics = Arc::new(
            Metrics::new()
                .map_err(|e| AppError::Internal(format!("failed to build metrics: {}", e)))?,
        );

        let providers = build_providers(&config)?;
        let router = Arc::new(FailoverRouter::from_config(
            &config,
            providers,
            Arc::clone(&metrics),
        ));

        let cache = if config.cache.enabled {
            let cache = ResultCache::new(
                &config.cache.url,
                Duration::from_secs(config.cache.ttl_seconds),
            )
            .map_err(|e| AppError::Config(format!("cache: {}", e)))?;
            Some(Arc::new(cache))
        } else {
            None
        };

        let jobs = Arc::new(JobQueue::new(Arc::clone(&router)));

        Ok(Self {
            config,
            router,
            cache,
            jobs,
            metrics,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn router(&self) -> &FailoverRouter {
        &self.router
    }

    pub fn cache(&self) -> Option<&Arc<ResultCache>> {
        self.cache.as_ref()
    }

    pub fn jobs(&self) -> &Arc<JobQueue> {
        &self.jobs
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::config::Config;

    /// Config with two unreachable providers; API keys resolve through env
    /// vars the tests set themselves.
    pub(crate) fn unreachable_config() -> Config {
        // SAFETY: tests run under the tokio test runtime on one process;
        // setting the same value repeatedly is benign.
        unsafe {
            std::env::set_var("THRIFTROUTE_TEST_KEY", "test-key");
        }
        let toml = r#"
[server]
host = "127.0.0.1"
port = 0
request_timeout_seconds = 1

[[providers]]
name = "claude"
model = "claude-sonnet-4-5"
base_url = "http://127.0.0.1:59991"
api_key_env = "THRIFTROUTE_TEST_KEY"
cost_per_1k_tokens = 0.003

[[providers]]
name = "openai"
model = "gpt-4o-mini"
base_url = "http://127.0.0.1:59992"
api_key_env = "THRIFTROUTE_TEST_KEY"
cost_per_1k_tokens = 0.0006
"#;
        toml::from_str(toml).expect("should parse test config")
    }
}
