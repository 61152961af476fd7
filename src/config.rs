//! Configuration management for thriftroute
//!
//! Parses TOML configuration files and provides typed access to settings.
//! Provider API keys are never stored in the file; each provider names the
//! environment variable its key is read from at startup.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load and validate configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&raw)
            .map_err(|e| AppError::Config(format!("failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field invariants that serde cannot express
    pub fn validate(&self) -> AppResult<()> {
        if self.enabled_providers().next().is_none() {
            return Err(AppError::Config(
                "at least one enabled provider is required".to_string(),
            ));
        }

        for provider in &self.providers {
            provider.validate()?;
        }

        let mut names: Vec<&str> = self.providers.iter().map(|p| p.name()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.providers.len() {
            return Err(AppError::Config("provider names must be unique".to_string()));
        }

        if self.quota.max_requests == 0 {
            return Err(AppError::Config(
                "quota.max_requests must be greater than 0".to_string(),
            ));
        }
        if self.quota.window_seconds == 0 {
            return Err(AppError::Config(
                "quota.window_seconds must be greater than 0".to_string(),
            ));
        }

        for (field, value) in [
            ("health.auth_disable_seconds", self.health.auth_disable_seconds),
            (
                "health.payment_disable_seconds",
                self.health.payment_disable_seconds,
            ),
            (
                "health.rate_limit_cooldown_seconds",
                self.health.rate_limit_cooldown_seconds,
            ),
            (
                "health.error_cooldown_seconds",
                self.health.error_cooldown_seconds,
            ),
        ] {
            if value == 0 {
                return Err(AppError::Config(format!("{} must be greater than 0", field)));
            }
        }

        if self.server.request_timeout_seconds == 0 || self.server.request_timeout_seconds > 300 {
            return Err(AppError::Config(format!(
                "server.request_timeout_seconds must be in (0, 300], got {}",
                self.server.request_timeout_seconds
            )));
        }

        Ok(())
    }

    /// Iterate over providers that are enabled, in registration order.
    ///
    /// Registration order matters: it is the tie-break order for ranking.
    pub fn enabled_providers(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter().filter(|p| p.enabled())
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Per-provider-call timeout applied by the failover engine
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_request_timeout() -> u64 {
    30
}

/// One upstream provider entry.
///
/// Fields are private to keep validated data valid; configuration is loaded
/// via deserialization and checked by `Config::validate()`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    name: String,
    model: String,
    base_url: String,
    api_key_env: String,
    /// Nominal cost per 1000 tokens in USD, used only for ranking
    cost_per_1k_tokens: f64,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ProviderConfig {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key_env(&self) -> &str {
        &self.api_key_env
    }

    pub fn cost_per_1k_tokens(&self) -> f64 {
        self.cost_per_1k_tokens
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::Config("provider name cannot be empty".to_string()));
        }
        if !(self.cost_per_1k_tokens > 0.0 && self.cost_per_1k_tokens.is_finite()) {
            return Err(AppError::Config(format!(
                "provider '{}': cost_per_1k_tokens must be a positive number, got {}",
                self.name, self.cost_per_1k_tokens
            )));
        }
        if self.base_url.trim().is_empty() {
            return Err(AppError::Config(format!(
                "provider '{}': base_url cannot be empty",
                self.name
            )));
        }
        if self.api_key_env.trim().is_empty() {
            return Err(AppError::Config(format!(
                "provider '{}': api_key_env cannot be empty",
                self.name
            )));
        }
        Ok(())
    }
}

/// Ranking strategy selection
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RankingStrategy {
    /// Candidates keep their registration order
    FixedOrder,
    /// Candidates are sorted ascending by estimated request cost,
    /// ties broken by registration order
    #[default]
    CostThenFailover,
}

impl RankingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankingStrategy::FixedOrder => "fixed_order",
            RankingStrategy::CostThenFailover => "cost_then_failover",
        }
    }
}

/// Routing configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RoutingConfig {
    #[serde(default)]
    pub strategy: RankingStrategy,
}

/// Cooldown and disablement durations for the health state machine
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthConfig {
    /// Disable window after a 401/403 (default 24h)
    #[serde(default = "default_auth_disable")]
    pub auth_disable_seconds: u64,
    /// Disable window after a 402 (default 24h)
    #[serde(default = "default_payment_disable")]
    pub payment_disable_seconds: u64,
    /// Cooldown after a 429 or a local quota rejection
    #[serde(default = "default_rate_limit_cooldown")]
    pub rate_limit_cooldown_seconds: u64,
    /// Cooldown after any other retryable failure
    #[serde(default = "default_error_cooldown")]
    pub error_cooldown_seconds: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            auth_disable_seconds: default_auth_disable(),
            payment_disable_seconds: default_payment_disable(),
            rate_limit_cooldown_seconds: default_rate_limit_cooldown(),
            error_cooldown_seconds: default_error_cooldown(),
        }
    }
}

impl HealthConfig {
    pub fn auth_disable(&self) -> Duration {
        Duration::from_secs(self.auth_disable_seconds)
    }

    pub fn payment_disable(&self) -> Duration {
        Duration::from_secs(self.payment_disable_seconds)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_seconds)
    }

    pub fn error_cooldown(&self) -> Duration {
        Duration::from_secs(self.error_cooldown_seconds)
    }
}

fn default_auth_disable() -> u64 {
    86_400
}

fn default_payment_disable() -> u64 {
    86_400
}

fn default_rate_limit_cooldown() -> u64 {
    60
}

fn default_error_cooldown() -> u64 {
    10
}

/// Sliding-window local quota settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuotaConfig {
    /// Window length in seconds
    #[serde(default = "default_quota_window")]
    pub window_seconds: u64,
    /// Maximum admissions per provider within one window
    #[serde(default = "default_quota_max")]
    pub max_requests: usize,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            window_seconds: default_quota_window(),
            max_requests: default_quota_max(),
        }
    }
}

impl QuotaConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }
}

fn default_quota_window() -> u64 {
    60
}

fn default_quota_max() -> usize {
    5
}

/// Result cache settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_cache_url")]
    pub url: String,
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_cache_url(),
            ttl_seconds: default_cache_ttl(),
        }
    }
}

fn default_cache_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_cache_ttl() -> u64 {
    3600
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
