//! Command-line interface for thriftroute
//!
//! Provides argument parsing and subcommand handling for the binary.

use clap::{Parser, Subcommand};

/// Cost-aware multi-provider router for AI analysis requests
#[derive(Parser)]
#[command(name = "thriftroute")]
#[command(version)]
#[command(about = "Cost-aware multi-provider router for AI analysis requests")]
#[command(
    long_about = "Thriftroute dispatches analysis requests to the cheapest healthy AI \
    completion provider, classifies upstream failures, and fails over deterministically \
    while protecting each upstream with a local sliding-window quota."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# Thriftroute Configuration
# ==========================
#
# Configures the HTTP server, upstream providers, ranking strategy, health
# windows, the local quota, the result cache, and observability.

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "0.0.0.0"

# Port to listen on
port = 3000

# Per-provider-call timeout in seconds applied by the failover engine
request_timeout_seconds = 30

# ── Providers ────────────────────────────────────────────────────────────
# Registration order is the tie-break order for ranking. API keys are read
# from the named environment variables at startup; they never live in this
# file. cost_per_1k_tokens is a nominal USD rate used only for ranking.

[[providers]]
name = "deepseek"
model = "deepseek-chat"
base_url = "https://api.deepseek.com"
api_key_env = "DEEPSEEK_API_KEY"
cost_per_1k_tokens = 0.00027
enabled = true

[[providers]]
name = "openai"
model = "gpt-4o-mini"
base_url = "https://api.openai.com"
api_key_env = "OPENAI_API_KEY"
cost_per_1k_tokens = 0.0006
enabled = true

[[providers]]
name = "claude"
model = "claude-sonnet-4-5"
base_url = "https://api.anthropic.com"
api_key_env = "ANTHROPIC_API_KEY"
cost_per_1k_tokens = 0.003
enabled = true

[routing]
# "cost_then_failover" ranks candidates ascending by estimated request cost;
# "fixed_order" keeps the registration order above.
strategy = "cost_then_failover"

[health]
# Disable window after a 401/403 (auth) or 402 (billing) failure
auth_disable_seconds = 86400
payment_disable_seconds = 86400
# Cooldown after a vendor 429 or a local quota rejection
rate_limit_cooldown_seconds = 60
# Cooldown after any other retryable failure (5xx, network, timeout)
error_cooldown_seconds = 10

[quota]
# Local sliding-window admission cap, per provider
window_seconds = 60
max_requests = 5

[cache]
# Redis-backed result cache; disabled by default
enabled = false
url = "redis://127.0.0.1:6379"
ttl_seconds = 3600

[observability]
# Log level: trace, debug, info, warn, error (RUST_LOG overrides)
log_level = "info"
"#
}
