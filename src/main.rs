//! Thriftroute HTTP server
//!
//! Starts an Axum web server that routes analysis requests to the cheapest
//! healthy AI completion provider.

use clap::Parser;
use std::net::SocketAddr;
use thriftroute::{
    cli::{Cli, Command, generate_config_template},
    config::Config,
    handlers::{AppState, app},
    telemetry,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Subcommands run and exit before any server setup
    if let Some(Command::Config { output }) = cli.command {
        match output {
            Some(path) => {
                std::fs::write(&path, generate_config_template())?;
                println!("Wrote configuration template to {}", path);
            }
            None => print!("{}", generate_config_template()),
        }
        return Ok(());
    }

    // Load configuration
    let config = Config::from_file(&cli.config)?;

    // Initialize telemetry
    telemetry::init(&config.observability.log_level);

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        providers = config.enabled_providers().count(),
        strategy = config.routing.strategy.as_str(),
        "Starting thriftroute server"
    );

    let host = config.server.host.clone();
    let port = config.server.port;

    // Build application state (providers, router, cache, job queue)
    let state = AppState::new(config)?;
    let app = app(state);

    let addr = SocketAddr::from((
        host.parse::<std::net::IpAddr>()
            .unwrap_or_else(|_| std::net::IpAddr::from([0, 0, 0, 0])),
        port,
    ));

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
