//! Main entry point for the HTTP server binary

use anyhow::{Context, Result};
use core_lib::{create_app, run_server, AllowedOrigin, AppConfig, AppState};
use std::net::SocketAddr;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::load().context("Failed to load configuration")?;

    info!("Configuration loaded successfully");
    info!("Server will bind to: {}", config.bind_address());
    info!("Database file: {}", config.database.path.display());
    info!("Serving files from: {}", config.files.base_dir.display());
    info!("Allowed CORS origin: {}", config.cors.allowed_origin);

    // Missing directories only degrade the affected endpoints.
    if let Err(e) = config.create_directories() {
        warn!("Failed to create data directories: {}", e);
    }

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .context("Invalid bind address")?;

    let origin = AllowedOrigin::from_config(&config.cors).context("Invalid CORS origin")?;
    let state = AppState::from_config(&config).context("Failed to resolve file directory")?;

    let app = create_app(state, origin);

    run_server(app, addr)
        .await
        .with_context(|| format!("Failed to serve on {}", addr))?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let default_level = if cfg!(debug_assertions) {
            "debug"
        } else {
            "info"
        };

        format!("core_lib={0},http_server={0},tower_http=debug", default_level).into()
    });

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    let is_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    if is_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .init();
    }
}
