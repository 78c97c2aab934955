//! # AIS Relay Service
//!
//! Serves the downstream WebSocket fanout, the snapshot/health endpoints and the
//! feed and flight-data proxies on one HTTP listener.
//!
//! ## Usage
//!
//! ```bash
//! AISSTREAM_API_KEY=... cargo run --bin ais_relay -- --config Config.toml
//! ```
//!
//! Press Ctrl+C to stop gracefully.

use ais_relay::{
    http::{self, create_router, AppState},
    metrics,
    relay::Relay,
    settings::Settings,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;

#[derive(Parser, Debug)]
#[command(name = "ais_relay", about = "AIS vessel-tracking relay and aggregation engine")]
struct Cli {
    /// Configuration file (TOML). Missing file falls back to defaults.
    #[arg(long, default_value = "Config.toml")]
    config: String,
    /// Overrides `server.host`
    #[arg(long)]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_logging();

    let mut settings = match Settings::from_path(&cli.config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = settings.validate() {
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }
    if let Some(host) = cli.host {
        settings.server.host = host;
    }

    #[cfg(feature = "observability")]
    install_prometheus_exporter()?;
    metrics::describe_metrics();

    log::info!("🚀 Starting AIS relay");

    let relay = Arc::new(Relay::new(&settings));
    relay.ensure_upstream();
    let refresh_handle = relay.spawn_refresh_loop();

    let state = AppState::from_settings(Arc::clone(&relay), &settings)
        .context("failed to build proxy HTTP clients")?;
    let app = create_router(state);

    let listener = http::bind(&settings.server)
        .await
        .with_context(|| {
            format!(
                "failed to bind {}:{}",
                settings.server.host, settings.server.port
            )
        })?;
    let addr = listener.local_addr()?;
    log::info!("✅ Listening on {} (snapshot every {}ms)", addr, settings.snapshot.interval_ms);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = signal::ctrl_c().await {
                log::error!("❌ Failed to listen for shutdown signal: {}", e);
            }
            log::info!("🛑 Shutdown signal received");
        })
        .await?;

    refresh_handle.abort();
    Ok(())
}

#[cfg(not(feature = "observability"))]
fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

#[cfg(feature = "observability")]
fn init_logging() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

#[cfg(feature = "observability")]
fn install_prometheus_exporter() -> Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::net::SocketAddr;

    let port: u16 = std::env::var("METRICS_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(9000);
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .install()
        .context("failed to install Prometheus exporter")?;
    log::info!("📊 Prometheus metrics on :{}", port);
    Ok(())
}
