//! skywatch-proxy - Main entry point
//!
//! Caching proxy for public aircraft-position feeds.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter};

use skywatch_common::config::load_config;
use skywatch_proxy::upstream::UpstreamClient;
use skywatch_proxy::{build_router, AppState};

const DEFAULT_LOG_FILTER: &str = "skywatch_proxy=info,skywatch_common=info,tower_http=info";

/// Command-line arguments for skywatch-proxy
#[derive(Parser, Debug)]
#[command(name = "skywatch-proxy")]
#[command(about = "Caching proxy for aircraft position feeds")]
#[command(version)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config file)
    #[arg(short, long, env = "SKYWATCH_PORT")]
    port: Option<u16>,

    /// Address to bind (overrides config file)
    #[arg(long, env = "SKYWATCH_HOST")]
    host: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins; otherwise start at the default and switch to the
    // configured level once the config file has been read
    let env_filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok());
    let from_env = env_filter.is_some();
    let (filter_layer, filter_handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER)));
    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer())
        .init();

    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }

    if !from_env {
        let level = config.logging.level.clone();
        match EnvFilter::try_new(&level) {
            Ok(filter) => {
                let _ = filter_handle.modify(|f| *f = filter);
            }
            Err(e) => tracing::warn!(level = %level, error = %e, "Ignoring invalid log level"),
        }
    }

    info!("Starting skywatch-proxy v{}", env!("CARGO_PKG_VERSION"));
    info!(
        ttl_ms = config.cache.ttl_ms,
        timeout_ms = config.upstream.timeout_ms,
        "Cache and upstream settings"
    );

    let client = UpstreamClient::new(&config.upstream).context("Failed to build upstream client")?;
    let state = AppState::new(&config, Arc::new(client));
    let feeds = Arc::clone(&state.feeds);
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "Invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    feeds.shutdown();
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
