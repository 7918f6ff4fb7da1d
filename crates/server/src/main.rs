//! VaxTrack server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vaxtrack_core::config::AppConfig;
use vaxtrack_server::{AppState, NotificationQueue, create_router};

/// How long to wait for queued confirmation emails on shutdown.
const NOTIFICATION_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// VaxTrack - vaccination registration and certificate lookup
#[derive(Parser, Debug)]
#[command(name = "vaxtrackd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "VAXTRACK_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("VaxTrack v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    vaxtrack_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let store = vaxtrack_store::from_config(&config.store)
        .await
        .context("failed to initialize record store")?;
    store
        .health_check()
        .await
        .context("record store health check failed")?;
    tracing::info!("Record store initialized");

    let (notifications, dispatcher) = NotificationQueue::from_config(&config.notifications)
        .context("failed to initialize email delivery")?;

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;

    let state = AppState::new(config, store, notifications);
    let app = create_router(state);

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router, and with it every queue sender, is gone; the dispatcher
    // exits once it has worked through what is left.
    if let Some(dispatcher) = dispatcher {
        match tokio::time::timeout(NOTIFICATION_DRAIN_TIMEOUT, dispatcher).await {
            Ok(Ok(())) => tracing::info!("Pending confirmation emails flushed"),
            Ok(Err(e)) => tracing::error!(error = %e, "Email dispatcher task failed"),
            Err(_) => tracing::warn!("Timed out waiting for pending confirmation emails"),
        }
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Load configuration from `path` (optional) layered under `VAXTRACK_*`
/// environment variables.
fn load_config(path: &str) -> Result<AppConfig> {
    let config_path = Path::new(path);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}", path);
    }

    // VAXTRACK_CONFIG only names the file
    let has_env_config = std::env::vars()
        .any(|(key, _)| key.starts_with("VAXTRACK_") && key != "VAXTRACK_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: vaxtrackd --config /path/to/config.toml\n  \
             2. Environment variables: VAXTRACK_SERVER__BIND=0.0.0.0:8080 \
             VAXTRACK_AUTH__TOKEN_HASH=sha256:YOUR_TOKEN_HASH_HERE vaxtrackd\n\n\
             See config/server.example.toml for example configuration.\n\
             Set VAXTRACK_CONFIG env var to specify a default config file path."
        );
    }

    if !has_config_file {
        tracing::info!("Using environment variables for configuration");
    }

    figment
        .merge(Env::prefixed("VAXTRACK_").split("__"))
        .extract()
        .context("failed to load configuration")
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
