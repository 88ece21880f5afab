//! Lumen server binary: loads configuration, opens the metadata store,
//! and serves the HTTP API until interrupted.

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use lumen_core::{IngestionPipeline, MetadataStore, Thumbnailer};
use lumen_server::{AppState, Config, create_app};

#[derive(Parser, Debug)]
#[command(name = "lumen-server")]
#[command(about = "Content-addressed media vault server")]
struct Cli {
    /// Server host (overrides LUMEN_HOST)
    #[arg(long, env = "LUMEN_HOST")]
    host: Option<String>,

    /// Server port (overrides LUMEN_PORT)
    #[arg(short, long, env = "LUMEN_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env().context("failed to load configuration")?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    config
        .ensure_directories()
        .context("failed to create storage directories")?;

    let store = MetadataStore::connect(&config.database_path)
        .await
        .context("failed to open metadata store")?;
    let thumbnailer = Thumbnailer::new(config.thumbnail_dir.clone());
    let pipeline = IngestionPipeline::new(store, thumbnailer, config.storage_dir.clone());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid host/port")?;

    info!("storage location: {}", config.storage_dir.display());
    info!(
        "authentication: {}",
        if config.auth_enabled() {
            "enabled"
        } else {
            "disabled"
        }
    );
    info!("listening on http://{addr}");

    let app = create_app(AppState::new(pipeline, config));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind listener")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
    }
}
