//! Lumen client binary: watches a folder and syncs new media to the vault.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use lumen_client::{ClientConfig, DeliveryLedger, FolderMonitor, HttpDelivery, UploadQueue, watch};

#[derive(Parser, Debug)]
#[command(name = "lumen-client")]
#[command(about = "Watch a folder and upload new media to a Lumen vault")]
struct Cli {
    /// Folder to watch (overrides LUMEN_WATCH_DIR)
    #[arg(long, env = "LUMEN_WATCH_DIR")]
    watch_dir: Option<std::path::PathBuf>,

    /// Vault base URL (overrides LUMEN_SERVER_URL)
    #[arg(long, env = "LUMEN_SERVER_URL")]
    server_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env().context("failed to load configuration")?;
    if let Some(dir) = cli.watch_dir {
        config.watch_dir = dir;
    }
    if let Some(url) = cli.server_url {
        config.server_url = url;
    }
    std::fs::create_dir_all(&config.watch_dir).context("failed to create watch directory")?;

    let ledger = Arc::new(
        DeliveryLedger::load(&config.ledger_path)
            .await
            .context("failed to load delivery ledger")?,
    );
    info!(
        already_delivered = ledger.len().await,
        "ledger loaded from {}",
        config.ledger_path.display()
    );

    let delivery = Arc::new(
        HttpDelivery::new(
            &config.server_url,
            config.auth_token.clone(),
            config.request_timeout,
        )
        .context("failed to build HTTP client")?,
    );
    let queue = Arc::new(UploadQueue::new(
        delivery,
        ledger.clone(),
        config.max_attempts,
    ));

    let (event_tx, event_rx) = mpsc::channel(256);
    let (queue_tx, queue_rx) = mpsc::channel(256);

    // Watch before scanning, so nothing lands in the gap between the two.
    let watcher =
        watch::spawn_watcher(&config.watch_dir, event_tx).context("failed to start watcher")?;

    let monitor = FolderMonitor::new(ledger, config.settle);
    let scanned = monitor.scan_existing(&config.watch_dir, &queue_tx).await;
    info!(scanned, "startup scan complete");

    let monitor_task = tokio::spawn(async move { monitor.run(event_rx, queue_tx).await });
    let queue_task = tokio::spawn(queue.run(queue_rx, config.sweep_interval));

    info!("syncing {} to {}", config.watch_dir.display(), config.server_url);
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutting down");

    // Dropping the watcher closes the event channel; the monitor flushes
    // and exits, then the queue finishes any in-flight delivery (bounded
    // by the per-request timeout) before its channel closes too.
    drop(watcher);
    monitor_task.await.context("monitor task failed")?;
    queue_task.await.context("queue task failed")?;
    Ok(())
}
