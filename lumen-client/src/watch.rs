use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use lumen_model::allowed_extension;

use crate::ledger::DeliveryLedger;

/// Start watching `root` recursively, forwarding raw notify events into
/// `tx`. The returned watcher must be kept alive for events to flow.
pub fn spawn_watcher(
    root: &Path,
    tx: mpsc::Sender<notify::Result<Event>>,
) -> notify::Result<RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = tx.blocking_send(res);
    })?;
    watcher.watch(root, RecursiveMode::Recursive)?;
    info!(root = %root.display(), "watching for new media");
    Ok(watcher)
}

/// Turns raw filesystem events into upload requests.
///
/// Every create or write pushes the path's deadline out by the settle
/// delay, so a file still being copied in is not uploaded until the
/// writes stop. Once a path settles, it is checked against the ledger
/// and dropped if already delivered; the queue repeats that check at
/// enqueue time.
#[derive(Debug)]
pub struct FolderMonitor {
    ledger: Arc<DeliveryLedger>,
    settle: Duration,
}

impl FolderMonitor {
    pub fn new(ledger: Arc<DeliveryLedger>, settle: Duration) -> Self {
        Self { ledger, settle }
    }

    /// Walk `root` once and enqueue every eligible file that predates the
    /// watcher. Returns how many paths were sent.
    pub async fn scan_existing(&self, root: &Path, queue_tx: &mpsc::Sender<PathBuf>) -> usize {
        let root = root.to_path_buf();
        let found = tokio::task::spawn_blocking(move || {
            walkdir::WalkDir::new(&root)
                .follow_links(false)
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(e) => Some(e),
                    Err(e) => {
                        warn!("scan error: {e}");
                        None
                    }
                })
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .filter(|p| allowed_extension(p))
                .collect::<Vec<_>>()
        })
        .await
        .unwrap_or_default();

        let mut sent = 0;
        for path in found {
            if self.ledger.contains(&path).await {
                continue;
            }
            if queue_tx.send(path).await.is_err() {
                break;
            }
            sent += 1;
        }
        sent
    }

    /// Consume watcher events until the channel closes, sending each
    /// settled path into `queue_tx` exactly once per burst of writes.
    pub async fn run(
        &self,
        mut events: mpsc::Receiver<notify::Result<Event>>,
        queue_tx: mpsc::Sender<PathBuf>,
    ) {
        let mut pending: HashMap<PathBuf, Instant> = HashMap::new();

        loop {
            let next_due = pending.values().min().copied();
            tokio::select! {
                maybe = events.recv() => match maybe {
                    Some(Ok(event)) => self.absorb(event, &mut pending),
                    Some(Err(e)) => warn!("watch error: {e}"),
                    None => break,
                },
                _ = wait_until(next_due) => {
                    let now = Instant::now();
                    let due: Vec<PathBuf> = pending
                        .iter()
                        .filter(|(_, deadline)| **deadline <= now)
                        .map(|(path, _)| path.clone())
                        .collect();
                    for path in due {
                        pending.remove(&path);
                        if self.ledger.contains(&path).await {
                            continue;
                        }
                        debug!(path = %path.display(), "settled");
                        if queue_tx.send(path).await.is_err() {
                            return;
                        }
                    }
                }
            }
        }

        // Channel closed: anything still inside its settle window may be
        // a half-written file, so it is dropped rather than uploaded. It
        // is not in the ledger, so the next startup scan picks it up
        // complete.
        if !pending.is_empty() {
            debug!(unsettled = pending.len(), "discarding unsettled paths at shutdown");
        }
    }

    fn absorb(&self, event: Event, pending: &mut HashMap<PathBuf, Instant>) {
        match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) => {
                for path in event.paths {
                    if !allowed_extension(&path) || !path.is_file() {
                        continue;
                    }
                    // Each write pushes the deadline out again.
                    pending.insert(path, Instant::now() + self.settle);
                }
            }
            EventKind::Remove(_) => {
                for path in event.paths {
                    pending.remove(&path);
                }
            }
            _ => {}
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(due) => tokio::time::sleep_until(due).await,
        None => std::future::pending().await,
    }
}
