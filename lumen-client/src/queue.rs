use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::delivery::{Delivery, DeliveryError};
use crate::ledger::DeliveryLedger;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Lifecycle of an upload task. Terminal success removes the task from the
/// queue entirely, so it has no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    InFlight,
    FailedRetryable,
    Abandoned,
}

#[derive(Debug)]
struct UploadTask {
    attempts: u32,
    state: TaskState,
}

/// Tracks one task per path through delivery, retry, and abandonment.
///
/// A path already in the queue is never enqueued twice, and an abandoned
/// path stays abandoned until a fresh filesystem event (or a restart scan)
/// re-enqueues it.
pub struct UploadQueue {
    tasks: Mutex<HashMap<PathBuf, UploadTask>>,
    delivery: Arc<dyn Delivery>,
    ledger: Arc<DeliveryLedger>,
    max_attempts: u32,
}

impl std::fmt::Debug for UploadQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadQueue")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl UploadQueue {
    pub fn new(
        delivery: Arc<dyn Delivery>,
        ledger: Arc<DeliveryLedger>,
        max_attempts: u32,
    ) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            delivery,
            ledger,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Add a task for `path` unless it is already ledgered or tracked.
    /// Re-arms abandoned tasks. Returns whether a new attempt was scheduled.
    pub async fn enqueue(&self, path: PathBuf) -> bool {
        if self.ledger.contains(&path).await {
            debug!(path = %path.display(), "already delivered, skipping");
            return false;
        }
        let mut tasks = self.tasks.lock().await;
        match tasks.get_mut(&path) {
            Some(task) if task.state == TaskState::Abandoned => {
                task.attempts = 0;
                task.state = TaskState::Pending;
                info!(path = %path.display(), "abandoned task re-armed");
                true
            }
            Some(_) => false,
            None => {
                tasks.insert(
                    path,
                    UploadTask {
                        attempts: 0,
                        state: TaskState::Pending,
                    },
                );
                true
            }
        }
    }

    /// Deliver every pending task, one at a time.
    pub async fn drain(&self) {
        while let Some(path) = self.take_pending().await {
            self.deliver_one(path).await;
        }
    }

    /// Re-arm retryable failures and deliver them.
    pub async fn sweep(&self) {
        let requeued = {
            let mut tasks = self.tasks.lock().await;
            let mut n = 0;
            for task in tasks.values_mut() {
                if task.state == TaskState::FailedRetryable {
                    task.state = TaskState::Pending;
                    n += 1;
                }
            }
            n
        };
        if requeued > 0 {
            debug!(requeued, "sweeping failed uploads");
            self.drain().await;
        }
    }

    pub async fn state_of(&self, path: &PathBuf) -> Option<TaskState> {
        self.tasks.lock().await.get(path).map(|t| t.state)
    }

    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    /// Consume enqueue events and run periodic sweeps until the channel
    /// closes.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<PathBuf>, sweep_interval: Duration) {
        let mut ticker = tokio::time::interval(sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // first tick resolves immediately

        loop {
            tokio::select! {
                maybe = rx.recv() => match maybe {
                    Some(path) => {
                        if self.enqueue(path).await {
                            self.drain().await;
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => self.sweep().await,
            }
        }
        self.sweep().await;
    }

    async fn take_pending(&self) -> Option<PathBuf> {
        let mut tasks = self.tasks.lock().await;
        let path = tasks
            .iter()
            .find(|(_, t)| t.state == TaskState::Pending)
            .map(|(p, _)| p.clone())?;
        let task = tasks.get_mut(&path)?;
        task.state = TaskState::InFlight;
        task.attempts += 1;
        Some(path)
    }

    async fn deliver_one(&self, path: PathBuf) {
        match self.delivery.deliver(&path).await {
            Ok(receipt) => {
                if let Err(e) = self.ledger.record(&path).await {
                    // The server holds the file; its dedup covers a re-send.
                    error!(path = %path.display(), "ledger write failed: {e}");
                }
                info!(
                    path = %path.display(),
                    file_id = receipt.file_id,
                    duplicate = receipt.duplicate,
                    "delivered"
                );
                self.tasks.lock().await.remove(&path);
            }
            Err(e) => {
                let mut tasks = self.tasks.lock().await;
                let Some(task) = tasks.get_mut(&path) else {
                    return;
                };
                if e.is_retryable() && task.attempts < self.max_attempts {
                    task.state = TaskState::FailedRetryable;
                    warn!(
                        path = %path.display(),
                        attempt = task.attempts,
                        "delivery failed, will retry: {e}"
                    );
                } else {
                    task.state = TaskState::Abandoned;
                    warn!(
                        path = %path.display(),
                        attempts = task.attempts,
                        "giving up on delivery: {e}"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lumen_model::{MediaKind, UploadResponse};
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn receipt(duplicate: bool) -> UploadResponse {
        UploadResponse {
            message: "ok".to_string(),
            file_id: 7,
            filename: "a.png".to_string(),
            size: 10,
            kind: MediaKind::Image,
            duplicate,
        }
    }

    /// Pops scripted outcomes per call; once the script runs out, succeeds.
    struct ScriptedDelivery {
        script: Mutex<VecDeque<Result<UploadResponse, DeliveryError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedDelivery {
        fn new(script: Vec<Result<UploadResponse, DeliveryError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Delivery for ScriptedDelivery {
        async fn deliver(&self, _path: &Path) -> Result<UploadResponse, DeliveryError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Ok(receipt(false)))
        }
    }

    async fn ledger() -> (Arc<DeliveryLedger>, TempDir) {
        let dir = TempDir::new().unwrap();
        let ledger = DeliveryLedger::load(dir.path().join("ledger.log"))
            .await
            .unwrap();
        (Arc::new(ledger), dir)
    }

    #[tokio::test]
    async fn success_records_ledger_and_clears_task() {
        let (ledger, _dir) = ledger().await;
        let delivery = ScriptedDelivery::new(vec![]);
        let queue = UploadQueue::new(delivery.clone(), ledger.clone(), DEFAULT_MAX_ATTEMPTS);

        let path = PathBuf::from("/media/a.png");
        assert!(queue.enqueue(path.clone()).await);
        queue.drain().await;

        assert_eq!(delivery.calls(), 1);
        assert!(ledger.contains(&path).await);
        assert_eq!(queue.len().await, 0);
    }

    #[tokio::test]
    async fn ledgered_path_is_never_enqueued() {
        let (ledger, _dir) = ledger().await;
        let path = PathBuf::from("/media/a.png");
        ledger.record(&path).await.unwrap();

        let delivery = ScriptedDelivery::new(vec![]);
        let queue = UploadQueue::new(delivery.clone(), ledger, DEFAULT_MAX_ATTEMPTS);

        assert!(!queue.enqueue(path).await);
        queue.drain().await;
        assert_eq!(delivery.calls(), 0);
    }

    #[tokio::test]
    async fn tracked_path_is_not_enqueued_twice() {
        let (ledger, _dir) = ledger().await;
        let delivery = ScriptedDelivery::new(vec![Err(DeliveryError::Retryable("net".into()))]);
        let queue = UploadQueue::new(delivery.clone(), ledger, DEFAULT_MAX_ATTEMPTS);

        let path = PathBuf::from("/media/a.png");
        assert!(queue.enqueue(path.clone()).await);
        queue.drain().await;
        assert_eq!(
            queue.state_of(&path).await,
            Some(TaskState::FailedRetryable)
        );

        // Still tracked, so a second event schedules nothing new.
        assert!(!queue.enqueue(path).await);
        assert_eq!(delivery.calls(), 1);
    }

    #[tokio::test]
    async fn retryable_failures_abandon_after_max_attempts() {
        let (ledger, _dir) = ledger().await;
        let delivery = ScriptedDelivery::new(vec![
            Err(DeliveryError::Retryable("net".into())),
            Err(DeliveryError::Retryable("net".into())),
            Err(DeliveryError::Retryable("net".into())),
            Err(DeliveryError::Retryable("net".into())),
        ]);
        let queue = UploadQueue::new(delivery.clone(), ledger.clone(), 3);

        let path = PathBuf::from("/media/a.png");
        queue.enqueue(path.clone()).await;
        queue.drain().await;
        queue.sweep().await;
        queue.sweep().await;

        assert_eq!(delivery.calls(), 3);
        assert_eq!(queue.state_of(&path).await, Some(TaskState::Abandoned));
        assert!(!ledger.contains(&path).await);

        // Sweeps no longer touch an abandoned task.
        queue.sweep().await;
        assert_eq!(delivery.calls(), 3);
    }

    #[tokio::test]
    async fn rejection_abandons_without_retry() {
        let (ledger, _dir) = ledger().await;
        let delivery = ScriptedDelivery::new(vec![Err(DeliveryError::Rejected("bad type".into()))]);
        let queue = UploadQueue::new(delivery.clone(), ledger, DEFAULT_MAX_ATTEMPTS);

        let path = PathBuf::from("/media/notes.txt");
        queue.enqueue(path.clone()).await;
        queue.drain().await;
        queue.sweep().await;

        assert_eq!(delivery.calls(), 1);
        assert_eq!(queue.state_of(&path).await, Some(TaskState::Abandoned));
    }

    #[tokio::test]
    async fn fresh_event_rearms_abandoned_task() {
        let (ledger, _dir) = ledger().await;
        let delivery = ScriptedDelivery::new(vec![Err(DeliveryError::Rejected("nope".into()))]);
        let queue = UploadQueue::new(delivery.clone(), ledger.clone(), DEFAULT_MAX_ATTEMPTS);

        let path = PathBuf::from("/media/a.png");
        queue.enqueue(path.clone()).await;
        queue.drain().await;
        assert_eq!(queue.state_of(&path).await, Some(TaskState::Abandoned));

        // Script exhausted: the re-armed attempt succeeds.
        assert!(queue.enqueue(path.clone()).await);
        queue.drain().await;
        assert_eq!(delivery.calls(), 2);
        assert!(ledger.contains(&path).await);
    }

    #[tokio::test]
    async fn duplicate_receipt_still_ledgers() {
        let (ledger, _dir) = ledger().await;
        let delivery = ScriptedDelivery::new(vec![Ok(receipt(true))]);
        let queue = UploadQueue::new(delivery, ledger.clone(), DEFAULT_MAX_ATTEMPTS);

        let path = PathBuf::from("/media/a.png");
        queue.enqueue(path.clone()).await;
        queue.drain().await;
        assert!(ledger.contains(&path).await);
        assert_eq!(queue.len().await, 0);
    }
}
