use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

/// Append-only record of paths that have been delivered to the server.
///
/// One path per line. The file is fsynced after every append, so a crash
/// can at worst lose the entry for an upload still in flight; the server's
/// fingerprint dedup absorbs the resulting re-send.
#[derive(Debug)]
pub struct DeliveryLedger {
    path: PathBuf,
    entries: Mutex<HashSet<PathBuf>>,
}

impl DeliveryLedger {
    /// Load the ledger from disk. A missing file is an empty ledger.
    pub async fn load(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let entries: HashSet<PathBuf> = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text
                .lines()
                .filter(|line| !line.is_empty())
                .map(PathBuf::from)
                .collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => return Err(e),
        };
        debug!(entries = entries.len(), path = %path.display(), "ledger loaded");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub async fn contains(&self, path: &Path) -> bool {
        self.entries.lock().await.contains(path)
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// Append `path` and fsync before returning. Once this resolves, the
    /// entry survives a crash.
    pub async fn record(&self, path: &Path) -> io::Result<()> {
        let mut entries = self.entries.lock().await;
        if entries.contains(path) {
            return Ok(());
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{}\n", path.display()).as_bytes())
            .await?;
        file.sync_all().await?;
        entries.insert(path.to_path_buf());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_is_empty_ledger() {
        let dir = TempDir::new().unwrap();
        let ledger = DeliveryLedger::load(dir.path().join("ledger.log"))
            .await
            .unwrap();
        assert_eq!(ledger.len().await, 0);
        assert!(!ledger.contains(Path::new("/tmp/a.png")).await);
    }

    #[tokio::test]
    async fn recorded_paths_survive_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.log");

        let ledger = DeliveryLedger::load(&path).await.unwrap();
        ledger.record(Path::new("/media/a.png")).await.unwrap();
        ledger.record(Path::new("/media/b.mp4")).await.unwrap();
        ledger.record(Path::new("/media/a.png")).await.unwrap();

        let reloaded = DeliveryLedger::load(&path).await.unwrap();
        assert_eq!(reloaded.len().await, 2);
        assert!(reloaded.contains(Path::new("/media/a.png")).await);
        assert!(reloaded.contains(Path::new("/media/b.mp4")).await);
        assert!(!reloaded.contains(Path::new("/media/c.png")).await);
    }

    #[tokio::test]
    async fn one_line_per_entry() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.log");

        let ledger = DeliveryLedger::load(&path).await.unwrap();
        ledger.record(Path::new("/media/a.png")).await.unwrap();
        ledger.record(Path::new("/media/b.png")).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
