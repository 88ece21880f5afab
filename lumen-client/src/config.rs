use std::{env, path::PathBuf, time::Duration};

/// Client configuration loaded from environment variables (a `.env` file
/// is honored when present).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the vault server, e.g. `http://127.0.0.1:5000`.
    pub server_url: String,
    /// Bearer token sent with every upload; `None` when the server is open.
    pub auth_token: Option<String>,

    /// Folder to monitor for new media files.
    pub watch_dir: PathBuf,
    /// Append-only record of paths already delivered.
    pub ledger_path: PathBuf,

    /// How long a file must go without further writes before upload.
    pub settle: Duration,
    /// How often failed uploads are re-queued.
    pub sweep_interval: Duration,
    /// Per-request timeout; covers large files over slow links.
    pub request_timeout: Duration,
    /// Delivery attempts before a task is abandoned.
    pub max_attempts: u32,
}

impl ClientConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let watch_dir: PathBuf = env::var("LUMEN_WATCH_DIR")
            .unwrap_or_else(|_| "./watched".to_string())
            .into();
        let ledger_path = env::var("LUMEN_LEDGER_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploaded_files.log"));

        Ok(Self {
            server_url: env::var("LUMEN_SERVER_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:5000".to_string()),
            auth_token: env::var("LUMEN_AUTH_TOKEN").ok().filter(|t| !t.is_empty()),
            watch_dir,
            ledger_path,
            settle: Duration::from_millis(env_u64("LUMEN_SETTLE_MS", 2_000)),
            sweep_interval: Duration::from_secs(env_u64("LUMEN_SWEEP_SECS", 60)),
            request_timeout: Duration::from_secs(env_u64("LUMEN_TIMEOUT_SECS", 300)),
            max_attempts: env_u64("LUMEN_MAX_ATTEMPTS", 3) as u32,
        })
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
