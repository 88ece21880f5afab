use std::{env, path::PathBuf};

/// Server configuration loaded from environment variables (a `.env` file
/// is honored when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,

    /// Directory holding uploaded blobs.
    pub storage_dir: PathBuf,
    /// Directory holding generated thumbnails.
    pub thumbnail_dir: PathBuf,
    /// SQLite database file for file metadata.
    pub database_path: PathBuf,

    /// Static bearer token; `None` disables authentication.
    pub auth_token: Option<String>,

    pub cors_allowed_origins: Vec<String>,

    /// Upper bound on a single upload body, in bytes.
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let storage_dir: PathBuf = env::var("LUMEN_STORAGE_DIR")
            .unwrap_or_else(|_| "./storage".to_string())
            .into();
        let thumbnail_dir = env::var("LUMEN_THUMBNAIL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| storage_dir.join(".thumbnails"));
        let database_path = env::var("LUMEN_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| storage_dir.join("lumen.db"));

        Ok(Self {
            host: env::var("LUMEN_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("LUMEN_PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .unwrap_or(5000),
            storage_dir,
            thumbnail_dir,
            database_path,
            auth_token: env::var("LUMEN_AUTH_TOKEN").ok().filter(|t| !t.is_empty()),
            cors_allowed_origins: env::var("LUMEN_CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            max_upload_bytes: env::var("LUMEN_MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(500 * 1024 * 1024),
        })
    }

    /// Create the storage and thumbnail directories if they don't exist.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.storage_dir)?;
        std::fs::create_dir_all(&self.thumbnail_dir)?;
        if let Some(parent) = self.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    pub fn auth_enabled(&self) -> bool {
        self.auth_token.is_some()
    }
}
