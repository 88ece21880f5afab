//! Wire payloads for the HTTP surface.

use std::collections::BTreeMap;

use crate::files::{FileRecord, StoreStats};
use crate::kind::MediaKind;

/// Response body for `POST /upload`, for both fresh and duplicate uploads.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub file_id: i64,
    pub filename: String,
    pub size: i64,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub duplicate: bool,
}

/// Response body for `GET /files` and `GET /search`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FileListResponse {
    pub files: Vec<FileRecord>,
    pub count: usize,
}

impl From<Vec<FileRecord>> for FileListResponse {
    fn from(files: Vec<FileRecord>) -> Self {
        let count = files.len();
        Self { files, count }
    }
}

/// Response body for `GET /stats`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: StoreStats,
    pub total_bytes_formatted: String,
}

impl From<StoreStats> for StatsResponse {
    fn from(stats: StoreStats) -> Self {
        let total_bytes_formatted = crate::bytes::format_size(stats.total_bytes);
        Self {
            stats,
            total_bytes_formatted,
        }
    }
}

/// Response body for `GET /`: name, version, and the endpoint map.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ApiIndex {
    pub name: String,
    pub version: String,
    pub endpoints: BTreeMap<String, String>,
}

impl Default for ApiIndex {
    fn default() -> Self {
        let endpoints = [
            ("POST /upload", "Upload a file"),
            ("GET /files", "List stored files"),
            ("GET /file/{id}", "Download a file by id"),
            ("GET /thumbnail/{id}", "Fetch a file's thumbnail"),
            ("DELETE /file/{id}", "Delete a file by id"),
            ("GET /stats", "Storage statistics"),
            ("GET /search?q=", "Search files by name"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            name: "Lumen Media Vault".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            endpoints,
        }
    }
}
