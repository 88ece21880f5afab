use chrono::{DateTime, Utc};

use crate::kind::MediaKind;

/// A stored file's metadata as persisted by the server.
///
/// Created exactly once per distinct fingerprint and never mutated
/// afterwards; the `id` is assigned by the store on first insert.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct FileRecord {
    pub id: i64,
    /// On-disk blob name: timestamp prefix plus the sanitized original name.
    pub stored_name: String,
    pub original_name: String,
    pub size_bytes: i64,
    pub mime_type: Option<String>,
    pub kind: MediaKind,
    pub created_at: DateTime<Utc>,
    pub uploaded_at: DateTime<Utc>,
    /// Thumbnail file name under the thumbnail directory; `None` when the
    /// file is not an image or generation failed.
    pub thumbnail_ref: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    /// SHA-256 of the file contents, lowercase hex. Unique across records.
    pub fingerprint: String,
}

/// Aggregate counters for the whole store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StoreStats {
    pub total_count: i64,
    pub total_bytes: i64,
    pub image_count: i64,
    pub video_count: i64,
}
