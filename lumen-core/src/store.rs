//! SQLite-backed metadata store.
//!
//! One row per distinct content fingerprint, enforced by a unique
//! constraint rather than a read-then-write check so that concurrent
//! inserts of identical content cannot both succeed.

use std::path::Path;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};

use crate::error::{Result, VaultError};
use lumen_model::{FileRecord, MediaKind, StoreStats};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    stored_name TEXT NOT NULL,
    original_name TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    mime_type TEXT,
    kind TEXT NOT NULL,
    created_at TEXT NOT NULL,
    uploaded_at TEXT NOT NULL,
    thumbnail_ref TEXT,
    width INTEGER,
    height INTEGER,
    fingerprint TEXT NOT NULL UNIQUE
);
CREATE INDEX IF NOT EXISTS idx_files_uploaded_at ON files(uploaded_at);
CREATE INDEX IF NOT EXISTS idx_files_kind ON files(kind);
"#;

/// A record about to be inserted; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub stored_name: String,
    pub original_name: String,
    pub size_bytes: i64,
    pub mime_type: Option<String>,
    pub kind: MediaKind,
    pub created_at: DateTime<Utc>,
    pub uploaded_at: DateTime<Utc>,
    pub thumbnail_ref: Option<String>,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub fingerprint: String,
}

#[derive(Debug, Clone)]
pub struct MetadataStore {
    pool: SqlitePool,
}

impl MetadataStore {
    /// Open (creating if missing) the database at `path` and ensure the
    /// schema exists.
    pub async fn connect(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a new record, returning it with its assigned id.
    ///
    /// A fingerprint collision surfaces as `DuplicateFingerprint`; the
    /// caller decides whether that is a conflict or an idempotent hit.
    pub async fn insert(&self, record: NewFileRecord) -> Result<FileRecord> {
        let inserted = sqlx::query_as::<_, FileRecord>(
            r#"
            INSERT INTO files (
                stored_name, original_name, size_bytes, mime_type, kind,
                created_at, uploaded_at, thumbnail_ref, width, height, fingerprint
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING
                id, stored_name, original_name, size_bytes, mime_type, kind,
                created_at, uploaded_at, thumbnail_ref, width, height, fingerprint
            "#,
        )
        .bind(&record.stored_name)
        .bind(&record.original_name)
        .bind(record.size_bytes)
        .bind(&record.mime_type)
        .bind(record.kind)
        .bind(record.created_at)
        .bind(record.uploaded_at)
        .bind(&record.thumbnail_ref)
        .bind(record.width)
        .bind(record.height)
        .bind(&record.fingerprint)
        .fetch_one(self.pool())
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                VaultError::DuplicateFingerprint(record.fingerprint.clone())
            }
            _ => VaultError::Database(e),
        })?;

        Ok(inserted)
    }

    pub async fn find_by_fingerprint(&self, fingerprint: &str) -> Result<Option<FileRecord>> {
        let record = sqlx::query_as::<_, FileRecord>(
            "SELECT * FROM files WHERE fingerprint = ?",
        )
        .bind(fingerprint)
        .fetch_optional(self.pool())
        .await?;
        Ok(record)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<FileRecord>> {
        let record = sqlx::query_as::<_, FileRecord>("SELECT * FROM files WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(record)
    }

    /// Case-insensitive substring match on the original name, newest first.
    pub async fn search(&self, query: &str) -> Result<Vec<FileRecord>> {
        let pattern = format!("%{}%", escape_like(query));
        let records = sqlx::query_as::<_, FileRecord>(
            r#"
            SELECT * FROM files
            WHERE original_name LIKE ? ESCAPE '\'
            ORDER BY uploaded_at DESC, id DESC
            "#,
        )
        .bind(pattern)
        .fetch_all(self.pool())
        .await?;
        Ok(records)
    }

    /// List records newest first. `limit = None` means unbounded.
    pub async fn list(
        &self,
        limit: Option<i64>,
        offset: i64,
        kind: Option<MediaKind>,
    ) -> Result<Vec<FileRecord>> {
        // SQLite treats a negative LIMIT as "no limit".
        let limit = limit.unwrap_or(-1);
        let records = match kind {
            Some(kind) => {
                sqlx::query_as::<_, FileRecord>(
                    r#"
                    SELECT * FROM files
                    WHERE kind = ?
                    ORDER BY uploaded_at DESC, id DESC
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(kind)
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query_as::<_, FileRecord>(
                    r#"
                    SELECT * FROM files
                    ORDER BY uploaded_at DESC, id DESC
                    LIMIT ? OFFSET ?
                    "#,
                )
                .bind(limit)
                .bind(offset)
                .fetch_all(self.pool())
                .await?
            }
        };
        Ok(records)
    }

    /// Delete a record by id, returning whether one existed.
    ///
    /// Filesystem cleanup is the caller's responsibility.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let stats = sqlx::query_as::<_, StoreStats>(
            r#"
            SELECT
                COUNT(*) AS total_count,
                COALESCE(SUM(size_bytes), 0) AS total_bytes,
                COALESCE(SUM(CASE WHEN kind = 'image' THEN 1 ELSE 0 END), 0) AS image_count,
                COALESCE(SUM(CASE WHEN kind = 'video' THEN 1 ELSE 0 END), 0) AS video_count
            FROM files
            "#,
        )
        .fetch_one(self.pool())
        .await?;
        Ok(stats)
    }
}

fn escape_like(query: &str) -> String {
    query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (tempfile::TempDir, MetadataStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = MetadataStore::connect(&dir.path().join("meta.db"))
            .await
            .unwrap();
        (dir, store)
    }

    fn record(name: &str, fingerprint: &str, kind: MediaKind, size: i64) -> NewFileRecord {
        let now = Utc::now();
        NewFileRecord {
            stored_name: format!("20260830_120000_{name}"),
            original_name: name.to_string(),
            size_bytes: size,
            mime_type: Some("image/png".to_string()),
            kind,
            created_at: now,
            uploaded_at: now,
            thumbnail_ref: None,
            width: None,
            height: None,
            fingerprint: fingerprint.to_string(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_monotonic_ids() {
        let (_dir, store) = temp_store().await;
        let a = store
            .insert(record("a.png", "fp-a", MediaKind::Image, 10))
            .await
            .unwrap();
        let b = store
            .insert(record("b.png", "fp-b", MediaKind::Image, 20))
            .await
            .unwrap();
        assert!(b.id > a.id);
    }

    #[tokio::test]
    async fn duplicate_fingerprint_is_rejected() {
        let (_dir, store) = temp_store().await;
        store
            .insert(record("a.png", "same-fp", MediaKind::Image, 10))
            .await
            .unwrap();
        let err = store
            .insert(record("b.png", "same-fp", MediaKind::Image, 10))
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::DuplicateFingerprint(_)));
    }

    #[tokio::test]
    async fn lookup_by_fingerprint_and_id() {
        let (_dir, store) = temp_store().await;
        let inserted = store
            .insert(record("a.png", "fp-a", MediaKind::Image, 10))
            .await
            .unwrap();

        let by_fp = store.find_by_fingerprint("fp-a").await.unwrap().unwrap();
        assert_eq!(by_fp.id, inserted.id);
        let by_id = store.find_by_id(inserted.id).await.unwrap().unwrap();
        assert_eq!(by_id.fingerprint, "fp-a");
        assert!(store.find_by_id(inserted.id + 999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn search_is_case_insensitive_substring() {
        let (_dir, store) = temp_store().await;
        store
            .insert(record("Holiday_Beach.png", "fp-1", MediaKind::Image, 1))
            .await
            .unwrap();
        store
            .insert(record("garden.png", "fp-2", MediaKind::Image, 1))
            .await
            .unwrap();

        let hits = store.search("beach").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].original_name, "Holiday_Beach.png");
        assert!(store.search("nothing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_escapes_like_wildcards() {
        let (_dir, store) = temp_store().await;
        store
            .insert(record("100%_done.png", "fp-1", MediaKind::Image, 1))
            .await
            .unwrap();
        store
            .insert(record("plain.png", "fp-2", MediaKind::Image, 1))
            .await
            .unwrap();

        // A literal "%" must not match everything.
        let hits = store.search("100%").await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn list_filters_and_paginates() {
        let (_dir, store) = temp_store().await;
        store
            .insert(record("a.png", "fp-1", MediaKind::Image, 1))
            .await
            .unwrap();
        store
            .insert(record("b.mp4", "fp-2", MediaKind::Video, 1))
            .await
            .unwrap();
        store
            .insert(record("c.png", "fp-3", MediaKind::Image, 1))
            .await
            .unwrap();

        let all = store.list(None, 0, None).await.unwrap();
        assert_eq!(all.len(), 3);
        // Newest first.
        assert_eq!(all[0].original_name, "c.png");

        let images = store.list(None, 0, Some(MediaKind::Image)).await.unwrap();
        assert_eq!(images.len(), 2);

        let page = store.list(Some(1), 1, None).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].original_name, "b.mp4");
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let (_dir, store) = temp_store().await;
        let inserted = store
            .insert(record("a.png", "fp-1", MediaKind::Image, 1))
            .await
            .unwrap();
        assert!(store.delete(inserted.id).await.unwrap());
        assert!(!store.delete(inserted.id).await.unwrap());
        assert!(store.find_by_id(inserted.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stats_empty_store_is_all_zero() {
        let (_dir, store) = temp_store().await;
        let stats = store.stats().await.unwrap();
        assert_eq!(stats, StoreStats::default());
    }

    #[tokio::test]
    async fn stats_counts_match_list() {
        let (_dir, store) = temp_store().await;
        store
            .insert(record("a.png", "fp-1", MediaKind::Image, 100))
            .await
            .unwrap();
        store
            .insert(record("b.mp4", "fp-2", MediaKind::Video, 50))
            .await
            .unwrap();
        store
            .insert(record("c.bin", "fp-3", MediaKind::Other, 25))
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_count, 3);
        assert_eq!(stats.total_bytes, 175);
        assert_eq!(stats.image_count, 1);
        assert_eq!(stats.video_count, 1);
        assert_eq!(
            stats.total_count as usize,
            store.list(None, 0, None).await.unwrap().len()
        );
    }
}
