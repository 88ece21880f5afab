//! Content-addressed ingestion.
//!
//! The pipeline owns the order of operations: gate on extension, hash,
//! dedup lookup, blob write, best-effort thumbnail, metadata insert last.
//! Inserting last means a disk failure can strand a blob without a record
//! but never a record without a blob.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::error::{Result, VaultError};
use crate::hash;
use crate::store::{MetadataStore, NewFileRecord};
use crate::thumbs::Thumbnailer;
use lumen_model::{FileRecord, MediaKind, allowed_extension, guess_mime};

/// Result of one ingest call; `duplicate` is set when the fingerprint was
/// already known and `record` is the pre-existing record.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub record: FileRecord,
    pub duplicate: bool,
}

#[derive(Debug, Clone)]
pub struct IngestionPipeline {
    store: MetadataStore,
    thumbnailer: Thumbnailer,
    blob_dir: PathBuf,
}

impl IngestionPipeline {
    pub fn new(store: MetadataStore, thumbnailer: Thumbnailer, blob_dir: PathBuf) -> Self {
        Self {
            store,
            thumbnailer,
            blob_dir,
        }
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn thumbnailer(&self) -> &Thumbnailer {
        &self.thumbnailer
    }

    pub fn blob_path(&self, stored_name: &str) -> PathBuf {
        self.blob_dir.join(stored_name)
    }

    /// Ingest the payload at `source` under the client-supplied name.
    ///
    /// Idempotent per content: re-uploading known bytes returns the
    /// existing record with `duplicate = true` and touches nothing.
    pub async fn ingest(
        &self,
        original_name: &str,
        declared_mime: Option<&str>,
        source: &Path,
    ) -> Result<IngestOutcome> {
        let name_path = Path::new(original_name);
        if !allowed_extension(name_path) {
            return Err(VaultError::UnsupportedType(original_name.to_string()));
        }

        let fingerprint = hash::fingerprint_file(source).await?;

        if let Some(existing) = self.store.find_by_fingerprint(&fingerprint).await? {
            info!(
                file_id = existing.id,
                fingerprint = %fingerprint,
                "duplicate upload, returning existing record"
            );
            return Ok(IngestOutcome {
                record: existing,
                duplicate: true,
            });
        }

        let original_name = sanitize_file_name(original_name);
        let (stored_name, size_bytes, wrote_blob) =
            self.persist_blob(source, &original_name, &fingerprint).await?;
        let blob_path = self.blob_path(&stored_name);

        let mime_type = guess_mime(name_path)
            .map(str::to_string)
            .or_else(|| declared_mime.map(str::to_string));
        let kind = MediaKind::from_mime(mime_type.as_deref());

        let mut thumbnail_ref = None;
        let mut dimensions = None;
        if kind == MediaKind::Image {
            match self.thumbnailer.generate(&blob_path, &stored_name).await {
                Ok(name) => thumbnail_ref = Some(name),
                Err(e) => warn!(%stored_name, "thumbnail generation failed: {e}"),
            }
            dimensions = self.thumbnailer.probe_dimensions(&blob_path).await;
        }

        let now = Utc::now();
        let record = NewFileRecord {
            stored_name: stored_name.clone(),
            original_name,
            size_bytes,
            mime_type,
            kind,
            created_at: now,
            uploaded_at: now,
            thumbnail_ref,
            width: dimensions.map(|(w, _)| w as i64),
            height: dimensions.map(|(_, h)| h as i64),
            fingerprint: fingerprint.clone(),
        };

        match self.store.insert(record).await {
            Ok(inserted) => {
                info!(file_id = inserted.id, %stored_name, "stored new file");
                Ok(IngestOutcome {
                    record: inserted,
                    duplicate: false,
                })
            }
            Err(VaultError::DuplicateFingerprint(_)) => {
                // A concurrent upload of the same bytes won the insert
                // race. Drop this request's blob and serve the winner,
                // unless both requests landed on the same blob path.
                let winner = self
                    .store
                    .find_by_fingerprint(&fingerprint)
                    .await?
                    .ok_or_else(|| {
                        VaultError::Internal(format!(
                            "record for fingerprint {fingerprint} vanished after conflict"
                        ))
                    })?;
                if wrote_blob && winner.stored_name != stored_name {
                    self.discard_blob(&blob_path, &stored_name).await;
                }
                Ok(IngestOutcome {
                    record: winner,
                    duplicate: true,
                })
            }
            Err(e) => {
                if wrote_blob {
                    self.discard_blob(&blob_path, &stored_name).await;
                }
                Err(e)
            }
        }
    }

    /// Delete the blob, thumbnail, and record for `id`.
    ///
    /// Returns whether a record existed. Disk files already gone are
    /// tolerated; the record is removed regardless so no orphaned record
    /// can point at deleted content.
    pub async fn remove(&self, id: i64) -> Result<bool> {
        let Some(record) = self.store.find_by_id(id).await? else {
            return Ok(false);
        };

        let blob_path = self.blob_path(&record.stored_name);
        match tokio::fs::remove_file(&blob_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        if let Some(thumb) = &record.thumbnail_ref {
            self.thumbnailer.remove(thumb).await?;
        }

        self.store.delete(id).await
    }

    /// Copy the payload into the blob dir under a timestamped stored
    /// name, returning `(stored_name, size, wrote_blob)`.
    ///
    /// The blob file is created with create-new semantics, so two
    /// concurrent uploads sharing a name within the same second cannot
    /// overwrite each other: the loser of the plain name falls back to a
    /// fingerprint-prefixed one. When even that exists, the same bytes
    /// are already on disk under that name (a concurrent twin of this
    /// request wrote them) and nothing is written.
    async fn persist_blob(
        &self,
        source: &Path,
        sanitized: &str,
        fingerprint: &str,
    ) -> Result<(String, i64, bool)> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let prefix = &fingerprint[..8.min(fingerprint.len())];
        let plain = format!("{stamp}_{sanitized}");
        let prefixed = format!("{stamp}_{prefix}_{sanitized}");

        for stored_name in [plain, prefixed] {
            match copy_create_new(source, &self.blob_path(&stored_name)).await {
                Ok(size) => return Ok((stored_name, size as i64, true)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        let size = tokio::fs::metadata(source).await?.len() as i64;
        Ok((
            format!("{stamp}_{prefix}_{sanitized}"),
            size,
            false,
        ))
    }

    async fn discard_blob(&self, blob_path: &Path, stored_name: &str) {
        if let Err(e) = tokio::fs::remove_file(blob_path).await {
            warn!(%stored_name, "failed to remove losing blob: {e}");
        }
        let thumb_name = format!("thumb_{stored_name}.jpg");
        let _ = self.thumbnailer.remove(&thumb_name).await;
    }
}

/// Copy `source` to `dest`, failing with `AlreadyExists` rather than
/// overwriting. A copy that errors midway removes its partial file.
async fn copy_create_new(source: &Path, dest: &Path) -> std::io::Result<u64> {
    let mut src = tokio::fs::File::open(source).await?;
    let mut dst = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .await?;
    match tokio::io::copy(&mut src, &mut dst).await {
        Ok(size) => {
            dst.flush().await?;
            Ok(size)
        }
        Err(e) => {
            drop(dst);
            let _ = tokio::fs::remove_file(dest).await;
            Err(e)
        }
    }
}

/// Strip path components and anything outside `[A-Za-z0-9._-]`.
///
/// Leading dots are dropped so a stored name can never be hidden or
/// traverse upward once joined to the blob directory.
fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name)
        .trim_start_matches('.');
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}
