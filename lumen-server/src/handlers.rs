use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use lumen_model::{ApiIndex, FileListResponse, MediaKind, StatsResponse, UploadResponse};

use crate::{
    errors::{AppError, AppResult},
    state::AppState,
};

/// Returns the API name, version, and endpoint map for `GET /`.
pub async fn index() -> Json<ApiIndex> {
    Json(ApiIndex::default())
}

/// Ingests one multipart file part named `file` for `POST /upload`.
///
/// The part is spooled to a temp file first so the fingerprint covers the
/// complete payload; a truncated body fails the multipart read and never
/// reaches the pipeline.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Response> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field
            .file_name()
            .map(str::to_string)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| AppError::bad_request("No file selected"))?;
        let declared_mime = field.content_type().map(str::to_string);

        let spool = tempfile::NamedTempFile::new()
            .map_err(|e| AppError::internal(format!("cannot create spool file: {e}")))?;
        let mut writer = tokio::fs::File::create(spool.path())
            .await
            .map_err(|e| AppError::internal(format!("cannot open spool file: {e}")))?;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| AppError::bad_request(format!("Upload interrupted: {e}")))?
        {
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| AppError::internal(format!("spool write failed: {e}")))?;
        }
        writer
            .flush()
            .await
            .map_err(|e| AppError::internal(format!("spool flush failed: {e}")))?;
        drop(writer);

        let outcome = state
            .pipeline
            .ingest(&original_name, declared_mime.as_deref(), spool.path())
            .await?;

        let status = if outcome.duplicate {
            StatusCode::OK
        } else {
            StatusCode::CREATED
        };
        let message = if outcome.duplicate {
            "File already exists (duplicate detected)"
        } else {
            "File uploaded successfully"
        };
        let record = outcome.record;
        let body = UploadResponse {
            message: message.to_string(),
            file_id: record.id,
            filename: record.original_name,
            size: record.size_bytes,
            kind: record.kind,
            duplicate: outcome.duplicate,
        };
        return Ok((status, Json(body)).into_response());
    }

    Err(AppError::bad_request("No file provided"))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: i64,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Lists stored files, newest first, for `GET /files?limit&offset&type`.
pub async fn list_files(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<FileListResponse>> {
    let kind = params
        .kind
        .as_deref()
        .map(|k| {
            k.parse::<MediaKind>()
                .map_err(|_| AppError::bad_request(format!("Unknown type filter: {k}")))
        })
        .transpose()?;

    let files = state.store().list(params.limit, params.offset, kind).await?;
    Ok(Json(files.into()))
}

/// Streams the original blob as an attachment for `GET /file/{id}`.
pub async fn download_file(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let record = state
        .store()
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("File not found"))?;

    let blob_path = state.pipeline.blob_path(&record.stored_name);
    let file = match tokio::fs::File::open(&blob_path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(file_id = id, "record exists but blob is missing");
            return Err(AppError::not_found("File not found on disk"));
        }
        Err(e) => return Err(AppError::internal(format!("cannot open blob: {e}"))),
    };

    let content_type = record
        .mime_type
        .as_deref()
        .unwrap_or("application/octet-stream");
    let disposition = format!("attachment; filename=\"{}\"", record.original_name);

    let response = Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, record.size_bytes)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::internal(format!("response build failed: {e}")))?;
    Ok(response)
}

/// Serves the JPEG preview, when one exists, for `GET /thumbnail/{id}`.
pub async fn get_thumbnail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let record = state
        .store()
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::not_found("File not found"))?;

    let thumb_ref = record
        .thumbnail_ref
        .as_deref()
        .ok_or_else(|| AppError::not_found("No thumbnail available"))?;

    let path = state.pipeline.thumbnailer().thumbnail_path(thumb_ref);
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| AppError::not_found("Thumbnail not found on disk"))?;

    let response = Response::builder()
        .header(header::CONTENT_TYPE, "image/jpeg")
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::internal(format!("response build failed: {e}")))?;
    Ok(response)
}

/// Removes blob, thumbnail, and record for `DELETE /file/{id}`.
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<serde_json::Value>> {
    if !state.pipeline.remove(id).await? {
        return Err(AppError::not_found("File not found"));
    }
    info!(file_id = id, "file deleted");
    Ok(Json(serde_json::json!({
        "message": "File deleted successfully"
    })))
}

/// Reports aggregate counters plus a human-formatted total size for
/// `GET /stats`.
pub async fn get_stats(State(state): State<AppState>) -> AppResult<Json<StatsResponse>> {
    let stats = state.store().stats().await?;
    Ok(Json(stats.into()))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

/// Case-insensitive substring match on original names for `GET /search?q=`.
pub async fn search_files(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<FileListResponse>> {
    if params.q.is_empty() {
        return Err(AppError::bad_request("Search query required"));
    }
    let files = state.store().search(&params.q).await?;
    Ok(Json(files.into()))
}
