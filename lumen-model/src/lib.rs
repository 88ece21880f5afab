//! Core data model definitions shared across Lumen crates.

pub mod api;
pub mod bytes;
pub mod exts;
pub mod files;
pub mod kind;

pub use api::{ApiIndex, FileListResponse, StatsResponse, UploadResponse};
pub use bytes::format_size;
pub use exts::{allowed_extension, guess_mime};
pub use files::{FileRecord, StoreStats};
pub use kind::MediaKind;
