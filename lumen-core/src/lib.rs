//! Lumen's server-side engine: content hashing, metadata persistence,
//! thumbnail generation, and the dedup ingestion pipeline.

pub mod error;
pub mod hash;
pub mod ingest;
pub mod store;
pub mod thumbs;

pub use error::{Result, VaultError};
pub use ingest::{IngestOutcome, IngestionPipeline};
pub use store::{MetadataStore, NewFileRecord};
pub use thumbs::Thumbnailer;
