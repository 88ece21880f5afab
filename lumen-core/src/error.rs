use thiserror::Error;

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("Fingerprint already stored: {0}")]
    DuplicateFingerprint(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, VaultError>;
