//! Streaming content fingerprints.
//!
//! A fingerprint is the SHA-256 of the file's bytes, lowercase hex. It
//! depends on the bytes alone: filename, timestamps, and read chunk size
//! never influence it.

use std::io::SeekFrom;
use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

use crate::error::Result;

const CHUNK_SIZE: usize = 8 * 1024;

/// Fingerprint a file on disk without loading it into memory.
pub async fn fingerprint_file(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    hash_stream(&mut file).await
}

/// Fingerprint a seekable stream, leaving its position at the start so the
/// same handle can be reused for persistence.
pub async fn fingerprint_reader<R>(reader: &mut R) -> Result<String>
where
    R: AsyncRead + AsyncSeek + Unpin,
{
    reader.seek(SeekFrom::Start(0)).await?;
    let digest = hash_stream(reader).await?;
    reader.seek(SeekFrom::Start(0)).await?;
    Ok(digest)
}

async fn hash_stream<R>(reader: &mut R) -> Result<String>
where
    R: AsyncRead + Unpin,
{
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
