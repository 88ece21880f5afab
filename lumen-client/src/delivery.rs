use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, multipart};
use tokio_util::io::ReaderStream;
use tracing::debug;

use lumen_model::{UploadResponse, guess_mime};

/// Why a delivery attempt failed, split by whether retrying can help.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Transient: network trouble, timeout, or a 5xx from the server.
    #[error("retryable delivery failure: {0}")]
    Retryable(String),

    /// Permanent: the server rejected the file and will keep rejecting it.
    #[error("upload rejected: {0}")]
    Rejected(String),
}

impl DeliveryError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

/// Hands one local file to the vault. Swapped for a scripted fake in tests.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, path: &Path) -> Result<UploadResponse, DeliveryError>;
}

/// Delivers files via multipart `POST /upload`, streaming the body from disk.
#[derive(Debug)]
pub struct HttpDelivery {
    client: reqwest::Client,
    upload_url: String,
    auth_token: Option<String>,
}

impl HttpDelivery {
    pub fn new(
        server_url: &str,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            upload_url: format!("{}/upload", server_url.trim_end_matches('/')),
            auth_token,
        })
    }
}

#[async_trait]
impl Delivery for HttpDelivery {
    async fn deliver(&self, path: &Path) -> Result<UploadResponse, DeliveryError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                DeliveryError::Rejected(format!("unusable file name: {}", path.display()))
            })?
            .to_string();

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| DeliveryError::Retryable(format!("cannot open {}: {e}", path.display())))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| DeliveryError::Retryable(format!("cannot stat {}: {e}", path.display())))?
            .len();

        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let mut part = multipart::Part::stream_with_length(body, len).file_name(file_name);
        if let Some(mime) = guess_mime(path) {
            part = part
                .mime_str(mime)
                .map_err(|e| DeliveryError::Rejected(format!("bad mime type: {e}")))?;
        }
        let form = multipart::Form::new().part("file", part);

        let mut request = self.client.post(&self.upload_url).multipart(form);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DeliveryError::Retryable(format!("request failed: {e}")))?;
        let status = response.status();

        if status.is_success() {
            let receipt: UploadResponse = response
                .json()
                .await
                .map_err(|e| DeliveryError::Retryable(format!("unreadable response: {e}")))?;
            debug!(
                file_id = receipt.file_id,
                duplicate = receipt.duplicate,
                "upload accepted"
            );
            Ok(receipt)
        } else if status.is_server_error()
            || status == StatusCode::REQUEST_TIMEOUT
            || status == StatusCode::TOO_MANY_REQUESTS
        {
            Err(DeliveryError::Retryable(format!("server returned {status}")))
        } else {
            let detail = response.text().await.unwrap_or_default();
            Err(DeliveryError::Rejected(format!(
                "server returned {status}: {detail}"
            )))
        }
    }
}
