//! Document text retrieval
//!
//! Downloads document content referenced by `file_url` when a payload
//! carries no inline text. Only UTF-8 text bodies are handled here;
//! extraction from binary formats (PDF, DOCX) is an upstream concern and
//! such payloads are expected to arrive with `text` already populated.

use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

/// Hard cap on downloaded document size
pub const MAX_FILE_SIZE_BYTES: usize = 50 * 1024 * 1024;
const DOWNLOAD_MAX_RETRIES: u32 = 3;
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_URL_LENGTH: usize = 2048;

/// Text retrieval errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Invalid file URL: {0}")]
    InvalidUrl(String),
    #[error("File too large: {size} bytes (max {MAX_FILE_SIZE_BYTES})")]
    TooLarge { size: usize },
    #[error("Authentication failed (401): service token invalid or expired")]
    AuthFailed,
    #[error("Download failed after {attempts} attempts: {message}")]
    Download { attempts: u32, message: String },
    #[error("Downloaded content is not valid UTF-8 text")]
    NotText,
    #[error("HTTP client error: {0}")]
    Client(String),
}

/// HTTP document text fetcher
#[derive(Clone)]
pub struct TextFetcher {
    client: Client,
}

impl TextFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .connect_timeout(Duration::from_secs(10))
            .user_agent("docflow-ai/0.3")
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    /// Download a document and decode it as UTF-8 text.
    ///
    /// Retries transient failures with exponential backoff; authentication
    /// failures are terminal and never retried.
    pub async fn fetch_text(
        &self,
        url: &str,
        service_token: Option<&str>,
    ) -> Result<String, FetchError> {
        validate_file_url(url)?;

        let mut last_error = String::new();
        for attempt in 1..=DOWNLOAD_MAX_RETRIES {
            info!(url, attempt, max_attempts = DOWNLOAD_MAX_RETRIES, "Downloading document");

            let mut request = self.client.get(url);
            if let Some(token) = service_token {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.as_u16() == 401 {
                        warn!(url, "Service token rejected, not retrying");
                        return Err(FetchError::AuthFailed);
                    }
                    if status.is_success() {
                        let bytes = response
                            .bytes()
                            .await
                            .map_err(|e| FetchError::Client(e.to_string()))?;
                        if bytes.len() > MAX_FILE_SIZE_BYTES {
                            return Err(FetchError::TooLarge { size: bytes.len() });
                        }
                        info!(url, size_bytes = bytes.len(), "Document downloaded");
                        return String::from_utf8(bytes.to_vec()).map_err(|_| FetchError::NotText);
                    }
                    last_error = format!("HTTP {status}");
                    warn!(url, attempt, status = %status, "Document download attempt failed");
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(url, attempt, error = %last_error, "Document download attempt failed");
                }
            }

            if attempt < DOWNLOAD_MAX_RETRIES {
                tokio::time::sleep(Duration::from_secs(1 << (attempt - 1))).await;
            }
        }

        Err(FetchError::Download {
            attempts: DOWNLOAD_MAX_RETRIES,
            message: last_error,
        })
    }
}

/// Validate URL scheme and length before touching the network
fn validate_file_url(raw: &str) -> Result<(), FetchError> {
    if raw.len() > MAX_URL_LENGTH {
        return Err(FetchError::InvalidUrl(format!(
            "URL too long: {} characters",
            raw.len()
        )));
    }

    let url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(FetchError::InvalidUrl(format!(
            "Unsupported URL scheme: {}",
            url.scheme()
        )));
    }

    Ok(())
}
