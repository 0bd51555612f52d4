//! Generation Port abstraction
//!
//! A single capability boundary over external text generators:
//! `generate(prompt, structured_hint) -> text`, bounded by a hard timeout.
//! Backends are interchangeable and capability-equivalent; callers must not
//! assume deterministic output length or latency.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Generation backend errors
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Generation timed out after {0:?}")]
    Timeout(Duration),
}

/// Capability abstraction over a text-generation backend
#[async_trait]
pub trait GenerationPort: Send + Sync {
    /// Provider key, e.g. "groq"
    fn name(&self) -> &str;

    /// Hard per-call timeout enforced by [`GenerationPort::generate`]
    fn call_timeout(&self) -> Duration;

    /// Raw backend call. Implementations should not enforce the overall
    /// timeout themselves; `generate` wraps every call uniformly.
    async fn generate_raw(
        &self,
        prompt: &str,
        structured_hint: bool,
    ) -> Result<String, GenerationError>;

    /// Generate text for a prompt. `structured_hint` tells backends that
    /// support it to constrain output to JSON; the sanitizer never relies
    /// on the hint being honored.
    async fn generate(
        &self,
        prompt: &str,
        structured_hint: bool,
    ) -> Result<String, GenerationError> {
        let timeout = self.call_timeout();
        tokio::time::timeout(timeout, self.generate_raw(prompt, structured_hint))
            .await
            .map_err(|_| GenerationError::Timeout(timeout))?
    }
}
