//! Generation backends behind the [`GenerationPort`] capability.
//!
//! `ProviderFactory` is the only place that knows which backends exist;
//! everything else holds a `dyn GenerationPort`. Backends are selected by
//! configuration key, with an optional per-task override carried in the
//! payload.

pub mod gemini;
pub mod groq;
pub mod mock;
pub mod ollama;
pub mod port;

pub use port::{GenerationError, GenerationPort};

use crate::config::LlmSection;
use gemini::{GeminiBackend, GeminiConfig};
use groq::{GroqBackend, GroqConfig};
use mock::MockGeneration;
use ollama::{OllamaBackend, OllamaConfig};
use std::sync::Arc;
use std::time::Duration;

/// Closed factory over the enumerated generation backends
pub struct ProviderFactory {
    llm: LlmSection,
}

impl ProviderFactory {
    pub fn new(llm: LlmSection) -> Self {
        Self { llm }
    }

    /// Provider key used when no per-task override is present
    pub fn default_provider(&self) -> &str {
        &self.llm.provider
    }

    /// Create a backend, honoring a per-task provider override.
    ///
    /// The configured model only applies to the configured provider; an
    /// override falls back to that backend's default model.
    pub fn create(
        &self,
        provider_override: Option<&str>,
    ) -> Result<Arc<dyn GenerationPort>, GenerationError> {
        let provider = provider_override.unwrap_or(&self.llm.provider);
        let timeout = Duration::from_secs(self.llm.timeout_secs);
        let model = (provider == self.llm.provider).then(|| self.llm.model.clone());

        match provider {
            "mock" => Ok(Arc::new(MockGeneration::new(timeout))),
            "groq" => {
                let defaults = GroqConfig::default();
                let backend = GroqBackend::new(GroqConfig {
                    api_key: self.resolve_api_key()?,
                    model: model.unwrap_or(defaults.model),
                    base_url: self.llm.base_url.clone().unwrap_or(defaults.base_url),
                    timeout,
                })?;
                Ok(Arc::new(backend))
            }
            "ollama" => {
                let defaults = OllamaConfig::default();
                let backend = OllamaBackend::new(OllamaConfig {
                    model: model.unwrap_or(defaults.model),
                    base_url: self.llm.base_url.clone().unwrap_or(defaults.base_url),
                    timeout,
                })?;
                Ok(Arc::new(backend))
            }
            "gemini" => {
                let defaults = GeminiConfig::default();
                let backend = GeminiBackend::new(GeminiConfig {
                    api_key: self.resolve_api_key()?,
                    model: model.unwrap_or(defaults.model),
                    base_url: self.llm.base_url.clone().unwrap_or(defaults.base_url),
                    timeout,
                })?;
                Ok(Arc::new(backend))
            }
            other => Err(GenerationError::NotConfigured(format!(
                "Unknown generation provider: {other}. Valid options: mock, groq, ollama, gemini"
            ))),
        }
    }

    fn resolve_api_key(&self) -> Result<String, GenerationError> {
        let env_name = self.llm.api_key_env.as_ref().ok_or_else(|| {
            GenerationError::NotConfigured(format!(
                "llm.api_key_env is required for provider '{}'",
                self.llm.provider
            ))
        })?;
        std::env::var(env_name)
            .map_err(|_| GenerationError::NotConfigured(format!("{env_name} is not set")))
    }
}
