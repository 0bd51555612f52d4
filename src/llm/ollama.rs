//! Ollama backend
//!
//! Local model server; no API key, non-streaming generate endpoint.

use super::port::{GenerationError, GenerationPort};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Ollama backend configuration
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            model: "llama2".to_string(),
            base_url: "http://localhost:11434".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Ollama generation backend
pub struct OllamaBackend {
    config: OllamaConfig,
    client: Client,
}

impl OllamaBackend {
    pub fn new(config: OllamaConfig) -> Result<Self, GenerationError> {
        if config.base_url.is_empty() {
            return Err(GenerationError::NotConfigured(
                "Ollama base URL is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GenerationError::NetworkError(e.to_string()))?;

        Ok(Self { config, client })
    }
}

#[async_trait]
impl GenerationPort for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    fn call_timeout(&self) -> Duration {
        self.config.timeout
    }

    async fn generate_raw(
        &self,
        prompt: &str,
        structured_hint: bool,
    ) -> Result<String, GenerationError> {
        let request = OllamaGenerateRequest {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            format: structured_hint.then(|| "json".to_string()),
        };
        debug!(model = %request.model, prompt_len = prompt.len(), "Sending Ollama generate request");

        let response = self
            .client
            .post(format!("{}/api/generate", self.config.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Ollama request failed");
            return Err(GenerationError::RequestFailed(format!(
                "HTTP {status}: {body}"
            )));
        }

        let generated: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        Ok(generated.response)
    }
}

#[derive(Debug, Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_points_at_localhost() {
        let config = OllamaConfig::default();
        assert_eq!(config.base_url, "http://localhost:11434");
        assert!(OllamaBackend::new(config).is_ok());
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let config = OllamaConfig {
            base_url: String::new(),
            ..Default::default()
        };
        assert!(matches!(
            OllamaBackend::new(config),
            Err(GenerationError::NotConfigured(_))
        ));
    }
}
