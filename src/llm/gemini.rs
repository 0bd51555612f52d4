//! Gemini backend
//!
//! Google generateContent API.

use super::port::{GenerationError, GenerationPort};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Gemini backend configuration
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-pro".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Gemini generation backend
pub struct GeminiBackend {
    config: GeminiConfig,
    client: Client,
}

impl GeminiBackend {
    pub fn new(config: GeminiConfig) -> Result<Self, GenerationError> {
        if config.api_key.is_empty() {
            return Err(GenerationError::NotConfigured(
                "Gemini API key is required".to_string(),
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
impl GenerationPort for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn call_timeout(&self) -> Duration {
        self.config.timeout
    }

    async fn generate_raw(
        &self,
        prompt: &str,
        structured_hint: bool,
    ) -> Result<String, GenerationError> {
        let request = GeminiGenerateRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: structured_hint.then(|| GeminiGenerationConfig {
                response_mime_type: "application/json".to_string(),
            }),
        };
        debug!(model = %self.config.model, prompt_len = prompt.len(), "Sending Gemini generate request");

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        );

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Gemini request failed");
            return Err(match status.as_u16() {
                401 | 403 => GenerationError::AuthenticationFailed(format!("HTTP {status}")),
                429 => GenerationError::RateLimitExceeded(format!("HTTP {status}")),
                _ => GenerationError::RequestFailed(format!("HTTP {status}: {body}")),
            });
        }

        let generated: GeminiGenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        generated
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or_else(|| {
                GenerationError::InvalidResponse("No candidates returned from Gemini".to_string())
            })
    }
}

#[derive(Debug, Serialize)]
struct GeminiGenerateRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiGenerateResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}
