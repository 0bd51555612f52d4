//! Groq backend
//!
//! Chat-completions API, OpenAI-compatible wire format.

use super::port::{GenerationError, GenerationPort};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Groq backend configuration
#[derive(Debug, Clone)]
pub struct GroqConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for GroqConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "mixtral-8x7b-32768".to_string(),
            base_url: "https://api.groq.com/openai/v1".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Groq generation backend
pub struct GroqBackend {
    config: GroqConfig,
    client: Client,
}

impl GroqBackend {
    pub fn new(config: GroqConfig) -> Result<Self, GenerationError> {
        if config.api_key.is_empty() {
            return Err(GenerationError::NotConfigured(
                "Groq API key is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GenerationError::NetworkError(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn build_request(&self, prompt: &str, structured_hint: bool) -> GroqCompletionRequest {
        GroqCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![GroqMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: 0.2,
            response_format: structured_hint.then(|| GroqResponseFormat {
                format_type: "json_object".to_string(),
            }),
        }
    }
}

#[async_trait]
impl GenerationPort for GroqBackend {
    fn name(&self) -> &str {
        "groq"
    }

    fn call_timeout(&self) -> Duration {
        self.config.timeout
    }

    async fn generate_raw(
        &self,
        prompt: &str,
        structured_hint: bool,
    ) -> Result<String, GenerationError> {
        let request = self.build_request(prompt, structured_hint);
        debug!(model = %request.model, prompt_len = prompt.len(), "Sending Groq completion request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| GenerationError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Groq request failed");
            return Err(match status.as_u16() {
                401 | 403 => GenerationError::AuthenticationFailed(format!("HTTP {status}")),
                429 => GenerationError::RateLimitExceeded(format!("HTTP {status}")),
                _ => GenerationError::RequestFailed(format!("HTTP {status}: {body}")),
            });
        }

        let completion: GroqCompletionResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                GenerationError::InvalidResponse("No choices returned from Groq".to_string())
            })
    }
}

#[derive(Debug, Serialize)]
struct GroqCompletionRequest {
    model: String,
    messages: Vec<GroqMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<GroqResponseFormat>,
}

#[derive(Debug, Serialize)]
struct GroqResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct GroqMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct GroqCompletionResponse {
    choices: Vec<GroqChoice>,
}

#[derive(Debug, Deserialize)]
struct GroqChoice {
    message: GroqResponseMessage,
}

#[derive(Debug, Deserialize)]
struct GroqResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_api_key_rejected() {
        let result = GroqBackend::new(GroqConfig::default());
        assert!(matches!(result, Err(GenerationError::NotConfigured(_))));
    }

    #[test]
    fn test_structured_hint_sets_json_response_format() {
        let backend = GroqBackend::new(GroqConfig {
            api_key: "test-key".to_string(),
            ..Default::default()
        })
        .unwrap();

        let request = backend.build_request("classify this", true);
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["response_format"]["type"], "json_object");

        let request = backend.build_request("chat freely", false);
        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("response_format").is_none());
    }
}
