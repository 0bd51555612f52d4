//! Service configuration
//!
//! Configuration is loaded once from a TOML file at startup into an
//! immutable `ServiceConfig` and passed by reference into every component
//! constructor. No component reads ambient state directly; secrets stay in
//! the environment and are referenced by variable name only.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Top-level service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceConfig {
    pub service: ServiceSection,
    pub mqtt: MqttSection,
    #[serde(default)]
    pub queues: QueueSection,
    pub llm: LlmSection,
    #[serde(default)]
    pub chat: ChatSection,
}

/// Service identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceSection {
    /// Worker identifier (must match [a-zA-Z0-9._-]+), used as MQTT client id prefix
    pub id: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
}

/// Broker connection settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttSection {
    /// Broker URL with protocol and port, e.g. mqtt://localhost:1883
    pub broker_url: String,
    /// Environment variable containing username
    pub username_env: Option<String>,
    /// Environment variable containing password
    pub password_env: Option<String>,
}

/// Queue topology and retry policy.
///
/// Topic names, the retry delay and the retry ceiling are deployment
/// configuration, not protocol; defaults match the reference deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueSection {
    /// Task intake topic
    #[serde(default = "default_queue_main")]
    pub main: String,
    /// Holding topic for messages awaiting redelivery
    #[serde(default = "default_queue_retry")]
    pub retry: String,
    /// Terminal sink for messages that exhausted retries
    #[serde(default = "default_queue_dlq")]
    pub dead_letter: String,
    /// Default destination for results when a task carries no reply_to
    #[serde(default = "default_queue_results")]
    pub results: String,
    /// Holding time before a retry message is redelivered to main
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Maximum redeliveries before dead-lettering
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// In-flight concurrency cap across all consumer slots
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
}

fn default_queue_main() -> String {
    "ai_tasks".to_string()
}

fn default_queue_retry() -> String {
    "ai_tasks.retry".to_string()
}

fn default_queue_dlq() -> String {
    "ai_tasks.dlq".to_string()
}

fn default_queue_results() -> String {
    "docflow.core.ai_results".to_string()
}

fn default_retry_delay_ms() -> u64 {
    5000
}

fn default_max_retries() -> u32 {
    5
}

fn default_max_in_flight() -> usize {
    20
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            main: default_queue_main(),
            retry: default_queue_retry(),
            dead_letter: default_queue_dlq(),
            results: default_queue_results(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retries: default_max_retries(),
            max_in_flight: default_max_in_flight(),
        }
    }
}

/// Generation backend settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSection {
    /// Provider key: "mock", "groq", "ollama" or "gemini"
    pub provider: String,
    /// Model identifier
    pub model: String,
    /// Environment variable containing the API key (unused by mock/ollama)
    pub api_key_env: Option<String>,
    /// Override for the provider base URL (required for ollama)
    pub base_url: Option<String>,
    /// Hard per-call timeout in seconds
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_generation_timeout_secs() -> u64 {
    60
}

/// Chat handler settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatSection {
    /// Optional markdown file with company background injected into general chat
    pub context_file: Option<PathBuf>,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid service ID format: {0}")]
    InvalidServiceId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ServiceConfig {
    /// Load configuration from a TOML file and validate it
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ServiceConfig = toml::from_str(&content)?;

        validate_service_id(&config.service.id)?;
        config.validate()?;

        Ok(config)
    }

    /// Validate cross-field consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queues.max_in_flight == 0 {
            return Err(ConfigError::InvalidConfig(
                "queues.max_in_flight must be at least 1".to_string(),
            ));
        }
        if self.queues.main == self.queues.retry || self.queues.main == self.queues.dead_letter {
            return Err(ConfigError::InvalidConfig(
                "main, retry and dead_letter queues must be distinct".to_string(),
            ));
        }
        Ok(())
    }

    /// Get MQTT username from the environment
    pub fn mqtt_username(&self) -> Option<String> {
        get_env_var_optional(self.mqtt.username_env.as_ref())
    }

    /// Get MQTT password from the environment
    pub fn mqtt_password(&self) -> Option<String> {
        get_env_var_optional(self.mqtt.password_env.as_ref())
    }

    /// Get the LLM API key from the environment.
    /// Missing variable is an error only for providers that need a key.
    pub fn llm_api_key(&self) -> Result<String, ConfigError> {
        let env_name = self.llm.api_key_env.as_ref().ok_or_else(|| {
            ConfigError::InvalidConfig(format!(
                "llm.api_key_env is required for provider '{}'",
                self.llm.provider
            ))
        })?;
        std::env::var(env_name).map_err(|_| ConfigError::EnvVarNotFound(env_name.clone()))
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[service]
id = "test-worker"
description = "Test AI worker"

[mqtt]
broker_url = "mqtt://localhost:1883"

[llm]
provider = "mock"
model = "mock-model"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

fn get_env_var_optional(env_var_name: Option<&String>) -> Option<String> {
    env_var_name.and_then(|name| std::env::var(name).ok())
}

/// Validate worker ID format
fn validate_service_id(id: &str) -> Result<(), ConfigError> {
    let valid_chars = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidServiceId(format!(
            "Service ID '{id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}
