//! Pipeline error taxonomy
//!
//! Every failure class a message can hit on its way through the pipeline:
//! envelope parsing, payload validation, dispatch, generation, sanitization
//! and result publishing. All of them are equally retry-eligible — the
//! inbound adapter routes on failure presence, never on failure kind
//! (kind only controls logging detail and the outbound error text).

use thiserror::Error;

/// Main error type for pipeline operations
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Malformed task envelope: {message}")]
    Parse { message: String },

    #[error("Invalid payload: {message}")]
    Validation { message: String },

    #[error("Unknown task kind: {kind}")]
    UnknownKind { kind: String },

    #[error("Generation failed: {message}")]
    Generation { message: String },

    #[error("Sanitization failed: {message}")]
    Sanitize { message: String },

    #[error("Result publish failed: {message}")]
    Publish { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl PipelineError {
    /// Create an envelope parse error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create a payload validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an unknown-kind dispatch error
    pub fn unknown_kind<S: Into<String>>(kind: S) -> Self {
        Self::UnknownKind { kind: kind.into() }
    }

    /// Create a generation error
    pub fn generation<S: Into<String>>(message: S) -> Self {
        Self::Generation {
            message: message.into(),
        }
    }

    /// Create a sanitization error
    pub fn sanitize<S: Into<String>>(message: S) -> Self {
        Self::Sanitize {
            message: message.into(),
        }
    }

    /// Create a publish error
    pub fn publish<S: Into<String>>(message: S) -> Self {
        Self::Publish {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Human-readable message for the outbound ERROR result,
    /// redacted and bounded so error payloads stay small.
    pub fn to_result_message(&self) -> String {
        sanitize_error_message(&self.to_string())
    }
}

/// Sanitize error messages before they leave the process.
///
/// Outbound errors may embed upstream provider output or config fragments,
/// so secrets are redacted and the total length is capped at 500 chars.
pub fn sanitize_error_message(message: &str) -> String {
    let mut sanitized = message.to_string();

    // Remove common secret patterns
    sanitized = regex::Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+")
        .unwrap()
        .replace_all(&sanitized, "${1}=***")
        .to_string();

    // Remove potential file paths that might contain sensitive info
    sanitized =
        regex::Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
            .unwrap()
            .replace_all(&sanitized, "/***REDACTED***/")
            .to_string();

    // Truncate very long messages - ensure total length is <= 500
    if sanitized.len() > 500 {
        let truncate_suffix = "...[truncated]";
        let max_content_len = 500 - truncate_suffix.len();
        let mut cut = max_content_len;
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized = format!("{}{}", &sanitized[..cut], truncate_suffix);
    }

    sanitized
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_constructor() {
        let error = PipelineError::parse("unexpected end of input");
        assert!(matches!(error, PipelineError::Parse { .. }));
        assert_eq!(
            error.to_string(),
            "Malformed task envelope: unexpected end of input"
        );
    }

    #[test]
    fn test_unknown_kind_constructor() {
        let error = PipelineError::unknown_kind("DOCUMENT_SHRED");
        assert!(matches!(error, PipelineError::UnknownKind { .. }));
        assert_eq!(error.to_string(), "Unknown task kind: DOCUMENT_SHRED");
    }

    #[test]
    fn test_generation_error_constructor() {
        let error = PipelineError::generation("provider timeout");
        assert!(matches!(error, PipelineError::Generation { .. }));
        assert_eq!(error.to_string(), "Generation failed: provider timeout");
    }

    #[test]
    fn test_sanitize_error_constructor() {
        let error = PipelineError::sanitize("no JSON object found (response length 4231)");
        assert!(error.to_string().contains("4231"));
    }

    #[test]
    fn test_result_message_redacts_secrets() {
        let error = PipelineError::generation("auth failed: password=secret123 token=abc456");
        let message = error.to_result_message();

        assert!(!message.contains("secret123"));
        assert!(!message.contains("abc456"));
        assert!(message.contains("password=***"));
        assert!(message.contains("token=***"));
    }

    #[test]
    fn test_result_message_redacts_paths() {
        let error = PipelineError::validation("cannot read /home/user/.ssh/id_rsa");
        let message = error.to_result_message();

        assert!(message.contains("/***REDACTED***/"));
        assert!(!message.contains("id_rsa"));
    }

    #[test]
    fn test_long_message_truncation() {
        let long_message = "x".repeat(600);
        let sanitized = sanitize_error_message(&long_message);

        assert!(sanitized.len() <= 500);
        assert!(sanitized.ends_with("...[truncated]"));
    }

    #[test]
    fn test_sanitize_exactly_500_chars() {
        let message = "x".repeat(500);
        let sanitized = sanitize_error_message(&message);
        assert_eq!(sanitized.len(), 500);
        assert!(!sanitized.contains("truncated"));
    }

    #[test]
    fn test_sanitize_case_insensitive() {
        let message = "PASSWORD=secret123 Token=abc Key=xyz";
        let sanitized = sanitize_error_message(message);

        assert!(!sanitized.contains("secret123"));
        assert!(!sanitized.contains("abc"));
        assert!(!sanitized.contains("xyz"));
    }

    #[test]
    fn test_sanitize_empty_message() {
        assert_eq!(sanitize_error_message(""), "");
    }

    #[test]
    fn test_truncation_respects_utf8_boundaries() {
        let message = "д".repeat(400); // 800 bytes of two-byte chars
        let sanitized = sanitize_error_message(&message);
        assert!(sanitized.len() <= 500);
        assert!(sanitized.ends_with("...[truncated]"));
    }
}
