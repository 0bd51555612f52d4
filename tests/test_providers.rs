//! Generation backend wire-level tests against a mocked HTTP server.

use docflow_ai::llm::groq::{GroqBackend, GroqConfig};
use docflow_ai::llm::ollama::{OllamaBackend, OllamaConfig};
use docflow_ai::llm::{GenerationError, GenerationPort};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn groq_backend(base_url: &str) -> GroqBackend {
    GroqBackend::new(GroqConfig {
        api_key: "test-key".to_string(),
        base_url: base_url.to_string(),
        timeout: Duration::from_secs(5),
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_groq_returns_completion_content() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "{\"doc_type\": \"contract\"}"}}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = groq_backend(&mock_server.uri());
    let answer = backend.generate("analyze this", true).await.unwrap();
    assert_eq!(answer, "{\"doc_type\": \"contract\"}");
}

#[tokio::test]
async fn test_groq_structured_hint_requests_json_object() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "response_format": {"type": "json_object"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "{}"}}]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    groq_backend(&mock_server.uri())
        .generate("analyze", true)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_groq_auth_failure_is_terminal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;

    let err = groq_backend(&mock_server.uri())
        .generate("prompt", false)
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::AuthenticationFailed(_)));
}

#[tokio::test]
async fn test_groq_rate_limit_maps_to_dedicated_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock_server)
        .await;

    let err = groq_backend(&mock_server.uri())
        .generate("prompt", false)
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::RateLimitExceeded(_)));
}

#[tokio::test]
async fn test_groq_empty_choices_is_invalid_response() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&mock_server)
        .await;

    let err = groq_backend(&mock_server.uri())
        .generate("prompt", false)
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_ollama_generate_round_trip() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .and(body_partial_json(json!({"stream": false, "format": "json"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": "{\"pong\": true}",
            "done": true
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let backend = OllamaBackend::new(OllamaConfig {
        base_url: mock_server.uri(),
        timeout: Duration::from_secs(5),
        ..Default::default()
    })
    .unwrap();

    let answer = backend.generate("ping", true).await.unwrap();
    assert_eq!(answer, "{\"pong\": true}");
}

#[tokio::test]
async fn test_call_timeout_bounds_slow_backend() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/generate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"response": "late"}))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let backend = OllamaBackend::new(OllamaConfig {
        base_url: mock_server.uri(),
        timeout: Duration::from_millis(200),
        ..Default::default()
    })
    .unwrap();

    let err = backend.generate("prompt", false).await.unwrap_err();
    // Either the port deadline or the HTTP client timeout fires first;
    // both surface as a failed generation, never a hang.
    assert!(matches!(
        err,
        GenerationError::Timeout(_) | GenerationError::NetworkError(_)
    ));
}
