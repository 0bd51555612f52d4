//! Document analysis and review handlers.
//!
//! Both handlers follow the same shape: obtain document text (inline or
//! fetched), short-circuit the empty-document case with a schema-valid
//! placeholder record, otherwise prompt the backend, sanitize the answer
//! into the typed result, and return it as the result payload. The whole
//! analysis is bounded by a hard wall-clock deadline independent of the
//! backend's per-call timeout.

use crate::error::{PipelineError, PipelineResult};
use crate::fetch::TextFetcher;
use crate::handlers::{generate_with_retry, prompts, PortFactory, TaskHandler};
use crate::protocol::schemas::{
    DocumentAnalyzePayload, DocumentAnalyzeResult, DocumentReviewPayload, DocumentReviewResult,
};
use crate::sanitize::sanitize_response;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Wall-clock ceiling for one document task, prompt to parsed result
pub const ANALYSIS_TIMEOUT: Duration = Duration::from_secs(120);

const EMPTY_DOCUMENT_NOTE: &str = "No text content could be extracted from the document";

/// Resolve document text: inline text wins, otherwise download by URL.
/// `Ok(None)` means the document is genuinely empty.
async fn resolve_text(
    fetcher: &TextFetcher,
    payload: &DocumentAnalyzePayload,
) -> PipelineResult<Option<String>> {
    if let Some(text) = &payload.text {
        if text.trim().is_empty() {
            return Ok(None);
        }
        return Ok(Some(text.clone()));
    }

    let Some(url) = &payload.file_url else {
        return Ok(None);
    };

    let text = fetcher
        .fetch_text(url, payload.service_token.as_deref())
        .await
        .map_err(|e| PipelineError::validation(format!("Document download failed: {e}")))?;

    if text.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(text))
}

fn to_payload<T: serde::Serialize>(record: &T) -> PipelineResult<Value> {
    serde_json::to_value(record)
        .map_err(|e| PipelineError::internal(format!("result serialization failed: {e}")))
}

/// Handles `DOCUMENT_ANALYZE`
pub struct DocumentAnalyzeHandler {
    ports: Arc<dyn PortFactory>,
    fetcher: TextFetcher,
}

impl DocumentAnalyzeHandler {
    pub fn new(ports: Arc<dyn PortFactory>, fetcher: TextFetcher) -> Self {
        Self { ports, fetcher }
    }

    async fn analyze(&self, payload: &DocumentAnalyzePayload) -> PipelineResult<Value> {
        let Some(text) = resolve_text(&self.fetcher, payload).await? else {
            warn!(
                document_id = payload.document_id,
                "Document has no text, emitting placeholder analysis"
            );
            return to_payload(&DocumentAnalyzeResult::empty_document(EMPTY_DOCUMENT_NOTE));
        };

        let port = self
            .ports
            .acquire(payload.provider.as_deref())
            .await
            .map_err(|e| PipelineError::generation(e.to_string()))?;

        let truncated = prompts::truncate_text(&text);
        let prompt = prompts::build_analyze_prompt(&truncated);

        info!(
            document_id = payload.document_id,
            version_id = payload.version_id,
            backend = port.name(),
            text_chars = text.chars().count(),
            "Analyzing document"
        );

        let answer = generate_with_retry(port.as_ref(), &prompt, true).await?;
        let record: DocumentAnalyzeResult = sanitize_response(&answer)
            .map_err(|e| PipelineError::sanitize(e.to_string()))?;
        to_payload(&record)
    }
}

#[async_trait]
impl TaskHandler for DocumentAnalyzeHandler {
    async fn handle(&self, payload: &Value) -> PipelineResult<Value> {
        let payload: DocumentAnalyzePayload = serde_json::from_value(payload.clone())
            .map_err(|e| PipelineError::validation(format!("Invalid analyze payload: {e}")))?;

        tokio::time::timeout(ANALYSIS_TIMEOUT, self.analyze(&payload))
            .await
            .map_err(|_| {
                PipelineError::generation(format!(
                    "Document analysis exceeded {}s deadline",
                    ANALYSIS_TIMEOUT.as_secs()
                ))
            })?
    }
}

/// Handles `DOCUMENT_REVIEW`
pub struct DocumentReviewHandler {
    ports: Arc<dyn PortFactory>,
    fetcher: TextFetcher,
}

impl DocumentReviewHandler {
    pub fn new(ports: Arc<dyn PortFactory>, fetcher: TextFetcher) -> Self {
        Self { ports, fetcher }
    }

    async fn review(&self, payload: &DocumentReviewPayload) -> PipelineResult<Value> {
        let Some(text) = resolve_text(&self.fetcher, &payload.document).await? else {
            warn!(
                document_id = payload.document.document_id,
                "Document has no text, emitting placeholder review"
            );
            return to_payload(&DocumentReviewResult::empty_document(EMPTY_DOCUMENT_NOTE));
        };

        let port = self
            .ports
            .acquire(payload.document.provider.as_deref())
            .await
            .map_err(|e| PipelineError::generation(e.to_string()))?;

        let truncated = prompts::truncate_text(&text);
        let prompt = prompts::build_review_prompt(&truncated, payload.topic.as_deref());

        info!(
            document_id = payload.document.document_id,
            backend = port.name(),
            topic = payload.topic.as_deref().unwrap_or("general"),
            "Reviewing document"
        );

        let answer = generate_with_retry(port.as_ref(), &prompt, true).await?;
        let record: DocumentReviewResult = sanitize_response(&answer)
            .map_err(|e| PipelineError::sanitize(e.to_string()))?;
        to_payload(&record)
    }
}

#[async_trait]
impl TaskHandler for DocumentReviewHandler {
    async fn handle(&self, payload: &Value) -> PipelineResult<Value> {
        let payload: DocumentReviewPayload = serde_json::from_value(payload.clone())
            .map_err(|e| PipelineError::validation(format!("Invalid review payload: {e}")))?;

        tokio::time::timeout(ANALYSIS_TIMEOUT, self.review(&payload))
            .await
            .map_err(|_| {
                PipelineError::generation(format!(
                    "Document review exceeded {}s deadline",
                    ANALYSIS_TIMEOUT.as_secs()
                ))
            })?
    }
}
