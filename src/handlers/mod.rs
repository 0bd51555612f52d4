//! Task handlers and the dispatch table.
//!
//! Each handler owns one task kind end to end: validate the payload, build
//! the prompt, call the generation backend, sanitize and normalize the
//! answer. The [`Dispatcher`] is the single closed mapping from
//! [`TaskKind`] to handler; unknown kinds are rejected here, not at parse
//! time, so a malformed `type` still yields a well-formed error result.

pub mod chat;
pub mod document;
pub mod ping;
pub mod prompts;
pub mod workflow;

use crate::error::{PipelineError, PipelineResult};
use crate::llm::{GenerationError, GenerationPort, ProviderFactory};
use crate::protocol::TaskKind;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub use chat::ChatHandler;
pub use document::{DocumentAnalyzeHandler, DocumentReviewHandler};
pub use ping::PingHandler;
pub use workflow::WorkflowSuggestHandler;

/// Transient-failure retries inside a single handler invocation
pub const GENERATION_MAX_RETRIES: u32 = 2;
/// Pause between generation retry attempts
pub const GENERATION_RETRY_DELAY: Duration = Duration::from_millis(500);

/// One task kind's processing logic
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Process a task payload into a result payload
    async fn handle(&self, payload: &Value) -> PipelineResult<Value>;
}

/// Source of generation backends, resolvable per task
#[async_trait]
pub trait PortFactory: Send + Sync {
    /// Resolve a backend, honoring an optional per-task override
    async fn acquire(
        &self,
        provider_override: Option<&str>,
    ) -> Result<Arc<dyn GenerationPort>, GenerationError>;
}

#[async_trait]
impl PortFactory for ProviderFactory {
    async fn acquire(
        &self,
        provider_override: Option<&str>,
    ) -> Result<Arc<dyn GenerationPort>, GenerationError> {
        self.create(provider_override)
    }
}

/// Call the backend, retrying transient failures a bounded number of times.
///
/// Every attempt is subject to the port's own call timeout. After the final
/// attempt the last error is surfaced as a generation failure.
pub async fn generate_with_retry(
    port: &dyn GenerationPort,
    prompt: &str,
    structured_hint: bool,
) -> PipelineResult<String> {
    let mut last_error = None;

    for attempt in 0..=GENERATION_MAX_RETRIES {
        match port.generate(prompt, structured_hint).await {
            Ok(answer) => return Ok(answer),
            Err(err) => {
                warn!(
                    backend = port.name(),
                    attempt = attempt + 1,
                    error = %err,
                    "generation attempt failed"
                );
                last_error = Some(err);
                if attempt < GENERATION_MAX_RETRIES {
                    tokio::time::sleep(GENERATION_RETRY_DELAY).await;
                }
            }
        }
    }

    let err = last_error.unwrap_or_else(|| {
        GenerationError::NotConfigured("no generation attempt was made".to_string())
    });
    Err(PipelineError::generation(err.to_string()))
}

/// Closed mapping from task kind to handler
pub struct Dispatcher {
    ping: Arc<dyn TaskHandler>,
    analyze: Arc<dyn TaskHandler>,
    review: Arc<dyn TaskHandler>,
    workflow: Arc<dyn TaskHandler>,
    chat: Arc<dyn TaskHandler>,
}

impl Dispatcher {
    /// Wire the default handler set over a backend factory and a shared
    /// document fetcher
    pub fn new(
        ports: Arc<dyn PortFactory>,
        fetcher: crate::fetch::TextFetcher,
        company_context: Option<String>,
    ) -> Self {
        Self {
            ping: Arc::new(PingHandler),
            analyze: Arc::new(DocumentAnalyzeHandler::new(
                Arc::clone(&ports),
                fetcher.clone(),
            )),
            review: Arc::new(DocumentReviewHandler::new(
                Arc::clone(&ports),
                fetcher.clone(),
            )),
            workflow: Arc::new(WorkflowSuggestHandler::new(Arc::clone(&ports))),
            chat: Arc::new(ChatHandler::new(ports, fetcher, company_context)),
        }
    }

    /// Build a dispatcher from explicit handlers
    pub fn with_handlers(
        ping: Arc<dyn TaskHandler>,
        analyze: Arc<dyn TaskHandler>,
        review: Arc<dyn TaskHandler>,
        workflow: Arc<dyn TaskHandler>,
        chat: Arc<dyn TaskHandler>,
    ) -> Self {
        Self {
            ping,
            analyze,
            review,
            workflow,
            chat,
        }
    }

    /// Route a payload to the handler for `kind`
    pub async fn dispatch(&self, kind: &TaskKind, payload: &Value) -> PipelineResult<Value> {
        let handler = match kind {
            TaskKind::Ping => &self.ping,
            TaskKind::DocumentAnalyze => &self.analyze,
            TaskKind::DocumentReview => &self.review,
            TaskKind::WorkflowSuggest => &self.workflow,
            TaskKind::Chat => &self.chat,
            TaskKind::Unknown(label) => return Err(PipelineError::unknown_kind(label)),
        };
        handler.handle(payload).await
    }
}
