//! Chat handler for general and document-scoped conversations.

use crate::error::{PipelineError, PipelineResult};
use crate::fetch::TextFetcher;
use crate::handlers::{generate_with_retry, prompts, PortFactory, TaskHandler};
use crate::protocol::schemas::{ChatPayload, ChatResult, ChatType};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_COMPANY_CONTEXT: &str = "No company-specific information is available.";

/// Handles `CHAT`
pub struct ChatHandler {
    ports: Arc<dyn PortFactory>,
    fetcher: TextFetcher,
    company_context: String,
}

impl ChatHandler {
    pub fn new(
        ports: Arc<dyn PortFactory>,
        fetcher: TextFetcher,
        company_context: Option<String>,
    ) -> Self {
        Self {
            ports,
            fetcher,
            company_context: company_context
                .unwrap_or_else(|| DEFAULT_COMPANY_CONTEXT.to_string()),
        }
    }

    /// Document text for document-scoped chats; failures degrade to `None`
    /// so the conversation still gets an answer.
    async fn document_text(&self, payload: &ChatPayload) -> Option<String> {
        if payload.chat_type != ChatType::Document {
            return None;
        }
        let url = payload.file_url.as_deref()?;

        match self
            .fetcher
            .fetch_text(url, payload.service_token.as_deref())
            .await
        {
            Ok(text) => Some(prompts::truncate_text(&text).into_owned()),
            Err(err) => {
                warn!(url, error = %err, "Chat document fetch failed, answering without it");
                None
            }
        }
    }
}

#[async_trait]
impl TaskHandler for ChatHandler {
    async fn handle(&self, payload: &Value) -> PipelineResult<Value> {
        let payload: ChatPayload = serde_json::from_value(payload.clone())
            .map_err(|e| PipelineError::validation(format!("Invalid chat payload: {e}")))?;

        let provider = payload
            .context
            .as_ref()
            .and_then(|ctx| ctx.get("provider"))
            .and_then(Value::as_str);

        let port = self
            .ports
            .acquire(provider)
            .await
            .map_err(|e| PipelineError::generation(e.to_string()))?;

        let document_text = self.document_text(&payload).await;
        let prompt = prompts::build_chat_prompt(
            &payload,
            document_text.as_deref(),
            &self.company_context,
        );

        info!(
            channel_id = payload.channel_id,
            sender = %payload.sender_name,
            chat_type = ?payload.chat_type,
            backend = port.name(),
            "Answering chat message"
        );

        let answer = generate_with_retry(port.as_ref(), &prompt, false).await?;
        let result = ChatResult {
            response: answer,
            channel_id: payload.channel_id,
            used_model: Some(port.name().to_string()),
        };
        serde_json::to_value(&result)
            .map_err(|e| PipelineError::internal(format!("result serialization failed: {e}")))
    }
}
