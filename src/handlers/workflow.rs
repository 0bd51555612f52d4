//! Workflow suggestion handler.
//!
//! Loosely typed by design: payload fields are read with defaults and the
//! backend's answer is passed through raw, because the consuming side treats
//! workflow suggestions as advisory free-form content.

use crate::error::{PipelineError, PipelineResult};
use crate::handlers::{generate_with_retry, prompts, PortFactory, TaskHandler};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

/// Handles `WORKFLOW_SUGGEST`
pub struct WorkflowSuggestHandler {
    ports: Arc<dyn PortFactory>,
}

impl WorkflowSuggestHandler {
    pub fn new(ports: Arc<dyn PortFactory>) -> Self {
        Self { ports }
    }
}

#[async_trait]
impl TaskHandler for WorkflowSuggestHandler {
    async fn handle(&self, payload: &Value) -> PipelineResult<Value> {
        let document_type = payload
            .get("document_type")
            .and_then(Value::as_str)
            .unwrap_or("Unknown");
        let goal = payload
            .get("goal")
            .and_then(Value::as_str)
            .unwrap_or("Unknown");
        let roles: Vec<String> = payload
            .get("roles")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let provider = payload.get("provider").and_then(Value::as_str);
        let port = self
            .ports
            .acquire(provider)
            .await
            .map_err(|e| PipelineError::generation(e.to_string()))?;

        info!(document_type, goal, backend = port.name(), "Suggesting workflow");

        let prompt = prompts::build_workflow_prompt(document_type, &roles, goal);
        let answer = generate_with_retry(port.as_ref(), &prompt, true).await?;

        Ok(json!({ "suggestions_raw": answer }))
    }
}
