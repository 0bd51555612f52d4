//! Task and result envelopes
//!
//! `AiTask` is the inbound unit of work; `AiResult` is one status update
//! published for it. A task may produce several results: a provisional
//! PROCESSING result followed by exactly one terminal result. Consumers
//! treat results as a stream keyed by `task_id`, last terminal status wins.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Declared kind of a task.
///
/// The set of handled kinds is closed; anything else deserializes into
/// `Unknown` and is rejected by the dispatcher, not at parse time, so a
/// deploy mismatch flows through the same retry policy as any other failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    Ping,
    DocumentAnalyze,
    DocumentReview,
    WorkflowSuggest,
    Chat,
    #[serde(untagged)]
    Unknown(String),
}

impl TaskKind {
    /// Canonical wire label
    pub fn as_str(&self) -> &str {
        match self {
            TaskKind::Ping => "PING",
            TaskKind::DocumentAnalyze => "DOCUMENT_ANALYZE",
            TaskKind::DocumentReview => "DOCUMENT_REVIEW",
            TaskKind::WorkflowSuggest => "WORKFLOW_SUGGEST",
            TaskKind::Chat => "CHAT",
            TaskKind::Unknown(s) => s,
        }
    }

    /// Terminal status a successful task of this kind resolves to
    pub fn success_status(&self) -> TaskStatus {
        match self {
            TaskKind::Chat => TaskStatus::ChatResponse,
            _ => TaskStatus::Success,
        }
    }
}

/// Status carried by a result message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Processing,
    Success,
    Error,
    ChatResponse,
}

impl TaskStatus {
    /// Whether this status ends the result stream for a task
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::Processing)
    }
}

fn default_schema_version() -> u32 {
    1
}

fn default_uuid() -> String {
    Uuid::new_v4().to_string()
}

fn default_created_at() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// A unit of work submitted by an external producer.
///
/// Immutable once received. Identity is `task_id`; duplicate delivery is
/// possible and must be tolerated by downstream result consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiTask {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default = "default_uuid")]
    pub correlation_id: String,
    #[serde(default = "default_created_at")]
    pub created_at: String,
    #[serde(default = "default_uuid")]
    pub task_id: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    #[serde(default)]
    pub payload: Value,
    /// Destination override for results; falls back to the configured sink
    #[serde(default)]
    pub reply_to: Option<String>,
}

/// One status update produced for a task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub correlation_id: String,
    #[serde(default = "default_created_at")]
    pub created_at: String,
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl AiResult {
    fn base(task: &AiTask, status: TaskStatus) -> Self {
        Self {
            schema_version: task.schema_version,
            correlation_id: task.correlation_id.clone(),
            created_at: default_created_at(),
            task_id: task.task_id.clone(),
            status,
            result: Value::Object(Default::default()),
            error: None,
        }
    }

    /// Provisional in-flight acknowledgement, published before handling starts
    pub fn processing(task: &AiTask) -> Self {
        Self::base(task, TaskStatus::Processing)
    }

    /// Terminal success result; chat tasks resolve to CHAT_RESPONSE
    pub fn success(task: &AiTask, result: Value) -> Self {
        let mut out = Self::base(task, task.kind.success_status());
        out.result = result;
        out
    }

    /// Terminal error result with a bounded, redacted message
    pub fn failure(task: &AiTask, error: &PipelineError) -> Self {
        let mut out = Self::base(task, TaskStatus::Error);
        out.error = Some(error.to_result_message());
        out
    }
}
