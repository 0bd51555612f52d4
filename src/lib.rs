//! Docflow AI worker
//!
//! Queue-driven AI worker for a document workflow platform. Tasks arrive on
//! an MQTT queue as JSON envelopes, are dispatched to a handler per task
//! kind, run against a pluggable text-generation backend, and every task
//! produces a stream of status results: a provisional PROCESSING update
//! followed by one terminal SUCCESS, ERROR or CHAT_RESPONSE update.
//!
//! # Overview
//!
//! - [`protocol`]: task/result envelopes and the typed result schemas with
//!   lenient field normalization
//! - [`sanitize`]: JSON extraction from free-form model output
//! - [`llm`]: generation backends behind the [`llm::GenerationPort`] seam
//! - [`handlers`]: one handler per task kind plus the dispatch table
//! - [`queue`]: broker intake, bounded retry with dead-lettering, and
//!   result publishing
//!
//! # Quick Start
//!
//! ```rust
//! use docflow_ai::protocol::{AiTask, TaskKind};
//! use serde_json::json;
//!
//! let task: AiTask = serde_json::from_value(json!({
//!     "correlation_id": "corr-1",
//!     "task_id": "task-1",
//!     "type": "DOCUMENT_ANALYZE",
//!     "payload": {"document_id": 7, "version_id": 1, "text": "..."}
//! }))
//! .unwrap();
//!
//! assert_eq!(task.kind, TaskKind::DocumentAnalyze);
//! ```

pub mod config;
pub mod error;
pub mod fetch;
pub mod handlers;
pub mod llm;
pub mod logging;
pub mod protocol;
pub mod queue;
pub mod sanitize;
pub mod testing;

pub use config::ServiceConfig;
pub use error::{PipelineError, PipelineResult};
