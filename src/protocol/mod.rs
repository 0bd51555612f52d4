//! Wire protocol for the task queue
//!
//! `messages` defines the task/result envelopes exchanged with the core
//! system; `schemas` defines the closed, normalized result records that
//! leave the sanitizer.

pub mod messages;
pub mod schemas;

pub use messages::{AiResult, AiTask, TaskKind, TaskStatus};
pub use schemas::{
    ApprovalComplexity, ApprovalSuggestion, ChatPayload, ChatResult, DocType,
    DocumentAnalyzePayload, DocumentAnalyzeResult, DocumentReviewPayload, DocumentReviewResult,
    DocumentWeakness, Language, RiskItem, RiskSeverity, SemanticSummary, SystemRole,
    WorkflowDecision, WorkflowDecisionFlags,
};
