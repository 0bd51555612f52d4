//! End-to-end pipeline tests over mocked generation and publishing.
//!
//! These drive raw task bytes through envelope parsing, dispatch, handler
//! execution, sanitization and result publishing, asserting on the emitted
//! result stream the way a producer would observe it.

use docflow_ai::fetch::TextFetcher;
use docflow_ai::handlers::Dispatcher;
use docflow_ai::protocol::{AiResult, TaskStatus};
use docflow_ai::queue::TaskPipeline;
use docflow_ai::testing::mocks::{MockPortFactory, MockPublisher};
use docflow_ai::PipelineError;
use serde_json::json;
use std::sync::{Arc, Mutex};

type Records = Arc<Mutex<Vec<(AiResult, Option<String>)>>>;

fn pipeline_answering(answer: &str) -> (TaskPipeline, Records) {
    let publisher = MockPublisher::new();
    let records = publisher.records();
    let dispatcher = Dispatcher::new(
        Arc::new(MockPortFactory::answering(answer)),
        TextFetcher::new().unwrap(),
        None,
    );
    (TaskPipeline::new(dispatcher, Arc::new(publisher)), records)
}

fn task_bytes(value: serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(&value).unwrap()
}

const MESSY_ANALYZE_ANSWER: &str = r#"Sure! Here is the analysis you asked for:
```json
{
    "doc_type": "Договор",
    "language": "russian",
    "semantic_summary": {"purpose": "supply agreement", "audience": "procurement", "expected_actions": ["sign"]},
    "requirements": ["payment within 30 days"],
    "recommendations": [],
    "risks": [{"type": "financial", "description": "no penalty clause", "severity": "HIGH"}],
    "ambiguities": [],
    "workflow_decision": {
        "suggested_reviewers": ["Legal", "Chief Vibes Officer", "Legal", "CEO"],
        "approval_complexity": "multi-step",
        "decision_flags": {
            "can_auto_approve": false,
            "requires_human_review": true,
            "missing_mandatory_info": false
        },
        "analysis_confidence": "1.7"
    }
}
```
Hope that helps!"#;

#[tokio::test]
async fn test_analyze_task_with_messy_model_output() {
    let (pipeline, records) = pipeline_answering(MESSY_ANALYZE_ANSWER);

    let body = task_bytes(json!({
        "correlation_id": "corr-analyze",
        "task_id": "task-analyze",
        "type": "DOCUMENT_ANALYZE",
        "payload": {"document_id": 1, "version_id": 1, "text": "supply agreement body"}
    }));

    pipeline.process(&body).await.unwrap();

    let records = records.lock().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].0.status, TaskStatus::Processing);

    let terminal = &records[1].0;
    assert_eq!(terminal.status, TaskStatus::Success);
    assert_eq!(terminal.correlation_id, "corr-analyze");

    // Unlisted doc type falls back, language synonym canonicalizes
    assert_eq!(terminal.result["doc_type"], "other");
    assert_eq!(terminal.result["language"], "ru");
    // Severity label is case-insensitive
    assert_eq!(terminal.result["risks"][0]["severity"], "high");
    // Reviewers: hallucinated role becomes unknown, duplicates drop, order kept
    assert_eq!(
        terminal.result["workflow_decision"]["suggested_reviewers"],
        json!(["Legal", "unknown", "CEO"])
    );
    // Out-of-range confidence clamps to the upper bound
    assert_eq!(
        terminal.result["workflow_decision"]["analysis_confidence"],
        1.0
    );
}

#[tokio::test]
async fn test_unknown_kind_yields_error_result_and_propagates() {
    let (pipeline, records) = pipeline_answering("unused");

    let body = task_bytes(json!({
        "correlation_id": "corr-x",
        "task_id": "task-x",
        "type": "DOCUMENT_TRANSLATE",
        "payload": {}
    }));

    let err = pipeline.process(&body).await.unwrap_err();
    assert!(matches!(err, PipelineError::UnknownKind { .. }));

    let records = records.lock().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].0.status, TaskStatus::Error);
    let message = records[1].0.error.as_ref().unwrap();
    assert!(message.contains("DOCUMENT_TRANSLATE"));
    assert!(message.len() <= 500);
}

#[tokio::test]
async fn test_chat_task_resolves_to_chat_response() {
    let (pipeline, records) = pipeline_answering("Of course, clause 4 covers termination.");

    let body = task_bytes(json!({
        "correlation_id": "corr-chat",
        "task_id": "task-chat",
        "type": "CHAT",
        "payload": {
            "content": "What does clause 4 mean?",
            "channel_id": 12,
            "sender_id": 3,
            "sender_name": "Alice"
        }
    }));

    pipeline.process(&body).await.unwrap();

    let records = records.lock().unwrap();
    let terminal = &records[1].0;
    assert_eq!(terminal.status, TaskStatus::ChatResponse);
    assert_eq!(
        terminal.result["response"],
        "Of course, clause 4 covers termination."
    );
    assert_eq!(terminal.result["channel_id"], 12);
    assert_eq!(terminal.result["used_model"], "mock");
}

#[tokio::test]
async fn test_invalid_payload_still_gets_error_result() {
    let (pipeline, records) = pipeline_answering("unused");

    // Well-formed envelope, payload missing required analyze fields
    let body = task_bytes(json!({
        "correlation_id": "corr-bad",
        "task_id": "task-bad",
        "type": "DOCUMENT_ANALYZE",
        "payload": {"not_a_document": true}
    }));

    let err = pipeline.process(&body).await.unwrap_err();
    assert!(matches!(err, PipelineError::Validation { .. }));

    let records = records.lock().unwrap();
    assert_eq!(records[0].0.status, TaskStatus::Processing);
    assert_eq!(records[1].0.status, TaskStatus::Error);
}

#[tokio::test]
async fn test_garbage_bytes_fail_before_any_result() {
    let (pipeline, records) = pipeline_answering("unused");

    let err = pipeline.process(b"\x00\x01 not json").await.unwrap_err();
    assert!(matches!(err, PipelineError::Parse { .. }));
    assert!(records.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_results_follow_reply_to_override() {
    let (pipeline, records) = pipeline_answering("unused");

    let body = task_bytes(json!({
        "task_id": "task-reply",
        "type": "PING",
        "reply_to": "tenant-a.replies"
    }));

    pipeline.process(&body).await.unwrap();

    let records = records.lock().unwrap();
    assert_eq!(records.len(), 2);
    for (_, reply_to) in records.iter() {
        assert_eq!(reply_to.as_deref(), Some("tenant-a.replies"));
    }
}

#[tokio::test]
async fn test_broken_publisher_fails_the_delivery() {
    let dispatcher = Dispatcher::new(
        Arc::new(MockPortFactory::answering("unused")),
        TextFetcher::new().unwrap(),
        None,
    );
    let pipeline = TaskPipeline::new(dispatcher, Arc::new(MockPublisher::failing("broker down")));

    let body = task_bytes(json!({"task_id": "t", "type": "PING"}));
    let err = pipeline.process(&body).await.unwrap_err();
    assert!(matches!(err, PipelineError::Publish { .. }));
}
