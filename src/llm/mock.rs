//! Deterministic stub backend
//!
//! Returns canned, schema-valid output without network access. Used as the
//! default provider in development and by the test suite.

use super::port::{GenerationError, GenerationPort};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// Deterministic generation stub
pub struct MockGeneration {
    timeout: Duration,
}

impl MockGeneration {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn canned_analyze() -> String {
        json!({
            "doc_type": "contract",
            "language": "ru",
            "semantic_summary": {
                "purpose": "Software development services agreement (mock)",
                "audience": "Management and technical staff (mock)",
                "expected_actions": ["Sign the contract", "Approve the statement of work"]
            },
            "requirements": [
                "Deliverables accepted by signed act",
                "Payment within 10 days"
            ],
            "recommendations": [
                "Verify all contract appendices are attached"
            ],
            "risks": [
                {
                    "type": "MISSING_SIGNATURE",
                    "description": "No electronic signatures found in the text (mock)",
                    "severity": "high"
                }
            ],
            "ambiguities": [
                "No explicit work start date"
            ],
            "workflow_decision": {
                "suggested_reviewers": ["Legal", "CEO"],
                "approval_complexity": "multi-step",
                "decision_flags": {
                    "can_auto_approve": false,
                    "requires_human_review": true,
                    "missing_mandatory_info": false
                },
                "analysis_confidence": 0.95
            }
        })
        .to_string()
    }

    fn canned_review() -> String {
        json!({
            "weaknesses": [
                {
                    "title": "Vague delivery terms",
                    "description": "Delivery milestones are not dated (mock)",
                    "topic_relevance": "high",
                    "severity": "medium"
                }
            ],
            "recommendation": "Request changes before approval (mock)",
            "approval_suggestion": "request_changes",
            "confidence": 0.8
        })
        .to_string()
    }
}

#[async_trait]
impl GenerationPort for MockGeneration {
    fn name(&self) -> &str {
        "mock"
    }

    fn call_timeout(&self) -> Duration {
        self.timeout
    }

    async fn generate_raw(
        &self,
        prompt: &str,
        _structured_hint: bool,
    ) -> Result<String, GenerationError> {
        if prompt.contains("\"doc_type\"") {
            return Ok(Self::canned_analyze());
        }
        if prompt.contains("\"approval_suggestion\"") {
            return Ok(Self::canned_review());
        }

        let preview: String = prompt.chars().take(200).collect();
        Ok(format!("[MOCK ANSWER] {preview}"))
    }
}
