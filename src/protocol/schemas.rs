//! Payload shapes and sanitized result schemas, one per task kind.
//!
//! Result schemas are closed records: every enumerated field deserializes
//! leniently (case-insensitive allow-list match, long-form synonyms, fallback
//! member for anything unmatched) and confidence fields are coerced and
//! clamped into [0.0, 1.0]. A value of these types is always schema-valid;
//! there is no partially-valid state. Structural recovery of the raw
//! generator text happens first, in [`crate::sanitize`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Inbound payloads
// ---------------------------------------------------------------------------

fn default_priority() -> String {
    "normal".to_string()
}

/// Payload of a DOCUMENT_ANALYZE task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentAnalyzePayload {
    pub document_id: i64,
    pub version_id: i64,

    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub service_token: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub checksum: Option<String>,

    #[serde(default = "default_priority")]
    pub priority: String,

    /// Inline document text; takes precedence over file_url
    #[serde(default)]
    pub text: Option<String>,
    /// Per-task generation backend override
    #[serde(default)]
    pub provider: Option<String>,
}

/// Payload of a DOCUMENT_REVIEW task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentReviewPayload {
    #[serde(flatten)]
    pub document: DocumentAnalyzePayload,
    /// Optional topic the review should focus on
    #[serde(default)]
    pub topic: Option<String>,
}

/// Chat scope selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatType {
    #[default]
    General,
    Document,
}

/// Payload of a CHAT task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatPayload {
    pub content: String,
    pub channel_id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    #[serde(default)]
    pub document_id: Option<i64>,
    #[serde(default)]
    pub version_id: Option<i64>,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub service_token: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub chat_type: ChatType,
    /// Prior messages, newest last: `{"role": ..., "sender": ..., "content": ...}`
    #[serde(default)]
    pub history: Vec<Value>,
    #[serde(default)]
    pub context: Option<Value>,
}

/// Result of a CHAT task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatResult {
    pub response: String,
    pub channel_id: i64,
    pub used_model: Option<String>,
}

// ---------------------------------------------------------------------------
// Enumerated fields with fallback members
// ---------------------------------------------------------------------------

/// Document classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DocType {
    Contract,
    Instruction,
    Policy,
    Report,
    Order,
    Letter,
    #[serde(rename = "technical documentation")]
    TechnicalDocumentation,
    Specification,
    Invoice,
    Agreement,
    Minutes,
    Other,
}

impl DocType {
    /// Case-insensitive allow-list match; anything unmatched is `Other`
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "contract" => DocType::Contract,
            "instruction" => DocType::Instruction,
            "policy" => DocType::Policy,
            "report" => DocType::Report,
            "order" => DocType::Order,
            "letter" => DocType::Letter,
            "technical documentation" => DocType::TechnicalDocumentation,
            "specification" => DocType::Specification,
            "invoice" => DocType::Invoice,
            "agreement" => DocType::Agreement,
            "minutes" => DocType::Minutes,
            _ => DocType::Other,
        }
    }
}

impl<'de> Deserialize<'de> for DocType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value
            .as_str()
            .map(DocType::from_label)
            .unwrap_or(DocType::Other))
    }
}

/// Document language code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Ru,
    En,
    Kz,
    Unknown,
}

impl Language {
    /// Accepts short codes and long-form names, including localized ones
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "ru" | "russian" | "русский" => Language::Ru,
            "en" | "english" | "английский" => Language::En,
            "kz" | "kazakh" | "казахский" => Language::Kz,
            _ => Language::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value
            .as_str()
            .map(Language::from_label)
            .unwrap_or(Language::Unknown))
    }
}

/// Organizational role a reviewer can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SystemRole {
    Worker,
    Manager,
    Legal,
    #[serde(rename = "CEO")]
    Ceo,
    Director,
    Accounting,
    #[serde(rename = "HR")]
    Hr,
    #[serde(rename = "Technical Lead")]
    TechnicalLead,
    #[serde(rename = "unknown")]
    Unknown,
}

impl SystemRole {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "worker" => SystemRole::Worker,
            "manager" => SystemRole::Manager,
            "legal" => SystemRole::Legal,
            "ceo" => SystemRole::Ceo,
            "director" => SystemRole::Director,
            "accounting" => SystemRole::Accounting,
            "hr" => SystemRole::Hr,
            "technical lead" => SystemRole::TechnicalLead,
            _ => SystemRole::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for SystemRole {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value
            .as_str()
            .map(SystemRole::from_label)
            .unwrap_or(SystemRole::Unknown))
    }
}

/// Risk severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskSeverity {
    Low,
    Medium,
    High,
    Unknown,
}

impl RiskSeverity {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "low" => RiskSeverity::Low,
            "medium" => RiskSeverity::Medium,
            "high" => RiskSeverity::High,
            _ => RiskSeverity::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for RiskSeverity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value
            .as_str()
            .map(RiskSeverity::from_label)
            .unwrap_or(RiskSeverity::Unknown))
    }
}

/// Approval routing complexity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ApprovalComplexity {
    #[serde(rename = "single-step")]
    SingleStep,
    #[serde(rename = "multi-step")]
    MultiStep,
    #[serde(rename = "unknown")]
    Unknown,
}

impl ApprovalComplexity {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "single-step" => ApprovalComplexity::SingleStep,
            "multi-step" => ApprovalComplexity::MultiStep,
            _ => ApprovalComplexity::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for ApprovalComplexity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value
            .as_str()
            .map(ApprovalComplexity::from_label)
            .unwrap_or(ApprovalComplexity::Unknown))
    }
}

/// Reviewer action suggested by a document review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalSuggestion {
    Approve,
    Reject,
    RequestChanges,
    Unknown,
}

impl ApprovalSuggestion {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "approve" => ApprovalSuggestion::Approve,
            "reject" => ApprovalSuggestion::Reject,
            "request_changes" => ApprovalSuggestion::RequestChanges,
            _ => ApprovalSuggestion::Unknown,
        }
    }
}

impl<'de> Deserialize<'de> for ApprovalSuggestion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value
            .as_str()
            .map(ApprovalSuggestion::from_label)
            .unwrap_or(ApprovalSuggestion::Unknown))
    }
}

// ---------------------------------------------------------------------------
// Field normalizers
// ---------------------------------------------------------------------------

/// Coerce a confidence value to f64 and clamp it into [0.0, 1.0].
/// Numeric-looking strings are parsed; anything else defaults to 0.0.
fn deserialize_confidence<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(normalize_confidence(&value))
}

pub(crate) fn normalize_confidence(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.map(|v| v.clamp(0.0, 1.0)).unwrap_or(0.0)
}

/// Accept a single role or a list of roles; "none"-like scalars normalize to
/// an empty list, each element normalizes independently, duplicates are
/// removed preserving first-seen order.
fn deserialize_reviewers<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<SystemRole>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(normalize_reviewers(&value))
}

pub(crate) fn normalize_reviewers(value: &Value) -> Vec<SystemRole> {
    let labels: Vec<&str> = match value {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() || matches!(s.to_lowercase().as_str(), "unknown" | "n/a" | "none") {
                return Vec::new();
            }
            vec![s]
        }
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect(),
        _ => return Vec::new(),
    };

    let mut out = Vec::new();
    for label in labels {
        let role = SystemRole::from_label(label);
        if !out.contains(&role) {
            out.push(role);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Sanitized result schemas
// ---------------------------------------------------------------------------

/// Conservative semantic summary of a document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SemanticSummary {
    pub purpose: String,
    pub audience: String,
    #[serde(default)]
    pub expected_actions: Vec<String>,
}

/// One identified risk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub severity: RiskSeverity,
}

/// Boolean routing hints for the core system
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowDecisionFlags {
    pub can_auto_approve: bool,
    pub requires_human_review: bool,
    pub missing_mandatory_info: bool,
}

/// Workflow routing suggestion derived from the analysis
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowDecision {
    #[serde(default, deserialize_with = "deserialize_reviewers")]
    pub suggested_reviewers: Vec<SystemRole>,
    pub approval_complexity: ApprovalComplexity,
    pub decision_flags: WorkflowDecisionFlags,
    #[serde(default, deserialize_with = "deserialize_confidence")]
    pub analysis_confidence: f64,
}

/// Sanitized result of a DOCUMENT_ANALYZE task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentAnalyzeResult {
    pub doc_type: DocType,
    pub language: Language,
    pub semantic_summary: SemanticSummary,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub risks: Vec<RiskItem>,
    #[serde(default)]
    pub ambiguities: Vec<String>,
    pub workflow_decision: WorkflowDecision,
}

impl DocumentAnalyzeResult {
    /// Schema-valid record for a document with no extractable text.
    /// Skips generation entirely but keeps downstream consumers working.
    pub fn empty_document(note: &str) -> Self {
        Self {
            doc_type: DocType::Other,
            language: Language::Unknown,
            semantic_summary: SemanticSummary {
                purpose: "unknown".to_string(),
                audience: "unknown".to_string(),
                expected_actions: Vec::new(),
            },
            requirements: Vec::new(),
            recommendations: Vec::new(),
            risks: Vec::new(),
            ambiguities: vec![note.to_string()],
            workflow_decision: WorkflowDecision {
                suggested_reviewers: Vec::new(),
                approval_complexity: ApprovalComplexity::Unknown,
                decision_flags: WorkflowDecisionFlags {
                    can_auto_approve: false,
                    requires_human_review: true,
                    missing_mandatory_info: true,
                },
                analysis_confidence: 0.0,
            },
        }
    }
}

/// One weakness found during review
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentWeakness {
    pub title: String,
    pub description: String,
    pub topic_relevance: String,
    pub severity: RiskSeverity,
}

/// Sanitized result of a DOCUMENT_REVIEW task
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentReviewResult {
    #[serde(default)]
    pub weaknesses: Vec<DocumentWeakness>,
    pub recommendation: String,
    pub approval_suggestion: ApprovalSuggestion,
    #[serde(default, deserialize_with = "deserialize_confidence")]
    pub confidence: f64,
}

impl DocumentReviewResult {
    /// Schema-valid record for a document with no extractable text
    pub fn empty_document(recommendation: &str) -> Self {
        Self {
            weaknesses: Vec::new(),
            recommendation: recommendation.to_string(),
            approval_suggestion: ApprovalSuggestion::Unknown,
            confidence: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn analyze_record(confidence: Value, reviewers: Value) -> Value {
        json!({
            "doc_type": "contract",
            "language": "ru",
            "semantic_summary": {
                "purpose": "Services agreement",
                "audience": "Management",
                "expected_actions": ["Sign"]
            },
            "requirements": ["Payment within 10 days"],
            "recommendations": [],
            "risks": [
                {"type": "MISSING_SIGNATURE", "description": "No signatures", "severity": "high"}
            ],
            "ambiguities": [],
            "workflow_decision": {
                "suggested_reviewers": reviewers,
                "approval_complexity": "multi-step",
                "decision_flags": {
                    "can_auto_approve": false,
                    "requires_human_review": true,
                    "missing_mandatory_info": false
                },
                "analysis_confidence": confidence
            }
        })
    }

    #[test]
    fn test_canonical_record_round_trips_identically() {
        let raw = analyze_record(json!(0.95), json!(["Legal", "CEO"]));
        let first: DocumentAnalyzeResult = serde_json::from_value(raw).unwrap();

        // Sanitizing already-normalized output yields an identical record
        let reserialized = serde_json::to_value(&first).unwrap();
        let second: DocumentAnalyzeResult = serde_json::from_value(reserialized).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.workflow_decision.analysis_confidence, 0.95);
        assert_eq!(
            first.workflow_decision.suggested_reviewers,
            vec![SystemRole::Legal, SystemRole::Ceo]
        );
    }

    #[test]
    fn test_confidence_string_above_range_clamps_to_one() {
        let record: DocumentAnalyzeResult =
            serde_json::from_value(analyze_record(json!("1.5"), json!([]))).unwrap();
        assert_eq!(record.workflow_decision.analysis_confidence, 1.0);
    }

    #[test]
    fn test_confidence_negative_string_clamps_to_zero() {
        let record: DocumentAnalyzeResult =
            serde_json::from_value(analyze_record(json!("-3"), json!([]))).unwrap();
        assert_eq!(record.workflow_decision.analysis_confidence, 0.0);
    }

    #[test]
    fn test_confidence_non_numeric_defaults_to_zero() {
        let record: DocumentAnalyzeResult =
            serde_json::from_value(analyze_record(json!("very sure"), json!([]))).unwrap();
        assert_eq!(record.workflow_decision.analysis_confidence, 0.0);

        let record: DocumentAnalyzeResult =
            serde_json::from_value(analyze_record(json!(null), json!([]))).unwrap();
        assert_eq!(record.workflow_decision.analysis_confidence, 0.0);
    }

    #[test]
    fn test_unrecognized_reviewer_falls_back_preserving_order() {
        let record: DocumentAnalyzeResult = serde_json::from_value(analyze_record(
            json!(0.5),
            json!(["Legal", "Hallucinated Role", "CEO", "Legal"]),
        ))
        .unwrap();

        assert_eq!(
            record.workflow_decision.suggested_reviewers,
            vec![SystemRole::Legal, SystemRole::Unknown, SystemRole::Ceo]
        );
    }

    #[test]
    fn test_reviewer_scalar_and_none_like_values() {
        assert_eq!(
            normalize_reviewers(&json!("Legal")),
            vec![SystemRole::Legal]
        );
        assert!(normalize_reviewers(&json!("none")).is_empty());
        assert!(normalize_reviewers(&json!("N/A")).is_empty());
        assert!(normalize_reviewers(&json!("unknown")).is_empty());
        assert!(normalize_reviewers(&json!(null)).is_empty());
        assert!(normalize_reviewers(&json!(42)).is_empty());
    }

    #[test]
    fn test_reviewer_case_insensitive_canonicalization() {
        assert_eq!(
            normalize_reviewers(&json!(["technical lead", "hr"])),
            vec![SystemRole::TechnicalLead, SystemRole::Hr]
        );
    }

    #[test]
    fn test_doc_type_fallback_to_other() {
        assert_eq!(DocType::from_label(" Contract "), DocType::Contract);
        assert_eq!(
            DocType::from_label("Technical Documentation"),
            DocType::TechnicalDocumentation
        );
        assert_eq!(DocType::from_label("shopping list"), DocType::Other);
    }

    #[test]
    fn test_language_synonyms_map_to_short_codes() {
        assert_eq!(Language::from_label("english"), Language::En);
        assert_eq!(Language::from_label("Русский"), Language::Ru);
        assert_eq!(Language::from_label("KZ"), Language::Kz);
        assert_eq!(Language::from_label("klingon"), Language::Unknown);
    }

    #[test]
    fn test_enum_wire_labels() {
        assert_eq!(
            serde_json::to_value(DocType::TechnicalDocumentation).unwrap(),
            json!("technical documentation")
        );
        assert_eq!(
            serde_json::to_value(SystemRole::TechnicalLead).unwrap(),
            json!("Technical Lead")
        );
        assert_eq!(serde_json::to_value(SystemRole::Ceo).unwrap(), json!("CEO"));
        assert_eq!(
            serde_json::to_value(ApprovalSuggestion::RequestChanges).unwrap(),
            json!("request_changes")
        );
        assert_eq!(
            serde_json::to_value(ApprovalComplexity::SingleStep).unwrap(),
            json!("single-step")
        );
    }

    #[test]
    fn test_review_result_lenient_fields() {
        let record: DocumentReviewResult = serde_json::from_value(json!({
            "weaknesses": [
                {
                    "title": "Vague terms",
                    "description": "Delivery dates unspecified",
                    "topic_relevance": "high",
                    "severity": "CRITICAL"
                }
            ],
            "recommendation": "Request changes before approval",
            "approval_suggestion": "Request_Changes",
            "confidence": "0.4"
        }))
        .unwrap();

        assert_eq!(record.weaknesses[0].severity, RiskSeverity::Unknown);
        assert_eq!(
            record.approval_suggestion,
            ApprovalSuggestion::RequestChanges
        );
        assert_eq!(record.confidence, 0.4);
    }

    #[test]
    fn test_missing_required_field_is_an_error() {
        // recommendation is required; leniency never invents required fields
        let result: Result<DocumentReviewResult, _> = serde_json::from_value(json!({
            "weaknesses": [],
            "approval_suggestion": "approve"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_review_payload_flattens_document_fields() {
        let payload: DocumentReviewPayload = serde_json::from_value(json!({
            "document_id": 10,
            "version_id": 2,
            "text": "body",
            "topic": "payment terms"
        }))
        .unwrap();
        assert_eq!(payload.document.document_id, 10);
        assert_eq!(payload.topic.as_deref(), Some("payment terms"));
    }

    #[test]
    fn test_chat_payload_defaults() {
        let payload: ChatPayload = serde_json::from_value(json!({
            "content": "hi",
            "channel_id": 3,
            "sender_id": 8,
            "sender_name": "Alice"
        }))
        .unwrap();
        assert_eq!(payload.chat_type, ChatType::General);
        assert!(payload.history.is_empty());
        assert!(payload.document_id.is_none());
    }

    #[test]
    fn test_empty_document_record_is_schema_valid() {
        let record = DocumentAnalyzeResult::empty_document("No text extracted");
        let value = serde_json::to_value(&record).unwrap();
        let parsed: DocumentAnalyzeResult = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, record);
        assert!(parsed.workflow_decision.decision_flags.requires_human_review);
    }
}
