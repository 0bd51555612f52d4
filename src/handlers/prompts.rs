//! Prompt construction for the generation backends.
//!
//! Pure functions: normalized input in, instruction text out. Oversized
//! document text is truncated to a fixed character ceiling with an explicit
//! marker so the model knows the tail is missing.

use crate::protocol::schemas::{ChatPayload, ChatType};
use serde_json::Value;
use std::borrow::Cow;

/// Character ceiling for document text embedded in a prompt
pub const MAX_TEXT_CHARS: usize = 80_000;
/// Appended when document text is cut at the ceiling
pub const TRUNCATION_MARKER: &str = "\n\n[TRUNCATED]";

/// Truncate document text to the prompt ceiling, marking the cut
pub fn truncate_text(text: &str) -> Cow<'_, str> {
    if text.chars().count() <= MAX_TEXT_CHARS {
        return Cow::Borrowed(text);
    }
    let mut truncated: String = text.chars().take(MAX_TEXT_CHARS).collect();
    truncated.push_str(TRUNCATION_MARKER);
    Cow::Owned(truncated)
}

/// Analysis instruction prompt for a document
pub fn build_analyze_prompt(text: &str) -> String {
    format!(
        "You are a backend document analysis engine inside a document workflow system.\n\
         You are NOT a chatbot and NOT an assistant for end users.\n\n\
         Your ONLY goal is to help the core system:\n\
         - understand the nature of the document,\n\
         - detect risks, missing or unclear information,\n\
         - decide how the document should move through the workflow.\n\n\
         You must be conservative. If something is not explicitly stated in the\n\
         document, mark it as \"unknown\". Never assume domain context,\n\
         regulations, technologies, or dates unless they are clearly present.\n\n\
         STRICT OUTPUT RULES\n\
         1. Output ONLY valid JSON.\n\
         2. No explanations, comments, or markdown.\n\
         3. Do NOT invent facts.\n\
         4. Prefer \"unknown\" over assumptions.\n\n\
         ALLOWED DOCUMENT TYPES\n\
         contract, instruction, policy, report, order, letter,\n\
         technical documentation, specification, invoice, agreement, minutes, other\n\n\
         ALLOWED SYSTEM ROLES (STRICT)\n\
         Worker, Manager, Legal, CEO, Director, Accounting, HR, Technical Lead.\n\
         If a role cannot be determined, use \"unknown\".\n\n\
         ANALYSIS STEPS\n\
         1. Classify the document using the allowed document types; use \"other\" when unsure.\n\
         2. Write a conservative semantic summary: purpose, audience, expected actions.\n\
         3. List ONLY requirements explicitly stated in the document.\n\
         4. List recommendations that are implied but not mandatory.\n\
         5. Identify risks and ambiguities: missing information, unclear\n\
            responsibilities, vague instructions.\n\
         6. Suggest how the core system should route this document.\n\n\
         OUTPUT JSON SCHEMA (STRICT)\n\
         {{\n\
           \"doc_type\": \"...\",\n\
           \"language\": \"ru | en | kz | unknown\",\n\
           \"semantic_summary\": {{\n\
             \"purpose\": \"...\",\n\
             \"audience\": \"...\",\n\
             \"expected_actions\": [\"...\"]\n\
           }},\n\
           \"requirements\": [\"...\"],\n\
           \"recommendations\": [\"...\"],\n\
           \"risks\": [\n\
             {{\"type\": \"...\", \"description\": \"...\", \"severity\": \"low | medium | high | unknown\"}}\n\
           ],\n\
           \"ambiguities\": [\"...\"],\n\
           \"workflow_decision\": {{\n\
             \"suggested_reviewers\": [\"Worker | Manager | Legal | CEO | unknown\"],\n\
             \"approval_complexity\": \"single-step | multi-step | unknown\",\n\
             \"decision_flags\": {{\n\
               \"can_auto_approve\": true | false,\n\
               \"requires_human_review\": true | false,\n\
               \"missing_mandatory_info\": true | false\n\
             }},\n\
             \"analysis_confidence\": 0.0\n\
           }}\n\
         }}\n\n\
         DOCUMENT:\n{text}"
    )
}

/// Review instruction prompt, optionally focused on a topic
pub fn build_review_prompt(text: &str, topic: Option<&str>) -> String {
    let topic_context = match topic {
        Some(topic) => format!("The review should specifically focus on this topic: {topic}"),
        None => "Perform a general document review.".to_string(),
    };

    format!(
        "You are a backend document review specialist inside a document workflow system.\n\n\
         Your goal is to perform a deep analysis of the document to identify\n\
         weaknesses, risks, and provide an approval recommendation.\n\n\
         {topic_context}\n\n\
         STRICT OUTPUT RULES\n\
         1. Output ONLY valid JSON.\n\
         2. No explanations, comments, or markdown.\n\
         3. Be critical. Look for contradictions, missing clauses, or vague language.\n\
         4. Suggest an action for the reviewer (approve, reject, or request_changes).\n\n\
         OUTPUT JSON SCHEMA\n\
         {{\n\
           \"weaknesses\": [\n\
             {{\n\
               \"title\": \"Short title of the issue\",\n\
               \"description\": \"Detailed explanation of why this is a weakness\",\n\
               \"topic_relevance\": \"How this relates to the requested topic\",\n\
               \"severity\": \"low | medium | high | unknown\"\n\
             }}\n\
           ],\n\
           \"recommendation\": \"Overall summary and advice for the human reviewer\",\n\
           \"approval_suggestion\": \"approve | reject | request_changes | unknown\",\n\
           \"confidence\": 0.0\n\
         }}\n\n\
         DOCUMENT:\n{text}"
    )
}

/// Workflow suggestion prompt
pub fn build_workflow_prompt(document_type: &str, roles: &[String], goal: &str) -> String {
    format!(
        "Suggest a simple approval workflow.\n\
         Document type: {document_type}\n\
         Roles: {roles:?}\n\
         Goal: {goal}\n\
         Return JSON with steps [{{order, role, action}}]."
    )
}

/// Chat prompt: scope restrictions, optional document/company context,
/// rendered history, latest message last
pub fn build_chat_prompt(
    payload: &ChatPayload,
    document_text: Option<&str>,
    company_context: &str,
) -> String {
    let history_text = render_history(&payload.history);

    match payload.chat_type {
        ChatType::Document => format!(
            "You are a document assistant focused ONLY on the currently open\n\
             document and its workflow.\n\n\
             RESTRICTIONS:\n\
             1. Strict context: only answer questions about the document content\n\
                below or the workflow associated with it.\n\
             2. No general chat: politely refuse off-topic questions and point\n\
                the user to the general assistant.\n\
             3. Tone: professional, precise, and helpful within your domain.\n\n\
             CURRENT DOCUMENT CONTEXT:\n{document}\n\n\
             {history}The user ({sender}) just said (LATEST MESSAGE): \"{content}\"\n",
            document = document_text.unwrap_or("No document content available."),
            history = history_text,
            sender = payload.sender_name,
            content = payload.content,
        ),
        ChatType::General => format!(
            "You are a friendly and professional assistant integrated into a\n\
             document workflow system.\n\n\
             GUIDELINES:\n\
             1. Company knowledge: use the company information below to answer\n\
                questions about the project, structure, and procedures.\n\
             2. Stay on topic: your scope is document management and\n\
                professional work within the company; politely redirect\n\
                off-topic questions.\n\
             3. Tone: helpful, polite, and professional.\n\
             4. Language: always respond in the same language as the user.\n\n\
             COMPANY CONTEXT:\n{context}\n\n\
             {history}The user ({sender}) just said (LATEST MESSAGE): \"{content}\"\n",
            context = company_context,
            history = history_text,
            sender = payload.sender_name,
            content = payload.content,
        ),
    }
}

fn render_history(history: &[Value]) -> String {
    if history.is_empty() {
        return String::new();
    }

    let mut out = String::from("\nPREVIOUS DIALOGUE:\n");
    for message in history {
        let role = message.get("role").and_then(Value::as_str).unwrap_or("user");
        let sender = if role == "assistant" {
            "AI Assistant"
        } else {
            message
                .get("sender")
                .and_then(Value::as_str)
                .unwrap_or("User")
        };
        let content = message.get("content").and_then(Value::as_str).unwrap_or("");
        out.push_str(&format!("{sender}: {content}\n"));
    }
    out.push_str("---\n");
    out
}
