//! Structural recovery of JSON from untrusted generator output.
//!
//! Generators are told to emit bare JSON and routinely do not: they wrap the
//! payload in code fences, prepend prose, use single quotes, or append
//! commentary. This module recovers a syntactically valid JSON value from
//! such text, or fails closed. It is pure and does no I/O.
//!
//! Recovery steps, each attempted only if the previous one failed:
//! 1. strip an enclosing code fence
//! 2. direct parse
//! 3. single-quote substitution (narrow heuristic, see below)
//! 4. incremental decode from every `{` position
//! 5. brace-depth matching from the first `{`
//!
//! Field-level normalization (enum fallbacks, confidence clamping) lives in
//! the schema types themselves, see [`crate::protocol::schemas`].

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Sanitization failures.
///
/// Diagnostics carry the response length, never the response content, so
/// error payloads and logs stay bounded.
#[derive(Debug, Clone, Error)]
pub enum SanitizeError {
    #[error("Empty response from generator")]
    EmptyResponse,
    #[error("No valid JSON object found in generator response (response length {response_len})")]
    NoJsonFound { response_len: usize },
    #[error("Recovered JSON does not match the result schema: {message}")]
    Schema { message: String },
}

/// Recover a JSON value from raw generator text.
pub fn extract_json(raw: &str) -> Result<Value, SanitizeError> {
    if raw.trim().is_empty() {
        return Err(SanitizeError::EmptyResponse);
    }

    let cleaned = strip_code_fences(raw);

    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        return Ok(value);
    }

    // Quote-substitution heuristic for low-quality models that emit
    // single-quoted pseudo-JSON. Deliberately narrow: only fires when the
    // text contains no double quote at all, because a wholesale replace
    // corrupts apostrophes inside legitimate string content. Last resort,
    // not a general repair strategy.
    if cleaned.contains('\'') && !cleaned.contains('"') {
        let requoted = cleaned.replace('\'', "\"");
        if let Ok(value) = serde_json::from_str::<Value>(&requoted) {
            return Ok(value);
        }
    }

    // Incremental decode from every opening brace. Recovers a valid object
    // embedded in explanatory prose the generator was told not to produce.
    for (idx, _) in cleaned.char_indices().filter(|&(_, c)| c == '{') {
        let mut stream = serde_json::Deserializer::from_str(&cleaned[idx..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            return Ok(value);
        }
    }

    // Brace-depth matching from the first opening brace. Depth counting is
    // naive about braces inside strings, same as the decode scan above is
    // not, so this only catches inputs the scan could not.
    if let Some(chunk) = braced_chunk(cleaned) {
        if let Ok(value) = serde_json::from_str::<Value>(chunk) {
            return Ok(value);
        }
    }

    Err(SanitizeError::NoJsonFound {
        response_len: cleaned.len(),
    })
}

/// Recover a JSON value and validate it against a typed result schema
pub fn sanitize_response<T: DeserializeOwned>(raw: &str) -> Result<T, SanitizeError> {
    let value = extract_json(raw)?;
    serde_json::from_value(value).map_err(|e| SanitizeError::Schema {
        message: e.to_string(),
    })
}

/// Strip an optional enclosing markdown code fence, language-tagged or bare
fn strip_code_fences(raw: &str) -> &str {
    let mut cleaned = raw.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned.trim()
}

/// Substring from the first `{` to its depth-matched `}`, if any
fn braced_chunk(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    for (idx, c) in text[start..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + idx + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direct_parse() {
        let value = extract_json(r#"{"a": 1}"#).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_tagged_code_fence_stripped() {
        let value = extract_json("```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_bare_code_fence_stripped() {
        let value = extract_json("```\n{\"a\": 1}\n```").unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_fenced_equals_bare() {
        // Round-trip property: a fenced payload sanitizes to the same value
        // as the bare payload alone
        let bare = extract_json(r#"{"doc_type": "contract", "nested": {"x": [1, 2]}}"#).unwrap();
        let fenced =
            extract_json("```json\n{\"doc_type\": \"contract\", \"nested\": {\"x\": [1, 2]}}\n```")
                .unwrap();
        assert_eq!(bare, fenced);
    }

    #[test]
    fn test_embedded_in_prose_recovers_via_incremental_decode() {
        let raw = "Sure! Here is the JSON: {\"a\": 1} Hope that helps.";
        let value = extract_json(raw).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_prose_equals_bare() {
        let bare = extract_json(r#"{"a": 1}"#).unwrap();
        let wrapped = extract_json("Of course.\n\n{\"a\": 1}\n\nLet me know!").unwrap();
        assert_eq!(bare, wrapped);
    }

    #[test]
    fn test_leading_false_brace_is_skipped() {
        // The first '{' opens no valid object; the scan must keep going
        let raw = "{oops, not json} but then {\"ok\": true} trailing";
        let value = extract_json(raw).unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[test]
    fn test_single_quote_heuristic() {
        let value = extract_json("{'doc_type': 'contract', 'language': 'en'}").unwrap();
        assert_eq!(value, json!({"doc_type": "contract", "language": "en"}));
    }

    #[test]
    fn test_single_quote_heuristic_not_applied_when_double_quotes_present() {
        // Mixed quoting means substitution would corrupt the payload;
        // the object is still recoverable by the incremental scan
        let raw = "note: 'informal' {\"a\": 1}";
        let value = extract_json(raw).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn test_nested_object_recovered_whole() {
        let raw = "Result: {\"outer\": {\"inner\": {\"deep\": 3}}} done";
        let value = extract_json(raw).unwrap();
        assert_eq!(value, json!({"outer": {"inner": {"deep": 3}}}));
    }

    #[test]
    fn test_empty_input_fails_closed() {
        assert!(matches!(extract_json(""), Err(SanitizeError::EmptyResponse)));
        assert!(matches!(
            extract_json("   \n\t "),
            Err(SanitizeError::EmptyResponse)
        ));
    }

    #[test]
    fn test_no_json_reports_length_not_content() {
        let raw = "I could not analyze this document, sorry.";
        let err = extract_json(raw).unwrap_err();
        match err {
            SanitizeError::NoJsonFound { response_len } => {
                assert_eq!(response_len, raw.len());
                assert!(!err.to_string().contains("document"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unclosed_brace_fails_closed() {
        let raw = "here we go {\"a\": 1";
        assert!(matches!(
            extract_json(raw),
            Err(SanitizeError::NoJsonFound { .. })
        ));
    }

    #[test]
    fn test_braced_chunk_matching() {
        assert_eq!(braced_chunk("ab {x{y}z} cd"), Some("{x{y}z}"));
        assert_eq!(braced_chunk("no braces"), None);
        assert_eq!(braced_chunk("open {only"), None);
    }

    #[test]
    fn test_sanitize_response_typed() {
        #[derive(serde::Deserialize)]
        struct Probe {
            a: i64,
        }
        let probe: Probe = sanitize_response("```json\n{\"a\": 7}\n```").unwrap();
        assert_eq!(probe.a, 7);
    }

    #[test]
    fn test_sanitize_response_schema_mismatch() {
        #[derive(Debug, serde::Deserialize)]
        struct Probe {
            #[allow(dead_code)]
            required_field: String,
        }
        let err = sanitize_response::<Probe>("{\"other\": 1}").unwrap_err();
        assert!(matches!(err, SanitizeError::Schema { .. }));
    }

    #[test]
    fn test_multibyte_prose_around_object() {
        let raw = "Конечно! Вот JSON: {\"a\": 1} Надеюсь, это поможет.";
        let value = extract_json(raw).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }
}
