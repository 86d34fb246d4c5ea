//! Delta extractor for the JSON chat-completion stream format.
//!
//! One event payload in, at most one outcome out. Payloads that fail
//! to parse or do not match the expected shape are ignored rather than
//! treated as model output; noisy or partial frames are normal during
//! streaming and must never leak into the rendered transcript.

use serde::Deserialize;

/// Literal payload that marks the end of a completion stream.
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Clone, Debug, PartialEq)]
pub enum Delta {
    /// A non-empty content fragment.
    Text(String),
    /// The terminal sentinel.
    Done,
}

#[derive(Deserialize)]
struct DeltaPayload {
    choices: Vec<DeltaChoice>,
}

#[derive(Deserialize)]
struct DeltaChoice {
    #[serde(default)]
    delta: DeltaContent,
}

#[derive(Deserialize, Default)]
struct DeltaContent {
    // Kept as a raw value so a non-string `content` (observed from
    // some backends) skips this choice instead of rejecting the whole
    // payload.
    #[serde(default)]
    content: Option<serde_json::Value>,
}

/// Interpret one event payload.
///
/// Returns `None` for anything that should be silently ignored:
/// malformed JSON, a shape without `choices`, or a delta that carries
/// no text (role-only deltas are common and must not trigger a no-op
/// render).
pub fn extract_delta(data: &str) -> Option<Delta> {
    let trimmed = data.trim();
    if trimmed == DONE_SENTINEL {
        return Some(Delta::Done);
    }

    let payload: DeltaPayload = serde_json::from_str(trimmed).ok()?;
    let mut text = String::new();
    for choice in &payload.choices {
        if let Some(fragment) = choice.delta.content.as_ref().and_then(|v| v.as_str()) {
            text.push_str(fragment);
        }
    }

    if text.is_empty() {
        None
    } else {
        Some(Delta::Text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_sentinel_terminates() {
        assert_eq!(extract_delta("[DONE]"), Some(Delta::Done));
        assert_eq!(extract_delta("  [DONE]  "), Some(Delta::Done));
    }

    #[test]
    fn extracts_content_fragment() {
        let data = r#"{"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(extract_delta(data), Some(Delta::Text("Hel".to_string())));
    }

    #[test]
    fn concatenates_every_choice() {
        let data = r#"{"choices":[{"delta":{"content":"a"}},{"delta":{"content":"b"}}]}"#;
        assert_eq!(extract_delta(data), Some(Delta::Text("ab".to_string())));
    }

    #[test]
    fn role_only_delta_is_ignored() {
        let data = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(extract_delta(data), None);
    }

    #[test]
    fn missing_choices_is_ignored_without_panicking() {
        assert_eq!(extract_delta(r#"{"id":"x"}"#), None);
        assert_eq!(extract_delta(r#"{"choices":{}}"#), None);
    }

    #[test]
    fn malformed_json_is_ignored() {
        assert_eq!(extract_delta("{not json"), None);
        assert_eq!(extract_delta(""), None);
    }

    #[test]
    fn non_string_content_is_skipped_not_rendered() {
        let data = r#"{"choices":[{"delta":{"content":42}},{"delta":{"content":"ok"}}]}"#;
        assert_eq!(extract_delta(data), Some(Delta::Text("ok".to_string())));
    }

    #[test]
    fn empty_string_content_is_ignored() {
        let data = r#"{"choices":[{"delta":{"content":""}}]}"#;
        assert_eq!(extract_delta(data), None);
    }
}
