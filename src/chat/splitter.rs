//! Reply splitter — separates an agent reply into display text and an
//! embedded structured payload.
//!
//! Agents may append a fenced ```json block (optionally prefixed inside
//! the fence with `LOG_DATA =`) carrying scores and progress variables.
//! The block is logged as name/value pairs and stripped from what the
//! user sees. A malformed block never fails the turn: the display text is
//! still returned and the parse error goes to the log.

use tracing::warn;

/// Fence marker that opens the structured segment.
const FENCE_OPEN: &str = "```json";
/// Fence marker that closes it.
const FENCE_CLOSE: &str = "```";
/// Optional assignment prefix inside the fence.
const LOG_PREFIX: &str = "LOG_DATA =";

/// A parsed agent reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitReply {
    /// Human-readable portion, trimmed. Never contains the fence marker.
    pub display_text: String,
    /// Top-level key/value pairs of the structured segment, stringified.
    /// Empty when no segment is present or it failed to parse.
    pub variables: Vec<(String, String)>,
}

/// Split a raw agent reply into display text and extracted variables.
pub fn split(raw: &str) -> SplitReply {
    let Some(fence_at) = raw.find(FENCE_OPEN) else {
        return SplitReply {
            display_text: raw.to_string(),
            variables: Vec::new(),
        };
    };

    let display_text = raw[..fence_at].trim().to_string();

    // Segment runs from after the fence to the closing marker, or to the
    // end of input when the reply was cut off before closing it.
    let rest = &raw[fence_at + FENCE_OPEN.len()..];
    let inner = match rest.find(FENCE_CLOSE) {
        Some(close_at) => &rest[..close_at],
        None => rest,
    };
    let payload = inner.trim().trim_start_matches(LOG_PREFIX).trim();

    let variables = if payload.is_empty() {
        Vec::new()
    } else {
        match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(payload) {
            Ok(object) => object
                .into_iter()
                .map(|(name, value)| (name, stringify(value)))
                .collect(),
            Err(e) => {
                warn!(error = %e, "Structured segment failed to parse; keeping text only");
                Vec::new()
            }
        }
    };

    SplitReply {
        display_text,
        variables,
    }
}

/// Textual form of a JSON value: strings unquoted, everything else in its
/// JSON rendering.
fn stringify(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_fence_returns_input_unchanged() {
        let result = split("Just a plain reply.");
        assert_eq!(result.display_text, "Just a plain reply.");
        assert!(result.variables.is_empty());
    }

    #[test]
    fn well_formed_fence_is_split_and_stringified() {
        let raw = "Hi!\n```json\n{\"score\": 5, \"done\": true, \"phase\": \"intro\"}\n```";
        let result = split(raw);
        assert_eq!(result.display_text, "Hi!");
        assert_eq!(result.variables.len(), 3);
        assert!(result.variables.contains(&("score".into(), "5".into())));
        assert!(result.variables.contains(&("done".into(), "true".into())));
        assert!(result.variables.contains(&("phase".into(), "intro".into())));
    }

    #[test]
    fn log_data_prefix_is_stripped() {
        let raw = "Done.\n```json\nLOG_DATA = {\"score\": 10}\n```";
        let result = split(raw);
        assert_eq!(result.display_text, "Done.");
        assert_eq!(result.variables, vec![("score".to_string(), "10".to_string())]);
    }

    #[test]
    fn malformed_payload_is_fail_soft() {
        let raw = "Visible text\n```json\n{not valid json\n```";
        let result = split(raw);
        assert_eq!(result.display_text, "Visible text");
        assert!(result.variables.is_empty());
    }

    #[test]
    fn unclosed_fence_reads_to_end() {
        let raw = "Text before\n```json\n{\"a\": 1}";
        let result = split(raw);
        assert_eq!(result.display_text, "Text before");
        assert_eq!(result.variables, vec![("a".to_string(), "1".to_string())]);
    }

    #[test]
    fn nested_structures_are_stringified() {
        let raw = "ok ```json {\"steps\": [1, 2], \"meta\": {\"k\": \"v\"}} ```";
        let result = split(raw);
        assert_eq!(result.display_text, "ok");
        assert!(result.variables.contains(&("steps".into(), "[1,2]".into())));
        assert!(result.variables.contains(&("meta".into(), "{\"k\":\"v\"}".into())));
    }

    #[test]
    fn empty_fence_yields_no_variables() {
        let result = split("Text ```json\n``` tail");
        assert_eq!(result.display_text, "Text");
        assert!(result.variables.is_empty());
    }

    #[test]
    fn display_never_contains_fence_marker() {
        let raw = "Hi! ```json\n{\"score\":5}\n```";
        let result = split(raw);
        assert!(!result.display_text.contains("```"));
    }
}
