//! JSON object extraction from free-form model output
//!
//! Models wrap their JSON in prose or markdown fences. We take the first
//! top-level balanced `{...}` span and parse only that.

use crate::error::CoordinatorError;
use serde_json::Value;

/// Return the first balanced `{...}` span in `text`, or `None`.
///
/// A `{` that never closes is skipped and the scan resumes at the next one.
/// Braces inside JSON string literals are ignored once inside the object.
pub fn first_json_object(text: &str) -> Option<&str> {
    text.match_indices('{').find_map(|(start, _)| balanced_from(text, start))
}

fn balanced_from(text: &str, start: usize) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Extract and parse the first JSON object in `text`.
///
/// `NoJsonFound` when no balanced span exists, `MalformedJson` when the span
/// is not valid JSON.
pub fn parse_first_object(text: &str) -> crate::Result<Value> {
    let span = first_json_object(text).ok_or(CoordinatorError::NoJsonFound)?;

    serde_json::from_str(span).map_err(|e| {
        CoordinatorError::MalformedJson(format!("{} | span={}", e, truncate(span, 200)))
    })
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_err;

    #[test]
    fn test_extracts_object_surrounded_by_prose() {
        let text = "Sure! Here is the plan:\n```json\n{\"goal\": \"x\", \"steps\": []}\n```\nGood luck.";
        assert_eq!(
            first_json_object(text),
            Some("{\"goal\": \"x\", \"steps\": []}")
        );
    }

    #[test]
    fn test_nested_objects_and_braces_in_strings() {
        let text = r#"prefix {"a": {"b": "}{"}, "c": "say \"{hi}\""} trailing {"d": 1}"#;
        let span = first_json_object(text).unwrap();
        assert_eq!(span, r#"{"a": {"b": "}{"}, "c": "say \"{hi}\""}"#);

        let value = parse_first_object(text).unwrap();
        assert_eq!(value["a"]["b"], "}{");
    }

    #[test]
    fn test_no_object() {
        assert_eq!(first_json_object("no json here"), None);
        assert_eq!(first_json_object("unbalanced { \"a\": 1"), None);
        assert!(matches!(
            parse_first_object("plain text"),
            Err(CoordinatorError::NoJsonFound)
        ));
    }

    #[test]
    fn test_first_span_wins_even_if_malformed() {
        let result = parse_first_object("use {placeholder} then {\"a\": 1}");
        let err = assert_err!(result);
        assert!(matches!(err, CoordinatorError::MalformedJson(_)));
    }

    #[test]
    fn test_unclosed_brace_is_skipped() {
        let text = "Use {x then {\"a\":1}";
        assert_eq!(first_json_object(text), Some("{\"a\":1}"));
        assert_eq!(parse_first_object(text).unwrap()["a"], 1);

        let text = "open { and { again {\"ok\": true} done";
        assert_eq!(parse_first_object(text).unwrap()["ok"], true);
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("héllo", 2), "hé...");
        assert_eq!(truncate("hi", 5), "hi");
    }
}
