//! Recover a JSON object from free-form model output.
//!
//! Greedy output is usually a bare object, but models sometimes wrap it in
//! markdown fences or chatter around it. Extraction tries progressively
//! looser strategies and returns a slice of the input.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

fn json_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```json\s*(.+?)\s*```").expect("valid fence pattern"))
}

fn any_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```\s*(.+?)\s*```").expect("valid fence pattern"))
}

/// Locate the JSON object in `text`.
///
/// Order: a ```` ```json ```` fence, any fence (leading `json` stripped), the
/// first balanced `{...}`, the whole trimmed text if it is brace-delimited,
/// and finally the span from the first `{` to the last `}`.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(m) = json_fence().captures(text).and_then(|c| c.get(1)) {
        return Some(m.as_str().trim());
    }
    if let Some(m) = any_fence().captures(text).and_then(|c| c.get(1)) {
        let inner = m.as_str().trim();
        return Some(inner.strip_prefix("json").unwrap_or(inner).trim());
    }

    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_object_end(text, start) {
            return Some(&text[start..=end]);
        }
        search_from = start + 1;
    }

    let trimmed = text.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        return Some(trimmed);
    }

    let first = text.find('{')?;
    let last = text.rfind('}')?;
    (last > first).then(|| &text[first..=last])
}

/// Extract and parse a JSON object. Arrays and scalars yield `None`.
pub fn parse_object(text: &str) -> Option<Map<String, Value>> {
    let candidate = extract_json(text)?;
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Byte index of the `}` closing the object opened at `start`.
fn balanced_object_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0u32;
    let mut in_string = false;
    let mut escaped = false;
    for (i, b) in text.bytes().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(i);
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

    #[test]
    fn test_bare_object() {
        assert_eq!(extract_json(r#"{"a":1}"#), Some(r#"{"a":1}"#));
    }

    #[test]
    fn test_json_fence() {
        let text = "Here you go:\n```json\n{\"a\": 1}\n```\nthanks";
        assert_eq!(extract_json(text), Some("{\"a\": 1}"));
    }

    #[test]
    fn test_plain_fence_strips_language_word() {
        let text = "```\njson {\"b\": 2}\n```";
        assert_eq!(extract_json(text), Some("{\"b\": 2}"));
    }

    #[test]
    fn test_first_balanced_object_in_chatter() {
        let text = r#"Sure! {"name": "tee {x}", "tags": []} and {"other": 1}"#;
        assert_eq!(extract_json(text), Some(r#"{"name": "tee {x}", "tags": []}"#));
    }

    #[test]
    fn test_unclosed_object_salvages_to_last_brace() {
        let text = r#"{"a": {"b": 1} , "c": "#;
        assert_eq!(extract_json(text), Some(r#"{"b": 1}"#));
        let text = r#"x { "a": "}" y"#;
        assert_eq!(extract_json(text), Some(r#"{ "a": "}"#));
    }

    #[test]
    fn test_no_object() {
        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("} {"), None);
    }

    #[test]
    fn test_parse_object_returns_map() {
        let map = parse_object("```json\n{\"category\": \"TOP\"}\n```").unwrap();
        assert_eq!(map.get("category").and_then(|v| v.as_str()), Some("TOP"));
    }

    #[test]
    fn test_parse_object_rejects_invalid() {
        assert!(parse_object("{not json}").is_none());
        assert!(parse_object("[1, 2]").is_none());
    }
}
