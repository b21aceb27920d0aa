//! JSON member/element extraction.
//!
//! Extraction specifiers name an object member or array element inside a
//! structured JSON value: `x`, `x.y`, `[3]`, `x[3].y`, and so on. An
//! empty specifier selects the whole document.

use crate::error::{HubError, Result};

/// JSON type tag reported alongside an extraction result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    Null,
    Boolean,
    Number,
    String,
    Object,
    Array,
}

/// One step of an extraction specifier.
#[derive(Debug, PartialEq)]
enum Step<'a> {
    Member(&'a str),
    Index(usize),
}

/// Extract the node selected by `spec` from `json`.
///
/// Returns the node's type tag and its textual rendition: string nodes
/// yield their raw contents, all other nodes their compact JSON form.
pub fn extract(json: &str, spec: &str) -> Result<(JsonType, String)> {
    let root: serde_json::Value = serde_json::from_str(json)
        .map_err(|e| HubError::BadParameter(format!("invalid JSON: {e}")))?;

    let mut node = &root;
    for step in parse_spec(spec)? {
        node = match step {
            Step::Member(name) => node
                .get(name)
                .ok_or_else(|| HubError::NotFound(format!("no member '{name}'")))?,
            Step::Index(i) => node
                .get(i)
                .ok_or_else(|| HubError::NotFound(format!("no element [{i}]")))?,
        };
    }

    Ok(render(node))
}

/// Interpret an extracted textual value as a Boolean.
pub fn to_boolean(text: &str) -> bool {
    text == "true"
}

/// Interpret an extracted textual value as a number.
pub fn to_number(text: &str) -> f64 {
    text.parse().unwrap_or(f64::NAN)
}

fn render(node: &serde_json::Value) -> (JsonType, String) {
    match node {
        serde_json::Value::Null => (JsonType::Null, "null".to_string()),
        serde_json::Value::Bool(v) => (JsonType::Boolean, v.to_string()),
        serde_json::Value::Number(n) => (JsonType::Number, n.to_string()),
        serde_json::Value::String(s) => (JsonType::String, s.clone()),
        serde_json::Value::Object(_) => (JsonType::Object, node.to_string()),
        serde_json::Value::Array(_) => (JsonType::Array, node.to_string()),
    }
}

fn parse_spec(spec: &str) -> Result<Vec<Step<'_>>> {
    let malformed =
        |detail: &str| HubError::BadParameter(format!("bad extraction spec '{spec}': {detail}"));

    let mut steps = Vec::new();
    let mut rest = spec;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix('[') {
            let end = after.find(']').ok_or_else(|| malformed("unterminated index"))?;
            let index: usize = after[..end]
                .parse()
                .map_err(|_| malformed("index is not a number"))?;
            steps.push(Step::Index(index));
            rest = &after[end + 1..];
        } else {
            // Member steps after the first are separated by '.'.
            let tail = if steps.is_empty() {
                rest
            } else {
                rest.strip_prefix('.')
                    .ok_or_else(|| malformed("missing separator"))?
            };
            let end = tail.find(|c| c == '.' || c == '[').unwrap_or(tail.len());
            if end == 0 {
                return Err(malformed("empty member name"));
            }
            let name = &tail[..end];
            if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(malformed("member name has invalid characters"));
            }
            steps.push(Step::Member(name));
            rest = &tail[end..];
        }
    }

    Ok(steps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_member() {
        let (ty, text) = extract(r#"{"x": 5}"#, "x").unwrap();
        assert_eq!(ty, JsonType::Number);
        assert_eq!(text, "5");
    }

    #[test]
    fn test_extract_nested() {
        let json = r#"{"x": {"y": "hello"}, "z": [1, 2, 3]}"#;

        let (ty, text) = extract(json, "x.y").unwrap();
        assert_eq!(ty, JsonType::String);
        assert_eq!(text, "hello");

        let (ty, text) = extract(json, "z[1]").unwrap();
        assert_eq!(ty, JsonType::Number);
        assert_eq!(text, "2");
    }

    #[test]
    fn test_extract_index_then_member() {
        let json = r#"[{"t": true}, {"t": false}]"#;
        let (ty, text) = extract(json, "[1].t").unwrap();
        assert_eq!(ty, JsonType::Boolean);
        assert_eq!(text, "false");
    }

    #[test]
    fn test_extract_whole_document() {
        let (ty, text) = extract(r#"{"a":1}"#, "").unwrap();
        assert_eq!(ty, JsonType::Object);
        assert_eq!(text, r#"{"a":1}"#);
    }

    #[test]
    fn test_extract_null() {
        let (ty, text) = extract(r#"{"v": null}"#, "v").unwrap();
        assert_eq!(ty, JsonType::Null);
        assert_eq!(text, "null");
    }

    #[test]
    fn test_extract_missing() {
        assert!(extract(r#"{"x": 5}"#, "y").is_err());
        assert!(extract(r#"[1]"#, "[4]").is_err());
    }

    #[test]
    fn test_extract_bad_spec() {
        assert!(extract(r#"{"x": 5}"#, ".x").is_err());
        assert!(extract(r#"{"x": 5}"#, "x.").is_err());
        assert!(extract(r#"{"x": 5}"#, "[oops]").is_err());
    }

    #[test]
    fn test_extract_invalid_json() {
        assert!(extract("{not json", "x").is_err());
    }

    #[test]
    fn test_conversions() {
        assert!(to_boolean("true"));
        assert!(!to_boolean("false"));
        assert_eq!(to_number("2.5"), 2.5);
        assert!(to_number("zebra").is_nan());
    }
}
