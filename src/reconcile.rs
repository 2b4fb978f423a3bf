//! Parsing the status-report agent's answer into completed item names.

use serde_json::Value;

use crate::errors::ReconcileError;
use crate::util::strip_code_fence;

/// Parse the agent's status report.
///
/// The answer must be a JSON array of strings, optionally wrapped in a single
/// Markdown code fence. Blank names are dropped and the rest trimmed.
pub fn parse_completions(raw: &str) -> Result<Vec<String>, ReconcileError> {
    let body = strip_code_fence(raw);
    let value: Value = serde_json::from_str(body).map_err(ReconcileError::InvalidJson)?;

    let Value::Array(entries) = value else {
        return Err(ReconcileError::NotAnArray {
            found: json_kind(&value),
        });
    };

    let mut names = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match entry {
            Value::String(name) => {
                let name = name.trim();
                if !name.is_empty() {
                    names.push(name.to_string());
                }
            }
            _ => return Err(ReconcileError::NonStringEntry { index }),
        }
    }
    Ok(names)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_array() {
        let names = parse_completions(r#"["Phase 1: Discovery and Design", "infra_setup"]"#).unwrap();
        assert_eq!(names, vec!["Phase 1: Discovery and Design", "infra_setup"]);
    }

    #[test]
    fn test_empty_array() {
        assert!(parse_completions("[]").unwrap().is_empty());
    }

    #[test]
    fn test_fenced_array() {
        let names = parse_completions("```json\n[\"a\"]\n```").unwrap();
        assert_eq!(names, vec!["a"]);
    }

    #[test]
    fn test_not_json() {
        let err = parse_completions("not json").unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidJson(_)));
    }

    #[test]
    fn test_object_is_rejected() {
        let err = parse_completions(r#"{"completed": ["a"]}"#).unwrap_err();
        assert!(matches!(err, ReconcileError::NotAnArray { found: "an object" }));
    }

    #[test]
    fn test_non_string_entry_is_rejected() {
        let err = parse_completions(r#"["a", 2]"#).unwrap_err();
        assert!(matches!(err, ReconcileError::NonStringEntry { index: 1 }));
    }

    #[test]
    fn test_blank_names_are_dropped() {
        assert_eq!(parse_completions(r#"[" a ", "  "]"#).unwrap(), vec!["a"]);
    }

    #[test]
    fn test_prose_around_array_is_rejected() {
        assert!(parse_completions("Here you go: [\"a\"]").is_err());
    }
}
