use serde_json::Value;
use tracing::{debug, warn};

use crate::data::FileWritePlan;

/// Interprets raw model output as a file-write plan.
///
/// The output must be a single JSON object whose every value is a string.
/// Anything else (invalid JSON, arrays, nested objects, non-string values,
/// surrounding prose or code fences) yields `None`; there is no partial
/// extraction. Paths are not validated here.
pub fn interpret(raw: &str) -> Option<FileWritePlan> {
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            warn!("Model response is not valid JSON: {}", e);
            return None;
        }
    };

    let Value::Object(map) = value else {
        warn!("Model response is JSON but not an object");
        return None;
    };

    let mut plan = FileWritePlan::new();
    for (path, content) in map {
        match content {
            Value::String(s) => plan.insert(path, s),
            other => {
                warn!(
                    "Model response entry '{}' is not a string (found {}); discarding plan",
                    path,
                    json_kind(&other)
                );
                return None;
            }
        }
    }

    debug!("Interpreted plan with {} entr(ies)", plan.len());
    Some(plan)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_flat_string_object() {
        let plan = interpret(r#"{"app/page.tsx": "updated content", "b.css": ""}"#)
            .expect("flat object should parse");
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.get("app/page.tsx"), Some("updated content"));
        assert_eq!(plan.get("b.css"), Some(""));
    }

    #[test]
    fn empty_object_is_an_empty_plan() {
        let plan = interpret("{}").expect("empty object is a valid plan");
        assert!(plan.is_empty());
    }

    #[test]
    fn tolerates_surrounding_whitespace() {
        assert!(interpret("\n  {\"a\": \"b\"}\n").is_some());
    }

    #[test]
    fn rejects_plain_text() {
        assert!(interpret("not json").is_none());
        assert!(interpret("").is_none());
    }

    #[test]
    fn rejects_non_object_json() {
        assert!(interpret(r#"["a", "b"]"#).is_none());
        assert!(interpret(r#""just a string""#).is_none());
        assert!(interpret("42").is_none());
        assert!(interpret("null").is_none());
    }

    #[test]
    fn rejects_any_non_string_value() {
        assert!(interpret(r#"{"a.txt": "ok", "b.txt": {"nested": "x"}}"#).is_none());
        assert!(interpret(r#"{"a.txt": 1}"#).is_none());
        assert!(interpret(r#"{"a.txt": true}"#).is_none());
        assert!(interpret(r#"{"a.txt": null}"#).is_none());
        assert!(interpret(r#"{"a.txt": ["x"]}"#).is_none());
    }

    #[test]
    fn rejects_fenced_output_without_repair() {
        let fenced = "```json\n{\"a.txt\": \"b\"}\n```";
        assert!(interpret(fenced).is_none());
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(interpret(r#"{"a.txt": "b"} and some prose"#).is_none());
    }
}
