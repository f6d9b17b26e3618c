//! Structured reply parsing.
//!
//! A reply is accepted only when it is a JSON object whose output field is a
//! string. One surrounding ```` ``` ```` or ```` ```json ```` fence is
//! tolerated since models add one often enough. Anything else fails closed.

use serde_json::Value;

use super::OutputShape;
use crate::error::FlowError;

/// Parse raw backend text into an output shape.
pub fn parse_reply<O: OutputShape>(raw: &str) -> Result<O, FlowError> {
    let body = strip_json_fence(raw.trim());

    let value: Value = serde_json::from_str(body)
        .map_err(|e| FlowError::Protocol(format!("reply is not JSON: {e}")))?;

    let Some(object) = value.as_object() else {
        return Err(FlowError::Protocol("reply is not a JSON object".into()));
    };

    match object.get(O::FIELD) {
        Some(Value::String(_)) => {}
        Some(_) => {
            return Err(FlowError::Protocol(format!(
                "field `{}` is not a string",
                O::FIELD
            )));
        }
        None => {
            return Err(FlowError::Protocol(format!(
                "reply is missing field `{}`",
                O::FIELD
            )));
        }
    }

    serde_json::from_value(value).map_err(|e| FlowError::Protocol(e.to_string()))
}

fn strip_json_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let Some(inner) = rest.strip_suffix("```") else {
        return text;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::{AnnotateOutput, SuggestOutput};

    #[test]
    fn test_plain_object() {
        let out: SuggestOutput = parse_reply(r#"{"suggestion": "return a + b"}"#).unwrap();
        assert_eq!(out.suggestion, "return a + b");
    }

    #[test]
    fn test_fenced_object() {
        let raw = "```json\n{\"annotatedCode\": \"# greets\\nprint('hi')\"}\n```";
        let out: AnnotateOutput = parse_reply(raw).unwrap();
        assert_eq!(out.annotated_code, "# greets\nprint('hi')");
    }

    #[test]
    fn test_extra_fields_ignored() {
        let out: SuggestOutput = parse_reply(r#"{"suggestion": "x", "note": 3}"#).unwrap();
        assert_eq!(out.suggestion, "x");
    }

    #[test]
    fn test_malformed_replies_fail_closed() {
        let cases = [
            "Sure! Here is your code.",
            r#"["suggestion"]"#,
            r#"{"annotatedCode": "wrong field"}"#,
            r#"{"suggestion": null}"#,
            r#"{"suggestion": 42}"#,
            "```json\n{\"suggestion\": \"x\"}",
        ];
        for raw in cases {
            let result = parse_reply::<SuggestOutput>(raw);
            assert!(
                matches!(result, Err(FlowError::Protocol(_))),
                "expected protocol error for {raw:?}"
            );
        }
    }
}
