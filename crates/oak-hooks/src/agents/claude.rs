use serde_json::Value;

use super::AgentDecoder;

/// Claude Code hooks send canonical snake_case fields, with two quirks:
/// tool output may arrive as `tool_response` (object or string), and
/// failures put the message under `error`.
pub(crate) struct ClaudeDecoder;

impl AgentDecoder for ClaudeDecoder {
    fn tool_output(&self, body: &Value) -> (Option<String>, Option<String>) {
        let inline = body
            .get("tool_output")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| match body.get("tool_response") {
                Some(Value::String(s)) => Some(s.clone()),
                Some(other @ Value::Object(_)) => Some(other.to_string()),
                _ => None,
            });
        let b64 = body
            .get("tool_output_b64")
            .and_then(Value::as_str)
            .map(str::to_string);
        (inline, b64)
    }

    fn error_message(&self, body: &Value) -> Option<String> {
        body.get("error_message")
            .or_else(|| body.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_response_object_is_stringified() {
        let body = serde_json::json!({
            "tool_response": {"stdout": "ok", "exit_code": 0}
        });
        let (inline, _) = ClaudeDecoder.tool_output(&body);
        assert!(inline.unwrap().contains("stdout"));
    }

    #[test]
    fn test_error_field_fallback() {
        let body = serde_json::json!({"error": "command not found"});
        assert_eq!(
            ClaudeDecoder.error_message(&body).as_deref(),
            Some("command not found")
        );
    }
}
