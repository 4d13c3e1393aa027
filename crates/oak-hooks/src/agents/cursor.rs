use oak_types::SessionSource;
use serde_json::Value;

use super::AgentDecoder;

/// Cursor hooks speak camelCase and sometimes double-encode the tool input
/// as a JSON string.
pub(crate) struct CursorDecoder;

impl AgentDecoder for CursorDecoder {
    fn prompt(&self, body: &Value) -> Option<String> {
        body.get("prompt")
            .or_else(|| body.get("text"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn source(&self, body: &Value) -> SessionSource {
        body.get("source")
            .or_else(|| body.get("startReason"))
            .and_then(Value::as_str)
            .and_then(SessionSource::parse)
            .unwrap_or(SessionSource::Startup)
    }

    fn tool_name(&self, body: &Value) -> Option<String> {
        body.get("toolName")
            .or_else(|| body.get("tool_name"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn tool_input(&self, body: &Value) -> Value {
        match body.get("toolInput").or_else(|| body.get("tool_input")) {
            Some(Value::String(s)) => {
                serde_json::from_str(s).unwrap_or(Value::String(s.clone()))
            }
            Some(other) => other.clone(),
            None => Value::Null,
        }
    }

    fn tool_output(&self, body: &Value) -> (Option<String>, Option<String>) {
        (
            body.get("toolOutput")
                .or_else(|| body.get("tool_output"))
                .and_then(Value::as_str)
                .map(str::to_string),
            body.get("toolOutputB64")
                .or_else(|| body.get("tool_output_b64"))
                .and_then(Value::as_str)
                .map(str::to_string),
        )
    }

    fn error_message(&self, body: &Value) -> Option<String> {
        body.get("errorMessage")
            .or_else(|| body.get("error_message"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn subagent_id(&self, body: &Value) -> Option<String> {
        body.get("subagentId")
            .or_else(|| body.get("subagent_id"))
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_double_encoded_tool_input_unwrapped() {
        let body = serde_json::json!({
            "toolInput": "{\"path\": \"src/lib.rs\"}"
        });
        let input = CursorDecoder.tool_input(&body);
        assert_eq!(input["path"], "src/lib.rs");
    }

    #[test]
    fn test_prompt_text_fallback() {
        let body = serde_json::json!({"text": "fix the tests"});
        assert_eq!(CursorDecoder.prompt(&body).as_deref(), Some("fix the tests"));
    }
}
