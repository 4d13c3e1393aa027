use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use oak_types::truncate_to_budget;

/// Byte budgets for what a single activity may persist
#[derive(Debug, Clone, Copy)]
pub struct HookLimits {
    pub tool_output_budget: usize,
    pub tool_input_budget: usize,
}

impl Default for HookLimits {
    fn default() -> Self {
        Self {
            tool_output_budget: 4096,
            tool_input_budget: 8192,
        }
    }
}

/// Canonicalize tool output: inline and base64 deliveries produce the same
/// string, truncated to the output-summary budget.
pub fn decode_tool_output(
    inline: Option<&str>,
    b64: Option<&str>,
    limits: &HookLimits,
) -> String {
    let raw = match (inline, b64) {
        (Some(text), _) => text.to_string(),
        (None, Some(encoded)) => match BASE64.decode(encoded.trim()) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(_) => String::new(),
        },
        (None, None) => String::new(),
    };
    truncate_to_budget(&raw, limits.tool_output_budget)
}

/// Sanitize tool input for storage: any string field larger than the input
/// budget is replaced with a `<N chars>` placeholder. Non-object inputs are
/// stringified and capped the same way.
pub fn sanitize_tool_input(input: &serde_json::Value, limits: &HookLimits) -> String {
    match input {
        serde_json::Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, value) in map {
                match value {
                    serde_json::Value::String(s) if s.len() > limits.tool_input_budget => {
                        sanitized.insert(
                            key.clone(),
                            serde_json::Value::String(format!("<{} chars>", s.chars().count())),
                        );
                    }
                    other => {
                        sanitized.insert(key.clone(), other.clone());
                    }
                }
            }
            serde_json::Value::Object(sanitized).to_string()
        }
        serde_json::Value::String(s) if s.len() > limits.tool_input_budget => {
            format!("<{} chars>", s.chars().count())
        }
        other => other.to_string(),
    }
}
