// Per-agent decoders, one per supported agent family. The registry picks a
// decoder from the envelope's agent label; unknown agents get the generic
// decoder, which understands the canonical field names the hook shims are
// documented to send.

mod claude;
mod cursor;
mod generic;

use oak_types::{EventContext, HookEvent, PlanWrite, SessionSource, ToolActivity, short_hash};
use serde_json::Value;

use crate::envelope::RawEnvelope;
use crate::sanitize::{HookLimits, decode_tool_output, sanitize_tool_input};
use crate::{Error, Result, is_plan_path};

/// Which hook endpoint received the payload. The URL decides the event
/// type; the body only supplies fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    SessionStart,
    PromptSubmit,
    PostToolUse,
    PostToolUseFailure,
    Stop,
    SessionEnd,
    SubagentStart,
    SubagentStop,
    PreCompact,
    Notify,
}

/// Field-mapping seam between agent families. Defaults implement the
/// canonical names; agent impls override where their hooks differ.
pub(crate) trait AgentDecoder {
    fn prompt(&self, body: &Value) -> Option<String> {
        body.get("prompt")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn source(&self, body: &Value) -> SessionSource {
        body.get("source")
            .and_then(Value::as_str)
            .and_then(SessionSource::parse)
            .unwrap_or(SessionSource::Startup)
    }

    fn tool_name(&self, body: &Value) -> Option<String> {
        body.get("tool_name")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn tool_input(&self, body: &Value) -> Value {
        body.get("tool_input").cloned().unwrap_or(Value::Null)
    }

    /// (inline, base64) delivery of the tool output
    fn tool_output(&self, body: &Value) -> (Option<String>, Option<String>) {
        (
            body.get("tool_output")
                .and_then(Value::as_str)
                .map(str::to_string),
            body.get("tool_output_b64")
                .and_then(Value::as_str)
                .map(str::to_string),
        )
    }

    fn error_message(&self, body: &Value) -> Option<String> {
        body.get("error_message")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    fn subagent_id(&self, body: &Value) -> Option<String> {
        body.get("subagent_id")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

fn decoder_for(agent: &str) -> &'static dyn AgentDecoder {
    match agent {
        "claude" => &claude::ClaudeDecoder,
        "cursor" => &cursor::CursorDecoder,
        _ => &generic::GenericDecoder,
    }
}

/// Decode one hook delivery into its canonical event. Malformed payloads
/// error here; the HTTP layer turns that into an ok-with-empty-context
/// response so the agent is never blocked.
pub fn decode_event(
    kind: HookKind,
    body: &Value,
    limits: &HookLimits,
) -> Result<(EventContext, HookEvent)> {
    let envelope: RawEnvelope = serde_json::from_value(body.clone())?;
    let context = envelope.context();
    let decoder = decoder_for(&context.agent);

    let event = match kind {
        HookKind::SessionStart => HookEvent::SessionStart {
            source: decoder.source(body),
        },
        HookKind::PromptSubmit => {
            let prompt = decoder.prompt(body).unwrap_or_default();
            let generation_id = envelope
                .generation_id
                .clone()
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("gen-{}", short_hash(&prompt)));
            HookEvent::PromptSubmit {
                prompt,
                generation_id,
            }
        }
        HookKind::PostToolUse => HookEvent::PostToolUse {
            tool: decode_tool(decoder, body, &envelope, limits)?,
        },
        HookKind::PostToolUseFailure => HookEvent::PostToolUseFailure {
            error_message: decoder
                .error_message(body)
                .unwrap_or_else(|| "unknown error".to_string()),
            tool: decode_tool(decoder, body, &envelope, limits)?,
        },
        HookKind::Stop => HookEvent::Stop,
        HookKind::SessionEnd => HookEvent::SessionEnd,
        HookKind::SubagentStart => HookEvent::SubagentStart {
            subagent_id: decoder
                .subagent_id(body)
                .ok_or_else(|| Error::Malformed("subagent-start requires a subagent id".to_string()))?,
        },
        HookKind::SubagentStop => HookEvent::SubagentStop {
            subagent_id: decoder
                .subagent_id(body)
                .ok_or_else(|| Error::Malformed("subagent-stop requires a subagent id".to_string()))?,
        },
        HookKind::PreCompact => HookEvent::PreCompact,
        HookKind::Notify => HookEvent::Notify {
            thread_id: string_field(body, &["thread-id", "thread_id"]),
            cwd: string_field(body, &["cwd"]),
            last_assistant_message: string_field(
                body,
                &["last-assistant-message", "last_assistant_message"],
            ),
        },
    };

    Ok((context, event))
}

fn decode_tool(
    decoder: &dyn AgentDecoder,
    body: &Value,
    envelope: &RawEnvelope,
    limits: &HookLimits,
) -> Result<ToolActivity> {
    let tool_name = decoder
        .tool_name(body)
        .ok_or_else(|| Error::Malformed("post-tool-use requires tool_name".to_string()))?;
    let tool_use_id = envelope
        .tool_use_id
        .clone()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::Malformed("post-tool-use requires tool_use_id".to_string()))?;

    let raw_input = decoder.tool_input(body);
    let file_path = extract_file_path(&raw_input);

    // Plan detection reads the raw input: the content field would be
    // placeholder-replaced by sanitization.
    let plan_write = match (&file_path, is_write_tool(&tool_name)) {
        (Some(path), true) if is_plan_path(path) => Some(PlanWrite {
            plan_path: path.clone(),
            content: extract_content(&raw_input).unwrap_or_default(),
        }),
        _ => None,
    };

    let (inline, b64) = decoder.tool_output(body);
    Ok(ToolActivity {
        tool_name,
        tool_use_id,
        tool_input: sanitize_tool_input(&raw_input, limits),
        tool_output: decode_tool_output(inline.as_deref(), b64.as_deref(), limits),
        file_path,
        plan_write,
    })
}

fn is_write_tool(tool_name: &str) -> bool {
    matches!(tool_name, "Write" | "write" | "write_file" | "create_file")
}

fn extract_file_path(input: &Value) -> Option<String> {
    for key in ["file_path", "filePath", "path", "target_file"] {
        if let Some(path) = input.get(key).and_then(Value::as_str) {
            if !path.is_empty() {
                return Some(path.to_string());
            }
        }
    }
    None
}

fn extract_content(input: &Value) -> Option<String> {
    for key in ["content", "contents", "text", "new_text"] {
        if let Some(content) = input.get(key).and_then(Value::as_str) {
            return Some(content.to_string());
        }
    }
    None
}

fn string_field(body: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(value) = body.get(key).and_then(Value::as_str) {
            return Some(value.to_string());
        }
    }
    None
}
