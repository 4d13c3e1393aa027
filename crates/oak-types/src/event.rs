use serde::{Deserialize, Serialize};

use crate::SessionSource;

/// Identity fields shared by every normalized hook event.
///
/// `session_id` is already resolved here: the wire layer falls back to the
/// conversation id when the agent omits a session id, and mints one when
/// both are absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventContext {
    pub agent: String,
    pub session_id: String,
    #[serde(default)]
    pub hook_origin: Option<String>,
}

/// One tool invocation as captured by a post-tool-use hook, already
/// sanitized: input capped with placeholders, output decoded and truncated
/// to the summary budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolActivity {
    pub tool_name: String,
    pub tool_use_id: String,
    pub tool_input: String,
    pub tool_output: String,
    #[serde(default)]
    pub file_path: Option<String>,
    /// Set when the tool wrote a file under an agent plan directory
    #[serde(default)]
    pub plan_write: Option<PlanWrite>,
}

/// A `Write` into `.claude/plans/` or `.cursor/plans/` reclassifies the
/// surrounding batch as a plan batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanWrite {
    pub plan_path: String,
    pub content: String,
}

/// Normalized agent lifecycle event.
///
/// The wire layer owns the heterogeneous per-agent payloads; everything past
/// it is strictly typed over these variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HookEvent {
    SessionStart {
        source: SessionSource,
    },
    PromptSubmit {
        prompt: String,
        generation_id: String,
    },
    PostToolUse {
        tool: ToolActivity,
    },
    PostToolUseFailure {
        tool: ToolActivity,
        error_message: String,
    },
    Stop,
    SessionEnd,
    SubagentStart {
        subagent_id: String,
    },
    SubagentStop {
        subagent_id: String,
    },
    PreCompact,
    Notify {
        #[serde(default)]
        thread_id: Option<String>,
        #[serde(default)]
        cwd: Option<String>,
        #[serde(default)]
        last_assistant_message: Option<String>,
    },
}

impl HookEvent {
    pub fn name(&self) -> &'static str {
        match self {
            HookEvent::SessionStart { .. } => "session-start",
            HookEvent::PromptSubmit { .. } => "prompt-submit",
            HookEvent::PostToolUse { .. } => "post-tool-use",
            HookEvent::PostToolUseFailure { .. } => "post-tool-use-failure",
            HookEvent::Stop => "stop",
            HookEvent::SessionEnd => "session-end",
            HookEvent::SubagentStart { .. } => "subagent-start",
            HookEvent::SubagentStop { .. } => "subagent-stop",
            HookEvent::PreCompact => "pre-compact",
            HookEvent::Notify { .. } => "notify",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serde_tagging() {
        let event = HookEvent::PromptSubmit {
            prompt: "add login".to_string(),
            generation_id: "g1".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "prompt_submit");

        let back: HookEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.name(), "prompt-submit");
    }
}
