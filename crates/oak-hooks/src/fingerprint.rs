use oak_types::{HookEvent, short_hash};

/// Build the dedup-cache fingerprint for an event.
///
/// Session-start includes the agent label: dual-hook agents fire the same
/// start twice under different labels, and both must pass so the latest
/// label wins. Every other event excludes the label so the duplicate
/// delivery is dropped.
///
/// `active_batch_id` only matters for `Stop` (a second stop for the same
/// open batch is a duplicate; a stop after a new prompt is not).
pub fn fingerprint(
    session_id: &str,
    agent_label: &str,
    event: &HookEvent,
    active_batch_id: Option<i64>,
) -> String {
    match event {
        HookEvent::SessionStart { source } => {
            format!("session-start:{}:{}:{}", session_id, agent_label, source.as_str())
        }
        HookEvent::PromptSubmit {
            prompt,
            generation_id,
        } => format!(
            "prompt-submit:{}:{}:{}",
            session_id,
            generation_id,
            short_hash(prompt)
        ),
        HookEvent::PostToolUse { tool } => format!("post-tool-use:{}", tool.tool_use_id),
        HookEvent::PostToolUseFailure { tool, .. } => {
            format!("post-tool-use:{}", tool.tool_use_id)
        }
        HookEvent::Stop => format!(
            "stop:{}:{}",
            session_id,
            active_batch_id.map(|id| id.to_string()).unwrap_or_default()
        ),
        HookEvent::SessionEnd => format!("session-end:{}", session_id),
        HookEvent::SubagentStart { subagent_id } => format!("subagent-start:{}", subagent_id),
        HookEvent::SubagentStop { subagent_id } => format!("subagent-stop:{}", subagent_id),
        HookEvent::PreCompact => format!("pre-compact:{}", session_id),
        HookEvent::Notify { thread_id, .. } => format!(
            "notify:{}:{}",
            session_id,
            thread_id.as_deref().unwrap_or("")
        ),
    }
}
