use serde::Deserialize;
use uuid::Uuid;

use oak_types::EventContext;

/// Fields every hook body may carry, before any per-agent interpretation.
/// Cursor sends camelCase variants of the id fields; aliases absorb them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEnvelope {
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default, alias = "conversationId")]
    pub conversation_id: Option<String>,
    #[serde(default, alias = "generationId")]
    pub generation_id: Option<String>,
    #[serde(default, alias = "toolUseId", alias = "tool_call_id")]
    pub tool_use_id: Option<String>,
    #[serde(default)]
    pub hook_origin: Option<String>,
    #[serde(default)]
    pub hook_event_name: Option<String>,
}

impl RawEnvelope {
    /// Session identity: explicit session id, else the conversation id,
    /// else a daemon-minted one (the agent gets it back in the response).
    pub fn effective_session_id(&self) -> String {
        self.session_id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| self.conversation_id.clone().filter(|id| !id.is_empty()))
            .unwrap_or_else(|| format!("anon-{}", Uuid::new_v4()))
    }

    pub fn agent_label(&self) -> String {
        self.agent
            .clone()
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn context(&self) -> EventContext {
        EventContext {
            agent: self.agent_label(),
            session_id: self.effective_session_id(),
            hook_origin: self.hook_origin.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_falls_back_to_conversation_id() {
        let envelope: RawEnvelope = serde_json::from_str(
            r#"{"agent": "cursor", "conversationId": "c-42"}"#,
        )
        .unwrap();
        assert_eq!(envelope.effective_session_id(), "c-42");
    }

    #[test]
    fn test_missing_ids_mint_one() {
        let envelope = RawEnvelope::default();
        let id = envelope.effective_session_id();
        assert!(id.starts_with("anon-"));
    }

    #[test]
    fn test_explicit_session_id_wins() {
        let envelope: RawEnvelope = serde_json::from_str(
            r#"{"session_id": "S1", "conversation_id": "c-42"}"#,
        )
        .unwrap();
        assert_eq!(envelope.effective_session_id(), "S1");
    }
}
