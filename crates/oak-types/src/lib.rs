mod event;
mod util;

use serde::{Deserialize, Serialize};

pub use event::{EventContext, HookEvent, PlanWrite, ToolActivity};
pub use util::*;

/// How a session came into being (reported by the agent's start hook)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionSource {
    Startup,
    Resume,
    Clear,
    Compact,
}

impl SessionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionSource::Startup => "startup",
            SessionSource::Resume => "resume",
            SessionSource::Clear => "clear",
            SessionSource::Compact => "compact",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "startup" => Some(SessionSource::Startup),
            "resume" => Some(SessionSource::Resume),
            "clear" => Some(SessionSource::Clear),
            "compact" => Some(SessionSource::Compact),
            _ => None,
        }
    }

    /// Fresh starts get prior-session context injected; resumes already have it
    pub fn is_fresh(&self) -> bool {
        matches!(self, SessionSource::Startup | SessionSource::Clear)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SessionStatus::Active),
            "completed" => Some(SessionStatus::Completed),
            _ => None,
        }
    }
}

/// Lifecycle of a prompt batch: active while the agent works, completed when
/// the next prompt (or a stop/end/timeout) closes it, processed once the
/// summarizer has run, failed on terminal processing error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Active,
    Completed,
    Processed,
    Failed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Active => "active",
            BatchStatus::Completed => "completed",
            BatchStatus::Processed => "processed",
            BatchStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(BatchStatus::Active),
            "completed" => Some(BatchStatus::Completed),
            "processed" => Some(BatchStatus::Processed),
            "failed" => Some(BatchStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptSource {
    User,
    Plan,
    Internal,
}

impl PromptSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptSource::User => "user",
            PromptSource::Plan => "plan",
            PromptSource::Internal => "internal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(PromptSource::User),
            "plan" => Some(PromptSource::Plan),
            "internal" => Some(PromptSource::Internal),
            _ => None,
        }
    }
}

/// Kind of knowledge an observation captures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Gotcha,
    BugFix,
    Decision,
    Discovery,
    TradeOff,
    SessionSummary,
    Plan,
}

impl MemoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryType::Gotcha => "gotcha",
            MemoryType::BugFix => "bug_fix",
            MemoryType::Decision => "decision",
            MemoryType::Discovery => "discovery",
            MemoryType::TradeOff => "trade_off",
            MemoryType::SessionSummary => "session_summary",
            MemoryType::Plan => "plan",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "gotcha" => Some(MemoryType::Gotcha),
            "bug_fix" => Some(MemoryType::BugFix),
            "decision" => Some(MemoryType::Decision),
            "discovery" => Some(MemoryType::Discovery),
            "trade_off" => Some(MemoryType::TradeOff),
            "session_summary" => Some(MemoryType::SessionSummary),
            "plan" => Some(MemoryType::Plan),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationStatus {
    Active,
    Resolved,
    Superseded,
}

impl ObservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationStatus::Active => "active",
            ObservationStatus::Resolved => "resolved",
            ObservationStatus::Superseded => "superseded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ObservationStatus::Active),
            "resolved" => Some(ObservationStatus::Resolved),
            "superseded" => Some(ObservationStatus::Superseded),
            _ => None,
        }
    }
}

/// Best-effort label the summarizer assigns to a finished batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchClassification {
    Feature,
    Exploration,
    BugFix,
    Refactor,
    Unknown,
}

impl BatchClassification {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchClassification::Feature => "feature",
            BatchClassification::Exploration => "exploration",
            BatchClassification::BugFix => "bug_fix",
            BatchClassification::Refactor => "refactor",
            BatchClassification::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "feature" => Some(BatchClassification::Feature),
            "exploration" => Some(BatchClassification::Exploration),
            "bug_fix" => Some(BatchClassification::BugFix),
            "refactor" => Some(BatchClassification::Refactor),
            "unknown" => Some(BatchClassification::Unknown),
            _ => None,
        }
    }
}

/// Rank-relative relevance grade assigned to retrieval results.
/// Not an absolute score: absolute similarities vary by embedder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "high",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::Low => "low",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_round_trip() {
        for status in [
            BatchStatus::Active,
            BatchStatus::Completed,
            BatchStatus::Processed,
            BatchStatus::Failed,
        ] {
            assert_eq!(BatchStatus::parse(status.as_str()), Some(status));
        }
        for mt in [
            MemoryType::Gotcha,
            MemoryType::BugFix,
            MemoryType::Decision,
            MemoryType::Discovery,
            MemoryType::TradeOff,
            MemoryType::SessionSummary,
            MemoryType::Plan,
        ] {
            assert_eq!(MemoryType::parse(mt.as_str()), Some(mt));
        }
    }

    #[test]
    fn test_session_source_freshness() {
        assert!(SessionSource::Startup.is_fresh());
        assert!(SessionSource::Clear.is_fresh());
        assert!(!SessionSource::Resume.is_fresh());
        assert!(!SessionSource::Compact.is_fresh());
    }

    #[test]
    fn test_confidence_ordering() {
        assert!(ConfidenceLevel::High < ConfidenceLevel::Medium);
        assert!(ConfidenceLevel::Medium < ConfidenceLevel::Low);
    }
}
