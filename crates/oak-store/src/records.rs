use chrono::{DateTime, Utc};
use oak_types::{
    BatchClassification, BatchStatus, MemoryType, ObservationStatus, PromptSource, SessionSource,
    SessionStatus,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: String,
    pub agent_label: String,
    pub source: SessionSource,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub tool_count: i64,
    pub files_touched: i64,
    pub error_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRecord {
    pub id: i64,
    pub session_id: String,
    pub prompt_text: String,
    pub prompt_source: PromptSource,
    pub generation_id: Option<String>,
    pub status: BatchStatus,
    pub classification: Option<BatchClassification>,
    pub response_summary: Option<String>,
    pub is_plan: bool,
    pub plan_content: Option<String>,
    pub activity_count: i64,
    pub fail_count: i64,
    pub fail_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: i64,
    pub session_id: String,
    pub batch_id: Option<i64>,
    pub tool_name: String,
    pub tool_use_id: Option<String>,
    pub tool_input: Option<String>,
    pub tool_output: Option<String>,
    pub file_path: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert-side view of an activity; ids and timestamps are minted by the
/// store on the bulk path.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub session_id: String,
    pub batch_id: Option<i64>,
    pub tool_name: String,
    pub tool_use_id: Option<String>,
    pub tool_input: Option<String>,
    pub tool_output: Option<String>,
    pub file_path: Option<String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub id: String,
    pub session_id: String,
    pub batch_id: Option<i64>,
    pub memory_type: MemoryType,
    pub observation_text: String,
    pub tags: Vec<String>,
    pub file_path: Option<String>,
    pub confidence: f64,
    pub content_hash: String,
    pub embedded: bool,
    pub archived: bool,
    pub status: ObservationStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewObservation {
    pub session_id: String,
    pub batch_id: Option<i64>,
    pub memory_type: MemoryType,
    pub observation_text: String,
    pub tags: Vec<String>,
    pub file_path: Option<String>,
    pub confidence: f64,
}

/// Filters for observation listing; all optional, combined with AND.
#[derive(Debug, Clone, Default)]
pub struct ObservationFilter {
    pub memory_type: Option<MemoryType>,
    pub file_path: Option<String>,
    pub session_id: Option<String>,
    pub batch_id: Option<i64>,
    pub include_archived: bool,
    pub embedded: Option<bool>,
}

/// Aggregates for one session, computed in a single query across N ids
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,
    pub batch_count: i64,
    pub activity_count: i64,
    pub observation_count: i64,
}

/// Store-wide aggregates surfaced on /api/status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub sessions: i64,
    pub active_sessions: i64,
    pub batches: i64,
    pub batches_pending: i64,
    pub batches_failed: i64,
    pub activities: i64,
    pub observations: i64,
    pub observations_unembedded: i64,
}
