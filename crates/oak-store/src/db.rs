use std::path::Path;

use chrono::{DateTime, Utc};
use oak_types::{BatchClassification, ObservationStatus, SessionSource, SessionStatus};
use rusqlite::Connection;

use crate::records::{
    ActivityRecord, BatchRecord, NewActivity, NewObservation, ObservationFilter,
    ObservationRecord, SessionRecord, SessionStats, StoreStats,
};
use crate::{Result, queries, schema};

/// Handle to the relational store. One writer at a time per handle; callers
/// share it behind a mutex and keep critical sections short.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            "#,
        )?;

        let mut db = Self { conn };
        schema::migrate(&mut db.conn)?;
        queries::meta::ensure_machine_id(&db.conn)?;
        Ok(db)
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }

    // ----- sessions -----

    pub fn get_session(&self, id: &str) -> Result<Option<SessionRecord>> {
        queries::session::get(&self.conn, id)
    }

    pub fn insert_session(&self, record: &SessionRecord) -> Result<()> {
        queries::session::insert(&self.conn, record)
    }

    pub fn update_agent_label(&self, id: &str, label: &str) -> Result<()> {
        queries::session::update_agent_label(&self.conn, id, label)
    }

    pub fn reactivate_session(
        &self,
        id: &str,
        source: SessionSource,
        now: DateTime<Utc>,
    ) -> Result<()> {
        queries::session::reactivate(&self.conn, id, source, now)
    }

    pub fn complete_session(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        queries::session::complete(&self.conn, id, now)
    }

    pub fn touch_session(&self, id: &str, now: DateTime<Utc>) -> Result<()> {
        queries::session::touch(&self.conn, id, now)
    }

    pub fn list_recent_sessions(
        &self,
        limit: usize,
        offset: usize,
        status: Option<SessionStatus>,
    ) -> Result<Vec<SessionRecord>> {
        queries::session::list_recent(&self.conn, limit, offset, status)
    }

    pub fn stale_active_sessions(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
        queries::session::stale_active(&self.conn, cutoff)
    }

    pub fn bulk_session_stats(&self, ids: &[String]) -> Result<Vec<SessionStats>> {
        queries::session::bulk_stats(&self.conn, ids)
    }

    // ----- batches -----

    pub fn open_batch(
        &self,
        session_id: &str,
        prompt_text: &str,
        prompt_source: oak_types::PromptSource,
        generation_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        queries::batch::open(&self.conn, session_id, prompt_text, prompt_source, generation_id, now)
    }

    pub fn get_batch(&self, id: i64) -> Result<Option<BatchRecord>> {
        queries::batch::get(&self.conn, id)
    }

    pub fn active_batch_for_session(&self, session_id: &str) -> Result<Option<BatchRecord>> {
        queries::batch::active_for_session(&self.conn, session_id)
    }

    pub fn latest_batch_for_session(&self, session_id: &str) -> Result<Option<i64>> {
        queries::batch::latest_for_session(&self.conn, session_id)
    }

    pub fn batches_for_session(&self, session_id: &str) -> Result<Vec<BatchRecord>> {
        queries::batch::list_for_session(&self.conn, session_id)
    }

    /// Close every active batch for a session, returning the closed ids so
    /// the caller can queue them for processing.
    pub fn close_active_batches_for_session(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<i64>> {
        queries::batch::close_active_for_session(&self.conn, session_id, now)
    }

    pub fn close_batch(&self, id: i64, now: DateTime<Utc>) -> Result<()> {
        queries::batch::close(&self.conn, id, now)
    }

    pub fn mark_batch_processed(&self, id: i64) -> Result<()> {
        queries::batch::mark_processed(&self.conn, id)
    }

    /// Record a processing failure. The batch stays retry-eligible until the
    /// caller's attempt ceiling; `batches_pending_processing` applies it.
    pub fn mark_batch_failed(&self, id: i64, reason: &str) -> Result<()> {
        queries::batch::mark_failed(&self.conn, id, reason)
    }

    pub fn batches_pending_processing(&self, max_attempts: i64) -> Result<Vec<BatchRecord>> {
        queries::batch::pending_processing(&self.conn, max_attempts)
    }

    pub fn stale_active_batches(&self, cutoff: DateTime<Utc>) -> Result<Vec<BatchRecord>> {
        queries::batch::stale_active(&self.conn, cutoff)
    }

    pub fn set_batch_plan(&self, id: i64, plan_content: &str) -> Result<()> {
        queries::batch::set_plan(&self.conn, id, plan_content)
    }

    pub fn set_batch_classification(
        &self,
        id: i64,
        classification: BatchClassification,
    ) -> Result<()> {
        queries::batch::set_classification(&self.conn, id, classification)
    }

    pub fn set_batch_summary(&self, id: i64, summary: &str) -> Result<()> {
        queries::batch::set_summary(&self.conn, id, summary)
    }

    // ----- activities -----

    pub fn insert_activity(&mut self, activity: &NewActivity) -> Result<i64> {
        let ids = self.insert_activities(std::slice::from_ref(activity))?;
        Ok(ids[0])
    }

    /// Bulk insert: one transaction, one aggregated counter update per
    /// session and per batch.
    pub fn insert_activities(&mut self, activities: &[NewActivity]) -> Result<Vec<i64>> {
        queries::activity::insert_bulk(&mut self.conn, activities)
    }

    pub fn activities_for_batch(&self, batch_id: i64) -> Result<Vec<ActivityRecord>> {
        queries::activity::list_for_batch(&self.conn, batch_id)
    }

    pub fn activities_for_session(&self, session_id: &str) -> Result<Vec<ActivityRecord>> {
        queries::activity::list_for_session(&self.conn, session_id)
    }

    pub fn orphaned_activities(&self) -> Result<Vec<ActivityRecord>> {
        queries::activity::orphaned(&self.conn)
    }

    pub fn attach_activities_to_batch(&self, ids: &[i64], batch_id: i64) -> Result<()> {
        queries::activity::attach_to_batch(&self.conn, ids, batch_id)
    }

    pub fn tool_use_id_exists(&self, tool_use_id: &str) -> Result<bool> {
        queries::activity::tool_use_id_exists(&self.conn, tool_use_id)
    }

    // ----- observations -----

    pub fn insert_observation(
        &self,
        observation: &NewObservation,
        now: DateTime<Utc>,
    ) -> Result<ObservationRecord> {
        queries::observation::insert(&self.conn, observation, now)
    }

    pub fn get_observation(&self, id: &str) -> Result<Option<ObservationRecord>> {
        queries::observation::get(&self.conn, id)
    }

    pub fn list_observations(
        &self,
        filter: &ObservationFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ObservationRecord>> {
        queries::observation::list(&self.conn, filter, limit, offset)
    }

    pub fn mark_observation_embedded(&self, id: &str) -> Result<()> {
        queries::observation::mark_embedded(&self.conn, id)
    }

    pub fn set_observation_unembedded(&self, id: &str) -> Result<()> {
        queries::observation::mark_unembedded(&self.conn, id)
    }

    pub fn observations_pending_embedding(&self) -> Result<Vec<ObservationRecord>> {
        queries::observation::pending_embedding(&self.conn)
    }

    pub fn set_observation_status(&self, id: &str, status: ObservationStatus) -> Result<()> {
        queries::observation::set_status(&self.conn, id, status)
    }

    pub fn archive_observation(&self, id: &str) -> Result<()> {
        queries::observation::archive(&self.conn, id)
    }

    pub fn recent_session_summaries(&self, limit: usize) -> Result<Vec<ObservationRecord>> {
        queries::observation::recent_session_summaries(&self.conn, limit)
    }

    pub fn all_active_observations(&self) -> Result<Vec<ObservationRecord>> {
        queries::observation::all_active(&self.conn)
    }

    pub fn count_embedded_observations(&self) -> Result<i64> {
        queries::observation::count_embedded(&self.conn)
    }

    /// Clear `processed` flags so the processor re-runs over history;
    /// optionally delete the LLM-derived observations first.
    pub fn reset_processing(&mut self, delete_observations: bool) -> Result<()> {
        queries::observation::reset_processing(&mut self.conn, delete_observations)
    }

    // ----- meta -----

    pub fn machine_id(&self) -> Result<String> {
        queries::meta::machine_id(&self.conn)
    }

    pub fn stats(&self) -> Result<StoreStats> {
        queries::meta::stats(&self.conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oak_types::PromptSource;
    use tempfile::TempDir;

    fn test_session(id: &str) -> SessionRecord {
        SessionRecord {
            id: id.to_string(),
            agent_label: "claude".to_string(),
            source: SessionSource::Startup,
            status: SessionStatus::Active,
            created_at: Utc::now(),
            last_activity_at: Utc::now(),
            ended_at: None,
            tool_count: 0,
            files_touched: 0,
            error_count: 0,
        }
    }

    #[test]
    fn test_open_on_disk_creates_parent() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data").join("oak.db");
        let db = Database::open(&path).unwrap();
        assert!(path.exists());
        assert!(db.machine_id().unwrap().len() > 0);
    }

    #[test]
    fn test_machine_id_is_stable() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("oak.db");

        let first = Database::open(&path).unwrap().machine_id().unwrap();
        let second = Database::open(&path).unwrap().machine_id().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let mut db = Database::open_in_memory().unwrap();

        let orphan = NewActivity {
            session_id: "missing".to_string(),
            batch_id: None,
            tool_name: "Read".to_string(),
            tool_use_id: Some("t1".to_string()),
            tool_input: None,
            tool_output: None,
            file_path: None,
            success: true,
            error_message: None,
            created_at: Utc::now(),
        };

        assert!(db.insert_activity(&orphan).is_err());
    }

    #[test]
    fn test_tool_use_id_unique() {
        let mut db = Database::open_in_memory().unwrap();
        db.insert_session(&test_session("s1")).unwrap();

        let activity = NewActivity {
            session_id: "s1".to_string(),
            batch_id: None,
            tool_name: "Edit".to_string(),
            tool_use_id: Some("t1".to_string()),
            tool_input: None,
            tool_output: None,
            file_path: None,
            success: true,
            error_message: None,
            created_at: Utc::now(),
        };

        db.insert_activity(&activity).unwrap();
        assert!(db.insert_activity(&activity).is_err());
        assert!(db.tool_use_id_exists("t1").unwrap());
    }

    #[test]
    fn test_batch_ordering_matches_creation() {
        let db = Database::open_in_memory().unwrap();
        db.insert_session(&test_session("s1")).unwrap();

        let t0 = Utc::now();
        let b1 = db
            .open_batch("s1", "first", PromptSource::User, Some("g1"), t0)
            .unwrap();
        let b2 = db
            .open_batch(
                "s1",
                "second",
                PromptSource::User,
                Some("g2"),
                t0 + chrono::Duration::milliseconds(5),
            )
            .unwrap();

        let batches = db.batches_for_session("s1").unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].id, b1);
        assert_eq!(batches[1].id, b2);
        assert!(batches[0].created_at <= batches[1].created_at);
    }
}
