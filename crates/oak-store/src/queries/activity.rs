use std::collections::{HashMap, HashSet};

use chrono::DateTime;
use oak_types::{format_ts, parse_ts};
use rusqlite::{Connection, Row, params};

use crate::Result;
use crate::records::{ActivityRecord, NewActivity};
use crate::queries::{batch, session};

const SELECT_COLS: &str = "id, session_id, batch_id, tool_name, tool_use_id, tool_input, \
                           tool_output, file_path, success, error_message, created_at";

fn from_row(row: &Row) -> rusqlite::Result<ActivityRecord> {
    let created_at: String = row.get(10)?;
    Ok(ActivityRecord {
        id: row.get(0)?,
        session_id: row.get(1)?,
        batch_id: row.get(2)?,
        tool_name: row.get(3)?,
        tool_use_id: row.get(4)?,
        tool_input: row.get(5)?,
        tool_output: row.get(6)?,
        file_path: row.get(7)?,
        success: row.get(8)?,
        error_message: row.get(9)?,
        created_at: parse_ts(&created_at).unwrap_or(DateTime::UNIX_EPOCH),
    })
}

/// Bulk insert path: one transaction for the rows plus one aggregated
/// counter update per session and per batch touched by the flush.
pub fn insert_bulk(conn: &mut Connection, activities: &[NewActivity]) -> Result<Vec<i64>> {
    if activities.is_empty() {
        return Ok(Vec::new());
    }

    let tx = conn.transaction()?;
    let mut ids = Vec::with_capacity(activities.len());

    {
        let mut stmt = tx.prepare(
            r#"
            INSERT INTO activities
                (session_id, batch_id, tool_name, tool_use_id, tool_input, tool_output,
                 file_path, success, error_message, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )?;

        for activity in activities {
            stmt.execute(params![
                &activity.session_id,
                activity.batch_id,
                &activity.tool_name,
                &activity.tool_use_id,
                &activity.tool_input,
                &activity.tool_output,
                &activity.file_path,
                activity.success,
                &activity.error_message,
                format_ts(activity.created_at),
            ])?;
            ids.push(tx.last_insert_rowid());
        }
    }

    // Aggregate deltas per session and per batch
    let mut session_tools: HashMap<&str, i64> = HashMap::new();
    let mut session_errors: HashMap<&str, i64> = HashMap::new();
    let mut session_files: HashMap<&str, HashSet<&str>> = HashMap::new();
    let mut batch_counts: HashMap<i64, i64> = HashMap::new();

    for activity in activities {
        *session_tools.entry(&activity.session_id).or_default() += 1;
        if !activity.success {
            *session_errors.entry(&activity.session_id).or_default() += 1;
        }
        if let Some(path) = &activity.file_path {
            session_files
                .entry(&activity.session_id)
                .or_default()
                .insert(path.as_str());
        }
        if let Some(batch_id) = activity.batch_id {
            *batch_counts.entry(batch_id).or_default() += 1;
        }
    }

    for (session_id, tool_delta) in &session_tools {
        let files_delta = session_files
            .get(session_id)
            .map(|set| set.len() as i64)
            .unwrap_or(0);
        let error_delta = session_errors.get(session_id).copied().unwrap_or(0);
        session::apply_counters(&tx, session_id, *tool_delta, files_delta, error_delta)?;
    }

    for (batch_id, delta) in &batch_counts {
        batch::bump_activity_count(&tx, *batch_id, *delta)?;
    }

    tx.commit()?;
    Ok(ids)
}

pub fn list_for_batch(conn: &Connection, batch_id: i64) -> Result<Vec<ActivityRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM activities WHERE batch_id = ?1 ORDER BY id ASC",
        SELECT_COLS
    ))?;
    let activities = stmt
        .query_map([batch_id], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(activities)
}

pub fn list_for_session(conn: &Connection, session_id: &str) -> Result<Vec<ActivityRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM activities WHERE session_id = ?1 ORDER BY id ASC",
        SELECT_COLS
    ))?;
    let activities = stmt
        .query_map([session_id], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(activities)
}

pub fn orphaned(conn: &Connection) -> Result<Vec<ActivityRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM activities WHERE batch_id IS NULL ORDER BY id ASC",
        SELECT_COLS
    ))?;
    let activities = stmt
        .query_map([], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(activities)
}

pub fn attach_to_batch(conn: &Connection, ids: &[i64], batch_id: i64) -> Result<()> {
    for id in ids {
        conn.execute(
            "UPDATE activities SET batch_id = ?2 WHERE id = ?1",
            params![id, batch_id],
        )?;
    }
    if !ids.is_empty() {
        batch::bump_activity_count(conn, batch_id, ids.len() as i64)?;
    }
    Ok(())
}

pub fn tool_use_id_exists(conn: &Connection, tool_use_id: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM activities WHERE tool_use_id = ?1",
        [tool_use_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}
