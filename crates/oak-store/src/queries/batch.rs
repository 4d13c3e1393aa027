use chrono::{DateTime, Utc};
use oak_types::{BatchClassification, BatchStatus, PromptSource, format_ts, parse_ts};
use rusqlite::{Connection, Row, params};

use crate::Result;
use crate::records::BatchRecord;

const SELECT_COLS: &str = "id, session_id, prompt_text, prompt_source, generation_id, status, \
                           classification, response_summary, is_plan, plan_content, \
                           activity_count, fail_count, fail_reason, created_at, ended_at";

fn from_row(row: &Row) -> rusqlite::Result<BatchRecord> {
    let prompt_source: String = row.get(3)?;
    let status: String = row.get(5)?;
    let classification: Option<String> = row.get(6)?;
    let created_at: String = row.get(13)?;
    let ended_at: Option<String> = row.get(14)?;

    Ok(BatchRecord {
        id: row.get(0)?,
        session_id: row.get(1)?,
        prompt_text: row.get(2)?,
        prompt_source: PromptSource::parse(&prompt_source).unwrap_or(PromptSource::User),
        generation_id: row.get(4)?,
        status: BatchStatus::parse(&status).unwrap_or(BatchStatus::Active),
        classification: classification.as_deref().and_then(BatchClassification::parse),
        response_summary: row.get(7)?,
        is_plan: row.get(8)?,
        plan_content: row.get(9)?,
        activity_count: row.get(10)?,
        fail_count: row.get(11)?,
        fail_reason: row.get(12)?,
        created_at: parse_ts(&created_at).unwrap_or(DateTime::UNIX_EPOCH),
        ended_at: ended_at.as_deref().and_then(parse_ts),
    })
}

pub fn open(
    conn: &Connection,
    session_id: &str,
    prompt_text: &str,
    prompt_source: PromptSource,
    generation_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO batches (session_id, prompt_text, prompt_source, generation_id, status, created_at)
        VALUES (?1, ?2, ?3, ?4, 'active', ?5)
        "#,
        params![
            session_id,
            prompt_text,
            prompt_source.as_str(),
            generation_id,
            format_ts(now)
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<BatchRecord>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM batches WHERE id = ?1", SELECT_COLS))?;
    let mut rows = stmt.query([id])?;
    match rows.next()? {
        Some(row) => Ok(Some(from_row(row)?)),
        None => Ok(None),
    }
}

pub fn active_for_session(conn: &Connection, session_id: &str) -> Result<Option<BatchRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM batches WHERE session_id = ?1 AND status = 'active' ORDER BY id DESC LIMIT 1",
        SELECT_COLS
    ))?;
    let mut rows = stmt.query([session_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(from_row(row)?)),
        None => Ok(None),
    }
}

pub fn latest_for_session(conn: &Connection, session_id: &str) -> Result<Option<i64>> {
    let mut stmt =
        conn.prepare("SELECT id FROM batches WHERE session_id = ?1 ORDER BY id DESC LIMIT 1")?;
    let mut rows = stmt.query([session_id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row.get(0)?)),
        None => Ok(None),
    }
}

pub fn list_for_session(conn: &Connection, session_id: &str) -> Result<Vec<BatchRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM batches WHERE session_id = ?1 ORDER BY created_at ASC, id ASC",
        SELECT_COLS
    ))?;
    let batches = stmt
        .query_map([session_id], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(batches)
}

pub fn close(conn: &Connection, id: i64, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE batches SET status = 'completed', ended_at = ?2 WHERE id = ?1 AND status = 'active'",
        params![id, format_ts(now)],
    )?;
    Ok(())
}

pub fn close_active_for_session(
    conn: &Connection,
    session_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<i64>> {
    let mut stmt =
        conn.prepare("SELECT id FROM batches WHERE session_id = ?1 AND status = 'active'")?;
    let ids = stmt
        .query_map([session_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<i64>>>()?;

    for id in &ids {
        close(conn, *id, now)?;
    }
    Ok(ids)
}

pub fn mark_processed(conn: &Connection, id: i64) -> Result<()> {
    conn.execute(
        "UPDATE batches SET status = 'processed' WHERE id = ?1",
        [id],
    )?;
    Ok(())
}

pub fn mark_failed(conn: &Connection, id: i64, reason: &str) -> Result<()> {
    conn.execute(
        r#"
        UPDATE batches
        SET status = 'failed', fail_count = fail_count + 1, fail_reason = ?2
        WHERE id = ?1
        "#,
        params![id, reason],
    )?;
    Ok(())
}

/// Batches the processor should pick up: completed but unprocessed, plus
/// failed ones still under the attempt ceiling.
pub fn pending_processing(conn: &Connection, max_attempts: i64) -> Result<Vec<BatchRecord>> {
    let mut stmt = conn.prepare(&format!(
        r#"
        SELECT {} FROM batches
        WHERE status = 'completed'
           OR (status = 'failed' AND fail_count < ?1)
        ORDER BY id ASC
        "#,
        SELECT_COLS
    ))?;
    let batches = stmt
        .query_map([max_attempts], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(batches)
}

/// Active batches with no activity since the cutoff (batch creation time
/// counts when the batch never saw an activity).
pub fn stale_active(conn: &Connection, cutoff: DateTime<Utc>) -> Result<Vec<BatchRecord>> {
    let mut stmt = conn.prepare(&format!(
        r#"
        SELECT {} FROM batches b
        WHERE b.status = 'active'
          AND COALESCE(
                (SELECT MAX(a.created_at) FROM activities a WHERE a.batch_id = b.id),
                b.created_at
              ) < ?1
        "#,
        SELECT_COLS
    ))?;
    let batches = stmt
        .query_map([format_ts(cutoff)], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(batches)
}

pub fn set_plan(conn: &Connection, id: i64, plan_content: &str) -> Result<()> {
    conn.execute(
        "UPDATE batches SET is_plan = 1, prompt_source = 'plan', plan_content = ?2 WHERE id = ?1",
        params![id, plan_content],
    )?;
    Ok(())
}

pub fn set_classification(
    conn: &Connection,
    id: i64,
    classification: BatchClassification,
) -> Result<()> {
    conn.execute(
        "UPDATE batches SET classification = ?2 WHERE id = ?1",
        params![id, classification.as_str()],
    )?;
    Ok(())
}

pub fn set_summary(conn: &Connection, id: i64, summary: &str) -> Result<()> {
    conn.execute(
        "UPDATE batches SET response_summary = ?2 WHERE id = ?1",
        params![id, summary],
    )?;
    Ok(())
}

pub fn bump_activity_count(conn: &Connection, id: i64, delta: i64) -> Result<()> {
    conn.execute(
        "UPDATE batches SET activity_count = activity_count + ?2 WHERE id = ?1",
        params![id, delta],
    )?;
    Ok(())
}
