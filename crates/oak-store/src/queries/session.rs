use chrono::{DateTime, Utc};
use oak_types::{SessionSource, SessionStatus, format_ts, parse_ts};
use rusqlite::{Connection, Row, params};

use crate::records::{SessionRecord, SessionStats};
use crate::{Error, Result};

fn from_row(row: &Row) -> rusqlite::Result<SessionRecord> {
    let source: String = row.get(2)?;
    let status: String = row.get(3)?;
    let created_at: String = row.get(4)?;
    let last_activity_at: String = row.get(5)?;
    let ended_at: Option<String> = row.get(6)?;

    Ok(SessionRecord {
        id: row.get(0)?,
        agent_label: row.get(1)?,
        source: SessionSource::parse(&source).unwrap_or(SessionSource::Startup),
        status: SessionStatus::parse(&status).unwrap_or(SessionStatus::Active),
        created_at: parse_ts(&created_at).unwrap_or(DateTime::UNIX_EPOCH),
        last_activity_at: parse_ts(&last_activity_at).unwrap_or(DateTime::UNIX_EPOCH),
        ended_at: ended_at.as_deref().and_then(parse_ts),
        tool_count: row.get(7)?,
        files_touched: row.get(8)?,
        error_count: row.get(9)?,
    })
}

const SELECT_COLS: &str = "id, agent_label, source, status, created_at, last_activity_at, \
                           ended_at, tool_count, files_touched, error_count";

pub fn get(conn: &Connection, id: &str) -> Result<Option<SessionRecord>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM sessions WHERE id = ?1", SELECT_COLS))?;
    let mut rows = stmt.query([id])?;
    match rows.next()? {
        Some(row) => Ok(Some(from_row(row)?)),
        None => Ok(None),
    }
}

pub fn insert(conn: &Connection, record: &SessionRecord) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO sessions
            (id, agent_label, source, status, created_at, last_activity_at, ended_at,
             tool_count, files_touched, error_count)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            &record.id,
            &record.agent_label,
            record.source.as_str(),
            record.status.as_str(),
            format_ts(record.created_at),
            format_ts(record.last_activity_at),
            record.ended_at.map(format_ts),
            record.tool_count,
            record.files_touched,
            record.error_count,
        ],
    )?;
    Ok(())
}

/// Dual-hook agents re-send session-start with a different label; the
/// latest label wins.
pub fn update_agent_label(conn: &Connection, id: &str, label: &str) -> Result<()> {
    conn.execute(
        "UPDATE sessions SET agent_label = ?2 WHERE id = ?1",
        params![id, label],
    )?;
    Ok(())
}

pub fn reactivate(
    conn: &Connection,
    id: &str,
    source: SessionSource,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        r#"
        UPDATE sessions
        SET status = 'active', source = ?2, ended_at = NULL, last_activity_at = ?3
        WHERE id = ?1
        "#,
        params![id, source.as_str(), format_ts(now)],
    )?;
    Ok(())
}

pub fn complete(conn: &Connection, id: &str, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        r#"
        UPDATE sessions
        SET status = 'completed', ended_at = ?2
        WHERE id = ?1 AND status = 'active'
        "#,
        params![id, format_ts(now)],
    )?;
    Ok(())
}

pub fn touch(conn: &Connection, id: &str, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE sessions SET last_activity_at = ?2 WHERE id = ?1",
        params![id, format_ts(now)],
    )?;
    Ok(())
}

pub fn list_recent(
    conn: &Connection,
    limit: usize,
    offset: usize,
    status: Option<SessionStatus>,
) -> Result<Vec<SessionRecord>> {
    let mut sql = format!("SELECT {} FROM sessions", SELECT_COLS);
    if let Some(status) = status {
        sql.push_str(&format!(" WHERE status = '{}'", status.as_str()));
    }
    sql.push_str(" ORDER BY last_activity_at DESC LIMIT ?1 OFFSET ?2");

    let mut stmt = conn.prepare(&sql)?;
    let sessions = stmt
        .query_map(params![limit as i64, offset as i64], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(sessions)
}

/// Active sessions whose last activity (or creation, if never active)
/// predates the cutoff. Recovery completes these.
pub fn stale_active(conn: &Connection, cutoff: DateTime<Utc>) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id FROM sessions
        WHERE status = 'active' AND last_activity_at < ?1
        "#,
    )?;
    let ids = stmt
        .query_map([format_ts(cutoff)], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(ids)
}

/// Aggregate counts for N sessions in a single query.
pub fn bulk_stats(conn: &Connection, ids: &[String]) -> Result<Vec<SessionStats>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    if ids.len() > 500 {
        return Err(Error::Query(format!(
            "bulk_stats limited to 500 sessions, got {}",
            ids.len()
        )));
    }

    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        r#"
        SELECT s.id,
               (SELECT COUNT(*) FROM batches b WHERE b.session_id = s.id),
               (SELECT COUNT(*) FROM activities a WHERE a.session_id = s.id),
               (SELECT COUNT(*) FROM observations o WHERE o.session_id = s.id)
        FROM sessions s
        WHERE s.id IN ({})
        ORDER BY s.id
        "#,
        placeholders
    );

    let mut stmt = conn.prepare(&sql)?;
    let stats = stmt
        .query_map(rusqlite::params_from_iter(ids.iter()), |row| {
            Ok(SessionStats {
                session_id: row.get(0)?,
                batch_count: row.get(1)?,
                activity_count: row.get(2)?,
                observation_count: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(stats)
}

/// Counter deltas from a bulk activity flush, applied once per session.
pub fn apply_counters(
    conn: &Connection,
    id: &str,
    tool_delta: i64,
    files_delta: i64,
    error_delta: i64,
) -> Result<()> {
    conn.execute(
        r#"
        UPDATE sessions
        SET tool_count = tool_count + ?2,
            files_touched = files_touched + ?3,
            error_count = error_count + ?4
        WHERE id = ?1
        "#,
        params![id, tool_delta, files_delta, error_delta],
    )?;
    Ok(())
}
