use chrono::{DateTime, Utc};
use oak_types::{MemoryType, ObservationStatus, content_hash, format_ts, parse_ts};
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

use crate::Result;
use crate::records::{NewObservation, ObservationFilter, ObservationRecord};

const SELECT_COLS: &str = "id, session_id, batch_id, memory_type, observation_text, tags, \
                           file_path, confidence, content_hash, embedded, archived, status, \
                           created_at";

fn from_row(row: &Row) -> rusqlite::Result<ObservationRecord> {
    let memory_type: String = row.get(3)?;
    let tags: String = row.get(5)?;
    let status: String = row.get(11)?;
    let created_at: String = row.get(12)?;

    Ok(ObservationRecord {
        id: row.get(0)?,
        session_id: row.get(1)?,
        batch_id: row.get(2)?,
        memory_type: MemoryType::parse(&memory_type).unwrap_or(MemoryType::Discovery),
        observation_text: row.get(4)?,
        tags: serde_json::from_str(&tags).unwrap_or_default(),
        file_path: row.get(6)?,
        confidence: row.get(7)?,
        content_hash: row.get(8)?,
        embedded: row.get(9)?,
        archived: row.get(10)?,
        status: ObservationStatus::parse(&status).unwrap_or(ObservationStatus::Active),
        created_at: parse_ts(&created_at).unwrap_or(DateTime::UNIX_EPOCH),
    })
}

/// Durable commit point of the dual-store write: the row lands with
/// `embedded = 0` and the vector replica follows.
pub fn insert(
    conn: &Connection,
    observation: &NewObservation,
    now: DateTime<Utc>,
) -> Result<ObservationRecord> {
    let id = format!("obs-{}", Uuid::new_v4());
    let hash = content_hash(&observation.observation_text);
    let tags = serde_json::to_string(&observation.tags).unwrap_or_else(|_| "[]".to_string());

    conn.execute(
        r#"
        INSERT INTO observations
            (id, session_id, batch_id, memory_type, observation_text, tags, file_path,
             confidence, content_hash, embedded, archived, status, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, 0, 'active', ?10)
        "#,
        params![
            &id,
            &observation.session_id,
            observation.batch_id,
            observation.memory_type.as_str(),
            &observation.observation_text,
            &tags,
            &observation.file_path,
            observation.confidence,
            &hash,
            format_ts(now),
        ],
    )?;

    Ok(ObservationRecord {
        id,
        session_id: observation.session_id.clone(),
        batch_id: observation.batch_id,
        memory_type: observation.memory_type,
        observation_text: observation.observation_text.clone(),
        tags: observation.tags.clone(),
        file_path: observation.file_path.clone(),
        confidence: observation.confidence,
        content_hash: hash,
        embedded: false,
        archived: false,
        status: ObservationStatus::Active,
        created_at: now,
    })
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<ObservationRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM observations WHERE id = ?1",
        SELECT_COLS
    ))?;
    let mut rows = stmt.query([id])?;
    match rows.next()? {
        Some(row) => Ok(Some(from_row(row)?)),
        None => Ok(None),
    }
}

pub fn list(
    conn: &Connection,
    filter: &ObservationFilter,
    limit: usize,
    offset: usize,
) -> Result<Vec<ObservationRecord>> {
    let mut where_clauses = vec!["1 = 1".to_string()];
    let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

    if !filter.include_archived {
        where_clauses.push("archived = 0".to_string());
    }
    if let Some(memory_type) = filter.memory_type {
        where_clauses.push("memory_type = ?".to_string());
        args.push(Box::new(memory_type.as_str().to_string()));
    }
    if let Some(file_path) = &filter.file_path {
        where_clauses.push("file_path = ?".to_string());
        args.push(Box::new(file_path.clone()));
    }
    if let Some(session_id) = &filter.session_id {
        where_clauses.push("session_id = ?".to_string());
        args.push(Box::new(session_id.clone()));
    }
    if let Some(batch_id) = filter.batch_id {
        where_clauses.push("batch_id = ?".to_string());
        args.push(Box::new(batch_id));
    }
    if let Some(embedded) = filter.embedded {
        where_clauses.push("embedded = ?".to_string());
        args.push(Box::new(embedded));
    }

    let sql = format!(
        "SELECT {} FROM observations WHERE {} ORDER BY created_at DESC, id DESC LIMIT {} OFFSET {}",
        SELECT_COLS,
        where_clauses.join(" AND "),
        limit,
        offset
    );

    let mut stmt = conn.prepare(&sql)?;
    let observations = stmt
        .query_map(rusqlite::params_from_iter(args.iter()), from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(observations)
}

pub fn mark_embedded(conn: &Connection, id: &str) -> Result<()> {
    conn.execute("UPDATE observations SET embedded = 1 WHERE id = ?1", [id])?;
    Ok(())
}

pub fn mark_unembedded(conn: &Connection, id: &str) -> Result<()> {
    conn.execute("UPDATE observations SET embedded = 0 WHERE id = ?1", [id])?;
    Ok(())
}

/// Rows whose vector replica may be missing; recovery re-embeds these.
pub fn pending_embedding(conn: &Connection) -> Result<Vec<ObservationRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM observations WHERE embedded = 0 AND archived = 0 ORDER BY created_at ASC",
        SELECT_COLS
    ))?;
    let observations = stmt
        .query_map([], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(observations)
}

pub fn set_status(conn: &Connection, id: &str, status: ObservationStatus) -> Result<()> {
    conn.execute(
        "UPDATE observations SET status = ?2 WHERE id = ?1",
        params![id, status.as_str()],
    )?;
    Ok(())
}

pub fn archive(conn: &Connection, id: &str) -> Result<()> {
    conn.execute("UPDATE observations SET archived = 1 WHERE id = ?1", [id])?;
    Ok(())
}

pub fn recent_session_summaries(conn: &Connection, limit: usize) -> Result<Vec<ObservationRecord>> {
    let mut stmt = conn.prepare(&format!(
        r#"
        SELECT {} FROM observations
        WHERE memory_type = 'session_summary' AND archived = 0
        ORDER BY created_at DESC LIMIT ?1
        "#,
        SELECT_COLS
    ))?;
    let observations = stmt
        .query_map([limit as i64], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(observations)
}

/// Everything eligible for the memory collection; rebuild-memories walks
/// this set.
pub fn all_active(conn: &Connection) -> Result<Vec<ObservationRecord>> {
    let mut stmt = conn.prepare(&format!(
        r#"
        SELECT {} FROM observations
        WHERE archived = 0 AND status != 'superseded'
        ORDER BY created_at ASC
        "#,
        SELECT_COLS
    ))?;
    let observations = stmt
        .query_map([], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(observations)
}

pub fn count_embedded(conn: &Connection) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM observations WHERE embedded = 1 AND archived = 0 AND status != 'superseded'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub fn reset_processing(conn: &mut Connection, delete_observations: bool) -> Result<()> {
    let tx = conn.transaction()?;
    if delete_observations {
        tx.execute("DELETE FROM observations WHERE batch_id IS NOT NULL", [])?;
    }
    tx.execute(
        "UPDATE batches SET status = 'completed', fail_count = 0, fail_reason = NULL \
         WHERE status IN ('processed', 'failed')",
        [],
    )?;
    tx.commit()?;
    Ok(())
}
