use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::Result;
use crate::records::StoreStats;

/// Mint the machine id on first open; backup/restore scoping keys off it.
pub fn ensure_machine_id(conn: &Connection) -> Result<()> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT value FROM daemon_meta WHERE key = 'machine_id'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    if existing.is_none() {
        conn.execute(
            "INSERT INTO daemon_meta (key, value) VALUES ('machine_id', ?1)",
            [Uuid::new_v4().to_string()],
        )?;
    }
    Ok(())
}

pub fn machine_id(conn: &Connection) -> Result<String> {
    let id = conn.query_row(
        "SELECT value FROM daemon_meta WHERE key = 'machine_id'",
        [],
        |row| row.get(0),
    )?;
    Ok(id)
}

pub fn set_machine_id(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO daemon_meta (key, value) VALUES ('machine_id', ?1) \
         ON CONFLICT(key) DO UPDATE SET value = ?1",
        params![id],
    )?;
    Ok(())
}

pub fn stats(conn: &Connection) -> Result<StoreStats> {
    let count = |sql: &str| -> Result<i64> {
        Ok(conn.query_row(sql, [], |row| row.get(0))?)
    };

    Ok(StoreStats {
        sessions: count("SELECT COUNT(*) FROM sessions")?,
        active_sessions: count("SELECT COUNT(*) FROM sessions WHERE status = 'active'")?,
        batches: count("SELECT COUNT(*) FROM batches")?,
        batches_pending: count("SELECT COUNT(*) FROM batches WHERE status = 'completed'")?,
        batches_failed: count("SELECT COUNT(*) FROM batches WHERE status = 'failed'")?,
        activities: count("SELECT COUNT(*) FROM activities")?,
        observations: count("SELECT COUNT(*) FROM observations")?,
        observations_unembedded: count(
            "SELECT COUNT(*) FROM observations WHERE embedded = 0 AND archived = 0",
        )?,
    })
}
