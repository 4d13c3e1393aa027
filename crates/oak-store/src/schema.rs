use rusqlite::Connection;

use crate::{Error, Result};

/// Schema version the code understands. `PRAGMA user_version` on disk is
/// compared against this at open: older versions are migrated forward, a
/// newer version fails closed.
pub const SCHEMA_VERSION: i32 = 2;

const MIGRATION_V1: &str = r#"
CREATE TABLE sessions (
    id TEXT PRIMARY KEY,
    agent_label TEXT NOT NULL,
    source TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT NOT NULL,
    last_activity_at TEXT NOT NULL,
    ended_at TEXT,
    tool_count INTEGER NOT NULL DEFAULT 0,
    files_touched INTEGER NOT NULL DEFAULT 0,
    error_count INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE batches (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    prompt_text TEXT NOT NULL DEFAULT '',
    prompt_source TEXT NOT NULL DEFAULT 'user',
    generation_id TEXT,
    status TEXT NOT NULL DEFAULT 'active',
    classification TEXT,
    response_summary TEXT,
    is_plan INTEGER NOT NULL DEFAULT 0,
    plan_content TEXT,
    activity_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    ended_at TEXT,
    FOREIGN KEY (session_id) REFERENCES sessions(id)
);

CREATE TABLE activities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    batch_id INTEGER,
    tool_name TEXT NOT NULL,
    tool_use_id TEXT UNIQUE,
    tool_input TEXT,
    tool_output TEXT,
    file_path TEXT,
    success INTEGER NOT NULL DEFAULT 1,
    error_message TEXT,
    created_at TEXT NOT NULL,
    FOREIGN KEY (session_id) REFERENCES sessions(id),
    FOREIGN KEY (batch_id) REFERENCES batches(id)
);

CREATE TABLE observations (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    batch_id INTEGER,
    memory_type TEXT NOT NULL,
    observation_text TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    file_path TEXT,
    confidence REAL NOT NULL DEFAULT 1.0,
    content_hash TEXT NOT NULL,
    embedded INTEGER NOT NULL DEFAULT 0,
    archived INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'active',
    created_at TEXT NOT NULL,
    FOREIGN KEY (session_id) REFERENCES sessions(id),
    FOREIGN KEY (batch_id) REFERENCES batches(id)
);

CREATE TABLE daemon_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE INDEX idx_sessions_status ON sessions(status);
CREATE INDEX idx_batches_session ON batches(session_id);
CREATE INDEX idx_batches_status ON batches(status);
CREATE INDEX idx_activities_session ON activities(session_id);
CREATE INDEX idx_activities_batch ON activities(batch_id);
CREATE INDEX idx_observations_session ON observations(session_id);
CREATE INDEX idx_observations_file ON observations(file_path);
"#;

// v2: processing retries became durable so terminal failure survives
// restarts, and the embedding-repair scan got an index.
const MIGRATION_V2: &str = r#"
ALTER TABLE batches ADD COLUMN fail_count INTEGER NOT NULL DEFAULT 0;
ALTER TABLE batches ADD COLUMN fail_reason TEXT;
CREATE INDEX idx_observations_embedded ON observations(embedded);
"#;

const MIGRATIONS: &[(i32, &str)] = &[(1, MIGRATION_V1), (2, MIGRATION_V2)];

/// Apply forward-only migrations, each in its own transaction. Fails closed
/// when the installed version is newer than the code's.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    let installed: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if installed > SCHEMA_VERSION {
        return Err(Error::SchemaTooNew {
            installed,
            supported: SCHEMA_VERSION,
        });
    }

    for (version, sql) in MIGRATIONS {
        if *version <= installed {
            continue;
        }
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {}", version))?;
        tx.commit()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_from_empty() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let version: i32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);

        // v2 columns exist
        conn.execute(
            "UPDATE batches SET fail_count = 0 WHERE 1 = 0",
            [],
        )
        .unwrap();
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
    }

    #[test]
    fn test_newer_schema_fails_closed() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&format!("PRAGMA user_version = {}", SCHEMA_VERSION + 1))
            .unwrap();

        let err = migrate(&mut conn).unwrap_err();
        assert!(matches!(err, Error::SchemaTooNew { .. }));
    }
}
