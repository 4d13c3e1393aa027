use rusqlite::types::Value;

use crate::db::Database;
use crate::queries::meta;
use crate::{Error, Result};

// Tables in backup scope, dumped in FK dependency order so a restore can
// replay the statements top to bottom.
const TABLES: &[(&str, &[&str])] = &[
    (
        "sessions",
        &[
            "id",
            "agent_label",
            "source",
            "status",
            "created_at",
            "last_activity_at",
            "ended_at",
            "tool_count",
            "files_touched",
            "error_count",
        ],
    ),
    (
        "batches",
        &[
            "id",
            "session_id",
            "prompt_text",
            "prompt_source",
            "generation_id",
            "status",
            "classification",
            "response_summary",
            "is_plan",
            "plan_content",
            "activity_count",
            "fail_count",
            "fail_reason",
            "created_at",
            "ended_at",
        ],
    ),
    (
        "activities",
        &[
            "id",
            "session_id",
            "batch_id",
            "tool_name",
            "tool_use_id",
            "tool_input",
            "tool_output",
            "file_path",
            "success",
            "error_message",
            "created_at",
        ],
    ),
    (
        "observations",
        &[
            "id",
            "session_id",
            "batch_id",
            "memory_type",
            "observation_text",
            "tags",
            "file_path",
            "confidence",
            "content_hash",
            "embedded",
            "archived",
            "status",
            "created_at",
        ],
    ),
];

fn sql_quote(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(r) => {
            // Round-trippable float formatting keeps dumps byte-stable
            format!("{:?}", r)
        }
        Value::Text(s) => {
            // Newlines are encoded with char() concatenation so every dump
            // statement stays on one line (restore validation is line-based)
            let escaped = s
                .replace('\'', "''")
                .replace('\r', "'||char(13)||'")
                .replace('\n', "'||char(10)||'");
            format!("'{}'", escaped)
        }
        Value::Blob(b) => {
            let mut out = String::from("X'");
            for byte in b {
                out.push_str(&format!("{:02x}", byte));
            }
            out.push('\'');
            out
        }
    }
}

/// Produce a portable, deterministic SQL dump of the tables in scope.
/// Rows are ordered by primary key so repeated exports of the same data
/// are byte-equivalent.
pub fn export_dump(db: &Database) -> Result<String> {
    let machine = meta::machine_id(db.conn())?;
    let mut out = String::new();
    out.push_str(&format!("-- oakd dump v1 machine={}\n", machine));

    for (table, columns) in TABLES {
        let sql = format!(
            "SELECT {} FROM {} ORDER BY id ASC",
            columns.join(", "),
            table
        );
        let mut stmt = db.conn().prepare(&sql)?;
        let mut rows = stmt.query([])?;

        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for idx in 0..columns.len() {
                let value: Value = row.get(idx)?;
                values.push(sql_quote(&value));
            }
            out.push_str(&format!(
                "INSERT INTO {} ({}) VALUES ({});\n",
                table,
                columns.join(", "),
                values.join(", ")
            ));
        }
    }

    Ok(out)
}

/// Restore a dump produced by `export_dump`. The restore is scoped by
/// machine id: a non-empty database only accepts dumps from its own
/// machine; an empty database adopts the dump's machine id.
pub fn restore_dump(db: &mut Database, dump: &str) -> Result<()> {
    let header = dump
        .lines()
        .next()
        .ok_or_else(|| Error::Restore("empty dump".to_string()))?;
    let dump_machine = header
        .strip_prefix("-- oakd dump v1 machine=")
        .ok_or_else(|| Error::Restore("unrecognized dump header".to_string()))?
        .trim()
        .to_string();
    if dump_machine.is_empty() {
        return Err(Error::Restore("dump header missing machine id".to_string()));
    }

    for line in dump.lines().skip(1) {
        let line = line.trim();
        if line.is_empty() || line.starts_with("--") {
            continue;
        }
        let allowed = TABLES
            .iter()
            .any(|(table, _)| line.starts_with(&format!("INSERT INTO {} ", table)));
        if !allowed {
            return Err(Error::Restore(format!(
                "unexpected statement in dump: {}",
                oak_types::excerpt(line, 60)
            )));
        }
    }

    let session_count: i64 =
        db.conn()
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
    let own_machine = meta::machine_id(db.conn())?;
    if session_count > 0 && own_machine != dump_machine {
        return Err(Error::Restore(format!(
            "dump belongs to machine {} but this store is {}",
            dump_machine, own_machine
        )));
    }

    let tx = db.conn_mut().transaction()?;
    for (table, _) in TABLES.iter().rev() {
        tx.execute(&format!("DELETE FROM {}", table), [])?;
    }
    tx.execute_batch(dump)?;
    tx.execute(
        "INSERT INTO daemon_meta (key, value) VALUES ('machine_id', ?1) \
         ON CONFLICT(key) DO UPDATE SET value = ?1",
        [&dump_machine],
    )?;
    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{NewActivity, SessionRecord};
    use chrono::Utc;
    use oak_types::{PromptSource, SessionSource, SessionStatus};

    fn seeded_db() -> Database {
        let mut db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        db.insert_session(&SessionRecord {
            id: "s1".to_string(),
            agent_label: "claude".to_string(),
            source: SessionSource::Startup,
            status: SessionStatus::Active,
            created_at: now,
            last_activity_at: now,
            ended_at: None,
            tool_count: 0,
            files_touched: 0,
            error_count: 0,
        })
        .unwrap();
        let batch = db
            .open_batch("s1", "it's a 'test'", PromptSource::User, Some("g1"), now)
            .unwrap();
        db.insert_activity(&NewActivity {
            session_id: "s1".to_string(),
            batch_id: Some(batch),
            tool_name: "Edit".to_string(),
            tool_use_id: Some("t1".to_string()),
            tool_input: Some("{}".to_string()),
            tool_output: Some("ok".to_string()),
            file_path: Some("src/auth.py".to_string()),
            success: true,
            error_message: None,
            created_at: now,
        })
        .unwrap();
        db
    }

    #[test]
    fn test_export_restore_round_trip_is_byte_equivalent() {
        let db = seeded_db();
        let dump = export_dump(&db).unwrap();

        let mut fresh = Database::open_in_memory().unwrap();
        restore_dump(&mut fresh, &dump).unwrap();

        let dump_again = export_dump(&fresh).unwrap();
        assert_eq!(dump, dump_again);
    }

    #[test]
    fn test_restore_rejects_foreign_machine_when_populated() {
        let db = seeded_db();
        let mut dump = export_dump(&db).unwrap();
        dump = dump.replacen(
            &db.machine_id().unwrap(),
            "00000000-0000-0000-0000-000000000000",
            1,
        );

        let mut target = seeded_db();
        let err = restore_dump(&mut target, &dump).unwrap_err();
        assert!(matches!(err, Error::Restore(_)));
    }

    #[test]
    fn test_restore_rejects_non_insert_statements() {
        let db = Database::open_in_memory().unwrap();
        let dump = format!(
            "-- oakd dump v1 machine={}\nDROP TABLE sessions;\n",
            db.machine_id().unwrap()
        );

        let mut target = Database::open_in_memory().unwrap();
        let err = restore_dump(&mut target, &dump).unwrap_err();
        assert!(matches!(err, Error::Restore(_)));
    }
}
