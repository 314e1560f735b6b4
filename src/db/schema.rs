//! SQL DDL for all Cortex tables.
//!
//! Defines `memories` (one row per live record), `embedding_log` (the
//! append-only write-ahead vector log), and `schema_meta`. All DDL uses
//! `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

/// All schema DDL statements for Cortex's core tables.
const SCHEMA_SQL: &str = r#"
-- Authoritative persisted record. Vectors live in embedding_log.
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    primary_sector TEXT NOT NULL
        CHECK(primary_sector IN ('episodic','semantic','procedural','emotional','reflective')),
    sectors TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    metadata TEXT NOT NULL DEFAULT '{}',
    salience REAL NOT NULL CHECK(salience >= 0.0 AND salience <= 1.0),
    decay_lambda REAL NOT NULL CHECK(decay_lambda > 0.0),
    created_at TEXT NOT NULL,
    last_access_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_memories_primary_sector ON memories(primary_sector);

-- Write-ahead embedding log. A NULL embedding is a tombstone.
CREATE TABLE IF NOT EXISTS embedding_log (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    memory_id TEXT NOT NULL,
    embedding BLOB,
    dim INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"memories".to_string()));
        assert!(tables.contains(&"embedding_log".to_string()));
        assert!(tables.contains(&"schema_meta".to_string()));
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap(); // second call should not error
    }

    #[test]
    fn salience_range_is_enforced() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO memories (id, content, primary_sector, sectors, salience, decay_lambda, created_at, last_access_at)
             VALUES ('x', 'c', 'semantic', '[\"semantic\"]', 1.5, 0.01, 't', 't')",
            [],
        );
        assert!(result.is_err());
    }
}
