pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;

/// Open (or create) the Cortex database at the given path, with schema
/// initialized and migrations applied.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let mut conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    // WAL keeps readers unblocked while a write transaction commits
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;

    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&mut conn).context("failed to run migrations")?;

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open an in-memory database, fully migrated. Used by tests and ephemeral engines.
pub fn open_memory_database() -> Result<Connection> {
    let mut conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    schema::init_schema(&conn).context("failed to initialize schema")?;
    migrations::run_migrations(&mut conn).context("failed to run migrations")?;
    Ok(conn)
}

/// Result of [`check_database_health`].
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub schema_version: u32,
    pub integrity_ok: bool,
    pub integrity_details: String,
    pub memory_count: u64,
    pub log_count: u64,
    pub tombstone_count: u64,
    pub embedding_model: Option<String>,
    pub embedding_dimensions: Option<usize>,
    pub page_count: u64,
    pub page_size: u64,
}

impl HealthReport {
    /// Approximate on-disk size in bytes.
    pub fn db_size_estimate(&self) -> u64 {
        self.page_count * self.page_size
    }
}

/// Run `PRAGMA integrity_check` and gather row counts and the stored
/// embedding identity.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let integrity: Vec<String> = conn
        .prepare("PRAGMA integrity_check")?
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;
    let integrity_ok = integrity.len() == 1 && integrity[0] == "ok";

    let count = |sql: &str| -> rusqlite::Result<u64> {
        conn.query_row(sql, [], |row| row.get::<_, i64>(0))
            .map(|n| n as u64)
    };

    Ok(HealthReport {
        schema_version: migrations::get_schema_version(conn)?,
        integrity_ok,
        integrity_details: integrity.join("; "),
        memory_count: count("SELECT COUNT(*) FROM memories")?,
        log_count: count("SELECT COUNT(*) FROM embedding_log")?,
        tombstone_count: count("SELECT COUNT(*) FROM embedding_log WHERE embedding IS NULL")?,
        embedding_model: migrations::get_embedding_model(conn)?,
        embedding_dimensions: migrations::get_embedding_dimensions(conn)?,
        page_count: count("PRAGMA page_count")?,
        page_size: count("PRAGMA page_size")?,
    })
}
