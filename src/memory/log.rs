//! Durable record rows and the write-ahead embedding log.
//!
//! Every mutation commits to SQLite before the in-memory structures change:
//! ingestion writes the `memories` row and one `embedding_log` entry in a
//! single transaction; deletion removes the row and appends a tombstone (an
//! entry with a NULL vector) in a single transaction; reinforcement updates
//! the row. [`replay`] rebuilds the live record set from the log at startup.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{EngineError, Result};
use crate::memory::types::{MemoryRecord, Sector, SectorSet};

/// One entry of the embedding log. `embedding == None` is a tombstone.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingLogEntry {
    pub seq: i64,
    pub memory_id: String,
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

pub(crate) fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|x| x.to_le_bytes()).collect()
}

pub(crate) fn decode_embedding(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| EngineError::invalid(format!("value is not serializable: {e}")))
}

/// Persist a new record and its log entry atomically. Returns the log sequence number.
pub fn write_ingest(conn: &mut Connection, record: &MemoryRecord) -> Result<i64> {
    let sectors = to_json(&record.sectors)?;
    let tags = to_json(&record.tags)?;
    let metadata = to_json(&record.metadata)?;

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO memories (id, content, primary_sector, sectors, tags, metadata,
                               salience, decay_lambda, created_at, last_access_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            record.id,
            record.content,
            record.primary_sector.as_str(),
            sectors,
            tags,
            metadata,
            record.salience,
            record.decay_lambda,
            record.created_at.to_rfc3339(),
            record.last_access_at.to_rfc3339(),
        ],
    )?;
    tx.execute(
        "INSERT INTO embedding_log (memory_id, embedding, dim, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            record.id,
            encode_embedding(&record.embedding),
            record.embedding.len() as i64,
            record.created_at.to_rfc3339(),
        ],
    )?;
    let seq = tx.last_insert_rowid();
    tx.commit()?;
    Ok(seq)
}

/// Remove a record row and tombstone its log entry atomically.
pub fn write_tombstone(conn: &mut Connection, id: &str, now: DateTime<Utc>) -> Result<i64> {
    let tx = conn.transaction()?;
    let removed = tx.execute("DELETE FROM memories WHERE id = ?1", [id])?;
    if removed == 0 {
        return Err(EngineError::NotFound(id.to_string()));
    }
    tx.execute(
        "INSERT INTO embedding_log (memory_id, embedding, dim, created_at)
         VALUES (?1, NULL, 0, ?2)",
        params![id, now.to_rfc3339()],
    )?;
    let seq = tx.last_insert_rowid();
    tx.commit()?;
    Ok(seq)
}

/// Persist new salience state for a record.
pub fn write_reinforcement(
    conn: &Connection,
    id: &str,
    salience: f64,
    last_access_at: DateTime<Utc>,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE memories SET salience = ?1, last_access_at = ?2 WHERE id = ?3",
        params![salience, last_access_at.to_rfc3339(), id],
    )?;
    if updated == 0 {
        return Err(EngineError::NotFound(id.to_string()));
    }
    Ok(())
}

/// Read the whole log in sequence order.
///
/// Fails with `RecoveryFailure` on a vector blob that is not a whole number
/// of `f32`s, or whose length disagrees with its recorded dimension.
pub fn read_log(conn: &Connection) -> Result<Vec<EmbeddingLogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT seq, memory_id, embedding, dim, created_at FROM embedding_log ORDER BY seq",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<Vec<u8>>>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, String>(4)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (seq, memory_id, blob, dim, created_at) = row?;
        let embedding = match blob {
            None => None,
            Some(bytes) => {
                let vector = decode_embedding(&bytes).ok_or_else(|| {
                    EngineError::RecoveryFailure(format!(
                        "log entry {seq} for {memory_id}: {} bytes is not a whole number of f32s",
                        bytes.len()
                    ))
                })?;
                if vector.len() as i64 != dim {
                    return Err(EngineError::RecoveryFailure(format!(
                        "log entry {seq} for {memory_id}: recorded dim {dim}, found {}",
                        vector.len()
                    )));
                }
                Some(vector)
            }
        };
        entries.push(EmbeddingLogEntry {
            seq,
            memory_id,
            created_at: parse_time(&created_at).map_err(|e| {
                EngineError::RecoveryFailure(format!("log entry {seq}: {e}"))
            })?,
            embedding,
        });
    }
    Ok(entries)
}

/// Rebuild the live record set from the log.
///
/// The last entry per id wins, so tombstoned ids are skipped entirely.
/// Survivors come back ordered by the sequence number of their vector entry,
/// which is ingestion order. Every surviving vector must have `dimensions`
/// components and a matching `memories` row; rows with no live log entry are
/// ignored with a warning.
pub fn replay(conn: &Connection, dimensions: usize) -> Result<Vec<MemoryRecord>> {
    let entries = read_log(conn)?;

    let mut latest: HashMap<String, EmbeddingLogEntry> = HashMap::new();
    for entry in entries {
        latest.insert(entry.memory_id.clone(), entry);
    }
    let mut live: Vec<EmbeddingLogEntry> = latest
        .into_values()
        .filter(|e| e.embedding.is_some())
        .collect();
    live.sort_by_key(|e| e.seq);

    let mut rows = load_rows(conn)?;
    let mut records = Vec::with_capacity(live.len());

    for entry in live {
        let Some(embedding) = entry.embedding else {
            continue;
        };
        if embedding.len() != dimensions {
            return Err(EngineError::RecoveryFailure(format!(
                "log entry {} for {} has {} dimensions, provider produces {dimensions}",
                entry.seq,
                entry.memory_id,
                embedding.len()
            )));
        }
        let row = rows.remove(&entry.memory_id).ok_or_else(|| {
            EngineError::RecoveryFailure(format!(
                "log entry {} for {} has no record row",
                entry.seq, entry.memory_id
            ))
        })?;
        records.push(row.into_record(embedding)?);
    }

    for id in rows.keys() {
        tracing::warn!(id = %id, "record row has no live embedding log entry, skipping");
    }

    Ok(records)
}

/// Whether the log holds any vector for a record that is still live.
pub fn has_live_vectors(conn: &Connection) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM embedding_log l
             WHERE l.embedding IS NOT NULL
               AND NOT EXISTS (SELECT 1 FROM embedding_log t
                               WHERE t.memory_id = l.memory_id AND t.seq > l.seq)
             LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

struct Row {
    id: String,
    content: String,
    primary_sector: String,
    sectors: String,
    tags: String,
    metadata: String,
    salience: f64,
    decay_lambda: f64,
    created_at: String,
    last_access_at: String,
}

impl Row {
    fn into_record(self, embedding: Vec<f32>) -> Result<MemoryRecord> {
        let corrupt =
            |what: &str, e: String| EngineError::RecoveryFailure(format!("record {}: bad {what}: {e}", self.id));

        let primary_sector: Sector = self
            .primary_sector
            .parse()
            .map_err(|e| corrupt("primary_sector", e))?;
        let sectors: SectorSet =
            serde_json::from_str(&self.sectors).map_err(|e| corrupt("sectors", e.to_string()))?;
        let tags = serde_json::from_str(&self.tags).map_err(|e| corrupt("tags", e.to_string()))?;
        let metadata =
            serde_json::from_str(&self.metadata).map_err(|e| corrupt("metadata", e.to_string()))?;
        let created_at = parse_time(&self.created_at).map_err(|e| corrupt("created_at", e))?;
        let last_access_at =
            parse_time(&self.last_access_at).map_err(|e| corrupt("last_access_at", e))?;

        Ok(MemoryRecord {
            id: self.id,
            content: self.content,
            embedding,
            primary_sector,
            sectors,
            tags,
            metadata,
            salience: self.salience,
            decay_lambda: self.decay_lambda,
            created_at,
            last_access_at,
        })
    }
}

fn load_rows(conn: &Connection) -> Result<HashMap<String, Row>> {
    let mut stmt = conn.prepare(
        "SELECT id, content, primary_sector, sectors, tags, metadata,
                salience, decay_lambda, created_at, last_access_at
         FROM memories",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(Row {
            id: row.get(0)?,
            content: row.get(1)?,
            primary_sector: row.get(2)?,
            sectors: row.get(3)?,
            tags: row.get(4)?,
            metadata: row.get(5)?,
            salience: row.get(6)?,
            decay_lambda: row.get(7)?,
            created_at: row.get(8)?,
            last_access_at: row.get(9)?,
        })
    })?;

    let mut by_id = HashMap::new();
    for row in rows {
        let row = row?;
        by_id.insert(row.id.clone(), row);
    }
    Ok(by_id)
}

fn parse_time(s: &str) -> std::result::Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp {s:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    fn record(id: &str, embedding: Vec<f32>) -> MemoryRecord {
        let now = Utc::now();
        let mut metadata = serde_json::Map::new();
        metadata.insert("source".into(), serde_json::json!("test"));
        MemoryRecord {
            id: id.into(),
            content: format!("content {id}"),
            embedding,
            primary_sector: Sector::Emotional,
            sectors: [Sector::Emotional, Sector::Episodic].into_iter().collect(),
            tags: ["t1".to_string()].into_iter().collect(),
            metadata,
            salience: 0.5,
            decay_lambda: 0.02,
            created_at: now,
            last_access_at: now,
        }
    }

    #[test]
    fn embedding_bytes_round_trip() {
        let v = vec![0.25f32, -1.5, 3.0];
        assert_eq!(decode_embedding(&encode_embedding(&v)), Some(v));
        assert_eq!(decode_embedding(&[0, 1, 2]), None);
    }

    #[test]
    fn replay_restores_records_in_ingestion_order() {
        let mut conn = open_memory_database().unwrap();
        write_ingest(&mut conn, &record("b", vec![1.0, 0.0])).unwrap();
        write_ingest(&mut conn, &record("a", vec![0.0, 1.0])).unwrap();

        let records = replay(&conn, 2).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);

        let a = &records[1];
        assert_eq!(a.embedding, vec![0.0, 1.0]);
        assert_eq!(a.primary_sector, Sector::Emotional);
        assert!(a.sectors.contains(&Sector::Episodic));
        assert!(a.tags.contains("t1"));
        assert_eq!(a.metadata["source"], "test");
    }

    #[test]
    fn tombstones_hide_records() {
        let mut conn = open_memory_database().unwrap();
        write_ingest(&mut conn, &record("a", vec![1.0, 0.0])).unwrap();
        write_ingest(&mut conn, &record("b", vec![0.0, 1.0])).unwrap();
        write_tombstone(&mut conn, "a", Utc::now()).unwrap();

        let records = replay(&conn, 2).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "b");
        assert!(matches!(
            write_tombstone(&mut conn, "a", Utc::now()),
            Err(EngineError::NotFound(_))
        ));

        let log = read_log(&conn).unwrap();
        assert_eq!(log.len(), 3);
        assert!(log[2].embedding.is_none());
    }

    #[test]
    fn reinforcement_persists() {
        let mut conn = open_memory_database().unwrap();
        write_ingest(&mut conn, &record("a", vec![1.0, 0.0])).unwrap();
        let later = Utc::now() + chrono::Duration::hours(1);
        write_reinforcement(&conn, "a", 0.9, later).unwrap();

        let records = replay(&conn, 2).unwrap();
        assert_eq!(records[0].salience, 0.9);
        assert_eq!(
            records[0].last_access_at.timestamp_micros(),
            later.timestamp_micros()
        );
        assert!(write_reinforcement(&conn, "zzz", 0.1, later).is_err());
    }

    #[test]
    fn dimension_mismatch_is_a_recovery_failure() {
        let mut conn = open_memory_database().unwrap();
        write_ingest(&mut conn, &record("a", vec![1.0, 0.0])).unwrap();
        assert!(matches!(
            replay(&conn, 3),
            Err(EngineError::RecoveryFailure(_))
        ));
    }

    #[test]
    fn truncated_blob_is_a_recovery_failure() {
        let conn = open_memory_database().unwrap();
        conn.execute(
            "INSERT INTO embedding_log (memory_id, embedding, dim, created_at)
             VALUES ('a', x'000080', 1, '2024-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        assert!(matches!(read_log(&conn), Err(EngineError::RecoveryFailure(_))));
    }

    #[test]
    fn live_entry_without_row_is_a_recovery_failure() {
        let mut conn = open_memory_database().unwrap();
        write_ingest(&mut conn, &record("a", vec![1.0, 0.0])).unwrap();
        conn.execute("DELETE FROM memories WHERE id = 'a'", []).unwrap();
        let err = replay(&conn, 2).unwrap_err();
        assert!(err.to_string().contains("no record row"));
    }

    #[test]
    fn live_vector_detection() {
        let mut conn = open_memory_database().unwrap();
        assert!(!has_live_vectors(&conn).unwrap());
        write_ingest(&mut conn, &record("a", vec![1.0, 0.0])).unwrap();
        assert!(has_live_vectors(&conn).unwrap());
        write_tombstone(&mut conn, "a", Utc::now()).unwrap();
        assert!(!has_live_vectors(&conn).unwrap());
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM memories", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 0);
    }
}
