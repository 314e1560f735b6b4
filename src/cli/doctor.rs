//! CLI `doctor` command: database diagnostics without loading the engine.

use anyhow::{Context, Result};

use crate::config::CortexConfig;
use crate::db;

/// Run database diagnostics and print a health report.
///
/// Opens the database directly rather than replaying the log, so it still
/// works when recovery would fail.
pub fn doctor(config: &CortexConfig) -> Result<()> {
    let db_path = config.resolved_db_path();

    if !db_path.exists() {
        println!("Database: not found at {}", db_path.display());
        println!("Run `cortex serve` or `cortex add` to initialize.");
        return Ok(());
    }

    let file_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

    let conn = db::open_database(&db_path).context("failed to open database (may be corrupt)")?;
    let report = db::check_database_health(&conn).context("failed to run health check")?;

    println!("Cortex Health Report");
    println!("====================");
    println!();
    println!("Database:          {}", db_path.display());
    println!("File size:         {}", format_bytes(file_size));
    println!("Page estimate:     {}", format_bytes(report.db_size_estimate()));
    println!("Schema version:    {}", report.schema_version);
    println!();
    println!("Embedding provider:");
    println!(
        "  Stored:          {}",
        identity(report.embedding_model.as_deref(), report.embedding_dimensions)
    );
    println!(
        "  Configured:      {}",
        identity(
            Some(configured_provider_name(config).as_str()),
            Some(config.embedding.dimensions)
        )
    );
    if report.embedding_dimensions.is_some_and(|d| d != config.embedding.dimensions) {
        println!("  WARNING: dimension mismatch! The engine will refuse to start.");
    }
    println!();
    println!("Row counts:");
    println!("  Memories:        {}", report.memory_count);
    println!("  Log entries:     {}", report.log_count);
    println!("  Tombstones:      {}", report.tombstone_count);
    println!();
    if report.integrity_ok {
        println!("Integrity check:   PASSED");
    } else {
        println!("Integrity check:   FAILED ({})", report.integrity_details);
        println!();
        println!("Recovery steps:");
        println!("  1. Stop every process using the database.");
        println!("  2. Restore from a backup: cp backup.db {}", db_path.display());
    }

    Ok(())
}

fn identity(model: Option<&str>, dims: Option<usize>) -> String {
    match (model, dims) {
        (Some(m), Some(d)) => format!("{m} ({d}d)"),
        (Some(m), None) => m.to_string(),
        (None, Some(d)) => format!("({d}d)"),
        (None, None) => "(not set)".to_string(),
    }
}

/// The provider name as the engine records it.
fn configured_provider_name(config: &CortexConfig) -> String {
    match crate::embedding::create_provider(&config.embedding) {
        Ok(provider) => provider.name().to_string(),
        Err(e) => format!("{} (unavailable: {e})", config.embedding.provider),
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn identity_formats() {
        assert_eq!(identity(None, None), "(not set)");
        assert_eq!(identity(Some("hashed/fnv1a-trigram"), Some(384)), "hashed/fnv1a-trigram (384d)");
    }
}
