//! Core memory type definitions.
//!
//! Defines [`Sector`] (the five cognitive categories), [`SectorSet`] (a
//! record's memberships), and [`MemoryRecord`] (a full stored memory).

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The five cognitive sectors.
///
/// Declaration order is the classifier's tie-break priority, so the derived
/// `Ord` puts episodic first and reflective last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    /// Events and experiences anchored in time.
    Episodic,
    /// Facts, definitions, and general knowledge.
    Semantic,
    /// How-to knowledge, steps, and instructions.
    Procedural,
    /// Feelings and affect.
    Emotional,
    /// Self-referential thought, insight, and questions.
    Reflective,
}

impl Sector {
    /// All sectors in priority order.
    pub const ALL: [Sector; 5] = [
        Sector::Episodic,
        Sector::Semantic,
        Sector::Procedural,
        Sector::Emotional,
        Sector::Reflective,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
            Self::Procedural => "procedural",
            Self::Emotional => "emotional",
            Self::Reflective => "reflective",
        }
    }

    /// Position in [`Sector::ALL`], used for fixed-size per-sector tables.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for Sector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Sector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "episodic" => Ok(Self::Episodic),
            "semantic" => Ok(Self::Semantic),
            "procedural" => Ok(Self::Procedural),
            "emotional" => Ok(Self::Emotional),
            "reflective" => Ok(Self::Reflective),
            _ => Err(format!("unknown sector: {s}")),
        }
    }
}

/// A record's sector memberships. Always contains the primary sector.
pub type SectorSet = BTreeSet<Sector>;

/// A stored memory.
///
/// Everything except `salience` and `last_access_at` is immutable after
/// creation; those two change only through reinforcement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// UUID v7 (time-sortable), never reused.
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub primary_sector: Sector,
    pub sectors: SectorSet,
    pub tags: BTreeSet<String>,
    /// Opaque caller-supplied key/value pairs.
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Baseline salience (`salience0`) in `[0.0, 1.0]`.
    pub salience: f64,
    /// Decay rate per day, strictly positive.
    pub decay_lambda: f64,
    pub created_at: DateTime<Utc>,
    pub last_access_at: DateTime<Utc>,
}

impl MemoryRecord {
    pub fn has_sector(&self, sector: Sector) -> bool {
        self.sectors.contains(&sector)
    }

    /// True when `tags` is empty or shares at least one tag with this record.
    pub fn matches_tags(&self, tags: &BTreeSet<String>) -> bool {
        tags.is_empty() || tags.iter().any(|t| self.tags.contains(t))
    }
}

/// Caller-visible view of a record with its salience decayed to "now".
#[derive(Debug, Clone, Serialize)]
pub struct MemoryView {
    pub id: String,
    pub content: String,
    pub primary_sector: Sector,
    pub sectors: SectorSet,
    pub tags: BTreeSet<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Current (decayed) salience.
    pub salience: f64,
    /// Stored baseline salience.
    pub salience0: f64,
    pub decay_lambda: f64,
    pub embedding_dim: usize,
    pub created_at: DateTime<Utc>,
    pub last_access_at: DateTime<Utc>,
}

impl MemoryView {
    pub fn from_record(record: &MemoryRecord, salience: f64) -> Self {
        Self {
            id: record.id.clone(),
            content: record.content.clone(),
            primary_sector: record.primary_sector,
            sectors: record.sectors.clone(),
            tags: record.tags.clone(),
            metadata: record.metadata.clone(),
            salience,
            salience0: record.salience,
            decay_lambda: record.decay_lambda,
            embedding_dim: record.embedding.len(),
            created_at: record.created_at,
            last_access_at: record.last_access_at,
        }
    }
}
