//! Cosine-similarity index over record embeddings.
//!
//! A flat exact index with two posting structures for filtering: one id set
//! per sector and one per tag. A filtered search scans only the smaller of the
//! matching postings, so cost follows the filtered candidate set rather than
//! the whole store. The index holds ids and vectors only; content, salience
//! and everything else stay in the [`MemoryStore`](super::store::MemoryStore).

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};

use crate::embedding::cosine_similarity;
use crate::error::{EngineError, Result};
use crate::memory::types::{MemoryRecord, Sector, SectorSet};

#[derive(Debug, Clone)]
struct IndexEntry {
    embedding: Vec<f32>,
    sectors: SectorSet,
    tags: BTreeSet<String>,
    created_at: DateTime<Utc>,
}

/// Filters applied before ranking.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Record must carry this sector in its `sectors`.
    pub sector: Option<Sector>,
    /// Record must share at least one tag. Empty means no tag filter.
    pub tags: BTreeSet<String>,
    /// Minimum cosine score (inclusive).
    pub min_score: Option<f64>,
}

impl SearchFilter {
    pub fn accepts(&self, sectors: &SectorSet, tags: &BTreeSet<String>) -> bool {
        self.sector.is_none_or(|s| sectors.contains(&s))
            && (self.tags.is_empty() || self.tags.iter().any(|t| tags.contains(t)))
    }
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
}

#[derive(Debug, Default)]
pub struct SimilarityIndex {
    dimensions: usize,
    entries: HashMap<String, IndexEntry>,
    by_sector: [HashSet<String>; 5],
    by_tag: HashMap<String, HashSet<String>>,
}

impl SimilarityIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Index a record. Re-inserting an id replaces the previous entry.
    pub fn insert(&mut self, record: &MemoryRecord) -> Result<()> {
        if record.embedding.len() != self.dimensions {
            return Err(EngineError::invalid(format!(
                "embedding has {} dimensions, index expects {}",
                record.embedding.len(),
                self.dimensions
            )));
        }
        self.remove(&record.id);

        for sector in &record.sectors {
            self.by_sector[sector.index()].insert(record.id.clone());
        }
        for tag in &record.tags {
            self.by_tag
                .entry(tag.clone())
                .or_default()
                .insert(record.id.clone());
        }
        self.entries.insert(
            record.id.clone(),
            IndexEntry {
                embedding: record.embedding.clone(),
                sectors: record.sectors.clone(),
                tags: record.tags.clone(),
                created_at: record.created_at,
            },
        );
        Ok(())
    }

    /// Drop a record from the index. Returns whether it was present.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(entry) = self.entries.remove(id) else {
            return false;
        };
        for sector in &entry.sectors {
            self.by_sector[sector.index()].remove(id);
        }
        for tag in &entry.tags {
            if let Some(ids) = self.by_tag.get_mut(tag) {
                ids.remove(id);
                if ids.is_empty() {
                    self.by_tag.remove(tag);
                }
            }
        }
        true
    }

    /// Top-`k` records by cosine similarity to `query`.
    ///
    /// Ordered by score descending, then by `salience(id)` descending, then by
    /// creation time (newest first), then by id so equal keys stay stable.
    /// Returns fewer than `k` hits when fewer records pass the filter.
    pub fn search<F>(
        &self,
        query: &[f32],
        k: usize,
        filter: &SearchFilter,
        salience: F,
    ) -> Result<Vec<SearchHit>>
    where
        F: Fn(&str) -> f64,
    {
        if query.len() != self.dimensions {
            return Err(EngineError::invalid(format!(
                "query vector has {} dimensions, index expects {}",
                query.len(),
                self.dimensions
            )));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(&str, f64, f64, DateTime<Utc>)> = self
            .candidates(filter)
            .into_iter()
            .filter_map(|id| self.entries.get_key_value(id))
            .filter(|(_, e)| filter.accepts(&e.sectors, &e.tags))
            .map(|(id, e)| (id.as_str(), cosine_similarity(query, &e.embedding), e))
            .filter(|(_, score, _)| filter.min_score.is_none_or(|min| *score >= min))
            .map(|(id, score, e)| (id, score, salience(id), e.created_at))
            .collect();

        scored.sort_by(|a, b| {
            b.1.total_cmp(&a.1)
                .then_with(|| b.2.total_cmp(&a.2))
                .then_with(|| b.3.cmp(&a.3))
                .then_with(|| a.0.cmp(b.0))
        });
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(id, score, _, _)| SearchHit {
                id: id.to_string(),
                score,
            })
            .collect())
    }

    /// Ids worth scoring for `filter`: the smallest posting that must contain
    /// every match, or every id when nothing narrows the search.
    fn candidates<'a>(&'a self, filter: &SearchFilter) -> Vec<&'a str> {
        let sector_ids = filter.sector.map(|s| &self.by_sector[s.index()]);

        let tag_ids = (!filter.tags.is_empty()).then(|| {
            let mut union: HashSet<&'a str> = HashSet::new();
            for tag in &filter.tags {
                if let Some(ids) = self.by_tag.get(tag) {
                    union.extend(ids.iter().map(String::as_str));
                }
            }
            union
        });

        match (sector_ids, tag_ids) {
            (Some(s), Some(t)) if s.len() < t.len() => s.iter().map(String::as_str).collect(),
            (_, Some(t)) => t.into_iter().collect(),
            (Some(s), None) => s.iter().map(String::as_str).collect(),
            (None, None) => self.entries.keys().map(String::as_str).collect(),
        }
    }
}

/// Rank order shared by search and traversal: score, then salience, both descending.
pub(crate) fn by_score_then_salience(a: (f64, f64), b: (f64, f64)) -> Ordering {
    b.0.total_cmp(&a.0).then_with(|| b.1.total_cmp(&a.1))
}
