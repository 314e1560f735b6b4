//! In-memory record store and the salience decay model.
//!
//! [`MemoryStore`] is an arena of records in ingestion order plus an id → slot
//! map. Slots are never reused, so iteration order is stable and newest-first
//! listing is a reverse walk. Salience is never stored decayed: the stored
//! baseline and `last_access_at` are the single source of truth, and
//! [`current_salience`] derives the value at any instant.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::{EngineError, Result};
use crate::memory::types::{MemoryRecord, Sector};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Decayed salience of `record` at `now`.
///
/// `salience0 * exp(-lambda * days_since_last_access)`, floored at zero. A
/// `now` earlier than the last access counts as zero elapsed time.
pub fn current_salience(record: &MemoryRecord, now: DateTime<Utc>) -> f64 {
    decayed(record.salience, record.decay_lambda, record.last_access_at, now)
}

pub(crate) fn decayed(
    salience0: f64,
    decay_lambda: f64,
    last_access_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f64 {
    let elapsed_ms = (now - last_access_at).num_milliseconds().max(0) as f64;
    let days = elapsed_ms / MILLIS_PER_DAY;
    (salience0 * (-decay_lambda * days).exp()).max(0.0)
}

/// Salience after reinforcing with `boost` at `now`: decayed value plus boost, capped at 1.0.
pub fn reinforced_salience(record: &MemoryRecord, boost: f64, now: DateTime<Utc>) -> f64 {
    (current_salience(record, now) + boost).clamp(0.0, 1.0)
}

/// Validate a reinforcement boost.
pub fn validate_boost(boost: f64) -> Result<()> {
    if !boost.is_finite() || !(0.0..=1.0).contains(&boost) {
        return Err(EngineError::invalid(format!(
            "boost must be between 0.0 and 1.0, got {boost}"
        )));
    }
    Ok(())
}

/// Authoritative in-memory set of memory records.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Vec<Option<MemoryRecord>>,
    by_id: HashMap<String, usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&MemoryRecord> {
        self.by_id
            .get(id)
            .and_then(|&slot| self.slots[slot].as_ref())
    }

    /// Look up a record, failing with NotFound.
    pub fn require(&self, id: &str) -> Result<&MemoryRecord> {
        self.get(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    /// Insert a new record. Ids are never reused, so a duplicate is a caller bug.
    pub fn insert(&mut self, record: MemoryRecord) -> Result<()> {
        if self.by_id.contains_key(&record.id) {
            return Err(EngineError::invalid(format!(
                "duplicate memory id: {}",
                record.id
            )));
        }
        let slot = self.slots.len();
        self.by_id.insert(record.id.clone(), slot);
        self.slots.push(Some(record));
        Ok(())
    }

    /// Remove a record, returning it.
    pub fn remove(&mut self, id: &str) -> Result<MemoryRecord> {
        let slot = self
            .by_id
            .remove(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        self.slots[slot]
            .take()
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    /// Overwrite the mutable salience state of a record.
    pub fn set_salience(
        &mut self,
        id: &str,
        salience: f64,
        last_access_at: DateTime<Utc>,
    ) -> Result<()> {
        let slot = *self
            .by_id
            .get(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        let record = self.slots[slot]
            .as_mut()
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        record.salience = salience.clamp(0.0, 1.0);
        record.last_access_at = last_access_at;
        Ok(())
    }

    /// Records in ingestion order, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &MemoryRecord> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    /// One page of records, newest first, optionally restricted to a sector.
    /// Returns the page and the total number of matching records.
    pub fn page(
        &self,
        limit: usize,
        offset: usize,
        sector: Option<Sector>,
    ) -> (Vec<&MemoryRecord>, usize) {
        let matching = || {
            self.iter()
                .rev()
                .filter(move |r| sector.is_none_or(|s| r.has_sector(s)))
        };
        let total = matching().count();
        let items = matching().skip(offset).take(limit).collect();
        (items, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(id: &str, salience: f64, lambda: f64, at: DateTime<Utc>) -> MemoryRecord {
        MemoryRecord {
            id: id.into(),
            content: format!("content of {id}"),
            embedding: vec![1.0, 0.0],
            primary_sector: Sector::Episodic,
            sectors: [Sector::Episodic].into_iter().collect(),
            tags: Default::default(),
            metadata: Default::default(),
            salience,
            decay_lambda: lambda,
            created_at: at,
            last_access_at: at,
        }
    }

    #[test]
    fn salience_decays_exponentially() {
        let t0 = Utc::now();
        let r = record("a", 0.8, 0.1, t0);
        assert!((current_salience(&r, t0) - 0.8).abs() < 1e-12);
        let ten_days = t0 + Duration::days(10);
        let expected = 0.8 * (-1.0f64).exp();
        assert!((current_salience(&r, ten_days) - expected).abs() < 1e-9);
    }

    #[test]
    fn salience_is_monotone_non_increasing() {
        let t0 = Utc::now();
        let r = record("a", 1.0, 0.02, t0);
        let mut prev = current_salience(&r, t0);
        for hours in (1..500).step_by(7) {
            let s = current_salience(&r, t0 + Duration::hours(hours));
            assert!(s <= prev, "salience rose at {hours}h");
            assert!(s >= 0.0);
            prev = s;
        }
    }

    #[test]
    fn clock_skew_counts_as_no_elapsed_time() {
        let t0 = Utc::now();
        let r = record("a", 0.6, 0.5, t0);
        assert_eq!(current_salience(&r, t0 - Duration::days(3)), 0.6);
    }

    #[test]
    fn reinforce_at_zero_elapsed_adds_boost() {
        let t0 = Utc::now();
        let r = record("a", 0.5, 0.015, t0);
        assert!((reinforced_salience(&r, 0.3, t0) - 0.8).abs() < 1e-12);
        assert_eq!(reinforced_salience(&r, 0.9, t0), 1.0);
    }

    #[test]
    fn reinforce_starts_from_decayed_value() {
        let t0 = Utc::now();
        let r = record("a", 0.5, 0.1, t0);
        let later = t0 + Duration::days(7);
        let expected = 0.5 * (-0.7f64).exp() + 0.2;
        assert!((reinforced_salience(&r, 0.2, later) - expected).abs() < 1e-9);
    }

    #[test]
    fn boost_validation() {
        assert!(validate_boost(0.0).is_ok());
        assert!(validate_boost(1.0).is_ok());
        assert!(validate_boost(-0.1).is_err());
        assert!(validate_boost(f64::NAN).is_err());
    }

    #[test]
    fn insert_get_remove() {
        let mut store = MemoryStore::new();
        let t0 = Utc::now();
        store.insert(record("a", 0.5, 0.01, t0)).unwrap();
        store.insert(record("b", 0.5, 0.01, t0)).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.insert(record("a", 0.1, 0.01, t0)).is_err());

        let removed = store.remove("a").unwrap();
        assert_eq!(removed.id, "a");
        assert!(store.get("a").is_none());
        assert!(matches!(store.remove("a"), Err(EngineError::NotFound(_))));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn set_salience_updates_clock() {
        let mut store = MemoryStore::new();
        let t0 = Utc::now();
        store.insert(record("a", 0.5, 0.01, t0)).unwrap();
        let t1 = t0 + Duration::hours(5);
        store.set_salience("a", 1.7, t1).unwrap();
        let r = store.get("a").unwrap();
        assert_eq!(r.salience, 1.0);
        assert_eq!(r.last_access_at, t1);
        assert!(store.set_salience("zzz", 0.1, t1).is_err());
    }

    #[test]
    fn page_is_newest_first_with_total() {
        let mut store = MemoryStore::new();
        let t0 = Utc::now();
        for i in 0..5 {
            let mut r = record(&format!("m{i}"), 0.5, 0.01, t0);
            if i % 2 == 0 {
                r.sectors.insert(Sector::Semantic);
            }
            store.insert(r).unwrap();
        }
        store.remove("m3").unwrap();

        let (items, total) = store.page(2, 0, None);
        assert_eq!(total, 4);
        let ids: Vec<&str> = items.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["m4", "m2"]);

        let (items, total) = store.page(10, 1, Some(Sector::Semantic));
        assert_eq!(total, 3);
        let ids: Vec<&str> = items.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["m2", "m0"]);
    }
}
