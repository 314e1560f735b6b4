use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::memory::sector::SectorTable;
use crate::memory::store::{current_salience, MemoryStore};
use crate::memory::types::Sector;

/// Per-sector summary, counted by primary sector.
#[derive(Debug, Clone, Serialize)]
pub struct SectorStat {
    pub sector: Sector,
    pub count: u64,
    /// Mean decayed salience; 0.0 for an empty sector.
    pub avg_salience: f64,
    /// Configured default decay rate per day.
    pub decay_lambda: f64,
}

/// Response from `sectors()`.
#[derive(Debug, Clone, Serialize)]
pub struct SectorsResponse {
    pub sectors: Vec<Sector>,
    pub stats: Vec<SectorStat>,
}

/// Response from `health()`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub memory_count: u64,
    /// `page_count * page_size` of the backing database.
    pub db_size_estimate: u64,
    pub waypoint_count: u64,
    pub embedding_provider: String,
    pub embedding_dimensions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_memory: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_memory: Option<DateTime<Utc>>,
}

/// Count and average decayed salience for every sector, empty ones included.
pub fn sector_stats(store: &MemoryStore, table: &SectorTable, now: DateTime<Utc>) -> SectorsResponse {
    let mut counts = [0u64; 5];
    let mut sums = [0.0f64; 5];
    for record in store.iter() {
        let i = record.primary_sector.index();
        counts[i] += 1;
        sums[i] += current_salience(record, now);
    }

    let stats = Sector::ALL
        .iter()
        .map(|&sector| {
            let i = sector.index();
            SectorStat {
                sector,
                count: counts[i],
                avg_salience: if counts[i] == 0 {
                    0.0
                } else {
                    sums[i] / counts[i] as f64
                },
                decay_lambda: table.decay_lambda(sector),
            }
        })
        .collect();

    SectorsResponse {
        sectors: Sector::ALL.to_vec(),
        stats,
    }
}

/// Oldest and newest creation timestamps.
pub fn time_range(store: &MemoryStore) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let oldest = store.iter().map(|r| r.created_at).min();
    let newest = store.iter().map(|r| r.created_at).max();
    (oldest, newest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::MemoryRecord;

    fn insert(store: &mut MemoryStore, id: &str, sector: Sector, salience: f64) {
        let now = Utc::now();
        store
            .insert(MemoryRecord {
                id: id.into(),
                content: id.into(),
                embedding: vec![1.0],
                primary_sector: sector,
                sectors: [sector, Sector::Reflective].into_iter().collect(),
                tags: Default::default(),
                metadata: Default::default(),
                salience,
                decay_lambda: 0.01,
                created_at: now,
                last_access_at: now,
            })
            .unwrap();
    }

    #[test]
    fn empty_store_reports_every_sector() {
        let stats = sector_stats(&MemoryStore::new(), &SectorTable::default(), Utc::now());
        assert_eq!(stats.sectors.len(), 5);
        assert_eq!(stats.stats.len(), 5);
        assert!(stats.stats.iter().all(|s| s.count == 0 && s.avg_salience == 0.0));
    }

    #[test]
    fn counts_by_primary_sector() {
        let mut store = MemoryStore::new();
        insert(&mut store, "a", Sector::Semantic, 0.4);
        insert(&mut store, "b", Sector::Semantic, 0.8);
        insert(&mut store, "c", Sector::Episodic, 1.0);

        let now = store.get("a").unwrap().last_access_at;
        let stats = sector_stats(&store, &SectorTable::default(), now);
        let semantic = &stats.stats[Sector::Semantic.index()];
        assert_eq!(semantic.count, 2);
        assert!((semantic.avg_salience - 0.6).abs() < 1e-9);
        assert_eq!(semantic.decay_lambda, 0.005);
        // secondary memberships are not counted
        assert_eq!(stats.stats[Sector::Reflective.index()].count, 0);
    }

    #[test]
    fn time_range_of_store() {
        let mut store = MemoryStore::new();
        assert_eq!(time_range(&store), (None, None));
        insert(&mut store, "a", Sector::Semantic, 0.4);
        let (oldest, newest) = time_range(&store);
        assert!(oldest.is_some());
        assert_eq!(oldest, newest);
    }
}
