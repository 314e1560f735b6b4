//! The memory engine.
//!
//! [`Engine`] owns the SQLite connection, the in-memory projections (record
//! store, similarity index, waypoint graph) and the embedding provider, and
//! exposes every memory operation. One `RwLock` guards the projections:
//! reads share it, and every mutation (ingest, reinforce, delete) takes it
//! exclusively, so read-modify-write cycles on a record never interleave.
//! A mutation commits to SQLite before it touches the projections.
//!
//! All methods are synchronous. Async callers go through
//! `tokio::task::spawn_blocking`.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{CortexConfig, EmbeddingConfig, RetrievalConfig};
use crate::db;
use crate::embedding::{self, embed_content, Chunking, EmbeddingProvider};
use crate::error::{EngineError, Result};
use crate::memory::classifier::classify_with_hint;
use crate::memory::graph::{TraversalHit, WaypointEdge, WaypointGraph};
use crate::memory::index::{SearchFilter, SimilarityIndex};
use crate::memory::log;
use crate::memory::sector::SectorTable;
use crate::memory::stats::{self, HealthResponse, SectorsResponse};
use crate::memory::store::{current_salience, reinforced_salience, validate_boost, MemoryStore};
use crate::memory::types::{MemoryRecord, MemoryView, Sector, SectorSet};

const DEFAULT_SALIENCE: f64 = 0.5;

/// Retrieval and linking knobs, resolved once from config.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub default_k: usize,
    pub max_k: usize,
    pub default_depth: usize,
    pub max_depth: usize,
    pub waypoint_neighbors: usize,
    pub waypoint_min_similarity: f64,
    pub reinforce_on_query: bool,
    pub query_boost: f64,
    pub chunking: Chunking,
}

impl EngineSettings {
    pub fn from_config(config: &CortexConfig) -> Self {
        Self::from_parts(&config.retrieval, &config.embedding)
    }

    pub fn from_parts(retrieval: &RetrievalConfig, embedding: &EmbeddingConfig) -> Self {
        Self {
            default_k: retrieval.default_k.max(1),
            max_k: retrieval.max_k.max(1),
            default_depth: retrieval.default_depth,
            max_depth: retrieval.max_depth,
            waypoint_neighbors: retrieval.waypoint_neighbors,
            waypoint_min_similarity: retrieval.waypoint_min_similarity,
            reinforce_on_query: retrieval.reinforce_on_query,
            query_boost: retrieval.query_boost.clamp(0.0, 1.0),
            chunking: Chunking::from_config(embedding),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_parts(&RetrievalConfig::default(), &EmbeddingConfig::default())
    }
}

/// Input to [`Engine::add`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddRequest {
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Baseline salience, defaults to 0.5.
    #[serde(default, alias = "salience0")]
    pub salience: Option<f64>,
    /// Overrides the primary sector's decay rate.
    #[serde(default)]
    pub decay_lambda: Option<f64>,
}

impl AddRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

/// Result of a successful ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct AddedMemory {
    pub id: String,
    pub primary_sector: Sector,
    pub sectors: SectorSet,
    pub salience: f64,
    pub embedding_dim: usize,
    /// Waypoint edges created for this record.
    pub waypoints: usize,
}

/// Input to [`Engine::query`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QueryRequest {
    pub query: String,
    pub k: Option<usize>,
    #[serde(alias = "sector_filter")]
    pub sector: Option<Sector>,
    #[serde(alias = "tag_filter")]
    pub tags: Vec<String>,
    pub min_score: Option<f64>,
    pub use_graph: bool,
    pub depth: Option<usize>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }
}

/// One ranked query result.
#[derive(Debug, Clone, Serialize)]
pub struct QueryMatch {
    pub id: String,
    pub content: String,
    pub score: f64,
    pub primary_sector: Sector,
    pub sectors: SectorSet,
    pub tags: BTreeSet<String>,
    /// Decayed salience when the query ran, before any query reinforcement.
    pub salience: f64,
    /// Waypoint path from a seed match; present only in graph mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub matches: Vec<QueryMatch>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReinforceResponse {
    pub success: bool,
    pub id: String,
    /// New baseline salience.
    pub salience: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResponse {
    pub items: Vec<MemoryView>,
    pub total: u64,
}

/// In-memory projections rebuilt from SQLite at startup.
struct EngineState {
    store: MemoryStore,
    index: SimilarityIndex,
    graph: WaypointGraph,
}

impl EngineState {
    fn new(dimensions: usize) -> Self {
        Self {
            store: MemoryStore::new(),
            index: SimilarityIndex::new(dimensions),
            graph: WaypointGraph::new(),
        }
    }

    fn salience_of(&self, id: &str, now: DateTime<Utc>) -> f64 {
        self.store
            .get(id)
            .map(|r| current_salience(r, now))
            .unwrap_or(0.0)
    }

    /// Link a new record to its nearest existing neighbours, then add it to
    /// every projection. Returns the number of edges created.
    fn link_and_insert(
        &mut self,
        record: MemoryRecord,
        settings: &EngineSettings,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let neighbors = if settings.waypoint_neighbors > 0 && !self.index.is_empty() {
            let store = &self.store;
            self.index.search(
                &record.embedding,
                settings.waypoint_neighbors,
                &SearchFilter::default(),
                |id| store.get(id).map(|r| current_salience(r, now)).unwrap_or(0.0),
            )?
        } else {
            Vec::new()
        };

        let id = record.id.clone();
        self.index.insert(&record)?;
        if let Err(e) = self.store.insert(record) {
            self.index.remove(&id);
            return Err(e);
        }
        self.graph.add_node(&id);

        let mut edges = 0;
        for hit in neighbors {
            if hit.score > settings.waypoint_min_similarity && self.graph.add_edge(&id, &hit.id, hit.score)
            {
                edges += 1;
            }
        }
        Ok(edges)
    }
}

/// The memory engine. Share it behind an `Arc`.
pub struct Engine {
    conn: Mutex<Connection>,
    state: RwLock<EngineState>,
    provider: Box<dyn EmbeddingProvider>,
    sectors: SectorTable,
    settings: EngineSettings,
    db_path: Option<PathBuf>,
}

impl Engine {
    /// Open the configured database, replay the embedding log, and build the
    /// in-memory projections. The engine is ready to serve once this returns.
    pub fn open(config: &CortexConfig) -> anyhow::Result<Self> {
        let db_path = config.resolved_db_path();
        let conn = db::open_database(&db_path)?;
        let mut engine = Self::from_config(conn, config)?;
        engine.db_path = Some(db_path);
        Ok(engine)
    }

    /// An engine over a fresh in-memory database.
    pub fn open_in_memory(config: &CortexConfig) -> anyhow::Result<Self> {
        let conn = db::open_memory_database()?;
        Self::from_config(conn, config)
    }

    fn from_config(conn: Connection, config: &CortexConfig) -> anyhow::Result<Self> {
        let provider = embedding::create_provider(&config.embedding)?;
        let sectors = SectorTable::from_config(config)?;
        let settings = EngineSettings::from_config(config);
        Ok(Self::with_parts(conn, provider, sectors, settings)?)
    }

    /// Build an engine from explicit parts, replaying whatever `conn` holds.
    pub fn with_parts(
        conn: Connection,
        provider: Box<dyn EmbeddingProvider>,
        sectors: SectorTable,
        settings: EngineSettings,
    ) -> Result<Self> {
        let started = Instant::now();
        check_embedding_identity(&conn, provider.as_ref())?;

        let records = log::replay(&conn, provider.dimensions())?;
        let mut state = EngineState::new(provider.dimensions());
        let now = Utc::now();
        for record in records {
            state
                .link_and_insert(record, &settings, now)
                .map_err(|e| EngineError::RecoveryFailure(e.to_string()))?;
        }

        info!(
            records = state.store.len(),
            waypoints = state.graph.edge_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "recovery finished"
        );

        Ok(Self {
            conn: Mutex::new(conn),
            state: RwLock::new(state),
            provider,
            sectors,
            settings,
            db_path: None,
        })
    }

    fn read_state(&self) -> RwLockReadGuard<'_, EngineState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, EngineState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn sector_table(&self) -> &SectorTable {
        &self.sectors
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn dimensions(&self) -> usize {
        self.provider.dimensions()
    }

    pub fn len(&self) -> usize {
        self.read_state().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── Public API ──

    /// Classify, embed, log, and index new content.
    pub fn add(&self, request: AddRequest) -> Result<AddedMemory> {
        if request.content.trim().is_empty() {
            return Err(EngineError::invalid("content must not be empty"));
        }
        let salience = request.salience.unwrap_or(DEFAULT_SALIENCE);
        if !salience.is_finite() || !(0.0..=1.0).contains(&salience) {
            return Err(EngineError::invalid(format!(
                "salience must be between 0.0 and 1.0, got {salience}"
            )));
        }
        if let Some(lambda) = request.decay_lambda {
            if !lambda.is_finite() || lambda <= 0.0 {
                return Err(EngineError::invalid(format!(
                    "decay_lambda must be > 0, got {lambda}"
                )));
            }
        }

        let classification = classify_with_hint(&request.content, &request.metadata, &self.sectors);
        let embedding = embed_content(self.provider.as_ref(), &request.content, self.settings.chunking)?;

        let now = Utc::now();
        let primary = classification.primary;
        let record = MemoryRecord {
            id: uuid::Uuid::now_v7().to_string(),
            content: request.content,
            embedding,
            primary_sector: primary,
            sectors: classification.sectors,
            tags: normalize_tags(&request.tags),
            metadata: request.metadata,
            salience,
            decay_lambda: request
                .decay_lambda
                .unwrap_or_else(|| self.sectors.decay_lambda(primary)),
            created_at: now,
            last_access_at: now,
        };
        let response = AddedMemory {
            id: record.id.clone(),
            primary_sector: record.primary_sector,
            sectors: record.sectors.clone(),
            salience: record.salience,
            embedding_dim: record.embedding.len(),
            waypoints: 0,
        };

        let mut state = self.write_state();
        log::write_ingest(&mut self.lock_conn(), &record)?;
        let waypoints = state.link_and_insert(record, &self.settings, now)?;

        info!(
            id = %response.id,
            sector = %response.primary_sector,
            waypoints,
            "memory added"
        );
        Ok(AddedMemory {
            waypoints,
            ..response
        })
    }

    /// Similarity search with optional waypoint expansion.
    pub fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let text = normalize_query(&request.query);
        if text.is_empty() {
            return Err(EngineError::invalid("query must not be empty"));
        }
        let k = request.k.unwrap_or(self.settings.default_k);
        if k == 0 {
            return Err(EngineError::invalid("k must be greater than 0"));
        }
        let k = k.min(self.settings.max_k);
        if let Some(min) = request.min_score {
            if !min.is_finite() {
                return Err(EngineError::invalid("min_score must be a finite number"));
            }
        }
        let depth = request
            .depth
            .unwrap_or(self.settings.default_depth)
            .min(self.settings.max_depth);

        let vector = embed_content(self.provider.as_ref(), &text, self.settings.chunking)?;

        let started = Instant::now();
        let now = Utc::now();
        let filter = SearchFilter {
            sector: request.sector,
            tags: normalize_tags(&request.tags),
            min_score: request.min_score,
        };

        let matches = {
            let state = self.read_state();
            let salience_of = |id: &str| state.salience_of(id, now);
            let hits = state.index.search(&vector, k, &filter, &salience_of)?;

            let scored: Vec<(String, f64, Option<Vec<String>>)> = if request.use_graph {
                let seeds: Vec<(String, f64)> =
                    hits.iter().map(|h| (h.id.clone(), h.score)).collect();
                let mut best: HashMap<String, (f64, Vec<String>)> = hits
                    .into_iter()
                    .map(|h| (h.id.clone(), (h.score, vec![h.id])))
                    .collect();

                for hit in state.graph.traverse(&seeds, depth, usize::MAX, &salience_of) {
                    let Some(record) = state.store.get(&hit.id) else {
                        continue;
                    };
                    if !filter.accepts(&record.sectors, &record.tags)
                        || filter.min_score.is_some_and(|min| hit.score < min)
                    {
                        continue;
                    }
                    let better = best
                        .get(&hit.id)
                        .is_none_or(|(score, _)| hit.score > *score);
                    if better {
                        best.insert(hit.id, (hit.score, hit.path));
                    }
                }
                best.into_iter()
                    .map(|(id, (score, path))| (id, score, Some(path)))
                    .collect()
            } else {
                hits.into_iter().map(|h| (h.id, h.score, None)).collect()
            };

            let mut matches: Vec<(QueryMatch, DateTime<Utc>)> = scored
                .into_iter()
                .filter_map(|(id, score, path)| {
                    let record = state.store.get(&id)?;
                    Some((
                        QueryMatch {
                            content: record.content.clone(),
                            score,
                            primary_sector: record.primary_sector,
                            sectors: record.sectors.clone(),
                            tags: record.tags.clone(),
                            salience: current_salience(record, now),
                            path,
                            id,
                        },
                        record.created_at,
                    ))
                })
                .collect();

            matches.sort_by(|(a, a_created), (b, b_created)| {
                b.score
                    .total_cmp(&a.score)
                    .then_with(|| b.salience.total_cmp(&a.salience))
                    .then_with(|| b_created.cmp(a_created))
                    .then_with(|| a.id.cmp(&b.id))
            });
            matches.truncate(k);
            matches.into_iter().map(|(m, _)| m).collect::<Vec<_>>()
        };

        debug!(
            k,
            graph = request.use_graph,
            matches = matches.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "query complete"
        );

        if self.settings.reinforce_on_query && self.settings.query_boost > 0.0 {
            for m in &matches {
                match self.reinforce_at(&m.id, self.settings.query_boost, Utc::now()) {
                    Ok(_) => {}
                    Err(EngineError::NotFound(_)) => {
                        debug!(id = %m.id, "match deleted before reinforcement, skipping");
                    }
                    Err(e) => warn!(id = %m.id, error = %e, "query reinforcement failed"),
                }
            }
        }

        Ok(QueryResponse { matches })
    }

    /// Boost a record's salience and reset its decay clock.
    pub fn reinforce(&self, id: &str, boost: f64) -> Result<ReinforceResponse> {
        validate_boost(boost)?;
        self.reinforce_at(id, boost, Utc::now())
    }

    fn reinforce_at(&self, id: &str, boost: f64, now: DateTime<Utc>) -> Result<ReinforceResponse> {
        let mut state = self.write_state();
        let record = state.store.require(id)?;
        let salience = reinforced_salience(record, boost, now);

        log::write_reinforcement(&self.lock_conn(), id, salience, now)?;
        state.store.set_salience(id, salience, now)?;

        debug!(id = %id, boost, salience, "memory reinforced");
        Ok(ReinforceResponse {
            success: true,
            id: id.to_string(),
            salience,
        })
    }

    /// Remove a record with its index entry and incident waypoint edges.
    pub fn delete(&self, id: &str) -> Result<DeleteResponse> {
        let mut state = self.write_state();
        state.store.require(id)?;

        log::write_tombstone(&mut self.lock_conn(), id, Utc::now())?;
        state.store.remove(id)?;
        state.index.remove(id);
        let edges = state.graph.remove_node(id);

        info!(id = %id, edges, "memory deleted");
        Ok(DeleteResponse {
            success: true,
            id: id.to_string(),
        })
    }

    /// Fetch a record with salience decayed to now. Does not touch recency.
    pub fn get(&self, id: &str) -> Result<MemoryView> {
        let state = self.read_state();
        let record = state.store.require(id)?;
        Ok(MemoryView::from_record(record, current_salience(record, Utc::now())))
    }

    /// Page through records, newest first.
    pub fn list(&self, limit: usize, offset: usize, sector: Option<Sector>) -> ListResponse {
        let now = Utc::now();
        let state = self.read_state();
        let (page, total) = state.store.page(limit, offset, sector);
        ListResponse {
            items: page
                .into_iter()
                .map(|r| MemoryView::from_record(r, current_salience(r, now)))
                .collect(),
            total: total as u64,
        }
    }

    /// Sector names with per-sector counts and average decayed salience.
    pub fn sectors(&self) -> SectorsResponse {
        stats::sector_stats(&self.read_state().store, &self.sectors, Utc::now())
    }

    /// Liveness and size summary.
    pub fn health(&self) -> Result<HealthResponse> {
        let (memory_count, waypoint_count, (oldest, newest)) = {
            let state = self.read_state();
            (
                state.store.len() as u64,
                state.graph.edge_count() as u64,
                stats::time_range(&state.store),
            )
        };

        let conn = self.lock_conn();
        let page_count: i64 = conn.query_row("PRAGMA page_count", [], |r| r.get(0))?;
        let page_size: i64 = conn.query_row("PRAGMA page_size", [], |r| r.get(0))?;
        let db_size_estimate = match &self.db_path {
            Some(path) => std::fs::metadata(path)
                .map(|m| m.len())
                .unwrap_or((page_count * page_size) as u64),
            None => (page_count * page_size) as u64,
        };

        Ok(HealthResponse {
            status: "ok".into(),
            memory_count,
            db_size_estimate,
            waypoint_count,
            embedding_provider: self.provider.name().to_string(),
            embedding_dimensions: self.provider.dimensions(),
            oldest_memory: oldest,
            newest_memory: newest,
        })
    }

    /// Expand from explicit seed ids over the waypoint graph. Each seed scores 1.0.
    pub fn traverse(&self, seed_ids: &[String], depth: usize, k: usize) -> Result<Vec<TraversalHit>> {
        if k == 0 {
            return Err(EngineError::invalid("k must be greater than 0"));
        }
        if seed_ids.is_empty() {
            return Err(EngineError::invalid("at least one seed id is required"));
        }
        let depth = depth.min(self.settings.max_depth);
        let now = Utc::now();

        let state = self.read_state();
        for id in seed_ids {
            state.store.require(id)?;
        }
        let seeds: Vec<(String, f64)> = seed_ids.iter().map(|id| (id.clone(), 1.0)).collect();
        Ok(state
            .graph
            .traverse(&seeds, depth, k, |id| state.salience_of(id, now)))
    }

    /// Waypoint edges of a record, strongest first.
    pub fn waypoints(&self, id: &str) -> Result<Vec<WaypointEdge>> {
        let state = self.read_state();
        state.store.require(id)?;
        Ok(state.graph.neighbors(id))
    }
}

/// Refuse to replay vectors produced by a different provider or dimension.
/// An empty store adopts the configured identity.
fn check_embedding_identity(conn: &Connection, provider: &dyn EmbeddingProvider) -> Result<()> {
    let stored_model = db::migrations::get_embedding_model(conn)?;
    let stored_dim = db::migrations::get_embedding_dimensions(conn)?;
    let model_changed = stored_model.as_deref().is_some_and(|m| m != provider.name());
    let dim_changed = stored_dim.is_some_and(|d| d != provider.dimensions());

    if model_changed || dim_changed {
        let stored = format!(
            "{}/{}d",
            stored_model.as_deref().unwrap_or("unknown"),
            stored_dim.map_or_else(|| "?".to_string(), |d| d.to_string())
        );
        let configured = format!("{}/{}d", provider.name(), provider.dimensions());
        if log::has_live_vectors(conn)? {
            return Err(EngineError::RecoveryFailure(format!(
                "stored vectors were produced by {stored}, configured provider is {configured}"
            )));
        }
        warn!(stored = %stored, configured = %configured, "embedding identity changed on an empty store");
    }

    if stored_model.is_none() || model_changed {
        db::migrations::set_embedding_model(conn, provider.name())?;
    }
    if stored_dim.is_none() || dim_changed {
        db::migrations::set_embedding_dimensions(conn, provider.dimensions())?;
    }
    Ok(())
}

fn normalize_tags(tags: &[String]) -> BTreeSet<String> {
    tags.iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}
