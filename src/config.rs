use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CortexConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub classifier: ClassifierConfig,
    pub sectors: SectorsConfig,
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `hashed`, `openai`, or `ollama`.
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    pub api_base: String,
    pub api_key: String,
    pub timeout_ms: u64,
    /// Target chunk size in estimated tokens (~4 chars each) for long content.
    pub chunk_tokens: usize,
    /// Fraction of a chunk repeated at the start of the next one.
    pub chunk_overlap: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClassifierConfig {
    /// A sector joins `sectors` when its score is at least this fraction of the best score.
    pub secondary_ratio: f64,
}

/// Per-sector overrides. Unset fields fall back to the built-in profile.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SectorProfileConfig {
    pub decay_lambda: Option<f64>,
    pub weight: Option<f64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SectorsConfig {
    pub episodic: SectorProfileConfig,
    pub semantic: SectorProfileConfig,
    pub procedural: SectorProfileConfig,
    pub emotional: SectorProfileConfig,
    pub reflective: SectorProfileConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_k: usize,
    pub max_k: usize,
    pub default_depth: usize,
    pub max_depth: usize,
    /// How many nearest neighbours a new memory is linked to at ingestion.
    pub waypoint_neighbors: usize,
    /// Minimum cosine similarity for a waypoint edge (exclusive).
    pub waypoint_min_similarity: f64,
    pub reinforce_on_query: bool,
    pub query_boost: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            host: "127.0.0.1".into(),
            port: 8080,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_cortex_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "hashed".into(),
            model: "fnv1a-trigram".into(),
            dimensions: 384,
            api_base: String::new(),
            api_key: String::new(),
            timeout_ms: 30_000,
            chunk_tokens: 768,
            chunk_overlap: 0.1,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            secondary_ratio: 0.7,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: 8,
            max_k: 100,
            default_depth: 2,
            max_depth: 5,
            waypoint_neighbors: 5,
            waypoint_min_similarity: 0.75,
            reinforce_on_query: true,
            query_boost: 0.1,
        }
    }
}

/// Returns `~/.cortex/`
pub fn default_cortex_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".cortex")
}

/// Returns the default config file path: `~/.cortex/config.toml`
pub fn default_config_path() -> PathBuf {
    default_cortex_dir().join("config.toml")
}

impl CortexConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            CortexConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// `CORTEX_DB`, `CORTEX_LOG_LEVEL`, `CORTEX_EMBEDDINGS`, `CORTEX_VEC_DIM`,
    /// `CORTEX_PORT`, and `OPENAI_API_KEY` (only fills an empty key).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CORTEX_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("CORTEX_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("CORTEX_EMBEDDINGS") {
            self.embedding.provider = val;
        }
        if let Some(dim) = std::env::var("CORTEX_VEC_DIM")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            self.embedding.dimensions = dim;
        }
        if let Some(port) = std::env::var("CORTEX_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
        {
            self.server.port = port;
        }
        if self.embedding.api_key.is_empty() {
            if let Ok(val) = std::env::var("OPENAI_API_KEY") {
                self.embedding.api_key = val;
            }
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
