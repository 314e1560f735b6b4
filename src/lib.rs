//! Brain-inspired memory for AI agents: sector classification, salience
//! decay, vector recall, and waypoint graph traversal.
//!
//! Cortex stores short pieces of text as memories. Each one is classified into
//! one or more cognitive sectors, each with its own decay rate:
//!
//! | Sector | Holds | Decay λ/day |
//! |--------|-------|-------------|
//! | **Episodic** | Events anchored in time | 0.015 |
//! | **Semantic** | Facts and definitions | 0.005 |
//! | **Procedural** | Steps and instructions | 0.008 |
//! | **Emotional** | Feelings and affect | 0.020 |
//! | **Reflective** | Insight and self-reflection | 0.001 |
//!
//! Salience fades as `s0 · e^(−λ·days)` since last access and is restored by
//! reinforcement. Queries rank by cosine similarity weighted with current
//! salience, and can follow "waypoint" edges between closely related memories.
//!
//! # Architecture
//!
//! - **Storage**: SQLite holds the records plus a write-ahead embedding log
//!   that is replayed at startup to rebuild the in-memory index and graph
//! - **Embeddings**: deterministic feature hashing by default, or an
//!   OpenAI-compatible / Ollama endpoint
//! - **Transport**: MCP over stdio, or a JSON HTTP API with MCP at `/mcp`
//!
//! # Modules
//!
//! - [`config`]: configuration from TOML files and environment variables
//! - [`db`]: SQLite initialization, schema, migrations, and health checks
//! - [`embedding`]: embedding providers, chunking, and vector math
//! - [`memory`]: the engine and its parts
//! - [`api`], [`tools`], [`server`]: HTTP and MCP surfaces
//! - [`cli`]: terminal commands

pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod memory;
pub mod server;
pub mod tools;

pub use error::{EngineError, Result};
pub use memory::Engine;
