//! Core memory engine: classification, decay, similarity search, waypoint
//! graph, write-ahead persistence, and the [`engine::Engine`] that ties them together.

pub mod classifier;
pub mod engine;
pub mod graph;
pub mod index;
pub mod log;
pub mod sector;
pub mod stats;
pub mod store;
pub mod types;

pub use engine::{AddRequest, Engine, QueryRequest};
