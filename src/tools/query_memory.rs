//! MCP `query_memory` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `query_memory` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct QueryMemoryParams {
    #[schemars(description = "Natural language query text")]
    pub query: String,

    #[schemars(description = "Maximum number of results. Defaults to 8.")]
    pub k: Option<usize>,

    #[schemars(
        description = "Only return memories in this sector: 'episodic', 'semantic', 'procedural', 'emotional', 'reflective'"
    )]
    pub sector: Option<String>,

    #[schemars(description = "Only return memories carrying at least one of these tags")]
    pub tags: Option<Vec<String>>,

    #[schemars(description = "Drop results scoring below this value (0.0-1.0)")]
    pub min_score: Option<f64>,

    /// Expand direct hits along waypoint edges.
    #[schemars(
        description = "If true, follow waypoint links from the direct hits and include related memories with their path"
    )]
    pub use_graph: Option<bool>,

    #[schemars(description = "Maximum hops when use_graph is true. Defaults to 2.")]
    pub depth: Option<usize>,
}
