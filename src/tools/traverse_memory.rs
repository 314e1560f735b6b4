//! MCP `traverse_memory` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `traverse_memory` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TraverseMemoryParams {
    #[schemars(description = "IDs of the memories to start from")]
    pub seed_ids: Vec<String>,

    #[schemars(description = "Maximum hops from a seed. Defaults to 2.")]
    pub depth: Option<usize>,

    #[schemars(description = "Maximum number of memories to return. Defaults to 8.")]
    pub k: Option<usize>,
}
