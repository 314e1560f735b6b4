//! MCP `add_memory` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `add_memory` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AddMemoryParams {
    /// The text to remember.
    #[schemars(description = "The natural language content of the memory")]
    pub content: String,

    #[schemars(description = "Optional tags used for filtering at query time")]
    pub tags: Option<Vec<String>>,

    /// Free-form JSON object. A `"sector"` key overrides classification.
    #[schemars(
        description = "Optional JSON object of metadata. Set \"sector\" to one of episodic, semantic, procedural, emotional, reflective to skip classification."
    )]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,

    #[schemars(description = "Initial salience 0.0-1.0. Defaults to 1.0.")]
    pub salience: Option<f64>,

    #[schemars(description = "Decay rate per day. Defaults to the primary sector's rate.")]
    pub decay_lambda: Option<f64>,
}
