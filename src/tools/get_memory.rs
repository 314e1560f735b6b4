use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetMemoryParams {
    #[schemars(description = "ID of the memory to fetch")]
    pub id: String,

    #[schemars(description = "If true, include the memory's waypoint links")]
    pub include_waypoints: Option<bool>,
}
