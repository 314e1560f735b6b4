use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ReinforceMemoryParams {
    #[schemars(description = "ID of the memory to reinforce")]
    pub id: String,

    #[schemars(description = "Salience to add (0.0-1.0). Defaults to 0.1.")]
    pub boost: Option<f64>,
}
