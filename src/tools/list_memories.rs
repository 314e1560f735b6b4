use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListMemoriesParams {
    #[schemars(description = "Page size. Defaults to 100.")]
    pub limit: Option<usize>,

    #[schemars(description = "Number of memories to skip, newest first. Defaults to 0.")]
    pub offset: Option<usize>,

    #[schemars(description = "Only list memories belonging to this sector")]
    pub sector: Option<String>,
}
