pub mod add_memory;
pub mod delete_memory;
pub mod get_memory;
pub mod list_memories;
pub mod query_memory;
pub mod reinforce_memory;
pub mod traverse_memory;

use std::sync::Arc;

use add_memory::AddMemoryParams;
use delete_memory::DeleteMemoryParams;
use get_memory::GetMemoryParams;
use list_memories::ListMemoriesParams;
use query_memory::QueryMemoryParams;
use reinforce_memory::ReinforceMemoryParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use serde::Serialize;
use traverse_memory::TraverseMemoryParams;

use crate::api::DEFAULT_REINFORCE_BOOST;
use crate::error::EngineError;
use crate::memory::engine::{AddRequest, QueryRequest};
use crate::memory::types::Sector;
use crate::memory::Engine;
use crate::server::run_blocking;

const DEFAULT_LIST_LIMIT: usize = 100;

/// The Cortex MCP tool handler. Every tool is a thin call into the shared
/// [`Engine`], run on the blocking pool.
#[derive(Clone)]
pub struct CortexTools {
    tool_router: ToolRouter<Self>,
    engine: Arc<Engine>,
}

fn tool_error(err: EngineError) -> String {
    format!("{}: {err}", err.code())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| format!("serialization failed: {e}"))
}

fn parse_sector(sector: Option<&str>) -> Result<Option<Sector>, String> {
    sector
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<Sector>())
        .transpose()
        .map_err(|e| tool_error(EngineError::InvalidArgument(e)))
}

#[tool_router]
impl CortexTools {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            engine,
        }
    }

    /// Store a new memory.
    #[tool(description = "Store a new memory. It is classified into cognitive sectors (episodic, semantic, procedural, emotional, reflective), embedded, and linked to similar memories.")]
    async fn add_memory(
        &self,
        Parameters(params): Parameters<AddMemoryParams>,
    ) -> Result<String, String> {
        tracing::info!(content_len = params.content.len(), "add_memory called");

        let request = AddRequest {
            content: params.content,
            tags: params.tags.unwrap_or_default(),
            metadata: params.metadata.unwrap_or_default(),
            salience: params.salience,
            decay_lambda: params.decay_lambda,
        };
        let added = run_blocking(&self.engine, move |e| e.add(request))
            .await
            .map_err(tool_error)?;
        to_json(&added)
    }

    /// Ranked similarity search, optionally expanded over waypoints.
    #[tool(description = "Search memories by natural language query. Results are ranked by similarity weighted with current salience. Set use_graph to also follow links to related memories.")]
    async fn query_memory(
        &self,
        Parameters(params): Parameters<QueryMemoryParams>,
    ) -> Result<String, String> {
        tracing::info!(query = %params.query, "query_memory called");

        let request = QueryRequest {
            query: params.query,
            k: params.k,
            sector: parse_sector(params.sector.as_deref())?,
            tags: params.tags.unwrap_or_default(),
            min_score: params.min_score,
            use_graph: params.use_graph.unwrap_or(false),
            depth: params.depth,
        };
        let response = run_blocking(&self.engine, move |e| e.query(&request))
            .await
            .map_err(tool_error)?;
        to_json(&response)
    }

    #[tool(description = "Fetch a memory by ID with its current salience, and optionally its waypoint links.")]
    async fn get_memory(
        &self,
        Parameters(params): Parameters<GetMemoryParams>,
    ) -> Result<String, String> {
        let include_waypoints = params.include_waypoints.unwrap_or(false);
        let value = run_blocking(&self.engine, move |e| {
            let view = e.get(&params.id)?;
            let mut value = serde_json::to_value(&view)
                .map_err(|err| EngineError::Internal(err.to_string()))?;
            if include_waypoints {
                let edges = e.waypoints(&params.id)?;
                value["waypoints"] = serde_json::to_value(&edges)
                    .map_err(|err| EngineError::Internal(err.to_string()))?;
            }
            Ok(value)
        })
        .await
        .map_err(tool_error)?;
        Ok(value.to_string())
    }

    #[tool(description = "List memories newest first, optionally restricted to one sector.")]
    async fn list_memories(
        &self,
        Parameters(params): Parameters<ListMemoriesParams>,
    ) -> Result<String, String> {
        let sector = parse_sector(params.sector.as_deref())?;
        let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
        let offset = params.offset.unwrap_or(0);
        let page = run_blocking(&self.engine, move |e| Ok(e.list(limit, offset, sector)))
            .await
            .map_err(tool_error)?;
        to_json(&page)
    }

    #[tool(description = "Reinforce a memory: raise its salience by boost (default 0.1, capped at 1.0) and restart its decay clock.")]
    async fn reinforce_memory(
        &self,
        Parameters(params): Parameters<ReinforceMemoryParams>,
    ) -> Result<String, String> {
        let boost = params.boost.unwrap_or(DEFAULT_REINFORCE_BOOST);
        tracing::info!(id = %params.id, boost, "reinforce_memory called");
        let response = run_blocking(&self.engine, move |e| e.reinforce(&params.id, boost))
            .await
            .map_err(tool_error)?;
        to_json(&response)
    }

    #[tool(description = "Permanently delete a memory and its waypoint links.")]
    async fn delete_memory(
        &self,
        Parameters(params): Parameters<DeleteMemoryParams>,
    ) -> Result<String, String> {
        tracing::info!(id = %params.id, "delete_memory called");
        let response = run_blocking(&self.engine, move |e| e.delete(&params.id))
            .await
            .map_err(tool_error)?;
        to_json(&response)
    }

    /// Multi-hop expansion from explicit seeds.
    #[tool(description = "Follow waypoint links outward from the given memory IDs and return related memories with the path that reached them.")]
    async fn traverse_memory(
        &self,
        Parameters(params): Parameters<TraverseMemoryParams>,
    ) -> Result<String, String> {
        let settings = self.engine.settings();
        let depth = params.depth.unwrap_or(settings.default_depth);
        let k = params.k.unwrap_or(settings.default_k);
        let hits = run_blocking(&self.engine, move |e| e.traverse(&params.seed_ids, depth, k))
            .await
            .map_err(tool_error)?;
        to_json(&serde_json::json!({ "hits": hits }))
    }

    #[tool(description = "List the cognitive sectors with memory counts, average salience, and decay rates.")]
    async fn memory_sectors(&self) -> Result<String, String> {
        let sectors = run_blocking(&self.engine, |e| Ok(e.sectors()))
            .await
            .map_err(tool_error)?;
        to_json(&sectors)
    }

    #[tool(description = "Report engine health: memory and waypoint counts, storage size, and the embedding provider in use.")]
    async fn memory_health(&self) -> Result<String, String> {
        let health = run_blocking(&self.engine, |e| e.health())
            .await
            .map_err(tool_error)?;
        to_json(&health)
    }
}

#[tool_handler]
impl ServerHandler for CortexTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Cortex is a brain-inspired memory server. Use add_memory to save memories, \
                 query_memory to search (set use_graph for related memories), and \
                 reinforce_memory to keep important memories from fading."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sector_parsing_for_tools() {
        assert_eq!(parse_sector(None).unwrap(), None);
        assert_eq!(parse_sector(Some("  ")).unwrap(), None);
        assert_eq!(parse_sector(Some("Semantic")).unwrap(), Some(Sector::Semantic));
        let err = parse_sector(Some("dreams")).unwrap_err();
        assert!(err.starts_with("invalid_argument"));
    }

    #[test]
    fn tool_errors_carry_code() {
        let msg = tool_error(EngineError::NotFound("abc".into()));
        assert_eq!(msg, "not_found: memory not found: abc");
    }
}
