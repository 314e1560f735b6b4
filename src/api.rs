//! JSON HTTP API over the memory engine.
//!
//! Every handler hands its engine call to the blocking pool through
//! [`run_blocking`], since embedding and SQLite writes are synchronous.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::error::EngineError;
use crate::memory::engine::{
    AddRequest, AddedMemory, DeleteResponse, ListResponse, QueryRequest, QueryResponse,
    ReinforceResponse,
};
use crate::memory::stats::{HealthResponse, SectorsResponse};
use crate::memory::types::{MemoryView, Sector};
use crate::memory::Engine;
use crate::server::run_blocking;

/// Boost applied by `POST /memory/reinforce` when the body omits one.
pub const DEFAULT_REINFORCE_BOOST: f64 = 0.1;

const DEFAULT_LIST_LIMIT: usize = 100;

/// Build the REST router. Routes:
///
/// - `GET /health`, `GET /sectors`
/// - `POST /memory/add`, `POST /memory/query`, `POST /memory/reinforce`
/// - `GET /memory/all?l=&u=&sector=`
/// - `GET /memory/{id}`, `DELETE /memory/{id}`
pub fn create_router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sectors", get(sectors))
        .route("/memory/add", post(add_memory))
        .route("/memory/query", post(query_memory))
        .route("/memory/reinforce", post(reinforce_memory))
        .route("/memory/all", get(list_memories))
        .route("/memory/{id}", get(get_memory).delete(delete_memory))
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

// -- errors --

/// Wire shape of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub err: String,
    pub message: String,
}

/// Engine error rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            EngineError::EmbeddingFailure(_) => StatusCode::BAD_GATEWAY,
            EngineError::RecoveryFailure(_)
            | EngineError::Storage(_)
            | EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = ErrorBody {
            err: self.0.code().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

// -- request bodies --

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QueryFilters {
    sector: Option<Sector>,
    tags: Vec<String>,
    min_score: Option<f64>,
}

/// `POST /memory/query` body. Filters may be given at the top level or
/// nested under `filters`; top-level values win.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct QueryBody {
    query: String,
    k: Option<usize>,
    #[serde(alias = "sector_filter")]
    sector: Option<Sector>,
    #[serde(alias = "tag_filter")]
    tags: Vec<String>,
    min_score: Option<f64>,
    use_graph: bool,
    depth: Option<usize>,
    filters: Option<QueryFilters>,
}

impl From<QueryBody> for QueryRequest {
    fn from(body: QueryBody) -> Self {
        let filters = body.filters.unwrap_or_default();
        QueryRequest {
            query: body.query,
            k: body.k,
            sector: body.sector.or(filters.sector),
            tags: if body.tags.is_empty() {
                filters.tags
            } else {
                body.tags
            },
            min_score: body.min_score.or(filters.min_score),
            use_graph: body.use_graph,
            depth: body.depth,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReinforceBody {
    id: String,
    boost: Option<f64>,
}

/// `GET /memory/all` query string: `l` is the page size, `u` the offset.
#[derive(Debug, Deserialize)]
struct ListParams {
    l: Option<usize>,
    u: Option<usize>,
    sector: Option<String>,
}

// -- handlers --

async fn health(State(engine): State<Arc<Engine>>) -> ApiResult<HealthResponse> {
    Ok(Json(run_blocking(&engine, |e| e.health()).await?))
}

async fn sectors(State(engine): State<Arc<Engine>>) -> ApiResult<SectorsResponse> {
    Ok(Json(run_blocking(&engine, |e| Ok(e.sectors())).await?))
}

async fn add_memory(
    State(engine): State<Arc<Engine>>,
    Json(request): Json<AddRequest>,
) -> ApiResult<AddedMemory> {
    Ok(Json(run_blocking(&engine, move |e| e.add(request)).await?))
}

async fn query_memory(
    State(engine): State<Arc<Engine>>,
    Json(body): Json<QueryBody>,
) -> ApiResult<QueryResponse> {
    let request = QueryRequest::from(body);
    Ok(Json(run_blocking(&engine, move |e| e.query(&request)).await?))
}

async fn reinforce_memory(
    State(engine): State<Arc<Engine>>,
    Json(body): Json<ReinforceBody>,
) -> ApiResult<ReinforceResponse> {
    let boost = body.boost.unwrap_or(DEFAULT_REINFORCE_BOOST);
    Ok(Json(
        run_blocking(&engine, move |e| e.reinforce(&body.id, boost)).await?,
    ))
}

async fn list_memories(
    State(engine): State<Arc<Engine>>,
    Query(params): Query<ListParams>,
) -> ApiResult<ListResponse> {
    let sector = match params.sector.as_deref() {
        Some(s) if !s.trim().is_empty() => {
            Some(s.parse::<Sector>().map_err(EngineError::InvalidArgument)?)
        }
        _ => None,
    };
    let limit = params.l.unwrap_or(DEFAULT_LIST_LIMIT);
    let offset = params.u.unwrap_or(0);
    Ok(Json(
        run_blocking(&engine, move |e| Ok(e.list(limit, offset, sector))).await?,
    ))
}

async fn get_memory(
    State(engine): State<Arc<Engine>>,
    Path(id): Path<String>,
) -> ApiResult<MemoryView> {
    Ok(Json(run_blocking(&engine, move |e| e.get(&id)).await?))
}

async fn delete_memory(
    State(engine): State<Arc<Engine>>,
    Path(id): Path<String>,
) -> ApiResult<DeleteResponse> {
    Ok(Json(run_blocking(&engine, move |e| e.delete(&id)).await?))
}
