//! Server entry points for stdio (MCP) and HTTP (REST + MCP) transports.
//!
//! Provides [`serve_stdio`] and [`serve_http`], which open the engine
//! (replaying the embedding log) before accepting any request.

use std::sync::Arc;

use anyhow::Result;
use rmcp::ServiceExt;

use crate::api;
use crate::config::CortexConfig;
use crate::error::EngineError;
use crate::memory::Engine;
use crate::tools::CortexTools;

/// Open the engine on the blocking pool. Recovery must finish before the
/// caller starts serving.
pub async fn open_engine(config: CortexConfig) -> Result<Arc<Engine>> {
    let engine = tokio::task::spawn_blocking(move || Engine::open(&config)).await??;
    tracing::info!(
        memories = engine.len(),
        provider = engine.provider_name(),
        dimensions = engine.dimensions(),
        "engine ready"
    );
    Ok(Arc::new(engine))
}

/// Run a synchronous engine call off the async runtime.
pub(crate) async fn run_blocking<T, F>(engine: &Arc<Engine>, f: F) -> crate::error::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&Engine) -> crate::error::Result<T> + Send + 'static,
{
    let engine = Arc::clone(engine);
    tokio::task::spawn_blocking(move || f(&engine))
        .await
        .map_err(|e| EngineError::Internal(e.to_string()))?
}

/// Dispatch on `server.transport`.
pub async fn serve(config: CortexConfig) -> Result<()> {
    match config.server.transport.as_str() {
        "http" => serve_http(config).await,
        "stdio" => serve_stdio(config).await,
        other => anyhow::bail!("unknown transport '{other}' (expected 'stdio' or 'http')"),
    }
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: CortexConfig) -> Result<()> {
    tracing::info!("starting Cortex MCP server on stdio");

    let engine = open_engine(config).await?;
    let server = CortexTools::new(engine).serve(rmcp::transport::stdio()).await?;
    tracing::info!("MCP server running, waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");
    Ok(())
}

/// The REST API with the MCP streamable HTTP service nested at `/mcp`.
pub fn create_app(engine: Arc<Engine>) -> axum::Router {
    let mcp_engine = Arc::clone(&engine);
    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(CortexTools::new(Arc::clone(&mcp_engine))),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    api::create_router(engine).nest_service("/mcp", service)
}

/// Start the HTTP server: REST routes plus MCP at `/mcp`.
pub async fn serve_http(config: CortexConfig) -> Result<()> {
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(addr = %bind_addr, "starting Cortex HTTP server");

    let engine = open_engine(config).await?;
    let app = create_app(engine);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "listening at http://{bind_addr} (MCP at /mcp)");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
