#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use cortex::config::CortexConfig;
use cortex::memory::{AddRequest, Engine};

/// Default config with the database placed under `dir`.
pub fn test_config(dir: &Path) -> CortexConfig {
    let mut config = CortexConfig::default();
    config.storage.db_path = dir.join("memory.db").to_string_lossy().into_owned();
    config.embedding.provider = "hashed".into();
    config.embedding.dimensions = 384;
    config
}

/// A fresh in-memory engine using the deterministic hashed provider.
pub fn test_engine() -> Engine {
    Engine::open_in_memory(&CortexConfig::default()).unwrap()
}

/// Same as [`test_engine`] but with query-time reinforcement switched off,
/// so salience only changes when a test asks for it.
pub fn quiet_engine() -> Engine {
    let mut config = CortexConfig::default();
    config.retrieval.reinforce_on_query = false;
    Engine::open_in_memory(&config).unwrap()
}

/// Add `content` with default options and return the new id.
pub fn add(engine: &Engine, content: &str) -> String {
    engine.add(AddRequest::new(content)).unwrap().id
}

/// Add `content` carrying `tags`.
pub fn add_tagged(engine: &Engine, content: &str, tags: &[&str]) -> String {
    let mut request = AddRequest::new(content);
    request.tags = tags.iter().map(|t| t.to_string()).collect();
    engine.add(request).unwrap().id
}

/// Serve the HTTP app on an ephemeral port. Returns the base URL.
pub async fn spawn_server(engine: Engine) -> String {
    let app = cortex::server::create_app(Arc::new(engine));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

pub async fn get(url: &str) -> (u16, String) {
    let resp = reqwest::Client::new().get(url).send().await.unwrap();
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap();
    (status, body)
}

pub async fn post_json(url: &str, body: &serde_json::Value) -> (u16, String) {
    let resp = reqwest::Client::new()
        .post(url)
        .json(body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap();
    (status, body)
}

pub async fn delete(url: &str) -> (u16, String) {
    let resp = reqwest::Client::new().delete(url).send().await.unwrap();
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap();
    (status, body)
}
