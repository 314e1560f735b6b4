mod helpers;

use helpers::{delete, get, post_json, spawn_server, test_engine};
use serde_json::{json, Value};

fn parse(body: &str) -> Value {
    serde_json::from_str(body).unwrap()
}

#[tokio::test]
async fn health_and_sectors() {
    let base = spawn_server(test_engine()).await;

    let (status, body) = get(&format!("{base}/health")).await;
    assert_eq!(status, 200);
    let health = parse(&body);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["memory_count"], 0);
    assert_eq!(health["embedding_dimensions"], 384);

    let (status, body) = get(&format!("{base}/sectors")).await;
    assert_eq!(status, 200);
    let sectors = parse(&body);
    assert_eq!(
        sectors["sectors"],
        json!(["episodic", "semantic", "procedural", "emotional", "reflective"])
    );
}

#[tokio::test]
async fn add_query_get_delete_flow() {
    let base = spawn_server(test_engine()).await;

    let (status, body) = post_json(
        &format!("{base}/memory/add"),
        &json!({ "content": "I went to Paris yesterday", "tags": ["travel"] }),
    )
    .await;
    assert_eq!(status, 200);
    let added = parse(&body);
    let id = added["id"].as_str().unwrap().to_string();
    assert_eq!(added["primary_sector"], "episodic");

    post_json(
        &format!("{base}/memory/add"),
        &json!({ "content": "Water boils at 100°C" }),
    )
    .await;

    let (status, body) = post_json(
        &format!("{base}/memory/query"),
        &json!({ "query": "Paris trip", "k": 1, "filters": { "sector": "episodic" } }),
    )
    .await;
    assert_eq!(status, 200);
    let matches = parse(&body)["matches"].as_array().unwrap().clone();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["id"], id.as_str());
    assert!(matches[0]["score"].as_f64().unwrap() > 0.0);

    let (status, body) = get(&format!("{base}/memory/{id}")).await;
    assert_eq!(status, 200);
    assert_eq!(parse(&body)["content"], "I went to Paris yesterday");

    let (status, body) = get(&format!("{base}/memory/all?l=10&u=0")).await;
    assert_eq!(status, 200);
    assert_eq!(parse(&body)["total"], 2);

    let (status, body) = get(&format!("{base}/memory/all?sector=semantic")).await;
    assert_eq!(status, 200);
    assert_eq!(parse(&body)["total"], 1);

    let (status, body) = delete(&format!("{base}/memory/{id}")).await;
    assert_eq!(status, 200);
    assert_eq!(parse(&body)["success"], true);

    let (status, body) = delete(&format!("{base}/memory/{id}")).await;
    assert_eq!(status, 404);
    assert_eq!(parse(&body)["err"], "not_found");
}

#[tokio::test]
async fn reinforce_defaults_boost() {
    let base = spawn_server(test_engine()).await;
    let (_, body) = post_json(
        &format!("{base}/memory/add"),
        &json!({ "content": "a note to remember", "salience": 0.5 }),
    )
    .await;
    let id = parse(&body)["id"].as_str().unwrap().to_string();

    let (status, body) =
        post_json(&format!("{base}/memory/reinforce"), &json!({ "id": id })).await;
    assert_eq!(status, 200);
    let salience = parse(&body)["salience"].as_f64().unwrap();
    assert!((salience - 0.6).abs() < 1e-6);

    let (status, body) = post_json(
        &format!("{base}/memory/reinforce"),
        &json!({ "id": id, "boost": 0.3 }),
    )
    .await;
    assert_eq!(status, 200);
    assert!((parse(&body)["salience"].as_f64().unwrap() - 0.9).abs() < 1e-6);
}

#[tokio::test]
async fn errors_map_to_status_codes() {
    let base = spawn_server(test_engine()).await;

    let (status, body) = get(&format!("{base}/memory/does-not-exist")).await;
    assert_eq!(status, 404);
    let err = parse(&body);
    assert_eq!(err["err"], "not_found");
    assert!(err["message"].as_str().unwrap().contains("does-not-exist"));

    let (status, body) =
        post_json(&format!("{base}/memory/add"), &json!({ "content": "   " })).await;
    assert_eq!(status, 400);
    assert_eq!(parse(&body)["err"], "invalid_argument");

    let (status, body) = post_json(
        &format!("{base}/memory/query"),
        &json!({ "query": "anything", "k": 0 }),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(parse(&body)["err"], "invalid_argument");

    let (status, _) = get(&format!("{base}/memory/all?sector=dreams")).await;
    assert_eq!(status, 400);
}
