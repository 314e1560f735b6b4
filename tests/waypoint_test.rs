mod helpers;

use cortex::memory::{AddRequest, QueryRequest};
use helpers::{add, quiet_engine};

#[test]
fn near_duplicates_are_linked_at_ingestion() {
    let engine = quiet_engine();
    let a = add(&engine, "I always drink coffee in the morning");
    let added = engine
        .add(AddRequest::new("I drink coffee in the morning"))
        .unwrap();
    assert_eq!(added.waypoints, 1);

    let edges = engine.waypoints(&a).unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].neighbor, added.id);
    assert!(edges[0].weight > 0.75 && edges[0].weight <= 1.0);

    // undirected: the same edge is visible from the other end
    let back = engine.waypoints(&added.id).unwrap();
    assert_eq!(back[0].neighbor, a);
    assert_eq!(back[0].weight, edges[0].weight);
}

#[test]
fn unrelated_memories_stay_unlinked() {
    let engine = quiet_engine();
    let a = add(&engine, "I went to Paris yesterday");
    let added = engine.add(AddRequest::new("Water boils at 100°C")).unwrap();
    assert_eq!(added.waypoints, 0);
    assert!(engine.waypoints(&a).unwrap().is_empty());
}

#[test]
fn traverse_reaches_neighbor_at_depth_one() {
    let engine = quiet_engine();
    let a = add(&engine, "I always drink coffee in the morning");
    let b = add(&engine, "I drink coffee in the morning");

    let hits = engine.traverse(&[a.clone()], 1, 10).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, a);
    assert_eq!(hits[0].path, vec![a.clone()]);

    let neighbor = hits.iter().find(|h| h.id == b).expect("neighbor reached");
    assert_eq!(neighbor.path, vec![a.clone(), b.clone()]);
    assert!(neighbor.score > 0.0 && neighbor.score < 1.0);
}

#[test]
fn traverse_at_depth_zero_returns_only_seeds() {
    let engine = quiet_engine();
    let a = add(&engine, "I always drink coffee in the morning");
    add(&engine, "I drink coffee in the morning");

    let hits = engine.traverse(&[a.clone()], 0, 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, a);
}

#[test]
fn graph_query_applies_tag_filter_to_expanded_nodes() {
    let engine = quiet_engine();
    let mut tagged = AddRequest::new("I always drink coffee in the morning");
    tagged.tags = vec!["keep".into()];
    let a = engine.add(tagged).unwrap().id;
    add(&engine, "I drink coffee in the morning");

    let mut request = QueryRequest::new("I always drink coffee in the morning");
    request.use_graph = true;
    request.depth = Some(2);
    request.tags = vec!["keep".into()];
    let response = engine.query(&request).unwrap();
    let ids: Vec<&str> = response.matches.iter().map(|m| m.id.as_str()).collect();
    assert_eq!(ids, vec![a.as_str()]);
}

#[test]
fn deleting_a_node_drops_its_edges() {
    let engine = quiet_engine();
    let a = add(&engine, "I always drink coffee in the morning");
    let b = add(&engine, "I drink coffee in the morning");
    engine.delete(&b).unwrap();

    assert!(engine.waypoints(&a).unwrap().is_empty());
    let hits = engine.traverse(&[a.clone()], 3, 10).unwrap();
    assert_eq!(hits.len(), 1);
}
