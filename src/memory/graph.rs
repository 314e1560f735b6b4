//! Waypoint graph: similarity links between memories, fixed at ingestion.
//!
//! Undirected and weighted. A new record is linked to its nearest existing
//! neighbours once, when it is stored; later insertions never rewire older
//! nodes. Deleting a record removes the node with every incident edge.
//!
//! [`WaypointGraph::traverse`] is a best-first expansion from scored seeds.
//! A node reached over a path scores `seed_score * product(edge weights)`, so
//! contribution fades with every hop. With weights in `(0, 1]` a path never
//! scores higher than its prefix, so the first time a node is popped from the
//! max-heap it carries its best score and path. That path may be longer than
//! another route to the same node, so a node is expanded again whenever it is
//! reached in fewer hops than any earlier expansion.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use serde::Serialize;

use crate::memory::index::by_score_then_salience;

/// An undirected edge as seen from one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaypointEdge {
    pub neighbor: String,
    pub weight: f64,
}

/// A node reached by traversal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraversalHit {
    pub id: String,
    /// Ids from the seed to this node, inclusive at both ends.
    pub path: Vec<String>,
    pub score: f64,
}

#[derive(Debug, Default)]
pub struct WaypointGraph {
    adjacency: HashMap<String, HashMap<String, f64>>,
    edge_count: usize,
}

impl WaypointGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn contains(&self, id: &str) -> bool {
        self.adjacency.contains_key(id)
    }

    /// Register a node with no edges.
    pub fn add_node(&mut self, id: &str) {
        self.adjacency.entry(id.to_string()).or_default();
    }

    /// Link `a` and `b`. Weights are clamped into `(0, 1]`; non-positive
    /// weights and self-loops are ignored. Returns whether an edge was added.
    pub fn add_edge(&mut self, a: &str, b: &str, weight: f64) -> bool {
        if a == b || !weight.is_finite() || weight <= 0.0 {
            return false;
        }
        let weight = weight.min(1.0);
        let fresh = self
            .adjacency
            .entry(a.to_string())
            .or_default()
            .insert(b.to_string(), weight)
            .is_none();
        self.adjacency
            .entry(b.to_string())
            .or_default()
            .insert(a.to_string(), weight);
        if fresh {
            self.edge_count += 1;
        }
        fresh
    }

    /// Remove a node and every incident edge. Returns the number of edges dropped.
    pub fn remove_node(&mut self, id: &str) -> usize {
        let Some(neighbors) = self.adjacency.remove(id) else {
            return 0;
        };
        for neighbor in neighbors.keys() {
            if let Some(back) = self.adjacency.get_mut(neighbor) {
                back.remove(id);
            }
        }
        self.edge_count -= neighbors.len();
        neighbors.len()
    }

    /// Neighbours of `id`, strongest first.
    pub fn neighbors(&self, id: &str) -> Vec<WaypointEdge> {
        let mut edges: Vec<WaypointEdge> = self
            .adjacency
            .get(id)
            .map(|n| {
                n.iter()
                    .map(|(neighbor, &weight)| WaypointEdge {
                        neighbor: neighbor.clone(),
                        weight,
                    })
                    .collect()
            })
            .unwrap_or_default();
        edges.sort_by(|a, b| {
            b.weight
                .total_cmp(&a.weight)
                .then_with(|| a.neighbor.cmp(&b.neighbor))
        });
        edges
    }

    /// Expand from `seeds` up to `depth` hops.
    ///
    /// Seeds are `(id, score)` pairs and appear in the result themselves with a
    /// one-element path. Every node is reported once, with the best-scoring
    /// path found. The result is ranked by score, then by `salience(id)`,
    /// both descending, and truncated to `k`. Seeds missing from the graph
    /// are skipped.
    pub fn traverse<F>(
        &self,
        seeds: &[(String, f64)],
        depth: usize,
        k: usize,
        salience: F,
    ) -> Vec<TraversalHit>
    where
        F: Fn(&str) -> f64,
    {
        let mut frontier = BinaryHeap::new();
        for (id, score) in seeds {
            if self.contains(id) {
                frontier.push(Candidate {
                    score: *score,
                    path: vec![id.clone()],
                });
            }
        }

        let mut reported: HashSet<String> = HashSet::new();
        // Fewest hops at which each node has been expanded so far.
        let mut expanded_at: HashMap<String, usize> = HashMap::new();
        let mut hits = Vec::new();

        while let Some(Candidate { score, path }) = frontier.pop() {
            let Some(current) = path.last() else {
                continue;
            };
            let hops = path.len() - 1;
            let first = !reported.contains(current);
            let expand =
                hops < depth && expanded_at.get(current).is_none_or(|&done| hops < done);
            if !first && !expand {
                continue;
            }
            if expand {
                expanded_at.insert(current.clone(), hops);
                if let Some(neighbors) = self.adjacency.get(current) {
                    for (next, weight) in neighbors {
                        if path.contains(next) {
                            continue;
                        }
                        if reported.contains(next)
                            && expanded_at.get(next).is_some_and(|&done| done <= hops + 1)
                        {
                            continue;
                        }
                        let mut next_path = path.clone();
                        next_path.push(next.clone());
                        frontier.push(Candidate {
                            score: score * weight,
                            path: next_path,
                        });
                    }
                }
            }
            if first {
                reported.insert(current.clone());
                hits.push(TraversalHit {
                    id: current.clone(),
                    path,
                    score,
                });
            }
        }

        let mut ranked: Vec<(f64, TraversalHit)> = hits
            .into_iter()
            .map(|hit| (salience(&hit.id), hit))
            .collect();
        ranked.sort_by(|(sa, a), (sb, b)| {
            by_score_then_salience((a.score, *sa), (b.score, *sb))
                .then_with(|| a.path.len().cmp(&b.path.len()))
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked.truncate(k);
        ranked.into_iter().map(|(_, hit)| hit).collect()
    }
}

/// Heap entry ordered by score, then by shorter path, then lexically, so the
/// pop order is deterministic.
#[derive(Debug)]
struct Candidate {
    score: f64,
    path: Vec<String>,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.path.len().cmp(&self.path.len()))
            .then_with(|| other.path.cmp(&self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat(_: &str) -> f64 {
        0.5
    }

    fn chain() -> WaypointGraph {
        // a -0.9- b -0.8- c -0.9- d
        let mut g = WaypointGraph::new();
        g.add_edge("a", "b", 0.9);
        g.add_edge("b", "c", 0.8);
        g.add_edge("c", "d", 0.9);
        g
    }

    fn seed(id: &str, score: f64) -> Vec<(String, f64)> {
        vec![(id.to_string(), score)]
    }

    #[test]
    fn edges_are_undirected_and_clamped() {
        let mut g = WaypointGraph::new();
        assert!(g.add_edge("a", "b", 1.4));
        assert_eq!(g.neighbors("b")[0].weight, 1.0);
        assert!(!g.add_edge("a", "b", 0.8));
        assert_eq!(g.neighbors("a")[0].weight, 0.8);
        assert_eq!(g.edge_count(), 1);
        assert!(!g.add_edge("a", "a", 0.9));
        assert!(!g.add_edge("a", "c", 0.0));
    }

    #[test]
    fn remove_node_drops_incident_edges() {
        let mut g = chain();
        assert_eq!(g.edge_count(), 3);
        assert_eq!(g.remove_node("b"), 2);
        assert_eq!(g.edge_count(), 1);
        assert!(g.neighbors("a").is_empty());
        assert_eq!(
            g.neighbors("c"),
            vec![WaypointEdge {
                neighbor: "d".into(),
                weight: 0.9
            }]
        );
        assert_eq!(g.remove_node("b"), 0);
    }

    #[test]
    fn depth_limits_hops() {
        let g = chain();
        let hits = g.traverse(&seed("a", 1.0), 1, 10, flat);
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(hits[1].path, vec!["a", "b"]);

        let hits = g.traverse(&seed("a", 1.0), 0, 10, flat);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn scores_fade_per_hop() {
        let g = chain();
        let hits = g.traverse(&seed("a", 0.5), 3, 10, flat);
        let d = hits.iter().find(|h| h.id == "d").unwrap();
        assert!((d.score - 0.5 * 0.9 * 0.8 * 0.9).abs() < 1e-12);
        assert_eq!(d.path, vec!["a", "b", "c", "d"]);
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn best_path_wins_over_fewer_hops() {
        // a -0.2- c directly, but a -0.9- b -0.9- c scores 0.81
        let mut g = WaypointGraph::new();
        g.add_edge("a", "c", 0.2);
        g.add_edge("a", "b", 0.9);
        g.add_edge("b", "c", 0.9);
        let hits = g.traverse(&seed("a", 1.0), 2, 10, flat);
        let c = hits.iter().find(|h| h.id == "c").unwrap();
        assert!((c.score - 0.81).abs() < 1e-12);
        assert_eq!(c.path, vec!["a", "b", "c"]);
    }

    #[test]
    fn shorter_route_still_expands_within_depth() {
        // a -0.9- b -0.9- c -0.9- d, plus a -0.5- c
        // c is reported via a,b,c (0.81) but d is only in range via a,c,d
        let mut g = WaypointGraph::new();
        g.add_edge("a", "b", 0.9);
        g.add_edge("b", "c", 0.9);
        g.add_edge("c", "d", 0.9);
        g.add_edge("a", "c", 0.5);
        let hits = g.traverse(&seed("a", 1.0), 2, 10, flat);
        assert_eq!(hits.len(), 4);

        let c = hits.iter().find(|h| h.id == "c").unwrap();
        assert_eq!(c.path, vec!["a", "b", "c"]);
        assert!((c.score - 0.81).abs() < 1e-12);

        let d = hits.iter().find(|h| h.id == "d").unwrap();
        assert_eq!(d.path, vec!["a", "c", "d"]);
        assert!((d.score - 0.45).abs() < 1e-12);

        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn cycles_visit_each_node_once() {
        let mut g = WaypointGraph::new();
        g.add_edge("a", "b", 0.9);
        g.add_edge("b", "c", 0.9);
        g.add_edge("c", "a", 0.9);
        let hits = g.traverse(&seed("a", 1.0), 5, 10, flat);
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn multiple_seeds_keep_higher_score() {
        let g = chain();
        let seeds = vec![("a".to_string(), 0.3), ("d".to_string(), 0.9)];
        let hits = g.traverse(&seeds, 1, 10, flat);
        let c = hits.iter().find(|h| h.id == "c").unwrap();
        assert_eq!(c.path, vec!["d", "c"]);
        assert!((c.score - 0.81).abs() < 1e-12);
        assert_eq!(hits[0].id, "d");
    }

    #[test]
    fn truncates_and_breaks_ties_on_salience() {
        let mut g = WaypointGraph::new();
        g.add_edge("s", "x", 0.8);
        g.add_edge("s", "y", 0.8);
        let salience = |id: &str| if id == "y" { 0.9 } else { 0.1 };
        let hits = g.traverse(&seed("s", 1.0), 1, 2, salience);
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["s", "y"]);
    }

    #[test]
    fn unknown_seeds_are_skipped() {
        let g = chain();
        assert!(g.traverse(&seed("zzz", 1.0), 2, 10, flat).is_empty());
    }
}
