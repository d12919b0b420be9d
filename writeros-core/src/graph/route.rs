//! Route-finding between locations.
//!
//! Connected_to edges form the travel graph, traversed in both
//! directions. Each edge costs its travel_time property when present,
//! otherwise 1.0, so an unweighted map degrades to hop counting. Search
//! is Dijkstra with a hop cap.

use super::{EntityGraph, MAX_TRAVERSAL_DEPTH};
use crate::id::EntityId;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

/// A found route, resolved to display names
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    /// Locations along the route, origin first
    pub path: Vec<String>,
    /// Number of edges traversed
    pub hops: usize,
    /// Total cost; equals `hops` when no edge carries a travel_time
    pub cost: f64,
    /// Anomalies encountered while searching
    pub warnings: Vec<String>,
}

/// A found path in id form, before name resolution
#[derive(Debug, Clone)]
pub(crate) struct FoundPath {
    pub path: Vec<EntityId>,
    pub cost: f64,
}

/// Min-heap entry ordered by cost
struct Candidate {
    cost: f64,
    hops: usize,
    node: EntityId,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cost == other.cost
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
        // Reversed for BinaryHeap's max-heap semantics
        other.cost.total_cmp(&self.cost)
    }
}

/// Dijkstra from `origin` to `destination`, capped at `max_hops` edges.
/// Returns `None` when no path exists within the cap.
pub(crate) fn shortest_path(
    graph: &EntityGraph,
    origin: EntityId,
    destination: EntityId,
    max_hops: usize,
) -> Option<FoundPath> {
    let max_hops = max_hops.min(MAX_TRAVERSAL_DEPTH);
    // Labels are keyed by (node, hops spent). With a hop cap a costlier
    // route that spends fewer hops can be the only one that still reaches
    // the destination within the cap, so a per-node label is not enough.
    let mut best: HashMap<(EntityId, usize), f64> = HashMap::new();
    let mut previous: HashMap<(EntityId, usize), (EntityId, usize)> = HashMap::new();
    let mut heap = BinaryHeap::new();

    best.insert((origin, 0), 0.0);
    heap.push(Candidate {
        cost: 0.0,
        hops: 0,
        node: origin,
    });

    while let Some(Candidate { cost, hops, node }) = heap.pop() {
        if node == destination {
            return Some(FoundPath {
                path: reconstruct(&previous, origin, destination, hops),
                cost,
            });
        }
        // Stale entry for a label already settled cheaper
        if best.get(&(node, hops)).is_some_and(|&known| cost > known) {
            continue;
        }
        if hops >= max_hops {
            continue;
        }
        for edge in graph.edges(node) {
            let step = edge.weight.unwrap_or(1.0);
            if !step.is_finite() || step < 0.0 {
                continue;
            }
            let next_cost = cost + step;
            let label = (edge.to, hops + 1);
            if best.get(&label).is_none_or(|&known| next_cost < known) {
                best.insert(label, next_cost);
                previous.insert(label, (node, hops));
                heap.push(Candidate {
                    cost: next_cost,
                    hops: hops + 1,
                    node: edge.to,
                });
            }
        }
    }

    None
}

fn reconstruct(
    previous: &HashMap<(EntityId, usize), (EntityId, usize)>,
    origin: EntityId,
    destination: EntityId,
    hops: usize,
) -> Vec<EntityId> {
    let mut path = vec![destination];
    let mut label = (destination, hops);
    while label != (origin, 0) {
        match previous.get(&label) {
            Some(&back) => {
                path.push(back.0);
                label = back;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

/// Resolve a found path to display names. Ids the store no longer knows
/// render by id so the route stays intact.
pub(crate) fn into_route(
    found: FoundPath,
    names: &HashMap<EntityId, String>,
    warnings: Vec<String>,
) -> Route {
    let hops = found.path.len().saturating_sub(1);
    let path = found
        .path
        .into_iter()
        .map(|id| names.get(&id).cloned().unwrap_or_else(|| id.to_string()))
        .collect();
    Route {
        path,
        hops,
        cost: found.cost,
        warnings,
    }
}
