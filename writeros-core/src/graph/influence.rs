//! Social-influence ego-networks.
//!
//! The ego-network of a character is the induced subgraph of everyone
//! reachable within N hops over social edges. Nodes are scored by degree
//! centrality within that subgraph and returned ranked, alongside the
//! induced edge list.

use super::{EdgeDirection, EntityGraph, MAX_TRAVERSAL_DEPTH};
use crate::id::EntityId;
use crate::model::{Entity, RelationKind};
use std::collections::{HashMap, HashSet, VecDeque};

/// One character in an ego-network, scored by degree centrality
#[derive(Debug, Clone, PartialEq)]
pub struct InfluenceNode {
    /// Entity id
    pub id: EntityId,
    /// Display name
    pub name: String,
    /// Hops from the focal character
    pub distance: usize,
    /// Distinct neighbors within the subgraph
    pub degree: usize,
    /// degree / (n - 1) over the subgraph's n nodes
    pub centrality: f64,
}

/// One edge of the induced subgraph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfluenceEdge {
    /// Source entity
    pub from: EntityId,
    /// Target entity
    pub to: EntityId,
    /// Edge type
    pub kind: RelationKind,
}

/// An ego-network around a focal character
#[derive(Debug, Clone)]
pub struct InfluenceNetwork {
    /// The character the network is centered on
    pub focal: EntityId,
    /// Display name of the focal character
    pub focal_name: String,
    /// Members ranked by centrality, highest first
    pub nodes: Vec<InfluenceNode>,
    /// Edges of the induced subgraph
    pub edges: Vec<InfluenceEdge>,
    /// Anomalies encountered while building the network
    pub warnings: Vec<String>,
}

/// BFS membership: every node within `max_depth` hops of `focal`,
/// mapped to its hop distance.
pub(crate) fn ego_membership(
    graph: &EntityGraph,
    focal: EntityId,
    max_depth: usize,
) -> HashMap<EntityId, usize> {
    let max_depth = max_depth.min(MAX_TRAVERSAL_DEPTH);
    let mut membership: HashMap<EntityId, usize> = HashMap::new();
    membership.insert(focal, 0);
    let mut queue: VecDeque<(EntityId, usize)> = VecDeque::new();
    queue.push_back((focal, 0));

    while let Some((node, distance)) = queue.pop_front() {
        if distance >= max_depth {
            continue;
        }
        for neighbor in graph.neighbors(node) {
            if membership.contains_key(&neighbor) {
                continue;
            }
            membership.insert(neighbor, distance + 1);
            queue.push_back((neighbor, distance + 1));
        }
    }

    membership
}

/// Score the induced subgraph and rank its members. Members whose
/// entity row is missing were already warned about by the caller and
/// are left out of the ranking.
pub(crate) fn rank_network(
    focal: Entity,
    graph: &EntityGraph,
    membership: HashMap<EntityId, usize>,
    names: &HashMap<EntityId, String>,
    warnings: Vec<String>,
) -> InfluenceNetwork {
    let n = membership.len();
    let divisor = n.saturating_sub(1).max(1) as f64;

    let mut edges = Vec::new();
    let mut seen_edges: HashSet<(EntityId, EntityId, RelationKind)> = HashSet::new();
    let mut degrees: HashMap<EntityId, HashSet<EntityId>> = HashMap::new();

    for &member in membership.keys() {
        for edge in graph.edges(member) {
            if !membership.contains_key(&edge.to) {
                continue;
            }
            degrees.entry(member).or_default().insert(edge.to);

            // Each stored edge appears from both endpoints; emit it once,
            // from the side the author wrote it on. Symmetric kinds look
            // outgoing from both sides, so order the pair instead.
            let emit = match edge.direction {
                EdgeDirection::Incoming => false,
                EdgeDirection::Outgoing => {
                    !edge.kind.is_symmetric() || member < edge.to
                }
            };
            if emit && seen_edges.insert((member, edge.to, edge.kind)) {
                edges.push(InfluenceEdge {
                    from: member,
                    to: edge.to,
                    kind: edge.kind,
                });
            }
        }
    }

    let mut nodes: Vec<InfluenceNode> = membership
        .iter()
        .filter_map(|(&id, &distance)| {
            let name = names.get(&id)?.clone();
            let degree = degrees.get(&id).map_or(0, HashSet::len);
            Some(InfluenceNode {
                id,
                name,
                distance,
                degree,
                centrality: degree as f64 / divisor,
            })
        })
        .collect();
    nodes.sort_by(|a, b| {
        b.centrality
            .total_cmp(&a.centrality)
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.id.cmp(&b.id))
    });
    edges.sort_by(|a, b| a.from.cmp(&b.from).then_with(|| a.to.cmp(&b.to)));

    InfluenceNetwork {
        focal: focal.id,
        focal_name: focal.name,
        nodes,
        edges,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::VaultId;
    use crate::model::{EntityKind, Relationship};

    fn social_graph(relationships: &[Relationship]) -> EntityGraph {
        EntityGraph::build(relationships, RelationKind::is_social, None)
    }

    fn person(vault: VaultId, name: &str) -> Entity {
        Entity::new(vault, EntityKind::Character, name)
    }

    #[test]
    fn test_hop_limit_bounds_membership() {
        let vault = VaultId::new();
        let ids: Vec<EntityId> = (0..5).map(|_| EntityId::new()).collect();
        let chain: Vec<Relationship> = ids
            .windows(2)
            .map(|pair| Relationship::new(vault, pair[0], pair[1], RelationKind::Friend))
            .collect();

        let graph = social_graph(&chain);
        let membership = ego_membership(&graph, ids[0], 2);

        assert_eq!(membership.len(), 3);
        assert_eq!(membership[&ids[2]], 2);
        assert!(!membership.contains_key(&ids[3]));
    }

    #[test]
    fn test_non_social_edges_excluded() {
        let vault = VaultId::new();
        let a = EntityId::new();
        let b = EntityId::new();
        let graph = social_graph(&[Relationship::new(
            vault,
            a,
            b,
            RelationKind::ConnectedTo,
        )]);

        let membership = ego_membership(&graph, a, 3);
        assert_eq!(membership.len(), 1);
    }

    #[test]
    fn test_hub_ranks_first_by_centrality() {
        let vault = VaultId::new();
        let hub = person(vault, "hub");
        let spokes: Vec<Entity> = ["ana", "bo", "cy"]
            .iter()
            .map(|name| person(vault, *name))
            .collect();

        let mut relationships: Vec<Relationship> = spokes
            .iter()
            .map(|spoke| Relationship::new(vault, hub.id, spoke.id, RelationKind::Ally))
            .collect();
        relationships.push(Relationship::new(
            vault,
            spokes[0].id,
            spokes[1].id,
            RelationKind::Friend,
        ));

        let graph = social_graph(&relationships);
        let membership = ego_membership(&graph, hub.id, 3);

        let mut names = HashMap::new();
        names.insert(hub.id, hub.name.clone());
        for spoke in &spokes {
            names.insert(spoke.id, spoke.name.clone());
        }

        let network = rank_network(hub.clone(), &graph, membership, &names, Vec::new());

        assert_eq!(network.nodes[0].id, hub.id);
        assert_eq!(network.nodes[0].degree, 3);
        assert!((network.nodes[0].centrality - 1.0).abs() < f64::EPSILON);
        // 3 hub spokes plus the ana-bo friendship, each emitted once
        assert_eq!(network.edges.len(), 4);
    }

    #[test]
    fn test_single_node_network_has_zero_centrality() {
        let vault = VaultId::new();
        let loner = person(vault, "loner");
        let graph = social_graph(&[]);
        let membership = ego_membership(&graph, loner.id, 3);

        let mut names = HashMap::new();
        names.insert(loner.id, loner.name.clone());
        let network = rank_network(loner, &graph, membership, &names, Vec::new());

        assert_eq!(network.nodes.len(), 1);
        assert_eq!(network.nodes[0].centrality, 0.0);
        assert!(network.edges.is_empty());
    }
}
