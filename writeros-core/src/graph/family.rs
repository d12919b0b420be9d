//! Family tree generation assignment.
//!
//! Generations are signed integers relative to the focal character:
//! children are +1, grandchildren +2, parents -1, siblings 0. Assignment
//! is a breadth-first walk over familial edges in which each edge kind
//! and direction contributes a generation delta; the first generation a
//! node is reached with wins.

use super::{EdgeDirection, EntityGraph, MAX_TRAVERSAL_DEPTH};
use crate::id::EntityId;
use crate::model::{Entity, RelationKind};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// One relative in the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyMember {
    /// Entity id
    pub id: EntityId,
    /// Display name
    pub name: String,
    /// Signed generation relative to the focal character
    pub generation: i32,
}

/// A family tree grouped by generation
#[derive(Debug, Clone)]
pub struct FamilyTree {
    /// The character the tree is centered on
    pub focal: EntityId,
    /// Display name of the focal character
    pub focal_name: String,
    /// Members grouped by signed generation, focal included at 0
    pub generations: BTreeMap<i32, Vec<FamilyMember>>,
    /// Total members including the focal character
    pub total: usize,
    /// Lowest (most ancestral) generation present
    pub min_generation: i32,
    /// Highest (most descendant) generation present
    pub max_generation: i32,
    /// Anomalies encountered while building the tree
    pub warnings: Vec<String>,
}

/// Generation delta contributed by following an edge, by kind and by
/// which side of the stored edge we stand on.
///
/// A parent edge runs from parent to child, so following it outgoing
/// steps toward descendants (+1) and traversing it from the child's
/// side steps toward ancestors (-1). Child edges run the other way and
/// invert both signs; sibling/family edges stay on the same level.
fn generation_delta(kind: RelationKind, direction: EdgeDirection) -> i32 {
    match (kind, direction) {
        (RelationKind::Parent, EdgeDirection::Outgoing) => 1,
        (RelationKind::Parent, EdgeDirection::Incoming) => -1,
        (RelationKind::Child, EdgeDirection::Outgoing) => -1,
        (RelationKind::Child, EdgeDirection::Incoming) => 1,
        _ => 0,
    }
}

/// Assign a signed generation to every family member reachable from the
/// focal character. First visit wins; depth is bounded.
pub(crate) fn assign_generations(
    graph: &EntityGraph,
    focal: EntityId,
    max_depth: usize,
) -> HashMap<EntityId, i32> {
    let max_depth = max_depth.min(MAX_TRAVERSAL_DEPTH);
    let mut generations: HashMap<EntityId, i32> = HashMap::new();
    generations.insert(focal, 0);

    let mut queue: VecDeque<(EntityId, i32, usize)> = VecDeque::new();
    queue.push_back((focal, 0, 0));

    while let Some((node, generation, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for edge in graph.edges(node) {
            if generations.contains_key(&edge.to) {
                continue;
            }
            let next = generation + generation_delta(edge.kind, edge.direction);
            generations.insert(edge.to, next);
            queue.push_back((edge.to, next, depth + 1));
        }
    }

    generations
}

/// Group assigned generations into the output tree, resolving names.
/// Members whose entity row is missing were already warned about by the
/// caller and are simply left out.
pub(crate) fn group_tree(
    focal: Entity,
    generations: HashMap<EntityId, i32>,
    names: &HashMap<EntityId, String>,
    warnings: Vec<String>,
) -> FamilyTree {
    let mut grouped: BTreeMap<i32, Vec<FamilyMember>> = BTreeMap::new();
    for (id, generation) in generations {
        let Some(name) = names.get(&id) else {
            continue;
        };
        grouped.entry(generation).or_default().push(FamilyMember {
            id,
            name: name.clone(),
            generation,
        });
    }
    for members in grouped.values_mut() {
        members.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    }

    let total = grouped.values().map(Vec::len).sum();
    let min_generation = grouped.keys().next().copied().unwrap_or(0);
    let max_generation = grouped.keys().next_back().copied().unwrap_or(0);

    FamilyTree {
        focal: focal.id,
        focal_name: focal.name,
        generations: grouped,
        total,
        min_generation,
        max_generation,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::VaultId;
    use crate::model::Relationship;

    fn family_graph(relationships: &[Relationship]) -> EntityGraph {
        EntityGraph::build(relationships, RelationKind::is_familial, None)
    }

    #[test]
    fn test_parent_chain_generations() {
        let vault = VaultId::new();
        let a = EntityId::new();
        let b = EntityId::new();
        let c = EntityId::new();

        let graph = family_graph(&[
            Relationship::new(vault, a, b, RelationKind::Parent),
            Relationship::new(vault, b, c, RelationKind::Parent),
        ]);

        let generations = assign_generations(&graph, a, MAX_TRAVERSAL_DEPTH);
        assert_eq!(generations[&a], 0);
        assert_eq!(generations[&b], 1);
        assert_eq!(generations[&c], 2);
    }

    #[test]
    fn test_child_edge_inverse_of_parent() {
        let vault = VaultId::new();
        let focal = EntityId::new();
        let mother = EntityId::new();

        // A child edge runs from child to parent
        let graph = family_graph(&[Relationship::new(
            vault,
            focal,
            mother,
            RelationKind::Child,
        )]);

        let generations = assign_generations(&graph, focal, MAX_TRAVERSAL_DEPTH);
        assert_eq!(generations[&mother], -1);
    }

    #[test]
    fn test_siblings_through_shared_parent_land_on_same_generation() {
        let vault = VaultId::new();
        let focal = EntityId::new();
        let robb = EntityId::new();
        let sansa = EntityId::new();

        // No explicit sibling edge; same level falls out of traversal
        let graph = family_graph(&[
            Relationship::new(vault, focal, robb, RelationKind::Parent),
            Relationship::new(vault, focal, sansa, RelationKind::Parent),
        ]);

        let generations = assign_generations(&graph, focal, MAX_TRAVERSAL_DEPTH);
        assert_eq!(generations[&robb], 1);
        assert_eq!(generations[&robb], generations[&sansa]);
    }

    #[test]
    fn test_sibling_edge_keeps_generation() {
        let vault = VaultId::new();
        let focal = EntityId::new();
        let sibling = EntityId::new();

        let graph = family_graph(&[Relationship::new(
            vault,
            focal,
            sibling,
            RelationKind::Sibling,
        )]);

        let generations = assign_generations(&graph, focal, MAX_TRAVERSAL_DEPTH);
        assert_eq!(generations[&sibling], 0);
    }

    #[test]
    fn test_cyclic_family_terminates() {
        let vault = VaultId::new();
        let a = EntityId::new();
        let b = EntityId::new();
        let c = EntityId::new();

        // Authoring error: a parent cycle
        let graph = family_graph(&[
            Relationship::new(vault, a, b, RelationKind::Parent),
            Relationship::new(vault, b, c, RelationKind::Parent),
            Relationship::new(vault, c, a, RelationKind::Parent),
        ]);

        let generations = assign_generations(&graph, a, MAX_TRAVERSAL_DEPTH);
        assert_eq!(generations.len(), 3);
        assert_eq!(generations[&a], 0);
    }

    #[test]
    fn test_depth_ceiling_bounds_walk() {
        let vault = VaultId::new();
        let ids: Vec<EntityId> = (0..20).map(|_| EntityId::new()).collect();
        let relationships: Vec<Relationship> = ids
            .windows(2)
            .map(|pair| Relationship::new(vault, pair[0], pair[1], RelationKind::Parent))
            .collect();

        let graph = family_graph(&relationships);
        let generations = assign_generations(&graph, ids[0], MAX_TRAVERSAL_DEPTH);

        // Focal plus at most MAX_TRAVERSAL_DEPTH descendants
        assert_eq!(generations.len(), MAX_TRAVERSAL_DEPTH + 1);
        assert_eq!(
            generations.values().copied().max(),
            Some(MAX_TRAVERSAL_DEPTH as i32)
        );
    }
}
