//! Graph traversal over the relationship and causal-event graphs.
//!
//! Relationships are loaded into an in-memory `EntityGraph` and traversed
//! synchronously. The underlying data is treated as possibly cyclic and
//! possibly containing duplicate or contradictory edges: every algorithm
//! carries a visited set and a hard depth ceiling, and malformed rows are
//! skipped with an accumulated warning rather than crashing a traversal.

pub mod agentic;
pub mod causality;
pub mod family;
pub mod influence;
pub mod route;

pub use agentic::{AgenticPath, HopChooser, NeighborView};
pub use causality::{CausalLink, CausalityChain};
pub use family::{FamilyMember, FamilyTree};
pub use influence::{InfluenceEdge, InfluenceNetwork, InfluenceNode};
pub use route::Route;

use crate::error::{GraphError, GraphResult};
use crate::id::{EntityId, EventId, VaultId};
use crate::model::{RelationKind, Relationship};
use crate::store::GraphStore;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Hard ceiling on traversal depth; the circuit breaker against
/// malformed data
pub const MAX_TRAVERSAL_DEPTH: usize = 15;

/// Which side of a stored edge a node sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum EdgeDirection {
    /// The node is the stored edge's source
    Outgoing,
    /// The node is the stored edge's target
    Incoming,
}

/// One edge as seen from a particular node
#[derive(Debug, Clone)]
pub(crate) struct EdgeRef {
    /// The node on the other end
    pub to: EntityId,
    /// Edge type
    pub kind: RelationKind,
    /// Which side of the stored edge this node is on; symmetric kinds
    /// always present as outgoing
    pub direction: EdgeDirection,
    /// travel_time property, when present and numeric
    pub weight: Option<f64>,
}

/// In-memory adjacency view over a relationship subset.
///
/// Duplicate parallel edges are collapsed for reachability (first kept),
/// self-loops are dropped, and both anomalies are recorded as warnings.
#[derive(Debug, Default)]
pub(crate) struct EntityGraph {
    adjacency: HashMap<EntityId, Vec<EdgeRef>>,
    warnings: Vec<String>,
}

impl EntityGraph {
    /// Build a graph from relationships matching `kind_filter`, optionally
    /// restricted to edges valid at a sequence position.
    pub fn build(
        relationships: &[Relationship],
        kind_filter: impl Fn(RelationKind) -> bool,
        at_sequence: Option<i64>,
    ) -> Self {
        let mut graph = Self::default();
        let mut seen: HashSet<(EntityId, EntityId, RelationKind, EdgeDirection)> = HashSet::new();

        for relationship in relationships {
            if !kind_filter(relationship.kind) {
                continue;
            }
            if let Some(position) = at_sequence {
                if !relationship.validity.contains(position) {
                    continue;
                }
            }
            if relationship.from_entity == relationship.to_entity {
                graph.warnings.push(format!(
                    "self-loop on entity {} skipped",
                    relationship.from_entity
                ));
                continue;
            }

            let weight = relationship.travel_time();
            let reverse_direction = if relationship.kind.is_symmetric() {
                EdgeDirection::Outgoing
            } else {
                EdgeDirection::Incoming
            };
            let halves = [
                (
                    relationship.from_entity,
                    relationship.to_entity,
                    EdgeDirection::Outgoing,
                ),
                (
                    relationship.to_entity,
                    relationship.from_entity,
                    reverse_direction,
                ),
            ];

            for (node, other, direction) in halves {
                if !seen.insert((node, other, relationship.kind, direction)) {
                    graph.warnings.push(format!(
                        "duplicate {:?} edge {} -> {} collapsed",
                        relationship.kind, node, other
                    ));
                    continue;
                }
                graph.adjacency.entry(node).or_default().push(EdgeRef {
                    to: other,
                    kind: relationship.kind,
                    direction,
                    weight,
                });
            }
        }

        graph
    }

    /// Edges hanging off a node, in both stored directions
    pub fn edges(&self, node: EntityId) -> &[EdgeRef] {
        self.adjacency
            .get(&node)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Distinct neighbor ids of a node
    pub fn neighbors(&self, node: EntityId) -> Vec<EntityId> {
        let mut seen = HashSet::new();
        self.edges(node)
            .iter()
            .filter(|edge| seen.insert(edge.to))
            .map(|edge| edge.to)
            .collect()
    }

    /// Every node id that appears in the graph
    pub fn nodes(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.adjacency.keys().copied()
    }

    /// Warnings accumulated during construction
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// The traversal facade over an injected store.
///
/// Loads the relevant rows, runs the synchronous algorithm, and resolves
/// ids back to names for display.
#[derive(Clone)]
pub struct GraphEngine {
    store: Arc<dyn GraphStore>,
    at_sequence: Option<i64>,
}

impl GraphEngine {
    /// Create an engine over a store
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self {
            store,
            at_sequence: None,
        }
    }

    /// Scope relationship traversals to a narrative sequence position.
    ///
    /// Edges whose validity window excludes the position are left out of
    /// every graph the engine builds; causality is event-based and
    /// unaffected.
    pub fn with_sequence(mut self, sequence: i64) -> Self {
        self.at_sequence = Some(sequence);
        self
    }

    /// Family tree around a focal character: signed generations relative
    /// to the focal entity, grouped and bounded.
    ///
    /// Known simplification: a node reached twice through family graphs
    /// with remarriage keeps its first-assigned generation (BFS queue
    /// order decides); generations are not reconciled across paths.
    pub async fn build_family_tree(&self, character: EntityId) -> GraphResult<FamilyTree> {
        let focal = self
            .store
            .entity(character)
            .await?
            .ok_or(GraphError::EntityNotFound(character))?;

        tracing::debug!(focal = %focal.name, "family tree traversal");
        let relationships = self.store.relationships(focal.vault_id).await?;
        let graph = EntityGraph::build(&relationships, RelationKind::is_familial, self.at_sequence);

        let generations = family::assign_generations(&graph, character, MAX_TRAVERSAL_DEPTH);
        let mut warnings: Vec<String> = graph.warnings().to_vec();
        let names = self
            .resolve_names(generations.keys().copied(), &mut warnings)
            .await?;

        Ok(family::group_tree(focal, generations, &names, warnings))
    }

    /// Bounded ancestor and descendant sets of a focal event over the
    /// directed causal graph, each entry tagged with its hop distance.
    pub async fn trace_causality(
        &self,
        event: EventId,
        max_depth: usize,
    ) -> GraphResult<CausalityChain> {
        let focal = self
            .store
            .event(event)
            .await?
            .ok_or(GraphError::EventNotFound(event))?;

        tracing::debug!(focal = %focal.name, max_depth, "causality traversal");
        let events = self.store.events(focal.vault_id).await?;
        Ok(causality::trace(&focal, &events, max_depth.min(MAX_TRAVERSAL_DEPTH)))
    }

    /// Shortest route between two locations over connected_to edges,
    /// weighted by travel_time when present.
    ///
    /// "No path" and "entity not found" are distinct errors.
    pub async fn find_route(
        &self,
        origin: EntityId,
        destination: EntityId,
        max_depth: usize,
    ) -> GraphResult<Route> {
        let from = self
            .store
            .entity(origin)
            .await?
            .ok_or(GraphError::EntityNotFound(origin))?;
        let to = self
            .store
            .entity(destination)
            .await?
            .ok_or(GraphError::EntityNotFound(destination))?;

        tracing::debug!(from = %from.name, to = %to.name, "route search");
        let relationships = self.store.relationships(from.vault_id).await?;
        let graph = EntityGraph::build(
            &relationships,
            |kind| kind == RelationKind::ConnectedTo,
            self.at_sequence,
        );

        let found = route::shortest_path(
            &graph,
            origin,
            destination,
            max_depth.min(MAX_TRAVERSAL_DEPTH),
        )
        .ok_or(GraphError::NoPath {
            from: from.name.clone(),
            to: to.name.clone(),
        })?;

        let mut warnings = graph.warnings().to_vec();
        let names = self
            .resolve_names(found.path.iter().copied(), &mut warnings)
            .await?;
        Ok(route::into_route(found, &names, warnings))
    }

    /// Social-influence ego-network within `max_depth` hops, nodes ranked
    /// by degree centrality.
    pub async fn trace_influence(
        &self,
        entity: EntityId,
        max_depth: usize,
    ) -> GraphResult<InfluenceNetwork> {
        let focal = self
            .store
            .entity(entity)
            .await?
            .ok_or(GraphError::EntityNotFound(entity))?;

        tracing::debug!(focal = %focal.name, max_depth, "influence traversal");
        let relationships = self.store.relationships(focal.vault_id).await?;
        let graph = EntityGraph::build(&relationships, RelationKind::is_social, self.at_sequence);

        let membership = influence::ego_membership(&graph, entity, max_depth.min(MAX_TRAVERSAL_DEPTH));
        let mut warnings = graph.warnings().to_vec();
        let names = self
            .resolve_names(membership.keys().copied(), &mut warnings)
            .await?;
        Ok(influence::rank_network(focal, &graph, membership, &names, warnings))
    }

    /// Guided path search: an injected decision function picks each next
    /// hop toward a named target, bounded by `max_steps`.
    ///
    /// Four distinct terminal outcomes: `Ok` (target reached), and the
    /// `DeadEnd`, `LoopDetected`, and `StepLimitExceeded` errors, each
    /// carrying the partial path.
    pub async fn agentic_traversal(
        &self,
        vault: VaultId,
        start_name: &str,
        end_name: &str,
        chooser: &dyn HopChooser,
        max_steps: usize,
    ) -> GraphResult<AgenticPath> {
        agentic::traverse(
            self.store.as_ref(),
            vault,
            start_name,
            end_name,
            chooser,
            max_steps,
            self.at_sequence,
        )
        .await
    }

    /// Build the relationship graph as of a narrative sequence position;
    /// edges whose validity window excludes the position are left out.
    pub async fn relationships_at(
        &self,
        vault: VaultId,
        sequence: i64,
    ) -> GraphResult<Vec<Relationship>> {
        let relationships = self.store.relationships(vault).await?;
        Ok(relationships
            .into_iter()
            .filter(|r| r.validity.contains(sequence))
            .collect())
    }

    /// Resolve a set of entity ids to display names, skipping (and
    /// warning about) ids the store no longer knows.
    async fn resolve_names(
        &self,
        ids: impl Iterator<Item = EntityId>,
        warnings: &mut Vec<String>,
    ) -> GraphResult<HashMap<EntityId, String>> {
        let mut names = HashMap::new();
        for id in ids {
            match self.store.entity(id).await? {
                Some(entity) => {
                    names.insert(id, entity.name);
                }
                None => {
                    tracing::warn!(%id, "edge references an entity the store no longer has");
                    warnings.push(format!("entity {id} referenced by an edge but not found"));
                }
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ValidityWindow;

    fn rel(vault: VaultId, from: EntityId, to: EntityId, kind: RelationKind) -> Relationship {
        Relationship::new(vault, from, to, kind)
    }

    #[test]
    fn test_symmetric_edge_added_both_ways_as_outgoing() {
        let vault = VaultId::new();
        let a = EntityId::new();
        let b = EntityId::new();
        let graph = EntityGraph::build(
            &[rel(vault, a, b, RelationKind::Friend)],
            |_| true,
            None,
        );

        assert_eq!(graph.neighbors(a), vec![b]);
        assert_eq!(graph.neighbors(b), vec![a]);
        assert_eq!(graph.edges(b)[0].direction, EdgeDirection::Outgoing);
    }

    #[test]
    fn test_directed_edge_reverse_is_incoming() {
        let vault = VaultId::new();
        let parent = EntityId::new();
        let child = EntityId::new();
        let graph = EntityGraph::build(
            &[rel(vault, parent, child, RelationKind::Parent)],
            |_| true,
            None,
        );

        assert_eq!(graph.edges(parent)[0].direction, EdgeDirection::Outgoing);
        assert_eq!(graph.edges(child)[0].direction, EdgeDirection::Incoming);
    }

    #[test]
    fn test_self_loop_skipped_with_warning() {
        let vault = VaultId::new();
        let a = EntityId::new();
        let graph = EntityGraph::build(
            &[rel(vault, a, a, RelationKind::Friend)],
            |_| true,
            None,
        );

        assert!(graph.neighbors(a).is_empty());
        assert_eq!(graph.warnings().len(), 1);
    }

    #[test]
    fn test_duplicate_edges_collapsed() {
        let vault = VaultId::new();
        let a = EntityId::new();
        let b = EntityId::new();
        let graph = EntityGraph::build(
            &[
                rel(vault, a, b, RelationKind::Ally),
                rel(vault, a, b, RelationKind::Ally),
            ],
            |_| true,
            None,
        );

        assert_eq!(graph.neighbors(a), vec![b]);
        assert!(!graph.warnings().is_empty());
    }

    #[test]
    fn test_parallel_edges_of_different_kinds_preserved() {
        let vault = VaultId::new();
        let a = EntityId::new();
        let b = EntityId::new();
        let graph = EntityGraph::build(
            &[
                rel(vault, a, b, RelationKind::Ally),
                rel(vault, a, b, RelationKind::Rival),
            ],
            |_| true,
            None,
        );

        // One reachability neighbor, two typed edges for display
        assert_eq!(graph.neighbors(a), vec![b]);
        assert_eq!(graph.edges(a).len(), 2);
    }

    #[test]
    fn test_temporal_window_filters_edges() {
        let vault = VaultId::new();
        let a = EntityId::new();
        let b = EntityId::new();
        let edge = rel(vault, a, b, RelationKind::Ally)
            .with_validity(ValidityWindow::between(10, 20));

        let at_15 = EntityGraph::build(std::slice::from_ref(&edge), |_| true, Some(15));
        assert_eq!(at_15.neighbors(a), vec![b]);

        let at_25 = EntityGraph::build(std::slice::from_ref(&edge), |_| true, Some(25));
        assert!(at_25.neighbors(a).is_empty());
    }
}
