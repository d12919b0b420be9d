//! Guided path search.
//!
//! A traversal loop walks the relationship graph one hop at a time,
//! asking an injected decision function which neighbor to move to next.
//! The decision function is the one seam where an external collaborator
//! (typically an LLM) steers core logic, so it is a trait and the loop
//! around it stays deterministic and fully testable: revisits, dead
//! ends, and step exhaustion all terminate with a partial path.

use super::EntityGraph;
use crate::error::{GraphError, GraphResult};
use crate::id::{EntityId, VaultId};
use crate::model::RelationKind;
use crate::store::GraphStore;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// A neighbor presented to the decision function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborView {
    /// Entity id
    pub id: EntityId,
    /// Display name; this is what the chooser answers with
    pub name: String,
    /// The edge type connecting it to the current node
    pub kind: RelationKind,
}

/// Picks the next hop during a guided search.
///
/// Implementations answer with the name of one of the offered
/// neighbors. An answer naming no offered neighbor aborts the search
/// with a [`GraphError::Decision`].
#[async_trait]
pub trait HopChooser: Send + Sync {
    /// Choose which neighbor to move to from `current`, aiming for
    /// `target`
    async fn choose_next(
        &self,
        current: &str,
        target: &str,
        neighbors: &[NeighborView],
    ) -> GraphResult<String>;
}

/// A successfully completed guided search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgenticPath {
    /// Names of the entities visited, start to target
    pub path: Vec<String>,
    /// Number of hops taken
    pub steps: usize,
}

/// Run the guided search from `start_name` toward `end_name`.
pub(crate) async fn traverse(
    store: &dyn GraphStore,
    vault: VaultId,
    start_name: &str,
    end_name: &str,
    chooser: &dyn HopChooser,
    max_steps: usize,
    at_sequence: Option<i64>,
) -> GraphResult<AgenticPath> {
    let start = store
        .entity_by_name(vault, start_name)
        .await?
        .ok_or_else(|| GraphError::NameNotFound {
            name: start_name.to_owned(),
        })?;
    let end = store
        .entity_by_name(vault, end_name)
        .await?
        .ok_or_else(|| GraphError::NameNotFound {
            name: end_name.to_owned(),
        })?;

    tracing::debug!(from = %start.name, to = %end.name, max_steps, "guided traversal");
    let relationships = store.relationships(vault).await?;
    let graph = EntityGraph::build(&relationships, |_| true, at_sequence);

    let mut names: HashMap<EntityId, String> = HashMap::new();
    names.insert(start.id, start.name.clone());
    names.insert(end.id, end.name.clone());

    let mut visited: HashSet<EntityId> = HashSet::new();
    visited.insert(start.id);
    let mut path = vec![start.name.clone()];
    let mut current = start.id;
    let mut steps = 0usize;

    loop {
        if current == end.id {
            return Ok(AgenticPath { path, steps });
        }
        if steps >= max_steps {
            return Err(GraphError::StepLimitExceeded { max_steps, path });
        }

        let neighbors = neighbor_views(store, &graph, current, &mut names).await?;
        if neighbors.is_empty() {
            return Err(GraphError::DeadEnd { path });
        }

        let current_name = path.last().cloned().unwrap_or_default();
        let choice = chooser
            .choose_next(&current_name, &end.name, &neighbors)
            .await?;

        let chosen = neighbors
            .iter()
            .find(|n| n.name.eq_ignore_ascii_case(choice.trim()))
            .ok_or_else(|| GraphError::Decision {
                reason: format!("'{choice}' is not among the offered neighbors"),
            })?;

        path.push(chosen.name.clone());
        if !visited.insert(chosen.id) {
            return Err(GraphError::LoopDetected { path });
        }
        current = chosen.id;
        steps += 1;
    }
}

/// Distinct neighbors of `node` with resolved names. Neighbors whose
/// entity row is missing are silently left off the menu.
async fn neighbor_views(
    store: &dyn GraphStore,
    graph: &EntityGraph,
    node: EntityId,
    names: &mut HashMap<EntityId, String>,
) -> GraphResult<Vec<NeighborView>> {
    let mut seen: HashSet<EntityId> = HashSet::new();
    let mut views = Vec::new();

    for edge in graph.edges(node) {
        if !seen.insert(edge.to) {
            continue;
        }
        if !names.contains_key(&edge.to) {
            if let Some(entity) = store.entity(edge.to).await? {
                names.insert(edge.to, entity.name);
            }
        }
        if let Some(name) = names.get(&edge.to) {
            views.push(NeighborView {
                id: edge.to,
                name: name.clone(),
                kind: edge.kind,
            });
        }
    }

    views.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    Ok(views)
}
