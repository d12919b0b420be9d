//! Iterative multi-hop retrieval.
//!
//! Some questions need several rounds of lookup: the first retrieval
//! surfaces names the query never mentioned, and those names are what
//! the next round should search for. The coordinator reformulates the
//! query after each hop from what the hop surfaced, never issues the
//! same query twice, and returns the union of everything retrieved.

use crate::error::RetrievalResult;
use crate::id::{DocumentId, EntityId, EventId, FactId, VaultId};
use crate::model::{Document, Entity, Event, Fact};
use crate::retrieval::{RetrievalBundle, RetrievalOptions, Retriever};
use std::collections::HashSet;

/// Hop ceiling
pub const DEFAULT_MAX_HOPS: usize = 10;
/// Per-type result cap for each hop
pub const DEFAULT_LIMIT_PER_HOP: usize = 3;

/// How many surfaced names feed the next hop's query
const EXPANSION_NAMES: usize = 4;

/// Everything retrieved across all hops, deduplicated by id
#[derive(Debug, Clone, Default)]
pub struct IterativeResults {
    /// The queries issued, in hop order
    pub queries: Vec<String>,
    /// Union of retrieved entities
    pub entities: Vec<Entity>,
    /// Union of retrieved facts
    pub facts: Vec<Fact>,
    /// Union of retrieved events
    pub events: Vec<Event>,
    /// Union of retrieved documents
    pub documents: Vec<Document>,
    /// Warnings carried over from individual hops
    pub warnings: Vec<String>,
}

impl IterativeResults {
    /// Total items across all collections
    pub fn len(&self) -> usize {
        self.entities.len() + self.facts.len() + self.events.len() + self.documents.len()
    }

    /// Whether nothing at all was retrieved
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drives repeated retrieval rounds over an injected [`Retriever`].
#[derive(Clone)]
pub struct RagCoordinator {
    retriever: Retriever,
    max_hops: usize,
    limit_per_hop: usize,
}

impl RagCoordinator {
    /// Create a coordinator with default bounds
    pub fn new(retriever: Retriever) -> Self {
        Self {
            retriever,
            max_hops: DEFAULT_MAX_HOPS,
            limit_per_hop: DEFAULT_LIMIT_PER_HOP,
        }
    }

    /// Set the hop ceiling
    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = max_hops;
        self
    }

    /// Set the per-type result cap for each hop
    pub fn with_limit_per_hop(mut self, limit_per_hop: usize) -> Self {
        self.limit_per_hop = limit_per_hop;
        self
    }

    /// Retrieve iteratively, reformulating the query from each hop's
    /// results, until the hop ceiling is reached, a reformulation
    /// repeats an earlier query, or a hop contributes nothing new.
    pub async fn retrieve_iterative(
        &self,
        initial_query: &str,
        vault: Option<VaultId>,
    ) -> RetrievalResult<IterativeResults> {
        let mut results = IterativeResults::default();
        let mut issued: HashSet<String> = HashSet::new();
        let mut seen_entities: HashSet<EntityId> = HashSet::new();
        let mut seen_facts: HashSet<FactId> = HashSet::new();
        let mut seen_events: HashSet<EventId> = HashSet::new();
        let mut seen_documents: HashSet<DocumentId> = HashSet::new();

        let mut query = initial_query.trim().to_owned();

        for hop in 0..self.max_hops {
            if !issued.insert(query.clone()) {
                tracing::debug!(hop, %query, "reformulated query already issued, stopping");
                break;
            }
            results.queries.push(query.clone());

            let options = RetrievalOptions::default().with_limit(self.limit_per_hop);
            let bundle = self.retriever.retrieve(&query, vault, options).await?;

            let fresh_names = self.absorb(
                bundle,
                &mut results,
                (
                    &mut seen_entities,
                    &mut seen_facts,
                    &mut seen_events,
                    &mut seen_documents,
                ),
            );

            if fresh_names.is_empty() {
                tracing::debug!(hop, "hop contributed nothing new, stopping");
                break;
            }
            query = expand_query(initial_query, &fresh_names);
        }

        Ok(results)
    }

    /// Merge a hop's bundle into the union, returning the names of
    /// items not seen on any earlier hop.
    fn absorb(
        &self,
        bundle: RetrievalBundle,
        results: &mut IterativeResults,
        seen: (
            &mut HashSet<EntityId>,
            &mut HashSet<FactId>,
            &mut HashSet<EventId>,
            &mut HashSet<DocumentId>,
        ),
    ) -> Vec<String> {
        let (seen_entities, seen_facts, seen_events, seen_documents) = seen;
        let mut fresh_names = Vec::new();

        for scored in bundle.entities {
            if seen_entities.insert(scored.item.id) {
                fresh_names.push(scored.item.name.clone());
                results.entities.push(scored.item);
            }
        }
        for scored in bundle.facts {
            if seen_facts.insert(scored.item.id) {
                fresh_names.push(scored.item.content.clone());
                results.facts.push(scored.item);
            }
        }
        for scored in bundle.events {
            if seen_events.insert(scored.item.id) {
                fresh_names.push(scored.item.name.clone());
                results.events.push(scored.item);
            }
        }
        for scored in bundle.documents {
            if seen_documents.insert(scored.item.id) {
                fresh_names.push(scored.item.title.clone());
                results.documents.push(scored.item);
            }
        }
        results.warnings.extend(bundle.warnings);

        fresh_names
    }
}

/// Reformulate the next hop's query: the original question plus the
/// most relevant handful of newly surfaced names. Deterministic, so
/// the dedup set catches stalled expansions.
fn expand_query(initial_query: &str, fresh_names: &[String]) -> String {
    let additions: Vec<&str> = fresh_names
        .iter()
        .map(String::as_str)
        .take(EXPANSION_NAMES)
        .collect();
    format!("{} {}", initial_query.trim(), additions.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_query_appends_fresh_names() {
        let expanded = expand_query(
            "who betrayed the crown",
            &["Lady Maren".to_owned(), "The Red Accord".to_owned()],
        );
        assert_eq!(expanded, "who betrayed the crown Lady Maren The Red Accord");
    }

    #[test]
    fn test_expand_query_caps_additions() {
        let names: Vec<String> = (0..10).map(|i| format!("name{i}")).collect();
        let expanded = expand_query("q", &names);
        assert_eq!(expanded, "q name0 name1 name2 name3");
    }
}
