//! Vector store abstraction and implementations.
//!
//! `GraphStore` is the seam between the retrieval/traversal engine and
//! persistence. Two implementations are provided:
//! - `PgStore`: Postgres + pgvector with HNSW indexes (production)
//! - `MemoryStore`: in-process maps with locally computed distances
//!   (tests, small vaults)
//!
//! The store is injected by reference into every component that needs it;
//! there is no global engine singleton.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use crate::error::StoreResult;
use crate::id::{EntityId, EventId, VaultId};
use crate::model::{Document, Entity, Event, Fact, Relationship};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Distance metric for nearest-neighbor search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine distance (1 - cosine similarity); the default contract
    #[default]
    Cosine,
    /// Euclidean distance
    L2,
}

/// A nearest-neighbor query against one typed collection
#[derive(Debug, Clone)]
pub struct VectorQuery<'a> {
    /// Restrict to one vault, or search globally
    pub vault: Option<VaultId>,
    /// The query embedding
    pub embedding: &'a [f32],
    /// Maximum rows to return
    pub limit: usize,
    /// Distance metric
    pub metric: DistanceMetric,
}

impl<'a> VectorQuery<'a> {
    /// Create a query over one vault with the default metric
    pub fn new(vault: Option<VaultId>, embedding: &'a [f32], limit: usize) -> Self {
        Self {
            vault,
            embedding,
            limit,
            metric: DistanceMetric::default(),
        }
    }

    /// Set the distance metric
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }
}

/// A row paired with its distance from the query embedding
#[derive(Debug, Clone)]
pub struct Scored<T> {
    /// Distance from the query (smaller is closer)
    pub distance: f32,
    /// The matched row
    pub item: T,
}

/// Storage seam for the graph core.
///
/// Search results are always ordered ascending by distance. Inserting a
/// relationship validates that both endpoints exist in the same vault.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Insert an entity
    async fn insert_entity(&self, entity: &Entity) -> StoreResult<()>;

    /// Insert a relationship, validating both endpoints
    async fn insert_relationship(&self, relationship: &Relationship) -> StoreResult<()>;

    /// Insert a fact (append-only; facts are never updated)
    async fn insert_fact(&self, fact: &Fact) -> StoreResult<()>;

    /// Insert an event
    async fn insert_event(&self, event: &Event) -> StoreResult<()>;

    /// Insert a document chunk
    async fn insert_document(&self, document: &Document) -> StoreResult<()>;

    /// Look up an entity by id
    async fn entity(&self, id: EntityId) -> StoreResult<Option<Entity>>;

    /// Look up an entity by exact name or alias within a vault
    async fn entity_by_name(&self, vault: VaultId, name: &str) -> StoreResult<Option<Entity>>;

    /// Look up an event by id
    async fn event(&self, id: EventId) -> StoreResult<Option<Event>>;

    /// Load all relationships in a vault
    async fn relationships(&self, vault: VaultId) -> StoreResult<Vec<Relationship>>;

    /// Load all events in a vault
    async fn events(&self, vault: VaultId) -> StoreResult<Vec<Event>>;

    /// Nearest-neighbor search over entities
    async fn search_entities(&self, query: &VectorQuery<'_>) -> StoreResult<Vec<Scored<Entity>>>;

    /// Nearest-neighbor search over facts
    async fn search_facts(&self, query: &VectorQuery<'_>) -> StoreResult<Vec<Scored<Fact>>>;

    /// Nearest-neighbor search over events
    async fn search_events(&self, query: &VectorQuery<'_>) -> StoreResult<Vec<Scored<Event>>>;

    /// Nearest-neighbor search over documents
    async fn search_documents(&self, query: &VectorQuery<'_>)
        -> StoreResult<Vec<Scored<Document>>>;
}

/// Compute the distance between two vectors under the given metric.
///
/// Mismatched lengths compare over the shorter prefix; a zero-magnitude
/// vector has maximal cosine distance.
pub(crate) fn distance(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    match metric {
        DistanceMetric::Cosine => {
            let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
            let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            if mag_a == 0.0 || mag_b == 0.0 {
                return 1.0;
            }
            1.0 - dot / (mag_a * mag_b)
        }
        DistanceMetric::L2 => a
            .iter()
            .zip(b)
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_distance() {
        let a = [1.0, 0.0];
        let b = [1.0, 0.0];
        let c = [0.0, 1.0];
        assert!(distance(DistanceMetric::Cosine, &a, &b).abs() < 1e-6);
        assert!((distance(DistanceMetric::Cosine, &a, &c) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_distance() {
        let a = [0.0, 0.0];
        let b = [3.0, 4.0];
        assert!((distance(DistanceMetric::L2, &a, &b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_cosine() {
        let a = [0.0, 0.0];
        let b = [1.0, 1.0];
        assert_eq!(distance(DistanceMetric::Cosine, &a, &b), 1.0);
    }
}
