//! In-memory store implementation.
//!
//! Backs unit and QA tests without a database, and doubles as a small
//! single-process store. Distances are computed locally with the same
//! metrics the Postgres store delegates to pgvector.

use super::{distance, GraphStore, Scored, VectorQuery};
use crate::error::{StoreError, StoreResult};
use crate::id::{DocumentId, EntityId, EventId, FactId, RelationshipId, VaultId};
use crate::model::{Document, Entity, Event, Fact, Relationship};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Default)]
struct Inner {
    entities: HashMap<EntityId, Entity>,
    relationships: HashMap<RelationshipId, Relationship>,
    facts: HashMap<FactId, Fact>,
    events: HashMap<EventId, Event>,
    documents: HashMap<DocumentId, Document>,
}

/// An in-process `GraphStore` over locked maps.
///
/// Cloning is cheap and shares the underlying data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Rank vault-filtered rows by distance to the query embedding.
///
/// Rows without an embedding are skipped; ties break by insertion-id order
/// via the stable sort over an id-sorted scan, keeping results
/// deterministic for snapshot tests.
fn rank<T: Clone, I: Ord + Copy + std::hash::Hash>(
    rows: &HashMap<I, T>,
    query: &VectorQuery<'_>,
    vault_of: impl Fn(&T) -> VaultId,
    embedding_of: impl Fn(&T) -> Option<&Vec<f32>>,
) -> Vec<Scored<T>> {
    let mut ids: Vec<I> = rows.keys().copied().collect();
    ids.sort();

    let mut scored: Vec<Scored<T>> = ids
        .into_iter()
        .filter_map(|id| {
            let row = &rows[&id];
            if let Some(vault) = query.vault {
                if vault_of(row) != vault {
                    return None;
                }
            }
            let embedding = embedding_of(row)?;
            Some(Scored {
                distance: distance(query.metric, query.embedding, embedding),
                item: row.clone(),
            })
        })
        .collect();

    scored.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    scored.truncate(query.limit);
    scored
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn insert_entity(&self, entity: &Entity) -> StoreResult<()> {
        self.write().entities.insert(entity.id, entity.clone());
        Ok(())
    }

    async fn insert_relationship(&self, relationship: &Relationship) -> StoreResult<()> {
        let mut inner = self.write();
        for endpoint in [relationship.from_entity, relationship.to_entity] {
            if !inner.entities.contains_key(&endpoint) {
                return Err(StoreError::DanglingEndpoint {
                    relationship: relationship.id,
                    entity: endpoint,
                });
            }
        }
        let from_vault = inner.entities[&relationship.from_entity].vault_id;
        let to_vault = inner.entities[&relationship.to_entity].vault_id;
        if from_vault != to_vault || from_vault != relationship.vault_id {
            return Err(StoreError::VaultMismatch {
                relationship: relationship.id,
                from_vault,
                to_vault,
            });
        }
        inner
            .relationships
            .insert(relationship.id, relationship.clone());
        Ok(())
    }

    async fn insert_fact(&self, fact: &Fact) -> StoreResult<()> {
        self.write().facts.insert(fact.id, fact.clone());
        Ok(())
    }

    async fn insert_event(&self, event: &Event) -> StoreResult<()> {
        self.write().events.insert(event.id, event.clone());
        Ok(())
    }

    async fn insert_document(&self, document: &Document) -> StoreResult<()> {
        self.write().documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn entity(&self, id: EntityId) -> StoreResult<Option<Entity>> {
        Ok(self.read().entities.get(&id).cloned())
    }

    async fn entity_by_name(&self, vault: VaultId, name: &str) -> StoreResult<Option<Entity>> {
        let inner = self.read();
        let needle = name.to_lowercase();
        let mut candidates: Vec<&Entity> = inner
            .entities
            .values()
            .filter(|e| e.vault_id == vault)
            .filter(|e| {
                e.name.to_lowercase() == needle
                    || e.aliases.iter().any(|a| a.to_lowercase() == needle)
            })
            .collect();
        // Deterministic pick when duplicate names exist across eras
        candidates.sort_by_key(|e| e.id);
        Ok(candidates.first().map(|e| (*e).clone()))
    }

    async fn event(&self, id: EventId) -> StoreResult<Option<Event>> {
        Ok(self.read().events.get(&id).cloned())
    }

    async fn relationships(&self, vault: VaultId) -> StoreResult<Vec<Relationship>> {
        let inner = self.read();
        let mut rows: Vec<Relationship> = inner
            .relationships
            .values()
            .filter(|r| r.vault_id == vault)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    async fn events(&self, vault: VaultId) -> StoreResult<Vec<Event>> {
        let inner = self.read();
        let mut rows: Vec<Event> = inner
            .events
            .values()
            .filter(|e| e.vault_id == vault)
            .cloned()
            .collect();
        rows.sort_by_key(|e| e.id);
        Ok(rows)
    }

    async fn search_entities(&self, query: &VectorQuery<'_>) -> StoreResult<Vec<Scored<Entity>>> {
        let inner = self.read();
        Ok(rank(
            &inner.entities,
            query,
            |e| e.vault_id,
            |e| e.embedding.as_ref(),
        ))
    }

    async fn search_facts(&self, query: &VectorQuery<'_>) -> StoreResult<Vec<Scored<Fact>>> {
        let inner = self.read();
        Ok(rank(
            &inner.facts,
            query,
            |f| f.vault_id,
            |f| f.embedding.as_ref(),
        ))
    }

    async fn search_events(&self, query: &VectorQuery<'_>) -> StoreResult<Vec<Scored<Event>>> {
        let inner = self.read();
        Ok(rank(
            &inner.events,
            query,
            |e| e.vault_id,
            |e| e.embedding.as_ref(),
        ))
    }

    async fn search_documents(
        &self,
        query: &VectorQuery<'_>,
    ) -> StoreResult<Vec<Scored<Document>>> {
        let inner = self.read();
        Ok(rank(
            &inner.documents,
            query,
            |d| d.vault_id,
            |d| d.embedding.as_ref(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EntityKind, RelationKind};
    use crate::store::DistanceMetric;

    fn entity_with_embedding(vault: VaultId, name: &str, embedding: Vec<f32>) -> Entity {
        Entity::new(vault, EntityKind::Character, name).with_embedding(embedding)
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let store = MemoryStore::new();
        let vault = VaultId::new();
        let entity = Entity::new(vault, EntityKind::Character, "Maren").with_alias("The Gull");
        store.insert_entity(&entity).await.unwrap();

        let found = store.entity(entity.id).await.unwrap().unwrap();
        assert_eq!(found.name, "Maren");

        let by_alias = store.entity_by_name(vault, "the gull").await.unwrap();
        assert_eq!(by_alias.unwrap().id, entity.id);

        let other_vault = store.entity_by_name(VaultId::new(), "Maren").await.unwrap();
        assert!(other_vault.is_none());
    }

    #[tokio::test]
    async fn test_relationship_endpoint_validation() {
        let store = MemoryStore::new();
        let vault = VaultId::new();
        let a = Entity::new(vault, EntityKind::Character, "A");
        store.insert_entity(&a).await.unwrap();

        let dangling = Relationship::new(vault, a.id, EntityId::new(), RelationKind::Friend);
        let err = store.insert_relationship(&dangling).await.unwrap_err();
        assert!(matches!(err, StoreError::DanglingEndpoint { .. }));
    }

    #[tokio::test]
    async fn test_relationship_vault_mismatch() {
        let store = MemoryStore::new();
        let vault_a = VaultId::new();
        let vault_b = VaultId::new();
        let a = Entity::new(vault_a, EntityKind::Character, "A");
        let b = Entity::new(vault_b, EntityKind::Character, "B");
        store.insert_entity(&a).await.unwrap();
        store.insert_entity(&b).await.unwrap();

        let cross = Relationship::new(vault_a, a.id, b.id, RelationKind::Friend);
        let err = store.insert_relationship(&cross).await.unwrap_err();
        assert!(matches!(err, StoreError::VaultMismatch { .. }));
    }

    #[tokio::test]
    async fn test_search_ranks_ascending() {
        let store = MemoryStore::new();
        let vault = VaultId::new();
        let near = entity_with_embedding(vault, "near", vec![1.0, 0.0]);
        let far = entity_with_embedding(vault, "far", vec![0.0, 1.0]);
        let mid = entity_with_embedding(vault, "mid", vec![1.0, 1.0]);
        for e in [&near, &far, &mid] {
            store.insert_entity(e).await.unwrap();
        }

        let embedding = [1.0, 0.0];
        let query = VectorQuery::new(Some(vault), &embedding, 3);
        let hits = store.search_entities(&query).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].item.name, "near");
        assert_eq!(hits[1].item.name, "mid");
        assert_eq!(hits[2].item.name, "far");
        assert!(hits[0].distance <= hits[1].distance);
        assert!(hits[1].distance <= hits[2].distance);
    }

    #[tokio::test]
    async fn test_search_respects_limit_and_metric() {
        let store = MemoryStore::new();
        let vault = VaultId::new();
        for i in 0..10 {
            let e = entity_with_embedding(vault, &format!("e{i}"), vec![i as f32, 1.0]);
            store.insert_entity(&e).await.unwrap();
        }

        let embedding = [0.0, 1.0];
        let query =
            VectorQuery::new(Some(vault), &embedding, 4).with_metric(DistanceMetric::L2);
        let hits = store.search_entities(&query).await.unwrap();
        assert_eq!(hits.len(), 4);
        assert_eq!(hits[0].item.name, "e0");
    }

    #[tokio::test]
    async fn test_rows_without_embedding_skipped() {
        let store = MemoryStore::new();
        let vault = VaultId::new();
        let plain = Entity::new(vault, EntityKind::Character, "no-vector");
        store.insert_entity(&plain).await.unwrap();

        let embedding = [1.0, 0.0];
        let query = VectorQuery::new(Some(vault), &embedding, 5);
        let hits = store.search_entities(&query).await.unwrap();
        assert!(hits.is_empty());
    }
}
