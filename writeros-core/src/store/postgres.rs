//! Postgres + pgvector store implementation.
//!
//! Each typed collection has its own table with a `vector(1536)` embedding
//! column and an HNSW index. Nearest-neighbor queries rank with the
//! pgvector `<=>` (cosine) or `<->` (L2) operator and always filter by
//! `vault_id` when one is given.
//!
//! The pool is constructed once at process start and injected; retrieval
//! and traversal are read-only, so concurrent callers share it freely.

use super::{DistanceMetric, GraphStore, Scored, VectorQuery};
use crate::error::{StoreError, StoreResult};
use crate::id::{DocumentId, EntityId, EventId, FactId, RelationshipId, VaultId};
use crate::model::{
    Canon, DocKind, Document, Entity, EntityKind, EntityStatus, Event, Fact, FactKind,
    RelationKind, Relationship, StoryTime, ValidityWindow,
};
use async_trait::async_trait;
use pgvector::Vector;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const SCHEMA: &[&str] = &[
    "CREATE EXTENSION IF NOT EXISTS vector",
    "CREATE TABLE IF NOT EXISTS entities (
        id UUID PRIMARY KEY,
        vault_id UUID NOT NULL,
        kind TEXT NOT NULL,
        name TEXT NOT NULL,
        aliases JSONB NOT NULL DEFAULT '[]',
        description TEXT NOT NULL DEFAULT '',
        status TEXT NOT NULL,
        properties JSONB NOT NULL DEFAULT '{}',
        embedding vector(1536),
        canon JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS entities_vault_idx ON entities (vault_id)",
    "CREATE INDEX IF NOT EXISTS entities_embedding_idx
        ON entities USING hnsw (embedding vector_cosine_ops)",
    "CREATE TABLE IF NOT EXISTS relationships (
        id UUID PRIMARY KEY,
        vault_id UUID NOT NULL,
        from_entity UUID NOT NULL REFERENCES entities (id),
        to_entity UUID NOT NULL REFERENCES entities (id),
        kind TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        properties JSONB NOT NULL DEFAULT '{}',
        validity_from BIGINT,
        validity_until BIGINT,
        canon JSONB NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS relationships_vault_idx ON relationships (vault_id)",
    "CREATE TABLE IF NOT EXISTS facts (
        id UUID PRIMARY KEY,
        vault_id UUID NOT NULL,
        entity_id UUID NOT NULL,
        kind TEXT NOT NULL,
        content TEXT NOT NULL,
        source TEXT,
        confidence REAL NOT NULL,
        embedding vector(1536),
        created_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS facts_vault_idx ON facts (vault_id)",
    "CREATE INDEX IF NOT EXISTS facts_embedding_idx
        ON facts USING hnsw (embedding vector_cosine_ops)",
    "CREATE TABLE IF NOT EXISTS events (
        id UUID PRIMARY KEY,
        vault_id UUID NOT NULL,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        story_year BIGINT,
        story_detail JSONB NOT NULL DEFAULT '{}',
        sequence_order BIGINT,
        causes JSONB NOT NULL DEFAULT '[]',
        embedding vector(1536),
        created_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS events_vault_idx ON events (vault_id)",
    "CREATE INDEX IF NOT EXISTS events_embedding_idx
        ON events USING hnsw (embedding vector_cosine_ops)",
    "CREATE TABLE IF NOT EXISTS documents (
        id UUID PRIMARY KEY,
        vault_id UUID NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        kind TEXT NOT NULL,
        embedding vector(1536),
        metadata JSONB NOT NULL DEFAULT '{}',
        created_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS documents_vault_idx ON documents (vault_id)",
    "CREATE INDEX IF NOT EXISTS documents_embedding_idx
        ON documents USING hnsw (embedding vector_cosine_ops)",
];

/// Postgres-backed `GraphStore`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing connection pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the given database URL
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(url).await?;
        Ok(Self::new(pool))
    }

    /// Create tables and ANN indexes if they do not exist
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// The underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Serialize a snake_case serde enum to its string form
fn enum_to_text<T: Serialize>(value: &T) -> StoreResult<String> {
    match serde_json::to_value(value) {
        Ok(Value::String(s)) => Ok(s),
        Ok(other) => Err(StoreError::Encoding(format!(
            "expected string-encoded enum, got {other}"
        ))),
        Err(e) => Err(StoreError::Encoding(e.to_string())),
    }
}

/// Parse a snake_case serde enum from its string form
fn enum_from_text<T: DeserializeOwned>(text: &str) -> StoreResult<T> {
    serde_json::from_value(Value::String(text.to_string()))
        .map_err(|e| StoreError::Encoding(format!("bad enum value '{text}': {e}")))
}

fn json_decode<T: DeserializeOwned>(value: Value, what: &str) -> StoreResult<T> {
    serde_json::from_value(value).map_err(|e| StoreError::Encoding(format!("bad {what}: {e}")))
}

fn json_encode<T: Serialize>(value: &T, what: &str) -> StoreResult<Value> {
    serde_json::to_value(value).map_err(|e| StoreError::Encoding(format!("bad {what}: {e}")))
}

fn metric_operator(metric: DistanceMetric) -> &'static str {
    match metric {
        DistanceMetric::Cosine => "<=>",
        DistanceMetric::L2 => "<->",
    }
}

fn embedding_column(row: &PgRow) -> StoreResult<Option<Vec<f32>>> {
    let vector: Option<Vector> = row.try_get("embedding")?;
    Ok(vector.map(|v| v.to_vec()))
}

fn row_to_entity(row: &PgRow) -> StoreResult<Entity> {
    Ok(Entity {
        id: EntityId::from_uuid(row.try_get("id")?),
        vault_id: VaultId::from_uuid(row.try_get("vault_id")?),
        kind: enum_from_text::<EntityKind>(row.try_get("kind")?)?,
        name: row.try_get("name")?,
        aliases: json_decode(row.try_get("aliases")?, "aliases")?,
        description: row.try_get("description")?,
        status: enum_from_text::<EntityStatus>(row.try_get("status")?)?,
        properties: json_decode(row.try_get("properties")?, "properties")?,
        embedding: embedding_column(row)?,
        canon: json_decode::<Canon>(row.try_get("canon")?, "canon")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_relationship(row: &PgRow) -> StoreResult<Relationship> {
    Ok(Relationship {
        id: RelationshipId::from_uuid(row.try_get("id")?),
        vault_id: VaultId::from_uuid(row.try_get("vault_id")?),
        from_entity: EntityId::from_uuid(row.try_get("from_entity")?),
        to_entity: EntityId::from_uuid(row.try_get("to_entity")?),
        kind: enum_from_text::<RelationKind>(row.try_get("kind")?)?,
        description: row.try_get("description")?,
        properties: json_decode(row.try_get("properties")?, "properties")?,
        validity: ValidityWindow {
            from: row.try_get("validity_from")?,
            until: row.try_get("validity_until")?,
        },
        canon: json_decode::<Canon>(row.try_get("canon")?, "canon")?,
    })
}

fn row_to_fact(row: &PgRow) -> StoreResult<Fact> {
    Ok(Fact {
        id: FactId::from_uuid(row.try_get("id")?),
        vault_id: VaultId::from_uuid(row.try_get("vault_id")?),
        entity_id: EntityId::from_uuid(row.try_get("entity_id")?),
        kind: enum_from_text::<FactKind>(row.try_get("kind")?)?,
        content: row.try_get("content")?,
        source: row.try_get("source")?,
        confidence: row.try_get("confidence")?,
        embedding: embedding_column(row)?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_event(row: &PgRow) -> StoreResult<Event> {
    let causes: Vec<Uuid> = json_decode(row.try_get("causes")?, "causes")?;
    Ok(Event {
        id: EventId::from_uuid(row.try_get("id")?),
        vault_id: VaultId::from_uuid(row.try_get("vault_id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        story_time: StoryTime {
            year: row.try_get("story_year")?,
            detail: json_decode(row.try_get("story_detail")?, "story_detail")?,
        },
        sequence_order: row.try_get("sequence_order")?,
        causes: causes.into_iter().map(EventId::from_uuid).collect(),
        embedding: embedding_column(row)?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_document(row: &PgRow) -> StoreResult<Document> {
    Ok(Document {
        id: DocumentId::from_uuid(row.try_get("id")?),
        vault_id: VaultId::from_uuid(row.try_get("vault_id")?),
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        kind: enum_from_text::<DocKind>(row.try_get("kind")?)?,
        embedding: embedding_column(row)?,
        metadata: json_decode(row.try_get("metadata")?, "metadata")?,
        created_at: row.try_get("created_at")?,
    })
}

impl PgStore {
    /// Run one ranked ANN query and map the rows.
    async fn search<T>(
        &self,
        table: &str,
        query: &VectorQuery<'_>,
        map: impl Fn(&PgRow) -> StoreResult<T>,
    ) -> StoreResult<Vec<Scored<T>>> {
        let op = metric_operator(query.metric);
        let sql = format!(
            "SELECT *, embedding {op} $1 AS distance
             FROM {table}
             WHERE embedding IS NOT NULL
               AND ($2::uuid IS NULL OR vault_id = $2)
             ORDER BY embedding {op} $1 ASC
             LIMIT $3"
        );
        let rows = sqlx::query(&sql)
            .bind(Vector::from(query.embedding.to_vec()))
            .bind(query.vault.map(|v| *v.as_uuid()))
            .bind(query.limit as i64)
            .fetch_all(&self.pool)
            .await?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let distance: f64 = row.try_get("distance")?;
            hits.push(Scored {
                distance: distance as f32,
                item: map(row)?,
            });
        }
        Ok(hits)
    }
}

#[async_trait]
impl GraphStore for PgStore {
    async fn insert_entity(&self, entity: &Entity) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO entities
                (id, vault_id, kind, name, aliases, description, status,
                 properties, embedding, canon, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                aliases = EXCLUDED.aliases,
                description = EXCLUDED.description,
                status = EXCLUDED.status,
                properties = EXCLUDED.properties,
                embedding = EXCLUDED.embedding,
                canon = EXCLUDED.canon",
        )
        .bind(entity.id.as_uuid())
        .bind(entity.vault_id.as_uuid())
        .bind(enum_to_text(&entity.kind)?)
        .bind(&entity.name)
        .bind(json_encode(&entity.aliases, "aliases")?)
        .bind(&entity.description)
        .bind(enum_to_text(&entity.status)?)
        .bind(Value::Object(entity.properties.clone()))
        .bind(entity.embedding.clone().map(Vector::from))
        .bind(json_encode(&entity.canon, "canon")?)
        .bind(entity.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_relationship(&self, relationship: &Relationship) -> StoreResult<()> {
        // Validate endpoints before touching the table so the error is
        // typed rather than a raw foreign-key violation.
        let mut vaults = Vec::with_capacity(2);
        for endpoint in [relationship.from_entity, relationship.to_entity] {
            let row = sqlx::query("SELECT vault_id FROM entities WHERE id = $1")
                .bind(endpoint.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
            match row {
                Some(row) => vaults.push(VaultId::from_uuid(row.try_get("vault_id")?)),
                None => {
                    return Err(StoreError::DanglingEndpoint {
                        relationship: relationship.id,
                        entity: endpoint,
                    })
                }
            }
        }
        if vaults[0] != vaults[1] || vaults[0] != relationship.vault_id {
            return Err(StoreError::VaultMismatch {
                relationship: relationship.id,
                from_vault: vaults[0],
                to_vault: vaults[1],
            });
        }

        sqlx::query(
            "INSERT INTO relationships
                (id, vault_id, from_entity, to_entity, kind, description,
                 properties, validity_from, validity_until, canon)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (id) DO UPDATE SET
                description = EXCLUDED.description,
                properties = EXCLUDED.properties,
                validity_from = EXCLUDED.validity_from,
                validity_until = EXCLUDED.validity_until,
                canon = EXCLUDED.canon",
        )
        .bind(relationship.id.as_uuid())
        .bind(relationship.vault_id.as_uuid())
        .bind(relationship.from_entity.as_uuid())
        .bind(relationship.to_entity.as_uuid())
        .bind(enum_to_text(&relationship.kind)?)
        .bind(&relationship.description)
        .bind(Value::Object(relationship.properties.clone()))
        .bind(relationship.validity.from)
        .bind(relationship.validity.until)
        .bind(json_encode(&relationship.canon, "canon")?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_fact(&self, fact: &Fact) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO facts
                (id, vault_id, entity_id, kind, content, source, confidence,
                 embedding, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(fact.id.as_uuid())
        .bind(fact.vault_id.as_uuid())
        .bind(fact.entity_id.as_uuid())
        .bind(enum_to_text(&fact.kind)?)
        .bind(&fact.content)
        .bind(&fact.source)
        .bind(fact.confidence)
        .bind(fact.embedding.clone().map(Vector::from))
        .bind(fact.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_event(&self, event: &Event) -> StoreResult<()> {
        let causes: Vec<Uuid> = event.causes.iter().map(|c| *c.as_uuid()).collect();
        sqlx::query(
            "INSERT INTO events
                (id, vault_id, name, description, story_year, story_detail,
                 sequence_order, causes, embedding, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (id) DO UPDATE SET
                description = EXCLUDED.description,
                story_year = EXCLUDED.story_year,
                story_detail = EXCLUDED.story_detail,
                sequence_order = EXCLUDED.sequence_order,
                causes = EXCLUDED.causes,
                embedding = EXCLUDED.embedding",
        )
        .bind(event.id.as_uuid())
        .bind(event.vault_id.as_uuid())
        .bind(&event.name)
        .bind(&event.description)
        .bind(event.story_time.year)
        .bind(Value::Object(event.story_time.detail.clone()))
        .bind(event.sequence_order)
        .bind(json_encode(&causes, "causes")?)
        .bind(event.embedding.clone().map(Vector::from))
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_document(&self, document: &Document) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO documents
                (id, vault_id, title, content, kind, embedding, metadata, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(document.id.as_uuid())
        .bind(document.vault_id.as_uuid())
        .bind(&document.title)
        .bind(&document.content)
        .bind(enum_to_text(&document.kind)?)
        .bind(document.embedding.clone().map(Vector::from))
        .bind(Value::Object(document.metadata.clone()))
        .bind(document.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn entity(&self, id: EntityId) -> StoreResult<Option<Entity>> {
        let row = sqlx::query("SELECT * FROM entities WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_entity).transpose()
    }

    async fn entity_by_name(&self, vault: VaultId, name: &str) -> StoreResult<Option<Entity>> {
        let row = sqlx::query(
            "SELECT * FROM entities
             WHERE vault_id = $1
               AND (lower(name) = lower($2)
                    OR EXISTS (
                        SELECT 1 FROM jsonb_array_elements_text(aliases) alias
                        WHERE lower(alias) = lower($2)))
             ORDER BY id
             LIMIT 1",
        )
        .bind(vault.as_uuid())
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_entity).transpose()
    }

    async fn event(&self, id: EventId) -> StoreResult<Option<Event>> {
        let row = sqlx::query("SELECT * FROM events WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_event).transpose()
    }

    async fn relationships(&self, vault: VaultId) -> StoreResult<Vec<Relationship>> {
        let rows = sqlx::query("SELECT * FROM relationships WHERE vault_id = $1 ORDER BY id")
            .bind(vault.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_relationship).collect()
    }

    async fn events(&self, vault: VaultId) -> StoreResult<Vec<Event>> {
        let rows = sqlx::query("SELECT * FROM events WHERE vault_id = $1 ORDER BY id")
            .bind(vault.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_event).collect()
    }

    async fn search_entities(&self, query: &VectorQuery<'_>) -> StoreResult<Vec<Scored<Entity>>> {
        self.search("entities", query, row_to_entity).await
    }

    async fn search_facts(&self, query: &VectorQuery<'_>) -> StoreResult<Vec<Scored<Fact>>> {
        self.search("facts", query, row_to_fact).await
    }

    async fn search_events(&self, query: &VectorQuery<'_>) -> StoreResult<Vec<Scored<Event>>> {
        self.search("events", query, row_to_event).await
    }

    async fn search_documents(
        &self,
        query: &VectorQuery<'_>,
    ) -> StoreResult<Vec<Scored<Document>>> {
        self.search("documents", query, row_to_document).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityStatus;

    #[test]
    fn test_enum_text_round_trip() {
        let text = enum_to_text(&RelationKind::ConnectedTo).unwrap();
        assert_eq!(text, "connected_to");
        let parsed: RelationKind = enum_from_text(&text).unwrap();
        assert_eq!(parsed, RelationKind::ConnectedTo);
    }

    #[test]
    fn test_enum_from_bad_text() {
        let err = enum_from_text::<EntityStatus>("zombie").unwrap_err();
        assert!(matches!(err, StoreError::Encoding(_)));
    }

    #[test]
    fn test_metric_operators() {
        assert_eq!(metric_operator(DistanceMetric::Cosine), "<=>");
        assert_eq!(metric_operator(DistanceMetric::L2), "<->");
    }
}
