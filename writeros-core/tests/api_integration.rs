//! Integration tests that hit a real Postgres instance (and optionally
//! the real embeddings API).
//!
//! These tests require DATABASE_URL to point at a Postgres database with
//! the pgvector extension available, set via .env file or environment.
//! The last test additionally requires OPENAI_API_KEY.
//! Run with: `cargo test -p writeros-core --test api_integration -- --ignored`
//!
//! These are marked #[ignore] by default to avoid:
//! - Requiring a database in CI
//! - API costs
//! - Slow test runs

use std::sync::Arc;

use writeros_core::embedding::{RemoteEmbedder, EMBEDDING_DIM};
use writeros_core::id::VaultId;
use writeros_core::model::{Entity, EntityKind, RelationKind, Relationship};
use writeros_core::retrieval::{RetrievalOptions, Retriever};
use writeros_core::store::{GraphStore, PgStore, VectorQuery};
use writeros_core::testing::FakeEmbedder;

/// Load environment variables from .env file and wire up log output
fn setup() {
    let _ = dotenvy::dotenv();
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Fake vector padded out to the schema's fixed width
fn wide_vector(text: &str) -> Vec<f32> {
    let mut vector = FakeEmbedder::vector(text);
    vector.resize(EMBEDDING_DIM, 0.0);
    vector
}

fn database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

async fn connect() -> Option<PgStore> {
    let Some(url) = database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return None;
    };
    let store = PgStore::connect(&url).await.expect("connect to Postgres");
    store.ensure_schema().await.expect("apply schema");
    Some(store)
}

#[tokio::test]
#[ignore] // Run with: cargo test -p writeros-core --test api_integration -- --ignored
async fn test_pg_entity_roundtrip_and_search() {
    setup();
    let Some(store) = connect().await else { return };

    let vault = VaultId::new();
    let hero = Entity::new(vault, EntityKind::Character, "Integration Hero")
        .with_description("a test character for the integration suite")
        .with_embedding(wide_vector("a test character"));
    store.insert_entity(&hero).await.expect("insert");

    let loaded = store.entity(hero.id).await.expect("select");
    assert_eq!(loaded.map(|e| e.name), Some("Integration Hero".to_owned()));

    let embedding = wide_vector("a test character");
    let query = VectorQuery::new(Some(vault), &embedding, 5);
    let hits = store.search_entities(&query).await.expect("search");
    assert!(hits.iter().any(|hit| hit.item.id == hero.id));
}

#[tokio::test]
#[ignore]
async fn test_pg_rejects_cross_vault_relationship() {
    setup();
    let Some(store) = connect().await else { return };

    let a = Entity::new(VaultId::new(), EntityKind::Character, "A");
    let b = Entity::new(VaultId::new(), EntityKind::Character, "B");
    store.insert_entity(&a).await.expect("insert a");
    store.insert_entity(&b).await.expect("insert b");

    let edge = Relationship::new(a.vault_id, a.id, b.id, RelationKind::Friend);
    assert!(store.insert_relationship(&edge).await.is_err());
}

#[tokio::test]
#[ignore]
async fn test_live_retrieval_end_to_end() {
    setup();
    let Some(store) = connect().await else { return };
    if std::env::var("OPENAI_API_KEY").is_err() {
        eprintln!("Skipping test: OPENAI_API_KEY not set");
        return;
    }

    use writeros_core::embedding::Embedder;

    let embedder = RemoteEmbedder::from_env().expect("embedder from env");
    let vault = VaultId::new();

    let text = "Marisol: a cartographer obsessed with uncharted coastlines";
    let vector = embedder.embed(text).await.expect("embed");
    let marisol = Entity::new(vault, EntityKind::Character, "Marisol")
        .with_description("a cartographer obsessed with uncharted coastlines")
        .with_embedding(vector);
    store.insert_entity(&marisol).await.expect("insert");

    let retriever = Retriever::new(Arc::new(store), Arc::new(embedder));
    let bundle = retriever
        .retrieve(
            "who maps unknown shores?",
            Some(vault),
            RetrievalOptions::default(),
        )
        .await
        .expect("retrieve");

    assert_eq!(
        bundle.entities.first().map(|hit| hit.item.name.as_str()),
        Some("Marisol")
    );
}
