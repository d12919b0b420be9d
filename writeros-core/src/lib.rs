//! GraphRAG retrieval and traversal engine for story knowledge graphs.
//!
//! This crate is the data/graph core beneath a swarm of story-analysis
//! agents. It provides:
//! - A typed data model for vault-scoped story knowledge (entities,
//!   relationships, facts, events, documents), each row carrying an
//!   embedding vector
//! - Vector stores: Postgres/pgvector for production, in-memory for tests
//! - Semantic nearest-neighbor retrieval across the typed collections,
//!   with optional temporal filtering
//! - Graph traversal: family-tree generation numbering, causality chain
//!   tracing, route finding, social influence ego-networks, and
//!   LLM-guided path search
//! - An iterative multi-hop RAG coordinator
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use writeros_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(PgStore::connect(&std::env::var("DATABASE_URL")?).await?);
//!     let embedder = Arc::new(RemoteEmbedder::from_env()?);
//!     let vault = VaultId::new();
//!
//!     let retriever = Retriever::new(store, embedder);
//!     let bundle = retriever
//!         .retrieve(
//!             "who betrayed the northern alliance?",
//!             Some(vault),
//!             RetrievalOptions::default(),
//!         )
//!         .await?;
//!     println!("{}", format_results(&bundle, 300));
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod embedding;
pub mod error;
pub mod graph;
pub mod id;
pub mod model;
pub mod rag;
pub mod retrieval;
pub mod store;
pub mod testing;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::embedding::{Embedder, RemoteEmbedder};
    pub use crate::error::*;
    pub use crate::graph::{GraphEngine, HopChooser};
    pub use crate::id::*;
    pub use crate::model::*;
    pub use crate::rag::RagCoordinator;
    pub use crate::retrieval::{
        format_results, RetrievalBundle, RetrievalOptions, Retriever, TemporalFilter,
    };
    pub use crate::store::{DistanceMetric, GraphStore, MemoryStore, PgStore, Scored, VectorQuery};
}
