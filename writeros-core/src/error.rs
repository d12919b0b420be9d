//! Error types for the graph core.
//!
//! Uses thiserror for ergonomic error definition. Each subsystem has its
//! own error enum; `Error` is the umbrella type for callers that cross
//! subsystem boundaries.

use crate::id::{EntityId, EventId, RelationshipId, VaultId};

/// Main error type for the graph core
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Store-related error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Embedding-related error
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbedError),

    /// Graph traversal error
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Retrieval error
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Storage-layer errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A relationship references an entity that does not exist
    #[error("Relationship {relationship} references missing entity {entity}")]
    DanglingEndpoint {
        /// The offending relationship
        relationship: RelationshipId,
        /// The missing endpoint
        entity: EntityId,
    },

    /// A relationship spans two different vaults
    #[error("Relationship {relationship} crosses vaults {from_vault} and {to_vault}")]
    VaultMismatch {
        /// The offending relationship
        relationship: RelationshipId,
        /// Vault of the source entity
        from_vault: VaultId,
        /// Vault of the target entity
        to_vault: VaultId,
    },

    /// A row column could not be encoded or decoded
    #[error("Row encoding error: {0}")]
    Encoding(String),
}

/// Embedding-service errors.
///
/// An embedding failure always aborts the retrieval that needed it — the
/// core never substitutes a zero vector.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Upstream client error
    #[error("Embedding provider error: {0}")]
    Provider(#[from] embeddings::Error),

    /// The provider returned a vector of the wrong width
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured dimensionality
        expected: usize,
        /// What the provider returned
        actual: usize,
    },

    /// The embedding call did not complete in time
    #[error("Embedding call timed out after {duration:?}")]
    Timeout {
        /// How long we waited
        duration: std::time::Duration,
    },
}

/// Graph traversal errors.
///
/// "Not found", "no path", and bounded-search failures are all distinct,
/// machine-readable conditions; the partial path is carried where one
/// exists so callers can report progress.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The requested entity does not exist in the vault
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// No entity with the given name exists in the vault
    #[error("No entity named '{name}' in vault")]
    NameNotFound {
        /// The name that failed to resolve
        name: String,
    },

    /// The requested event does not exist in the vault
    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    /// Both endpoints exist but no path connects them
    #[error("No path between '{from}' and '{to}'")]
    NoPath {
        /// Origin name
        from: String,
        /// Destination name
        to: String,
    },

    /// The guided search revisited a node
    #[error("Loop detected after visiting: {}", path.join(" -> "))]
    LoopDetected {
        /// The path walked before the revisit
        path: Vec<String>,
    },

    /// The current node has no neighbors to continue through
    #[error("Dead end after visiting: {}", path.join(" -> "))]
    DeadEnd {
        /// The path walked before the dead end
        path: Vec<String>,
    },

    /// The search exhausted its step budget without a terminal state
    #[error("Step limit ({max_steps}) exceeded after visiting: {}", path.join(" -> "))]
    StepLimitExceeded {
        /// The configured budget
        max_steps: usize,
        /// The path walked so far
        path: Vec<String>,
    },

    /// The injected decision function failed or chose an unknown neighbor
    #[error("Decision function error: {reason}")]
    Decision {
        /// What went wrong
        reason: String,
    },

    /// Storage error while loading graph rows
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Retrieval errors
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// Embedding the query failed; the whole retrieval is aborted
    #[error("Embedding failed: {0}")]
    Embedding(#[from] EmbedError),

    /// Storage error while searching
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type for embedding operations
pub type EmbedResult<T> = std::result::Result<T, EmbedError>;

/// Result type for graph traversal operations
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Result type for retrieval operations
pub type RetrievalResult<T> = std::result::Result<T, RetrievalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GraphError::NoPath {
            from: "Winter Harbor".to_string(),
            to: "The Capital".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "No path between 'Winter Harbor' and 'The Capital'"
        );
    }

    #[test]
    fn test_error_conversion() {
        let graph_err = GraphError::EntityNotFound(EntityId::nil());
        let err: Error = graph_err.into();
        assert!(matches!(err, Error::Graph(_)));
    }

    #[test]
    fn test_partial_path_in_display() {
        let err = GraphError::LoopDetected {
            path: vec!["A".to_string(), "B".to_string()],
        };
        assert!(err.to_string().contains("A -> B"));
    }
}
