//! Type-safe ID types for the graph core.
//!
//! Uses the newtype pattern to prevent mixing up different ID types at
//! compile time — an `EntityId` can never be handed to a function that
//! expects an `EventId`.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to define a newtype ID wrapper around UUID
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random ID
            #[inline]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an ID from an existing UUID
            #[inline]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the underlying UUID
            #[inline]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Create a nil (all zeros) ID - useful for testing
            #[inline]
            pub const fn nil() -> Self {
                Self(Uuid::nil())
            }

            /// Check if this is a nil ID
            #[inline]
            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), &self.0.to_string()[..8])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

define_id!(
    /// Unique identifier for a vault (one author's isolated project)
    VaultId
);

define_id!(
    /// Unique identifier for an entity (character, location, faction, ...)
    EntityId
);

define_id!(
    /// Unique identifier for a relationship edge between two entities
    RelationshipId
);

define_id!(
    /// Unique identifier for an atomic fact attached to an entity
    FactId
);

define_id!(
    /// Unique identifier for a story event
    EventId
);

define_id!(
    /// Unique identifier for a source-text document chunk
    DocumentId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_creation() {
        let id1 = EntityId::new();
        let id2 = EntityId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_id_nil() {
        let id = VaultId::nil();
        assert!(id.is_nil());
    }

    #[test]
    fn test_id_from_str() {
        let uuid_str = "550e8400-e29b-41d4-a716-446655440000";
        let id: EventId = uuid_str.parse().unwrap();
        assert_eq!(id.to_string(), uuid_str);
    }

    #[test]
    fn test_id_debug_format() {
        let id = EntityId::nil();
        let debug = format!("{:?}", id);
        assert!(debug.starts_with("EntityId("));
    }

    #[test]
    fn test_id_serde() {
        let id = FactId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: FactId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }
}
