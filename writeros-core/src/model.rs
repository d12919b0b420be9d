//! The vault-scoped story knowledge data model.
//!
//! Five row types, each owning an optional embedding vector:
//! - `Entity`: a graph node (character, location, faction, ...)
//! - `Relationship`: a typed, directed (sometimes symmetric) edge
//! - `Fact`: an atomic, append-only claim attached to one entity
//! - `Event`: an occurrence with story-time and sequence-order coordinates
//!   plus directed causal edges
//! - `Document`: a chunk of source text
//!
//! Property bags are free-form JSON maps for domain-specific data; graph
//! algorithms branch only on typed columns (kind, status, validity), never
//! on bag contents.

use crate::id::{DocumentId, EntityId, EventId, FactId, RelationshipId, VaultId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What kind of story element an entity represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A person or creature
    Character,
    /// A place
    Location,
    /// An organization, house, or group
    Faction,
    /// A physical object
    Item,
    /// A power, skill, or magic
    Ability,
    /// A world rule or magic system
    System,
    /// An occurrence modeled as a node
    Event,
    /// An abstract idea or theme
    Concept,
}

/// Lifecycle status of an entity within the story
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    /// Alive / extant
    Alive,
    /// Dead / destroyed
    Dead,
    /// Whereabouts unknown in-story
    Missing,
    /// Status not established
    Unknown,
}

/// Which continuity layer a row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonLayer {
    /// The primary continuity
    Primary,
    /// An alternate timeline or what-if
    Alternate,
    /// Unfinished draft material
    Draft,
}

/// Whether a row is currently part of the canon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonStatus {
    /// In effect
    Active,
    /// Retconned or superseded
    Deprecated,
    /// Awaiting author confirmation
    Pending,
}

/// Canon metadata shared by entities and relationships
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Canon {
    /// Continuity layer
    pub layer: CanonLayer,
    /// Canon status
    pub status: CanonStatus,
}

impl Default for Canon {
    fn default() -> Self {
        Self {
            layer: CanonLayer::Primary,
            status: CanonStatus::Active,
        }
    }
}

/// A node in the story knowledge graph.
///
/// Name+kind uniqueness is deliberately not enforced: duplicate names
/// across eras are resolved by temporal disambiguation, not constraints.
/// Entities are never hard-deleted, only status-flagged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    /// Unique identifier
    pub id: EntityId,
    /// Owning vault
    pub vault_id: VaultId,
    /// What kind of story element this is
    pub kind: EntityKind,
    /// Canonical name
    pub name: String,
    /// Alternate names
    pub aliases: Vec<String>,
    /// Free-text description
    pub description: String,
    /// Lifecycle status
    pub status: EntityStatus,
    /// Domain-specific properties
    pub properties: Map<String, Value>,
    /// Embedding vector over name + description
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    /// Canon metadata
    pub canon: Canon,
    /// When this row was created
    pub created_at: DateTime<Utc>,
}

impl Entity {
    /// Create a new entity
    pub fn new(vault_id: VaultId, kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            vault_id,
            kind,
            name: name.into(),
            aliases: Vec::new(),
            description: String::new(),
            status: EntityStatus::Unknown,
            properties: Map::new(),
            embedding: None,
            canon: Canon::default(),
            created_at: Utc::now(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add an alias
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Set the lifecycle status
    pub fn with_status(mut self, status: EntityStatus) -> Self {
        self.status = status;
        self
    }

    /// Set a domain-specific property
    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Set the embedding vector
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Text representation to embed
    pub fn to_embedding_text(&self) -> String {
        format!("{}: {}", self.name, self.description)
    }
}

/// The typed vocabulary of relationship edges.
///
/// `is_symmetric` is the single source of truth for which kinds get an
/// implicit reverse edge during graph construction; `is_familial` and
/// `is_social` select the traversal subsets for family trees and
/// ego-networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Generic family tie
    Family,
    /// From parent to their child
    Parent,
    /// From child to their parent
    Child,
    /// Siblings
    Sibling,
    /// Married
    Spouse,
    /// Friends
    Friend,
    /// Enemies
    Enemy,
    /// Allies
    Ally,
    /// Rivals
    Rival,
    /// From mentor to student
    Mentor,
    /// From student to mentor
    Mentee,
    /// Romantic involvement
    Romantic,
    /// Betrayal
    Betrayed,
    /// Owes a debt to
    OwesDebt,
    /// Belongs to a faction or group
    MemberOf,
    /// Leads a faction or group
    Leads,
    /// Is physically inside
    LocatedIn,
    /// Traversable connection between locations
    ConnectedTo,
    /// Causal link
    Causes,
}

impl RelationKind {
    /// Whether traversal adds the reverse edge implicitly
    pub fn is_symmetric(self) -> bool {
        matches!(
            self,
            Self::Friend | Self::Sibling | Self::Spouse | Self::Ally | Self::Rival
        )
    }

    /// Whether this edge participates in family-tree traversal
    pub fn is_familial(self) -> bool {
        matches!(self, Self::Family | Self::Parent | Self::Child | Self::Sibling)
    }

    /// Whether this edge participates in social-influence traversal
    pub fn is_social(self) -> bool {
        matches!(
            self,
            Self::Friend
                | Self::Enemy
                | Self::Ally
                | Self::Rival
                | Self::Family
                | Self::Parent
                | Self::Child
                | Self::Sibling
                | Self::Spouse
                | Self::Mentor
                | Self::Mentee
                | Self::Leads
                | Self::MemberOf
                | Self::Romantic
                | Self::Betrayed
                | Self::OwesDebt
        )
    }
}

/// Temporal validity window over opaque sequence markers.
///
/// A `None` bound is open-ended on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityWindow {
    /// First sequence position at which the edge holds
    pub from: Option<i64>,
    /// Last sequence position at which the edge holds (inclusive)
    pub until: Option<i64>,
}

impl ValidityWindow {
    /// A window valid at every position
    pub const ALWAYS: Self = Self {
        from: None,
        until: None,
    };

    /// Create a bounded window
    pub fn between(from: i64, until: i64) -> Self {
        Self {
            from: Some(from),
            until: Some(until),
        }
    }

    /// Whether the window contains the given sequence position
    pub fn contains(&self, position: i64) -> bool {
        self.from.map_or(true, |from| position >= from)
            && self.until.map_or(true, |until| position <= until)
    }
}

/// A directed edge between two entities in the same vault
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    /// Unique identifier
    pub id: RelationshipId,
    /// Owning vault
    pub vault_id: VaultId,
    /// Source entity
    pub from_entity: EntityId,
    /// Target entity
    pub to_entity: EntityId,
    /// Edge type
    pub kind: RelationKind,
    /// Free-text description (leverage, motive, history)
    pub description: String,
    /// Domain-specific properties (e.g. travel_time)
    pub properties: Map<String, Value>,
    /// Temporal validity window
    pub validity: ValidityWindow,
    /// Canon metadata
    pub canon: Canon,
}

impl Relationship {
    /// Create a new relationship edge
    pub fn new(vault_id: VaultId, from: EntityId, to: EntityId, kind: RelationKind) -> Self {
        Self {
            id: RelationshipId::new(),
            vault_id,
            from_entity: from,
            to_entity: to,
            kind,
            description: String::new(),
            properties: Map::new(),
            validity: ValidityWindow::ALWAYS,
            canon: Canon::default(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set a domain-specific property
    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Set the validity window
    pub fn with_validity(mut self, validity: ValidityWindow) -> Self {
        self.validity = validity;
        self
    }

    /// The travel time property, when present and numeric
    pub fn travel_time(&self) -> Option<f64> {
        self.properties.get("travel_time").and_then(Value::as_f64)
    }
}

/// What kind of claim a fact makes about its entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactKind {
    /// A personality or physical trait
    Trait,
    /// A capability
    Ability,
    /// A claim about a relationship
    Relationship,
    /// A claim about an event
    Event,
    /// A fear
    Fear,
    /// A desire
    Desire,
    /// A trauma
    Trauma,
    /// A motivation
    Motivation,
}

/// An atomic claim attached to one entity.
///
/// Facts are append-only: they are created by extraction passes and
/// superseded by newer facts rather than edited in place. The store trait
/// exposes no update operation for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    /// Unique identifier
    pub id: FactId,
    /// Owning vault
    pub vault_id: VaultId,
    /// Entity this fact is about
    pub entity_id: EntityId,
    /// What kind of claim this is
    pub kind: FactKind,
    /// The claim text
    pub content: String,
    /// Optional source citation (chapter, scene, note)
    pub source: Option<String>,
    /// Confidence in this fact (0.0 - 1.0)
    pub confidence: f32,
    /// Embedding vector over the content
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    /// When this fact was extracted
    pub created_at: DateTime<Utc>,
}

impl Fact {
    /// Create a new fact
    pub fn new(
        vault_id: VaultId,
        entity_id: EntityId,
        kind: FactKind,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: FactId::new(),
            vault_id,
            entity_id,
            kind,
            content: content.into(),
            source: None,
            confidence: 1.0,
            embedding: None,
            created_at: Utc::now(),
        }
    }

    /// Set confidence
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    /// Set source citation
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the embedding vector
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// In-universe timestamp, independent of narrative order.
///
/// Only `year` is comparable; everything else lives in the detail bag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoryTime {
    /// In-universe year, when known
    pub year: Option<i64>,
    /// Arbitrary structured detail (season, month, era name, ...)
    #[serde(default)]
    pub detail: Map<String, Value>,
}

impl StoryTime {
    /// A story time with just a year
    pub fn year(year: i64) -> Self {
        Self {
            year: Some(year),
            detail: Map::new(),
        }
    }
}

/// A vault-scoped occurrence with two independent temporal coordinates
/// and directed causal edges.
///
/// Causal edges may form cycles through authoring error; traversal code
/// must never assume acyclicity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier
    pub id: EventId,
    /// Owning vault
    pub vault_id: VaultId,
    /// Event name
    pub name: String,
    /// Free-text description
    pub description: String,
    /// In-universe time
    pub story_time: StoryTime,
    /// Ordinal position in narrative order
    pub sequence_order: Option<i64>,
    /// Events this event causally causes
    pub causes: Vec<EventId>,
    /// Embedding vector over name + description
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    /// When this row was created
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Create a new event
    pub fn new(vault_id: VaultId, name: impl Into<String>) -> Self {
        Self {
            id: EventId::new(),
            vault_id,
            name: name.into(),
            description: String::new(),
            story_time: StoryTime::default(),
            sequence_order: None,
            causes: Vec::new(),
            embedding: None,
            created_at: Utc::now(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the in-universe time
    pub fn with_story_time(mut self, story_time: StoryTime) -> Self {
        self.story_time = story_time;
        self
    }

    /// Set the narrative sequence position
    pub fn with_sequence_order(mut self, order: i64) -> Self {
        self.sequence_order = Some(order);
        self
    }

    /// Record that this event causes another
    pub fn with_cause_of(mut self, effect: EventId) -> Self {
        self.causes.push(effect);
        self
    }

    /// Set the embedding vector
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Text representation to embed
    pub fn to_embedding_text(&self) -> String {
        format!("{}: {}", self.name, self.description)
    }
}

/// What kind of source text a document chunk came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocKind {
    /// Manuscript prose
    Manuscript,
    /// A character sheet
    CharacterSheet,
    /// A craft/worldbuilding note
    CraftNote,
    /// Anything else
    Note,
}

/// A chunk of source text with an embedding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier
    pub id: DocumentId,
    /// Owning vault
    pub vault_id: VaultId,
    /// Title
    pub title: String,
    /// Chunk content
    pub content: String,
    /// Source kind
    pub kind: DocKind,
    /// Embedding vector over the content
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    /// Free-form metadata
    pub metadata: Map<String, Value>,
    /// When this chunk was ingested
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Create a new document chunk
    pub fn new(
        vault_id: VaultId,
        kind: DocKind,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: DocumentId::new(),
            vault_id,
            title: title.into(),
            content: content.into(),
            kind,
            embedding: None,
            metadata: Map::new(),
            created_at: Utc::now(),
        }
    }

    /// Set the embedding vector
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_builder() {
        let vault = VaultId::new();
        let entity = Entity::new(vault, EntityKind::Character, "Maren")
            .with_description("A smuggler turned spy")
            .with_alias("The Gull")
            .with_status(EntityStatus::Alive);

        assert_eq!(entity.name, "Maren");
        assert_eq!(entity.aliases, vec!["The Gull"]);
        assert_eq!(entity.status, EntityStatus::Alive);
        assert_eq!(entity.canon.layer, CanonLayer::Primary);
    }

    #[test]
    fn test_symmetric_kinds() {
        assert!(RelationKind::Friend.is_symmetric());
        assert!(RelationKind::Sibling.is_symmetric());
        assert!(RelationKind::Spouse.is_symmetric());
        assert!(RelationKind::Ally.is_symmetric());
        assert!(RelationKind::Rival.is_symmetric());
        assert!(!RelationKind::Parent.is_symmetric());
        assert!(!RelationKind::Leads.is_symmetric());
    }

    #[test]
    fn test_validity_window() {
        let window = ValidityWindow::between(10, 20);
        assert!(window.contains(10));
        assert!(window.contains(15));
        assert!(window.contains(20));
        assert!(!window.contains(25));
        assert!(!window.contains(9));
        assert!(ValidityWindow::ALWAYS.contains(i64::MIN));
    }

    #[test]
    fn test_fact_confidence_clamped() {
        let vault = VaultId::new();
        let fact = Fact::new(vault, EntityId::new(), FactKind::Fear, "afraid of the sea")
            .with_confidence(1.7);
        assert_eq!(fact.confidence, 1.0);
    }

    #[test]
    fn test_travel_time_property() {
        let vault = VaultId::new();
        let rel = Relationship::new(vault, EntityId::new(), EntityId::new(), RelationKind::ConnectedTo)
            .with_property("travel_time", serde_json::json!(3.5));
        assert_eq!(rel.travel_time(), Some(3.5));

        let rel = Relationship::new(vault, EntityId::new(), EntityId::new(), RelationKind::ConnectedTo)
            .with_property("travel_time", serde_json::json!("a week"));
        assert_eq!(rel.travel_time(), None);
    }

    #[test]
    fn test_relation_kind_serde() {
        let json = serde_json::to_string(&RelationKind::OwesDebt).unwrap();
        assert_eq!(json, "\"owes_debt\"");
        let parsed: RelationKind = serde_json::from_str("\"connected_to\"").unwrap();
        assert_eq!(parsed, RelationKind::ConnectedTo);
    }
}
