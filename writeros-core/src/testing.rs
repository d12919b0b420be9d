//! Deterministic test doubles.
//!
//! Everything here runs offline: a fake embedder whose vectors correlate
//! with word overlap, a scripted hop chooser, and a small fixture vault.
//! These are exported (not test-gated) so integration tests and
//! downstream crates can drive the engine without network access.

use crate::embedding::Embedder;
use crate::error::{EmbedResult, GraphError, GraphResult, StoreResult};
use crate::graph::{HopChooser, NeighborView};
use crate::id::VaultId;
use crate::model::{Entity, EntityKind, Event, Fact, FactKind, RelationKind, Relationship};
use crate::store::{GraphStore, MemoryStore};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

/// Vector width produced by [`FakeEmbedder`]
pub const FAKE_DIM: usize = 32;

/// Offline embedder: hashes each lowercase word into a bucket and
/// normalizes the counts.
///
/// Texts sharing words land close together under cosine distance, which
/// is enough signal to test ranking end to end without a provider.
#[derive(Debug, Clone, Default)]
pub struct FakeEmbedder;

impl FakeEmbedder {
    /// Create a fake embedder
    pub fn new() -> Self {
        Self
    }

    /// The deterministic vector for a text, usable from sync test setup
    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; FAKE_DIM];
        for word in text.to_lowercase().split_whitespace() {
            let word = word.trim_matches(|c: char| !c.is_alphanumeric());
            if word.is_empty() {
                continue;
            }
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            vector[(hasher.finish() as usize) % FAKE_DIM] += 1.0;
        }
        let magnitude = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for v in &mut vector {
                *v /= magnitude;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> EmbedResult<Vec<f32>> {
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        FAKE_DIM
    }
}

/// Hop chooser that replays a scripted list of answers in order.
///
/// Running past the end of the script is a test authoring error and
/// surfaces as a [`GraphError::Decision`].
#[derive(Debug, Default)]
pub struct ScriptedChooser {
    script: Mutex<Vec<String>>,
}

impl ScriptedChooser {
    /// Create a chooser that answers with `choices` in order
    pub fn new(choices: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let mut script: Vec<String> = choices.into_iter().map(Into::into).collect();
        script.reverse();
        Self {
            script: Mutex::new(script),
        }
    }
}

#[async_trait]
impl HopChooser for ScriptedChooser {
    async fn choose_next(
        &self,
        _current: &str,
        _target: &str,
        _neighbors: &[NeighborView],
    ) -> GraphResult<String> {
        let mut script = match self.script.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        script.pop().ok_or_else(|| GraphError::Decision {
            reason: "scripted chooser ran out of answers".to_owned(),
        })
    }
}

/// Hop chooser that always answers the same name; handy for forcing
/// revisits.
#[derive(Debug, Clone)]
pub struct FixedChooser(pub String);

#[async_trait]
impl HopChooser for FixedChooser {
    async fn choose_next(
        &self,
        _current: &str,
        _target: &str,
        _neighbors: &[NeighborView],
    ) -> GraphResult<String> {
        Ok(self.0.clone())
    }
}

/// A small pre-populated vault for integration tests
pub struct FixtureVault {
    /// The vault id everything below belongs to
    pub vault: VaultId,
    /// Populated store
    pub store: MemoryStore,
    /// Characters: Ned, Robb, Sansa, Maren
    pub ned: Entity,
    /// Ned's son
    pub robb: Entity,
    /// Ned's daughter
    pub sansa: Entity,
    /// An unrelated rival
    pub maren: Entity,
    /// Locations: Winter Harbor, The Crossing, The Capital
    pub winter_harbor: Entity,
    /// Middle stop between harbor and capital
    pub crossing: Entity,
    /// Southern capital
    pub capital: Entity,
    /// Isolated island with no roads
    pub island: Entity,
    /// Causal chain: spark -> fire -> exodus
    pub spark: Event,
    /// Middle event of the chain
    pub fire: Event,
    /// Final event of the chain
    pub exodus: Event,
}

/// Build a vault with a family, a road network, facts, and a causal
/// event chain, all embedded with [`FakeEmbedder`] vectors.
pub async fn fixture_vault() -> StoreResult<FixtureVault> {
    let store = MemoryStore::new();
    let vault = VaultId::new();

    let character = |name: &str, description: &str| {
        Entity::new(vault, EntityKind::Character, name)
            .with_description(description)
            .with_embedding(FakeEmbedder::vector(&format!("{name}: {description}")))
    };
    let location = |name: &str, description: &str| {
        Entity::new(vault, EntityKind::Location, name)
            .with_description(description)
            .with_embedding(FakeEmbedder::vector(&format!("{name}: {description}")))
    };

    let ned = character("Ned", "stern northern lord and father");
    let robb = character("Robb", "eldest son and heir of the north");
    let sansa = character("Sansa", "daughter drawn to the southern court");
    let maren = character("Lady Maren", "scheming rival of the northern family");

    let winter_harbor = location("Winter Harbor", "frozen port town in the north");
    let crossing = location("The Crossing", "fortified bridge over the great river");
    let capital = location("The Capital", "sprawling southern seat of the crown");
    let island = location("The Island", "isolated island with no roads");

    for entity in [
        &ned,
        &robb,
        &sansa,
        &maren,
        &winter_harbor,
        &crossing,
        &capital,
        &island,
    ] {
        store.insert_entity(entity).await?;
    }

    let edges = [
        Relationship::new(vault, ned.id, robb.id, RelationKind::Parent),
        Relationship::new(vault, ned.id, sansa.id, RelationKind::Parent),
        Relationship::new(vault, ned.id, maren.id, RelationKind::Rival),
        Relationship::new(vault, winter_harbor.id, crossing.id, RelationKind::ConnectedTo),
        Relationship::new(vault, crossing.id, capital.id, RelationKind::ConnectedTo),
    ];
    for edge in &edges {
        store.insert_relationship(edge).await?;
    }

    let fact = Fact::new(vault, ned.id, FactKind::Trait, "Ned values honor above safety")
        .with_embedding(FakeEmbedder::vector("Ned values honor above safety"));
    store.insert_fact(&fact).await?;

    let exodus = Event::new(vault, "exodus")
        .with_description("the survivors flee south")
        .with_embedding(FakeEmbedder::vector("exodus: the survivors flee south"));
    let fire = Event::new(vault, "fire")
        .with_description("the granary burns")
        .with_cause_of(exodus.id)
        .with_embedding(FakeEmbedder::vector("fire: the granary burns"));
    let spark = Event::new(vault, "spark")
        .with_description("a lantern tips over")
        .with_cause_of(fire.id)
        .with_embedding(FakeEmbedder::vector("spark: a lantern tips over"));
    for event in [&spark, &fire, &exodus] {
        store.insert_event(event).await?;
    }

    Ok(FixtureVault {
        vault,
        store,
        ned,
        robb,
        sansa,
        maren,
        winter_harbor,
        crossing,
        capital,
        island,
        spark,
        fire,
        exodus,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_embedder_is_deterministic() {
        assert_eq!(
            FakeEmbedder::vector("the north remembers"),
            FakeEmbedder::vector("the north remembers")
        );
    }

    #[test]
    fn test_word_overlap_beats_disjoint_text() {
        let query = FakeEmbedder::vector("stern northern lord");
        let close = FakeEmbedder::vector("northern lord of winter");
        let far = FakeEmbedder::vector("sprawling southern market fleet");

        let dot = |a: &[f32], b: &[f32]| -> f32 {
            a.iter().zip(b).map(|(x, y)| x * y).sum()
        };
        assert!(dot(&query, &close) > dot(&query, &far));
    }

    #[tokio::test]
    async fn test_scripted_chooser_replays_in_order() {
        let chooser = ScriptedChooser::new(["first", "second"]);
        let answer = chooser.choose_next("a", "b", &[]).await.unwrap();
        assert_eq!(answer, "first");
        let answer = chooser.choose_next("a", "b", &[]).await.unwrap();
        assert_eq!(answer, "second");
        assert!(chooser.choose_next("a", "b", &[]).await.is_err());
    }
}
