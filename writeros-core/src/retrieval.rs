//! Semantic similarity retrieval across the typed collections.
//!
//! `Retriever` embeds a natural-language query once, then runs ranked
//! nearest-neighbor searches per collection. Results come back in a
//! `RetrievalBundle`; `format_results` turns a bundle into a stable,
//! LLM-readable text block.
//!
//! Temporal filtering applies to events only and is permissive: an event
//! whose coordinate cannot be compared against the ceiling is included,
//! with a warning, rather than failing the query.

use crate::embedding::Embedder;
use crate::error::RetrievalResult;
use crate::id::VaultId;
use crate::model::{Document, Entity, Event, Fact};
use crate::store::{DistanceMetric, GraphStore, Scored, VectorQuery};
use std::fmt;
use std::sync::Arc;

/// Default per-type result limit
pub const DEFAULT_RESULT_LIMIT: usize = 5;

/// Over-fetch factor while a temporal filter is active, so post-filter
/// results can still fill the limit
const TEMPORAL_OVERFETCH: usize = 4;

/// Which typed collections to search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    /// Entity rows
    Entities,
    /// Fact rows
    Facts,
    /// Event rows
    Events,
    /// Document rows
    Documents,
}

impl Collection {
    /// Every collection, in formatting order
    pub const ALL: [Collection; 4] = [
        Collection::Entities,
        Collection::Facts,
        Collection::Events,
        Collection::Documents,
    ];
}

/// Temporal constraint on retrieved events
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TemporalFilter {
    /// No temporal constraint
    #[default]
    Unfiltered,
    /// Exclude events whose sequence_order exceeds this ceiling
    Sequence(i64),
    /// Exclude events whose story-time year exceeds this ceiling
    StoryTime(i64),
}

impl TemporalFilter {
    /// Whether an event passes the filter.
    ///
    /// Returns `(admitted, comparable)`; a non-comparable coordinate is
    /// admitted permissively.
    fn admits(&self, event: &Event) -> (bool, bool) {
        match self {
            TemporalFilter::Unfiltered => (true, true),
            TemporalFilter::Sequence(ceiling) => match event.sequence_order {
                Some(order) => (order <= *ceiling, true),
                None => (true, false),
            },
            TemporalFilter::StoryTime(ceiling) => match event.story_time.year {
                Some(year) => (year <= *ceiling, true),
                None => (true, false),
            },
        }
    }

    /// Whether any constraint is active
    pub fn is_active(&self) -> bool {
        !matches!(self, TemporalFilter::Unfiltered)
    }
}

impl fmt::Display for TemporalFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemporalFilter::Unfiltered => write!(f, "unfiltered"),
            TemporalFilter::Sequence(ceiling) => write!(f, "sequence <= {ceiling}"),
            TemporalFilter::StoryTime(ceiling) => write!(f, "story year <= {ceiling}"),
        }
    }
}

/// Options for one retrieval call
#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    /// Per-type result limit
    pub limit: usize,
    /// Distance metric
    pub metric: DistanceMetric,
    /// Temporal constraint on events
    pub temporal: TemporalFilter,
    /// Which collections to search
    pub collections: Vec<Collection>,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_RESULT_LIMIT,
            metric: DistanceMetric::default(),
            temporal: TemporalFilter::default(),
            collections: Collection::ALL.to_vec(),
        }
    }
}

impl RetrievalOptions {
    /// Set the per-type limit
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Set the distance metric
    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Set the temporal filter
    pub fn with_temporal(mut self, temporal: TemporalFilter) -> Self {
        self.temporal = temporal;
        self
    }

    /// Restrict the searched collections
    pub fn with_collections(mut self, collections: Vec<Collection>) -> Self {
        self.collections = collections;
        self
    }
}

/// Ranked results from one retrieval call
#[derive(Debug, Clone, Default)]
pub struct RetrievalBundle {
    /// The query that produced this bundle
    pub query: String,
    /// Matched entities, ascending by distance
    pub entities: Vec<Scored<Entity>>,
    /// Matched facts, ascending by distance
    pub facts: Vec<Scored<Fact>>,
    /// Matched events, ascending by distance
    pub events: Vec<Scored<Event>>,
    /// Matched documents, ascending by distance
    pub documents: Vec<Scored<Document>>,
    /// The temporal filter that was applied
    pub temporal: TemporalFilter,
    /// Non-fatal anomalies encountered (permissive fallbacks, ...)
    pub warnings: Vec<String>,
}

impl RetrievalBundle {
    /// Whether every collection came back empty
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
            && self.facts.is_empty()
            && self.events.is_empty()
            && self.documents.is_empty()
    }

    /// Total matched rows across collections
    pub fn len(&self) -> usize {
        self.entities.len() + self.facts.len() + self.events.len() + self.documents.len()
    }
}

/// Similarity retriever over an injected store and embedder
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn GraphStore>,
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    /// Create a retriever
    pub fn new(store: Arc<dyn GraphStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// The store this retriever reads from
    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// Retrieve the rows most similar to `query` from each requested
    /// collection.
    ///
    /// An embedding failure aborts the whole call; zero rows in every
    /// collection is not an error.
    pub async fn retrieve(
        &self,
        query: &str,
        vault: Option<VaultId>,
        options: RetrievalOptions,
    ) -> RetrievalResult<RetrievalBundle> {
        tracing::debug!(%query, ?vault, limit = options.limit, "retrieval start");
        let embedding = self.embedder.embed(query).await?;

        let mut bundle = RetrievalBundle {
            query: query.to_string(),
            temporal: options.temporal,
            ..Default::default()
        };

        for collection in &options.collections {
            let vector_query = VectorQuery::new(vault, &embedding, options.limit)
                .with_metric(options.metric);
            match collection {
                Collection::Entities => {
                    bundle.entities = self.store.search_entities(&vector_query).await?;
                }
                Collection::Facts => {
                    bundle.facts = self.store.search_facts(&vector_query).await?;
                }
                Collection::Events => {
                    bundle.events = self
                        .search_events_filtered(vector_query, &options, &mut bundle.warnings)
                        .await?;
                }
                Collection::Documents => {
                    bundle.documents = self.store.search_documents(&vector_query).await?;
                }
            }
        }

        tracing::debug!(total = bundle.len(), "retrieval done");
        Ok(bundle)
    }

    async fn search_events_filtered(
        &self,
        mut query: VectorQuery<'_>,
        options: &RetrievalOptions,
        warnings: &mut Vec<String>,
    ) -> RetrievalResult<Vec<Scored<Event>>> {
        if !options.temporal.is_active() {
            return Ok(self.store.search_events(&query).await?);
        }

        query.limit = options.limit.saturating_mul(TEMPORAL_OVERFETCH);
        let hits = self.store.search_events(&query).await?;

        let mut filtered = Vec::new();
        for hit in hits {
            let (admitted, comparable) = options.temporal.admits(&hit.item);
            if !comparable {
                tracing::warn!(
                    event = %hit.item.name,
                    filter = %options.temporal,
                    "event has no comparable temporal coordinate; including permissively"
                );
                warnings.push(format!(
                    "event '{}' not comparable against {}; included",
                    hit.item.name, options.temporal
                ));
            }
            if admitted {
                filtered.push(hit);
            }
            if filtered.len() == options.limit {
                break;
            }
        }
        Ok(filtered)
    }
}

/// Truncate text to a character budget, appending "..." when cut
fn truncate(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_len).collect();
    format!("{cut}...")
}

/// Render a bundle as a stable, human/LLM-readable text block.
///
/// Pure: the same bundle and budget always produce identical output, so
/// the formatting layer can be snapshot-tested without a live model.
pub fn format_results(bundle: &RetrievalBundle, max_len: usize) -> String {
    if bundle.is_empty() {
        return "No results found.".to_string();
    }

    let mut out = String::new();
    if bundle.temporal.is_active() {
        out.push_str(&format!(
            "[temporal filter active: {}]\n\n",
            bundle.temporal
        ));
    }

    if !bundle.entities.is_empty() {
        out.push_str("## Entities\n");
        for hit in &bundle.entities {
            let entity = &hit.item;
            out.push_str(&format!(
                "- {} ({:?}, {:?}): {}\n",
                entity.name,
                entity.kind,
                entity.status,
                truncate(&entity.description, max_len)
            ));
        }
        out.push('\n');
    }

    if !bundle.facts.is_empty() {
        out.push_str("## Facts\n");
        for hit in &bundle.facts {
            let fact = &hit.item;
            out.push_str(&format!(
                "- [{:?}] {} (confidence {:.2})\n",
                fact.kind,
                truncate(&fact.content, max_len),
                fact.confidence
            ));
        }
        out.push('\n');
    }

    if !bundle.events.is_empty() {
        out.push_str("## Events\n");
        for hit in &bundle.events {
            let event = &hit.item;
            let mut coordinates = Vec::new();
            if let Some(year) = event.story_time.year {
                coordinates.push(format!("year {year}"));
            }
            if let Some(order) = event.sequence_order {
                coordinates.push(format!("seq {order}"));
            }
            let marker = if coordinates.is_empty() {
                String::new()
            } else {
                format!(" ({})", coordinates.join(", "))
            };
            out.push_str(&format!(
                "- {}{}: {}\n",
                event.name,
                marker,
                truncate(&event.description, max_len)
            ));
        }
        out.push('\n');
    }

    if !bundle.documents.is_empty() {
        out.push_str("## Documents\n");
        for hit in &bundle.documents {
            let document = &hit.item;
            out.push_str(&format!(
                "- {} [{:?}]: {}\n",
                document.title,
                document.kind,
                truncate(&document.content, max_len)
            ));
        }
        out.push('\n');
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocKind, EntityKind, EntityStatus, FactKind, StoryTime};
    use crate::id::EntityId;

    fn scored<T>(item: T) -> Scored<T> {
        Scored {
            distance: 0.1,
            item,
        }
    }

    #[test]
    fn test_temporal_admits_sequence() {
        let vault = VaultId::new();
        let early = Event::new(vault, "early").with_sequence_order(5);
        let late = Event::new(vault, "late").with_sequence_order(50);
        let undated = Event::new(vault, "undated");

        let filter = TemporalFilter::Sequence(10);
        assert_eq!(filter.admits(&early), (true, true));
        assert_eq!(filter.admits(&late), (false, true));
        // Permissive fallback when not comparable
        assert_eq!(filter.admits(&undated), (true, false));
    }

    #[test]
    fn test_temporal_admits_story_time() {
        let vault = VaultId::new();
        let ancient = Event::new(vault, "ancient").with_story_time(StoryTime::year(100));
        let modern = Event::new(vault, "modern").with_story_time(StoryTime::year(900));

        let filter = TemporalFilter::StoryTime(500);
        assert_eq!(filter.admits(&ancient), (true, true));
        assert_eq!(filter.admits(&modern), (false, true));
    }

    #[test]
    fn test_format_empty_bundle() {
        let bundle = RetrievalBundle::default();
        assert_eq!(format_results(&bundle, 100), "No results found.");
    }

    #[test]
    fn test_format_is_stable() {
        let vault = VaultId::new();
        let mut bundle = RetrievalBundle::default();
        bundle.entities.push(scored(
            Entity::new(vault, EntityKind::Character, "Maren")
                .with_description("A smuggler turned spy")
                .with_status(EntityStatus::Alive),
        ));
        bundle.facts.push(scored(
            Fact::new(vault, EntityId::new(), FactKind::Fear, "afraid of the sea")
                .with_confidence(0.9),
        ));

        let first = format_results(&bundle, 200);
        let second = format_results(&bundle, 200);
        assert_eq!(first, second);
        assert!(first.contains("## Entities"));
        assert!(first.contains("Maren"));
        assert!(first.contains("confidence 0.90"));
    }

    #[test]
    fn test_format_truncates() {
        let vault = VaultId::new();
        let mut bundle = RetrievalBundle::default();
        bundle.documents.push(scored(Document::new(
            vault,
            DocKind::Manuscript,
            "Chapter 1",
            "x".repeat(500),
        )));

        let text = format_results(&bundle, 50);
        assert!(text.contains(&format!("{}...", "x".repeat(50))));
        assert!(!text.contains(&"x".repeat(51)));
    }

    #[test]
    fn test_format_notes_temporal_filter() {
        let vault = VaultId::new();
        let mut bundle = RetrievalBundle {
            temporal: TemporalFilter::Sequence(10),
            ..Default::default()
        };
        bundle
            .events
            .push(scored(Event::new(vault, "The Landing").with_sequence_order(3)));

        let text = format_results(&bundle, 100);
        assert!(text.starts_with("[temporal filter active: sequence <= 10]"));
        assert!(text.contains("seq 3"));
    }
}
