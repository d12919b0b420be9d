//! The embedding seam.
//!
//! `Embedder` is the trait the retriever depends on; `RemoteEmbedder`
//! implements it over the `embeddings` HTTP client with a per-call
//! timeout and an optional bounded cache. A failure is always a typed
//! error — the core never substitutes a zero vector.

use crate::error::{EmbedError, EmbedResult};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;

/// Fixed embedding width of the reference deployment; part of the
/// compatibility contract alongside the cosine metric.
pub const EMBEDDING_DIM: usize = 1536;

/// How long to wait on one embedding call before giving up
const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

/// Default capacity of the in-process embedding cache
const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Converts text into fixed-width vectors.
///
/// Must be deterministic for identical input and model version.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single query string
    async fn embed(&self, text: &str) -> EmbedResult<Vec<f32>>;

    /// Embed a batch of inputs, one vector per input in order
    async fn embed_batch(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>>;

    /// The vector width this embedder produces
    fn dimensions(&self) -> usize;
}

/// Bounded text -> vector cache, evicting oldest entries first.
///
/// Keyed by input text only; the cache belongs to one embedder, so the
/// model is implicit.
struct EmbedCache {
    entries: HashMap<String, Vec<f32>>,
    order: VecDeque<String>,
    capacity: usize,
}

impl EmbedCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn get(&self, text: &str) -> Option<Vec<f32>> {
        self.entries.get(text).cloned()
    }

    fn put(&mut self, text: String, vector: Vec<f32>) {
        if self.entries.contains_key(&text) {
            return;
        }
        while self.entries.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
        self.order.push_back(text.clone());
        self.entries.insert(text, vector);
    }
}

/// `Embedder` backed by the `embeddings` HTTP client.
pub struct RemoteEmbedder {
    client: embeddings::Embeddings,
    dimensions: usize,
    cache: Option<Mutex<EmbedCache>>,
}

impl RemoteEmbedder {
    /// Wrap an embeddings client, caching by input text
    pub fn new(client: embeddings::Embeddings) -> Self {
        Self {
            client,
            dimensions: EMBEDDING_DIM,
            cache: Some(Mutex::new(EmbedCache::new(DEFAULT_CACHE_CAPACITY))),
        }
    }

    /// Create a client from the OPENAI_API_KEY environment variable
    pub fn from_env() -> EmbedResult<Self> {
        Ok(Self::new(embeddings::Embeddings::from_env()?))
    }

    /// Override the expected vector width
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Disable the in-process cache
    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    fn check_dimensions(&self, vector: &[f32]) -> EmbedResult<()> {
        if vector.len() != self.dimensions {
            return Err(EmbedError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(())
    }

    async fn call_remote(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        let vectors = tokio::time::timeout(EMBED_TIMEOUT, self.client.embed(texts))
            .await
            .map_err(|_| EmbedError::Timeout {
                duration: EMBED_TIMEOUT,
            })??;
        for vector in &vectors {
            self.check_dimensions(vector)?;
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed(&self, text: &str) -> EmbedResult<Vec<f32>> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.lock().await.get(text) {
                tracing::debug!(len = text.len(), "embedding cache hit");
                return Ok(hit);
            }
        }

        let mut vectors = self.call_remote(std::slice::from_ref(&text.to_string())).await?;
        let vector = vectors.pop().ok_or(EmbedError::Provider(
            embeddings::Error::Parse("provider returned no vectors".to_string()),
        ))?;

        if let Some(cache) = &self.cache {
            cache.lock().await.put(text.to_string(), vector.clone());
        }
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> EmbedResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.call_remote(texts).await?;
        if let Some(cache) = &self.cache {
            let mut cache = cache.lock().await;
            for (text, vector) in texts.iter().zip(&vectors) {
                cache.put(text.clone(), vector.clone());
            }
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_eviction_order() {
        let mut cache = EmbedCache::new(2);
        cache.put("a".to_string(), vec![1.0]);
        cache.put("b".to_string(), vec![2.0]);
        cache.put("c".to_string(), vec![3.0]);

        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("b"), Some(vec![2.0]));
        assert_eq!(cache.get("c"), Some(vec![3.0]));
    }

    #[test]
    fn test_cache_no_duplicate_entries() {
        let mut cache = EmbedCache::new(2);
        cache.put("a".to_string(), vec![1.0]);
        cache.put("a".to_string(), vec![9.0]);
        // First write wins; embeddings are deterministic per input
        assert_eq!(cache.get("a"), Some(vec![1.0]));
        assert_eq!(cache.order.len(), 1);
    }
}
