//! LRU cache for query embeddings.
//!
//! Retrieval embeds up to three variants per request, and users re-run
//! similar questions; caching by trimmed query text removes most of that
//! backend traffic.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use lru::LruCache;
use tracing::debug;

use vellum_core::Result;
use vellum_inference::Embedder;

pub struct QueryEmbeddingCache {
    cache: Mutex<LruCache<String, Vec<f32>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl QueryEmbeddingCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity floored at 1");
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Return the embedding for `text`, computing and caching on miss.
    /// Empty or whitespace-only text bypasses the cache and yields `None`;
    /// such variants are skipped by the retrieval loop.
    pub async fn get_or_compute(&self, text: &str, embedder: &Embedder) -> Result<Option<Vec<f32>>> {
        let key = text.trim();
        if key.is_empty() {
            return Ok(None);
        }

        if let Some(vector) = self.cache.lock().unwrap().get(key).cloned() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(query = key, "Query embedding cache hit");
            return Ok(Some(vector));
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let vector = embedder.encode(key).await?;
        self.cache
            .lock()
            .unwrap()
            .put(key.to_string(), vector.clone());
        Ok(Some(vector))
    }

    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vellum_inference::MockInferenceBackend;

    fn embedder(backend: &MockInferenceBackend) -> Embedder {
        Embedder::new(Arc::new(backend.clone()))
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let backend = MockInferenceBackend::new();
        let e = embedder(&backend);
        let cache = QueryEmbeddingCache::new(8);
        e.load().await.unwrap();
        backend.clear_calls();

        let first = cache.get_or_compute("acme invoices", &e).await.unwrap().unwrap();
        let second = cache.get_or_compute("acme invoices", &e).await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(cache.miss_count(), 1);
        assert_eq!(cache.hit_count(), 1);
        assert_eq!(backend.embed_call_count(), 1);
    }

    #[tokio::test]
    async fn test_trimming_unifies_keys() {
        let backend = MockInferenceBackend::new();
        let e = embedder(&backend);
        let cache = QueryEmbeddingCache::new(8);

        cache.get_or_compute("  hello  ", &e).await.unwrap();
        cache.get_or_compute("hello", &e).await.unwrap();

        assert_eq!(cache.miss_count(), 1);
        assert_eq!(cache.hit_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_text_bypasses_cache() {
        let backend = MockInferenceBackend::new();
        let e = embedder(&backend);
        let cache = QueryEmbeddingCache::new(8);
        e.load().await.unwrap();
        backend.clear_calls();

        assert!(cache.get_or_compute("", &e).await.unwrap().is_none());
        assert!(cache.get_or_compute("  \t ", &e).await.unwrap().is_none());

        assert_eq!(backend.embed_call_count(), 0);
        assert_eq!(cache.hit_count(), 0);
        assert_eq!(cache.miss_count(), 0);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_capacity_evicts_lru() {
        let backend = MockInferenceBackend::new();
        let e = embedder(&backend);
        let cache = QueryEmbeddingCache::new(2);

        cache.get_or_compute("a", &e).await.unwrap();
        cache.get_or_compute("b", &e).await.unwrap();
        cache.get_or_compute("c", &e).await.unwrap();
        assert_eq!(cache.len(), 2);

        // "a" was evicted, so this is a miss.
        cache.get_or_compute("a", &e).await.unwrap();
        assert_eq!(cache.miss_count(), 4);
    }
}
