//! Embedding provider wrapping a backend with the pipeline-facing contract:
//! lazy load, input truncation, bounded parallelism, and zero-vector
//! degradation on backend failure.

use std::sync::Arc;

use tokio::sync::{OnceCell, Semaphore};
use tracing::{debug, info, warn};

use vellum_core::defaults::{EMBED_MAX_INPUT_CHARS, EMBED_MAX_PARALLELISM};
use vellum_core::{EmbeddingBackend, Result};

/// Snapshot of the provider's model for status surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub dimension: usize,
    pub device: String,
    pub loaded: bool,
}

/// Embedding provider used by the vectorization pipeline and by retrieval.
///
/// Degrades rather than fails: a backend error on one input yields a zero
/// vector for that input (logged at warn), so a single bad unit never sinks a
/// whole document's batch. Callers that need hard failures use the backend
/// directly.
#[derive(Clone)]
pub struct Embedder {
    backend: Arc<dyn EmbeddingBackend>,
    max_input_chars: usize,
    limiter: Arc<Semaphore>,
    loaded: Arc<OnceCell<()>>,
}

impl Embedder {
    pub fn new(backend: Arc<dyn EmbeddingBackend>) -> Self {
        Self::with_limits(backend, EMBED_MAX_INPUT_CHARS, EMBED_MAX_PARALLELISM)
    }

    pub fn with_limits(
        backend: Arc<dyn EmbeddingBackend>,
        max_input_chars: usize,
        max_parallelism: usize,
    ) -> Self {
        Self {
            backend,
            max_input_chars,
            limiter: Arc::new(Semaphore::new(max_parallelism.max(1))),
            loaded: Arc::new(OnceCell::new()),
        }
    }

    /// Ensure the model is warm. Idempotent: concurrent callers share one
    /// warm-up probe, later callers see it already done.
    pub async fn load(&self) -> Result<()> {
        self.loaded
            .get_or_init(|| async {
                match self.backend.embed("warmup").await {
                    Ok(_) => info!(
                        model = self.backend.model_name(),
                        dimension = self.backend.dimension(),
                        "Embedding model ready"
                    ),
                    Err(e) => warn!(
                        model = self.backend.model_name(),
                        error_msg = %e,
                        "Embedding warm-up failed, continuing degraded"
                    ),
                }
            })
            .await;
        Ok(())
    }

    /// Embed one text. Empty or whitespace-only input short-circuits to a
    /// zero vector without touching the backend.
    pub async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        self.load().await?;

        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension()]);
        }

        let truncated = truncate_chars(text, self.max_input_chars);
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| vellum_core::Error::Embedding(format!("Limiter closed: {}", e)))?;

        match self.backend.embed(truncated).await {
            Ok(vector) => Ok(vector),
            Err(e) => {
                warn!(
                    model = self.backend.model_name(),
                    input_len = text.len(),
                    error_msg = %e,
                    "Embedding failed, substituting zero vector"
                );
                Ok(vec![0.0; self.dimension()])
            }
        }
    }

    /// Embed a batch, order preserved. Per-input degradation as in
    /// [`encode`](Self::encode).
    pub async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.encode(text).await?);
        }
        debug!(input_count = texts.len(), "Batch embedding complete");
        Ok(out)
    }

    pub fn dimension(&self) -> usize {
        self.backend.dimension()
    }

    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            name: self.backend.model_name().to_string(),
            dimension: self.backend.dimension(),
            device: self.backend.device().to_string(),
            loaded: self.loaded.initialized(),
        }
    }
}

/// Truncate to at most `max_chars` characters, never splitting a code point.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockInferenceBackend;

    fn embedder(backend: MockInferenceBackend) -> Embedder {
        Embedder::new(Arc::new(backend))
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("hello", 10), "hello");
        // Multi-byte code points survive truncation.
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("", 5), "");
    }

    #[tokio::test]
    async fn test_encode_is_deterministic() {
        let e = embedder(MockInferenceBackend::new());
        let a = e.encode("the same text").await.unwrap();
        let b = e.encode("the same text").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), e.dimension());
    }

    #[tokio::test]
    async fn test_empty_input_yields_zero_vector_without_backend_call() {
        let backend = MockInferenceBackend::new();
        let e = embedder(backend.clone());
        e.load().await.unwrap();
        backend.clear_calls();

        let v = e.encode("   \n\t ").await.unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
        assert_eq!(backend.embed_call_count(), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_degrades_to_zero_vector() {
        let backend = MockInferenceBackend::new().with_failure_rate(1.0);
        let e = embedder(backend);

        let v = e.encode("anything").await.unwrap();
        assert_eq!(v.len(), 384);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn test_long_input_is_truncated_before_embedding() {
        let backend = MockInferenceBackend::new();
        let e = Embedder::with_limits(Arc::new(backend.clone()), 10, 2);
        e.load().await.unwrap();
        backend.clear_calls();

        e.encode(&"x".repeat(100)).await.unwrap();
        let calls = backend.get_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].input.len(), 10);
    }

    #[tokio::test]
    async fn test_encode_batch_preserves_order() {
        let e = embedder(MockInferenceBackend::new());
        let texts = vec!["first".to_string(), "second".to_string()];
        let batch = e.encode_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], e.encode("first").await.unwrap());
        assert_eq!(batch[1], e.encode("second").await.unwrap());
    }

    #[tokio::test]
    async fn test_model_info_tracks_load_state() {
        let e = embedder(MockInferenceBackend::new());
        assert!(!e.model_info().loaded);

        e.load().await.unwrap();
        let info = e.model_info();
        assert!(info.loaded);
        assert_eq!(info.dimension, 384);
        assert_eq!(info.name, "mock-embed");
    }
}
