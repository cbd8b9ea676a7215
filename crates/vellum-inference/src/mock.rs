//! Mock inference backend for deterministic testing.
//!
//! Generates reproducible embeddings from text content and canned completion
//! responses, with optional latency and failure injection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use vellum_core::{CompletionBackend, EmbeddingBackend, Error, Result};

/// Mock backend implementing both inference traits.
#[derive(Clone)]
pub struct MockInferenceBackend {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone)]
struct MockConfig {
    dimension: usize,
    /// Substring-keyed completion responses, checked in insertion order.
    mapped_responses: Vec<(String, String)>,
    default_response: String,
    latency_ms: u64,
    failure_rate: f64,
}

#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            dimension: 384,
            mapped_responses: Vec::new(),
            default_response: "Mock response".to_string(),
            latency_ms: 0,
            failure_rate: 0.0,
        }
    }
}

impl MockInferenceBackend {
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set the embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        Arc::make_mut(&mut self.config).dimension = dimension;
        self
    }

    /// Set the default completion response.
    pub fn with_fixed_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_response = response.into();
        self
    }

    /// Map any prompt containing `needle` to `output`.
    pub fn with_response_mapping(
        mut self,
        needle: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .mapped_responses
            .push((needle.into(), output.into()));
        self
    }

    /// Set simulated latency for all operations.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Set failure rate (0.0 - 1.0) for testing error handling. 1.0 fails
    /// every call deterministically.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        Arc::make_mut(&mut self.config).failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Get all logged calls for assertion.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    /// Clear the call log.
    pub fn clear_calls(&self) {
        self.call_log.lock().unwrap().clear()
    }

    /// Number of embed calls logged.
    pub fn embed_call_count(&self) -> usize {
        self.call_log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == "embed")
            .count()
    }

    /// Number of completion calls logged.
    pub fn complete_call_count(&self) -> usize {
        self.call_log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == "complete")
            .count()
    }

    fn log_call(&self, operation: &str, input: &str) {
        self.call_log.lock().unwrap().push(MockCall {
            operation: operation.to_string(),
            input: input.to_string(),
        });
    }

    fn should_fail(&self) -> bool {
        use rand::Rng;
        match self.config.failure_rate {
            r if r >= 1.0 => true,
            r if r <= 0.0 => false,
            r => rand::thread_rng().gen::<f64>() < r,
        }
    }

    async fn simulate_latency(&self) {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.config.latency_ms)).await;
        }
    }
}

impl Default for MockInferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for MockInferenceBackend {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.log_call("embed", text);
        self.simulate_latency().await;

        if self.should_fail() {
            return Err(Error::Embedding("Simulated embedding failure".to_string()));
        }

        Ok(MockEmbeddingGenerator::generate(text, self.config.dimension))
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }

    fn device(&self) -> &str {
        "cpu"
    }
}

#[async_trait]
impl CompletionBackend for MockInferenceBackend {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.log_call("complete", user_prompt);
        self.simulate_latency().await;

        if self.should_fail() {
            return Err(Error::Inference("Simulated completion failure".to_string()));
        }

        let _ = system_prompt;
        for (needle, output) in &self.config.mapped_responses {
            if user_prompt.contains(needle.as_str()) {
                return Ok(output.clone());
            }
        }
        Ok(self.config.default_response.clone())
    }
}

/// Deterministic embedding generation from text content.
pub struct MockEmbeddingGenerator;

impl MockEmbeddingGenerator {
    /// Generate a deterministic unit vector from text. The same text always
    /// produces the same embedding; similar texts produce similar vectors.
    pub fn generate(text: &str, dimension: usize) -> Vec<f32> {
        let mut vec = vec![0.0; dimension.max(1)];
        for (i, c) in text.chars().enumerate() {
            let idx = (c as usize + i) % vec.len();
            vec[idx] += 0.1;
        }
        Self::normalize(&mut vec);
        vec
    }

    fn normalize(vec: &mut [f32]) {
        let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            vec.iter_mut().for_each(|x| *x /= magnitude);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embeddings_are_deterministic_and_normalized() {
        let backend = MockInferenceBackend::new();
        let a = backend.embed("hello world").await.unwrap();
        let b = backend.embed("hello world").await.unwrap();
        assert_eq!(a, b);

        let magnitude: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_different_texts_differ() {
        let backend = MockInferenceBackend::new();
        let a = backend.embed("invoices from acme").await.unwrap();
        let b = backend.embed("vacation photos").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_response_mapping_and_default() {
        let backend = MockInferenceBackend::new()
            .with_fixed_response("fallback")
            .with_response_mapping("invoice", r#"{"variants": []}"#);

        let mapped = backend.complete("sys", "rewrite: invoice totals").await.unwrap();
        assert_eq!(mapped, r#"{"variants": []}"#);

        let default = backend.complete("sys", "something else").await.unwrap();
        assert_eq!(default, "fallback");
    }

    #[tokio::test]
    async fn test_failure_injection_is_deterministic_at_one() {
        let backend = MockInferenceBackend::new().with_failure_rate(1.0);
        assert!(backend.embed("x").await.is_err());
        assert!(backend.complete("s", "u").await.is_err());
    }

    #[tokio::test]
    async fn test_call_log() {
        let backend = MockInferenceBackend::new();
        backend.embed("a").await.unwrap();
        backend.embed("b").await.unwrap();
        backend.complete("s", "c").await.unwrap();

        assert_eq!(backend.embed_call_count(), 2);
        assert_eq!(backend.complete_call_count(), 1);

        backend.clear_calls();
        assert!(backend.get_calls().is_empty());
    }
}
