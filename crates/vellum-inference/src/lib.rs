//! # vellum-inference
//!
//! Inference backends for the vellum document engine: the Ollama HTTP backend
//! for embeddings and completions, the [`Embedder`] provider the pipeline
//! talks to, and a deterministic mock backend for tests.

pub mod embedder;
pub mod mock;
pub mod ollama;

pub use embedder::{Embedder, ModelInfo};
pub use mock::{MockEmbeddingGenerator, MockInferenceBackend};
pub use ollama::OllamaBackend;
