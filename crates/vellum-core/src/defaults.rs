//! Centralized default constants for the vellum engine.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. When adding constants, place them in the appropriate section and
//! document the rationale for the chosen value.

// =============================================================================
// EMBEDDING
// =============================================================================

/// Default embedding model name (Ollama).
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Default embedding vector dimension for nomic-embed-text.
pub const EMBED_DIMENSION: usize = 768;

/// Maximum characters accepted by the embedder before silent truncation.
pub const EMBED_MAX_INPUT_CHARS: usize = 8192;

/// Maximum concurrent calls into the underlying embedding model. The model is
/// a single shared instance; the provider serializes access so queue workers
/// never have to.
pub const EMBED_MAX_PARALLELISM: usize = 2;

/// Timeout for embedding requests in seconds.
pub const EMBED_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// CHUNKING
// =============================================================================

/// Maximum characters per content chunk.
pub const CHUNK_MAX_CHARS: usize = 1000;

/// Stored snippet length in characters for vector records.
pub const SNIPPET_MAX_CHARS: usize = 500;

// =============================================================================
// VECTORIZATION QUEUE
// =============================================================================

/// Default number of queue worker loops.
pub const QUEUE_MAX_CONCURRENCY: usize = 2;

/// Worker poll timeout when the queue is empty (milliseconds). Bounded so a
/// shutdown signal is observed promptly.
pub const QUEUE_POLL_INTERVAL_MS: u64 = 500;

/// Completed/failed task records retained for queue status reporting.
pub const QUEUE_HISTORY_LIMIT: usize = 100;

// =============================================================================
// RETRIEVAL
// =============================================================================

/// Maximum rewritten query variants per request.
pub const REWRITE_MAX_VARIANTS: usize = 3;

/// Timeout for the rewrite completion call in seconds.
pub const REWRITE_TIMEOUT_SECS: u64 = 15;

/// Character budget applied to text sent to the completion service.
pub const COMPLETION_CHAR_BUDGET: usize = 4000;

/// Timeout for generation requests in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Stage-1 candidate count multiplier over the requested `k`.
pub const STAGE1_MULTIPLIER: usize = 2;

/// Hard cap on stage-1 candidates regardless of `k`.
pub const STAGE1_CAP: usize = 20;

/// Default minimum cosine similarity for results to count as signal.
/// Typical good matches score 0.5-0.9; unrelated content below 0.2.
pub const SIMILARITY_THRESHOLD: f32 = 0.3;

/// RRF constant. K=20 emphasizes top-ranked results more strongly than the
/// original K=60 default, suited to small-to-medium private corpora where
/// precision matters more than deep recall.
///
/// Reference: Cormack et al. (2009), Elasticsearch BEIR analysis (2024)
pub const RRF_K: f32 = 20.0;

/// RRF source weight for summary-partition lists. Document-level synopses are
/// weighted above chunks to favor document-level precision.
pub const RRF_SUMMARY_WEIGHT: f32 = 1.0;

/// RRF source weight for chunk-partition lists.
pub const RRF_CHUNK_WEIGHT: f32 = 0.7;

/// Query-embedding LRU cache capacity.
pub const QUERY_CACHE_CAPACITY: usize = 128;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model name (Ollama).
pub const GEN_MODEL: &str = "qwen3:8b";
