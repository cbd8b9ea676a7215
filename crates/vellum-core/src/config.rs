//! Immutable configuration snapshots for pipeline runs.
//!
//! Live-reloadable preference state is never mutated in place: call sites take
//! an `Arc` snapshot at the start of a run and [`ConfigHandle::reload`]
//! installs a replacement snapshot for subsequent runs, keeping concurrent
//! workers race-free.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::defaults;

/// Retrieval tuning knobs, snapshotted per request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Maximum rewritten query variants used per request.
    pub max_variants: usize,
    /// Stage-1 candidate count is `min(stage1_multiplier * k, stage1_cap)`.
    pub stage1_multiplier: usize,
    pub stage1_cap: usize,
    /// Minimum similarity for a raw vector hit to count as signal.
    pub similarity_threshold: f32,
    /// RRF rank-dampening constant.
    pub rrf_k: f32,
    /// Per-source RRF weights; summary outweighs chunk by default.
    pub summary_weight: f32,
    pub chunk_weight: f32,
    /// Timeout for the rewrite completion call.
    pub rewrite_timeout_secs: u64,
    /// Character budget for text handed to the completion service.
    pub completion_char_budget: usize,
    /// Query-embedding LRU capacity.
    pub query_cache_capacity: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_variants: defaults::REWRITE_MAX_VARIANTS,
            stage1_multiplier: defaults::STAGE1_MULTIPLIER,
            stage1_cap: defaults::STAGE1_CAP,
            similarity_threshold: defaults::SIMILARITY_THRESHOLD,
            rrf_k: defaults::RRF_K,
            summary_weight: defaults::RRF_SUMMARY_WEIGHT,
            chunk_weight: defaults::RRF_CHUNK_WEIGHT,
            rewrite_timeout_secs: defaults::REWRITE_TIMEOUT_SECS,
            completion_char_budget: defaults::COMPLETION_CHAR_BUDGET,
            query_cache_capacity: defaults::QUERY_CACHE_CAPACITY,
        }
    }
}

impl SearchConfig {
    /// Stage-1 candidate request size for a caller-requested `k`.
    pub fn stage1_top_k(&self, k: usize) -> usize {
        (self.stage1_multiplier * k).min(self.stage1_cap)
    }
}

/// Vectorization queue tuning, snapshotted at pool start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Number of worker loops.
    pub max_concurrency: usize,
    /// Poll timeout when the queue is empty (milliseconds).
    pub poll_interval_ms: u64,
    /// Completed-task records retained for status reporting.
    pub history_limit: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrency: defaults::QUEUE_MAX_CONCURRENCY,
            poll_interval_ms: defaults::QUEUE_POLL_INTERVAL_MS,
            history_limit: defaults::QUEUE_HISTORY_LIMIT,
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `VELLUM_QUEUE_CONCURRENCY` | `2` | Worker loop count |
    /// | `VELLUM_QUEUE_POLL_MS` | `500` | Empty-queue poll timeout |
    pub fn from_env() -> Self {
        let max_concurrency = std::env::var("VELLUM_QUEUE_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::QUEUE_MAX_CONCURRENCY)
            .max(1);

        let poll_interval_ms = std::env::var("VELLUM_QUEUE_POLL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::QUEUE_POLL_INTERVAL_MS);

        Self {
            max_concurrency,
            poll_interval_ms,
            history_limit: defaults::QUEUE_HISTORY_LIMIT,
        }
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }
}

/// Handle producing immutable [`SearchConfig`] snapshots.
#[derive(Debug, Default)]
pub struct ConfigHandle {
    inner: RwLock<Arc<SearchConfig>>,
}

impl ConfigHandle {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            inner: RwLock::new(Arc::new(config)),
        }
    }

    /// Current snapshot. Holders keep seeing their snapshot unchanged even if
    /// a reload happens mid-run.
    pub fn snapshot(&self) -> Arc<SearchConfig> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Install a new snapshot for subsequent runs.
    pub fn reload(&self, config: SearchConfig) {
        info!(rrf_k = config.rrf_k, "Reloading search configuration");
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(config);
    }
}
