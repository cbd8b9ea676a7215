//! Structured logging schema for vellum.
//!
//! The constants document the field names the crates emit (tracing macros
//! need literal field names, so call sites repeat them) and give log
//! aggregation consumers one place to key their queries from.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (hits, chunks) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "db", "inference", "jobs", "search"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "two_stage", "rrf_fusion", "queue", "embedder"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "search", "embed_batch", "complete"
pub const OPERATION: &str = "operation";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Document UUID being operated on.
pub const DOCUMENT_ID: &str = "document_id";

/// Tenant/owner identifier scoping an operation.
pub const OWNER_ID: &str = "owner_id";

/// Queue worker index processing a task.
pub const WORKER_ID: &str = "worker_id";

/// Search query text.
pub const QUERY: &str = "query";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a search or query.
pub const RESULT_COUNT: &str = "result_count";

/// Number of embeddable units produced for a document.
pub const UNIT_COUNT: &str = "unit_count";

/// Number of input texts sent to the embedding model.
pub const INPUT_COUNT: &str = "input_count";

// ─── Retrieval-specific fields ─────────────────────────────────────────────

/// Retrieval stage (1 = summary candidates, 2 = chunk re-rank).
pub const STAGE: &str = "stage";

/// Number of rewritten query variants in play.
pub const VARIANT_COUNT: &str = "variant_count";

/// Number of stage-1 candidate documents.
pub const CANDIDATE_COUNT: &str = "candidate_count";

/// RRF k parameter.
pub const RRF_K: &str = "rrf_k";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error_msg";

// ─── Subscriber setup ──────────────────────────────────────────────────────

/// Initialize the global tracing subscriber for binaries and tools.
///
/// Environment variables:
///   LOG_FORMAT - "text" (default) or "json"
///   RUST_LOG   - standard env filter (default: "vellum=debug")
///
/// Safe to call once per process; later calls are no-ops.
pub fn init() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "vellum=debug".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let result = if log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    if result.is_ok() {
        tracing::info!(log_format = %log_format, "Logging initialized");
    }
}
