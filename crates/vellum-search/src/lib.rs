//! # vellum-search
//!
//! Retrieval for the vellum document engine: query rewriting, a query
//! embedding cache, weighted reciprocal rank fusion, and the two-stage
//! hybrid engine that ties them together.

pub mod query_cache;
pub mod rewrite;
pub mod rrf;
pub mod two_stage;

pub use query_cache::QueryEmbeddingCache;
pub use rewrite::QueryRewriter;
pub use rrf::{rrf_fuse, RankedList, RRF_K};
pub use two_stage::{RrfParams, SearchRequest, SearchStrategy, TwoStageEngine};
