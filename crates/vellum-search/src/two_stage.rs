//! Two-stage hybrid retrieval.
//!
//! Stage 1 ranks document summaries per rewritten variant to pick a candidate
//! document set; stage 2 re-ranks content chunks within those candidates.
//! All per-variant lists from both stages are fused with weighted RRF.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use vellum_core::{
    CompletionBackend, ConfigHandle, Result, ScoredRecord, SearchHit, VectorKind, VectorQuery,
    VectorStore,
};
use vellum_inference::Embedder;

use crate::query_cache::QueryEmbeddingCache;
use crate::rewrite::QueryRewriter;
use crate::rrf::{rrf_fuse, RankedList};

/// Per-request RRF overrides. Absent fields in the request fall back to the
/// live configuration snapshot.
#[derive(Debug, Clone, Copy)]
pub struct RrfParams {
    pub k_const: f32,
    pub summary_weight: f32,
    pub chunk_weight: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchStrategy {
    /// Summary stage for candidates, chunk stage for spans, fused.
    #[default]
    Hybrid,
    /// Document-level search only.
    SummaryOnly,
    /// Span-level search only, unrestricted (no stage 1 runs).
    ChunksOnly,
    /// Single-query summary search: no rewriting, no fusion.
    Legacy,
}

#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub owner_id: Option<String>,
    pub top_k: usize,
    /// Override of the configured similarity floor.
    pub similarity_threshold: Option<f32>,
    pub metadata_filter: Option<Map<String, JsonValue>>,
    pub strategy: SearchStrategy,
    /// Override of the configured stage-1 candidate count.
    pub stage1_top_k: Option<usize>,
    /// Override of the per-variant chunk result count; defaults to `top_k`.
    pub stage2_top_k: Option<usize>,
    pub rrf: Option<RrfParams>,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            owner_id: None,
            top_k: 10,
            similarity_threshold: None,
            metadata_filter: None,
            strategy: SearchStrategy::default(),
            stage1_top_k: None,
            stage2_top_k: None,
            rrf: None,
        }
    }
}

/// Retrieval engine over a vector store, an embedder, and a rewriter.
pub struct TwoStageEngine {
    vectors: Arc<dyn VectorStore>,
    embedder: Embedder,
    rewriter: QueryRewriter,
    cache: QueryEmbeddingCache,
    config: Arc<ConfigHandle>,
}

impl TwoStageEngine {
    pub fn new(
        vectors: Arc<dyn VectorStore>,
        embedder: Embedder,
        completion: Arc<dyn CompletionBackend>,
        config: Arc<ConfigHandle>,
    ) -> Self {
        let cache = QueryEmbeddingCache::new(config.snapshot().query_cache_capacity);
        let rewriter = QueryRewriter::new(completion, config.clone());
        Self {
            vectors,
            embedder,
            rewriter,
            cache,
            config,
        }
    }

    pub fn query_cache(&self) -> &QueryEmbeddingCache {
        &self.cache
    }

    #[instrument(skip(self, request), fields(subsystem = "search", component = "two_stage", operation = "search", query = %request.query))]
    pub async fn search(&self, request: SearchRequest) -> Result<Vec<SearchHit>> {
        let start = Instant::now();
        let cfg = self.config.snapshot();

        if request.top_k == 0 || request.query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let threshold = request
            .similarity_threshold
            .unwrap_or(cfg.similarity_threshold);
        let stage1_top_k = request
            .stage1_top_k
            .unwrap_or_else(|| cfg.stage1_top_k(request.top_k));
        let stage2_top_k = request.stage2_top_k.unwrap_or(request.top_k);
        let rrf = request.rrf.unwrap_or(RrfParams {
            k_const: cfg.rrf_k,
            summary_weight: cfg.summary_weight,
            chunk_weight: cfg.chunk_weight,
        });

        if request.strategy == SearchStrategy::Legacy {
            return self.legacy_search(&request, threshold).await;
        }
        if stage1_top_k == 0 {
            return Ok(Vec::new());
        }

        // Rewriting never fails; worst case the raw question is the only
        // variant.
        let rewrite = self.rewriter.rewrite(&request.query).await;
        let mut embeddings: Vec<Vec<f32>> = Vec::new();
        for variant in rewrite.variants.iter().take(cfg.max_variants) {
            if let Some(vector) = self.cache.get_or_compute(variant, &self.embedder).await? {
                embeddings.push(vector);
            }
        }
        if embeddings.is_empty() {
            return Ok(Vec::new());
        }

        let mut lists: Vec<RankedList> = Vec::new();

        // Stage 1: document-level candidates from summary vectors.
        let mut candidates: HashSet<Uuid> = HashSet::new();
        if request.strategy != SearchStrategy::ChunksOnly {
            for embedding in &embeddings {
                let query = VectorQuery {
                    vector: embedding.clone(),
                    top_k: stage1_top_k,
                    similarity_threshold: threshold,
                    owner_id: request.owner_id.clone(),
                    kind: Some(VectorKind::Summary),
                    document_ids: None,
                    metadata_filter: request.metadata_filter.clone(),
                };
                match self.vectors.search(&query).await {
                    Ok(hits) => {
                        candidates.extend(hits.iter().map(|h| h.document_id));
                        lists.push(RankedList {
                            weight: rrf.summary_weight,
                            hits,
                        });
                    }
                    Err(e) => {
                        warn!(stage = 1, error_msg = %e, "Variant summary search failed, skipping");
                    }
                }
            }

            if request.strategy == SearchStrategy::Hybrid && candidates.is_empty() {
                debug!("No stage-1 candidates, short-circuiting");
                return Ok(Vec::new());
            }
        }

        // Stage 2: span-level re-rank. Hybrid restricts to stage-1 candidates;
        // ChunksOnly has no candidate set to restrict by.
        if request.strategy != SearchStrategy::SummaryOnly {
            let document_ids = (request.strategy == SearchStrategy::Hybrid)
                .then(|| candidates.iter().copied().collect::<Vec<_>>());
            for embedding in &embeddings {
                let query = VectorQuery {
                    vector: embedding.clone(),
                    top_k: stage2_top_k,
                    similarity_threshold: threshold,
                    owner_id: request.owner_id.clone(),
                    kind: Some(VectorKind::Chunk),
                    document_ids: document_ids.clone(),
                    metadata_filter: request.metadata_filter.clone(),
                };
                match self.vectors.search(&query).await {
                    Ok(hits) => lists.push(RankedList {
                        weight: rrf.chunk_weight,
                        hits,
                    }),
                    Err(e) => {
                        warn!(stage = 2, error_msg = %e, "Variant chunk search failed, skipping");
                    }
                }
            }
        }

        let results = rrf_fuse(lists, rrf.k_const, request.top_k);
        info!(
            variant_count = embeddings.len(),
            candidate_count = candidates.len(),
            result_count = results.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Two-stage search complete"
        );
        Ok(results)
    }

    /// Pre-rewrite behavior kept for compatibility: one query, summary
    /// partition, raw similarity scores.
    async fn legacy_search(
        &self,
        request: &SearchRequest,
        threshold: f32,
    ) -> Result<Vec<SearchHit>> {
        let Some(vector) = self
            .cache
            .get_or_compute(&request.query, &self.embedder)
            .await?
        else {
            return Ok(Vec::new());
        };

        let hits = self
            .vectors
            .search(&VectorQuery {
                vector,
                top_k: request.top_k,
                similarity_threshold: threshold,
                owner_id: request.owner_id.clone(),
                kind: Some(VectorKind::Summary),
                document_ids: None,
                metadata_filter: request.metadata_filter.clone(),
            })
            .await?;

        Ok(hits.into_iter().map(to_hit).collect())
    }
}

fn to_hit(record: ScoredRecord) -> SearchHit {
    SearchHit {
        document_id: record.document_id,
        score: record.score,
        text: record.text,
        kind: record.kind,
        start_line: record.start_line,
        end_line: record.end_line,
        metadata: record.metadata,
    }
}
