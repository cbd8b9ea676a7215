//! Retrieval tests over the full pipeline: documents are vectorized through
//! the real handler into the in-memory store, then queried through the
//! two-stage engine with a deterministic mock backend.

use std::sync::Arc;

use serde_json::Map;
use uuid::Uuid;

use vellum_core::{
    ConfigHandle, Document, DocumentStatus, DocumentStore, NewDocument, VectorKind,
};
use vellum_db::Database;
use vellum_inference::{Embedder, MockInferenceBackend};
use vellum_jobs::{TaskHandler, Vectorizer};
use vellum_search::{SearchRequest, SearchStrategy, TwoStageEngine};

struct Harness {
    db: Database,
    vectorizer: Vectorizer,
    engine: TwoStageEngine,
}

async fn setup() -> Harness {
    let db = Database::connect_memory().await.unwrap();
    let backend = MockInferenceBackend::new();
    let vectorizer = Vectorizer::new(
        Arc::new(db.documents.clone()),
        Arc::new(db.vectors.clone()),
        Embedder::new(Arc::new(backend.clone())),
    );
    let engine = TwoStageEngine::new(
        Arc::new(db.vectors.clone()),
        Embedder::new(Arc::new(backend.clone())),
        Arc::new(backend),
        Arc::new(ConfigHandle::default()),
    );
    Harness {
        db,
        vectorizer,
        engine,
    }
}

impl Harness {
    async fn ingest(&self, filename: &str, summary: &str, text: Option<&str>) -> Document {
        let doc = self
            .db
            .documents
            .create(NewDocument {
                owner_id: "alice".to_string(),
                filename: filename.to_string(),
                content_type: "text/plain".to_string(),
                file_size: 256,
                tags: vec![],
                metadata: Map::new(),
            })
            .await
            .unwrap();
        if let Some(text) = text {
            self.db
                .documents
                .update_on_extraction_success(doc.id, text, &[])
                .await
                .unwrap();
        }
        if !summary.is_empty() {
            self.db
                .documents
                .set_analysis(
                    doc.id,
                    &serde_json::from_str(&format!(r#"{{"summary": "{summary}"}}"#)).unwrap(),
                )
                .await
                .unwrap();
        }
        let doc = self
            .db
            .documents
            .advance_status(doc.id, DocumentStatus::AnalysisCompleted, None)
            .await
            .unwrap();
        self.vectorizer.run(doc.id).await.unwrap();
        doc
    }

    fn request(&self, query: &str) -> SearchRequest {
        SearchRequest {
            query: query.to_string(),
            owner_id: Some("alice".to_string()),
            // The mock embedder is bag-of-chars; absolute similarities are
            // not meaningful, only their ordering is.
            similarity_threshold: Some(0.0),
            ..Default::default()
        }
    }
}

/// The document whose summary matches the query verbatim wins hybrid search.
#[tokio::test]
async fn test_hybrid_finds_the_matching_document() {
    let h = setup().await;
    let invoice = h
        .ingest(
            "acme-invoice.pdf",
            "Acme Corporation invoice for March consulting services",
            None,
        )
        .await;
    h.ingest("trip.md", "Travel notes from a week in Lisbon", None)
        .await;

    let hits = h
        .engine
        .search(h.request("Acme Corporation invoice for March consulting services"))
        .await
        .unwrap();

    assert!(!hits.is_empty());
    assert_eq!(hits[0].document_id, invoice.id);
}

/// An analyzed invoice is found at the default similarity floor, not just at
/// a zeroed one.
#[tokio::test]
async fn test_invoice_scenario_at_default_threshold() {
    let h = setup().await;
    let invoice = h
        .ingest(
            "acme.pdf",
            "Acme Corp invoice, $500, Jan 2024",
            Some("Invoice from Acme Corp dated 2024-01-01, total $500"),
        )
        .await;

    let mut req = h.request("Acme invoice");
    req.strategy = SearchStrategy::SummaryOnly;
    req.similarity_threshold = None;
    let hits = h.engine.search(req).await.unwrap();

    assert!(hits.iter().any(|hit| hit.document_id == invoice.id));
}

/// Chunk hits carry their line ranges through to the final results.
#[tokio::test]
async fn test_chunk_hits_preserve_line_ranges() {
    let h = setup().await;
    let doc = h
        .ingest(
            "minutes.txt",
            "Board meeting minutes",
            Some("opening remarks\n\nbudget approved for roadmap\n\nclosing remarks"),
        )
        .await;

    let mut req = h.request("budget approved for roadmap");
    req.strategy = SearchStrategy::ChunksOnly;
    let hits = h.engine.search(req).await.unwrap();

    assert!(!hits.is_empty());
    let chunk = &hits[0];
    assert_eq!(chunk.document_id, doc.id);
    assert_eq!(chunk.kind, VectorKind::Chunk);
    assert!(chunk.start_line.is_some());
    assert!(chunk.end_line.is_some());
}

/// A document with no analysis text and no extracted text is still findable
/// by its filename.
#[tokio::test]
async fn test_filename_fallback_document_is_searchable() {
    let h = setup().await;
    let doc = h.ingest("q3-financial-forecast.xlsx", "", None).await;

    let hits = h
        .engine
        .search(h.request("q3-financial-forecast.xlsx"))
        .await
        .unwrap();

    assert!(!hits.is_empty());
    assert_eq!(hits[0].document_id, doc.id);
    assert_eq!(hits[0].text, "q3-financial-forecast.xlsx");
}

/// Tenants never see each other's documents, whatever the strategy.
#[tokio::test]
async fn test_owner_isolation_across_strategies() {
    let h = setup().await;
    h.ingest("secret.txt", "confidential partner agreement", None)
        .await;

    for strategy in [
        SearchStrategy::Hybrid,
        SearchStrategy::SummaryOnly,
        SearchStrategy::ChunksOnly,
        SearchStrategy::Legacy,
    ] {
        let mut req = h.request("confidential partner agreement");
        req.owner_id = Some("mallory".to_string());
        req.strategy = strategy;
        assert!(
            h.engine.search(req).await.unwrap().is_empty(),
            "strategy {:?} leaked across owners",
            strategy
        );
    }
}

/// Deleting a document's vectors removes it from results immediately.
#[tokio::test]
async fn test_deleted_document_disappears_from_results() {
    use vellum_core::VectorStore;

    let h = setup().await;
    let doc = h
        .ingest("old-draft.txt", "early draft of the annual report", None)
        .await;

    let before = h
        .engine
        .search(h.request("early draft of the annual report"))
        .await
        .unwrap();
    assert!(before.iter().any(|hit| hit.document_id == doc.id));

    h.db.vectors
        .delete_by_document(doc.id, Some("alice"))
        .await
        .unwrap();

    let after = h
        .engine
        .search(h.request("early draft of the annual report"))
        .await
        .unwrap();
    assert!(after.iter().all(|hit| hit.document_id != doc.id));
}

/// Batch deletion reports every processed id and clears the store.
#[tokio::test]
async fn test_batch_delete_reports_processed_documents() {
    use vellum_core::VectorStore;

    let h = setup().await;
    let a = h.ingest("a.txt", "first document", None).await;
    let b = h.ingest("b.txt", "second document", None).await;

    let report = h
        .db
        .vectors
        .delete_by_documents(&[a.id, b.id, Uuid::new_v4()])
        .await
        .unwrap();

    assert_eq!(report.processed_count, 3);
    assert!(report.failed_ids.is_empty());
    assert_eq!(h.db.vectors.stats().await.unwrap().record_count, 0);
}

/// Legacy strategy returns the raw similarity for an identical query.
#[tokio::test]
async fn test_legacy_round_trip_scores_near_one() {
    let h = setup().await;
    h.ingest("note.txt", "reciprocal rank fusion notes", None)
        .await;

    let mut req = h.request("reciprocal rank fusion notes");
    req.strategy = SearchStrategy::Legacy;
    let hits = h.engine.search(req).await.unwrap();

    assert_eq!(hits.len(), 1);
    assert!(hits[0].score > 0.99);
}

/// Results are capped at the requested k after fusion.
#[tokio::test]
async fn test_top_k_truncates_fused_results() {
    let h = setup().await;
    for i in 0..6 {
        h.ingest(
            &format!("doc-{i}.txt"),
            &format!("shared topic document number {i}"),
            None,
        )
        .await;
    }

    let mut req = h.request("shared topic document");
    req.top_k = 3;
    let hits = h.engine.search(req).await.unwrap();
    assert_eq!(hits.len(), 3);
}
