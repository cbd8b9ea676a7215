//! Async trait seams between the pipeline and its collaborators.
//!
//! Repository traits are implemented by `vellum-db`; backend traits by
//! `vellum-inference` (and by deterministic mocks in tests).

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    BatchDeleteReport, Document, DocumentStatus, LineOffset, NewDocument, ScoredRecord,
    VectorQuery, VectorRecord, VectorStatus, VectorStoreStats,
};

/// Persistence for document records and their lifecycle state machine.
///
/// Assumed durable and strongly consistent per document id. This trait has no
/// concurrency control of its own; the vectorization queue and callers are
/// responsible for not issuing conflicting transitions for one document.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create a document record on upload (status `Uploaded`,
    /// vector status `NotVectorized`).
    async fn create(&self, doc: NewDocument) -> Result<Document>;

    /// Fetch a document, `Error::DocumentNotFound` if absent.
    async fn get(&self, id: Uuid) -> Result<Document>;

    /// Advance the content lifecycle.
    ///
    /// Transitioning to `Analyzing` while already `Analyzing` is a skip (the
    /// current record is returned unchanged) so duplicate concurrent analysis
    /// triggers are harmless. Error-terminal statuses set `error_detail`; all
    /// other transitions clear it. `updated_at` is bumped on every write.
    async fn advance_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
        error_detail: Option<&str>,
    ) -> Result<Document>;

    /// Advance the independent vectorization axis, with the same
    /// not-found/error-detail/timestamp contract as [`advance_status`].
    ///
    /// [`advance_status`]: DocumentStore::advance_status
    async fn advance_vector_status(
        &self,
        id: Uuid,
        vector_status: VectorStatus,
        error_detail: Option<&str>,
    ) -> Result<Document>;

    /// Store extracted text plus its line-offset map and move the document to
    /// `TextExtracted`.
    async fn update_on_extraction_success(
        &self,
        id: Uuid,
        text: &str,
        line_offsets: &[LineOffset],
    ) -> Result<Document>;

    /// Attach an analysis payload.
    async fn set_analysis(&self, id: Uuid, analysis: &crate::AnalysisPayload) -> Result<Document>;

    /// Hard delete. Returns false when the record was already absent. Callers
    /// cascade the vector-store deletion.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// List a tenant's documents, newest first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Document>>;
}

/// Persistent nearest-neighbor store for embeddable units, partitioned
/// logically by owner and by [`VectorKind`].
///
/// Individual calls are atomic; nothing is transactional across calls. The
/// delete-then-insert re-vectorization pattern therefore has a window where a
/// document has zero vectors; concurrent searches simply do not find it.
///
/// [`VectorKind`]: crate::VectorKind
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Ensure the backing collection exists for the given dimension.
    /// Idempotent; an existing collection is a no-op.
    async fn create_partition(&self, dimension: usize) -> Result<()>;

    /// Bulk insert. Best effort, not atomic: a mid-batch failure is surfaced
    /// as `Ok(false)` after attempting the remaining records.
    async fn insert(&self, records: &[VectorRecord]) -> Result<bool>;

    /// Similarity search. Owner scope is applied in the query itself whenever
    /// present; the store is the last line of defense against cross-tenant
    /// leakage.
    async fn search(&self, query: &VectorQuery) -> Result<Vec<ScoredRecord>>;

    /// Delete all records for a document across kinds. Idempotent: zero
    /// matching records is a success.
    ///
    /// When an owner scope is given and the document's records belong to a
    /// different tenant, the call fails with `Error::Unauthorized` instead of
    /// silently deleting nothing, so calling layers can log the rejection.
    /// `None` is reserved for trusted internal maintenance paths.
    async fn delete_by_document(&self, document_id: Uuid, owner_id: Option<&str>) -> Result<bool>;

    /// Best-effort batch delete; one failing id never aborts the others.
    async fn delete_by_documents(&self, document_ids: &[Uuid]) -> Result<BatchDeleteReport>;

    /// Collection statistics.
    async fn stats(&self) -> Result<VectorStoreStats>;
}

/// A text-embedding model.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed one text into a fixed-dimension vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, preserving order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Output vector dimension.
    fn dimension(&self) -> usize;

    /// Model identifier recorded on vector records.
    fn model_name(&self) -> &str;

    /// Device the model runs on ("cpu", "cuda", "remote").
    fn device(&self) -> &str {
        "remote"
    }
}

/// Opaque text-completion service used for query rewriting (and, outside this
/// core, answer synthesis). Callers pre-truncate inputs to a character budget
/// and wrap calls in a timeout.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}
