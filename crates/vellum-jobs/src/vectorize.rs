//! Vectorization handler: one document in, vector records out.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value as JsonValue};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use vellum_core::defaults::SNIPPET_MAX_CHARS;
use vellum_core::{
    Document, DocumentStore, EmbeddableUnit, Error, Result, VectorRecord, VectorStatus,
    VectorStore,
};
use vellum_inference::Embedder;

use crate::units::build_embeddable_units;

/// A unit of queue work. Implemented by [`Vectorizer`] in production and by
/// stand-ins in queue tests.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn run(&self, document_id: Uuid) -> Result<()>;
}

/// Re-vectorizes a single document: gate on lifecycle state, embed its units,
/// and replace its vector records wholesale.
pub struct Vectorizer {
    documents: Arc<dyn DocumentStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Embedder,
}

impl Vectorizer {
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Embedder,
    ) -> Self {
        Self {
            documents,
            vectors,
            embedder,
        }
    }

    async fn vectorize(&self, doc: &Document) -> Result<usize> {
        let units = build_embeddable_units(doc);
        let texts: Vec<String> = units.iter().map(|u| u.text.clone()).collect();
        let vectors = self.embedder.encode_batch(&texts).await?;

        self.vectors.create_partition(self.embedder.dimension()).await?;

        let records: Vec<VectorRecord> = units
            .into_iter()
            .zip(vectors)
            .map(|(unit, vector)| self.to_record(doc, unit, vector))
            .collect();

        // Replace wholesale. Between the delete and the insert the document
        // is simply absent from search results.
        self.vectors
            .delete_by_document(doc.id, Some(doc.owner_id.as_str()))
            .await?;
        let count = records.len();
        if !self.vectors.insert(&records).await? {
            return Err(Error::Embedding(
                "One or more vector records failed to insert".to_string(),
            ));
        }
        Ok(count)
    }

    fn to_record(&self, doc: &Document, unit: EmbeddableUnit, vector: Vec<f32>) -> VectorRecord {
        let mut metadata = Map::new();
        metadata.insert(
            "content_type".to_string(),
            JsonValue::from(doc.content_type.clone()),
        );
        metadata.insert("filename".to_string(), JsonValue::from(doc.filename.clone()));
        if !doc.tags.is_empty() {
            metadata.insert("tags".to_string(), JsonValue::from(doc.tags.clone()));
        }

        VectorRecord {
            id: Uuid::new_v4(),
            document_id: doc.id,
            owner_id: doc.owner_id.clone(),
            kind: unit.kind,
            vector,
            text: truncate_chars(&unit.text, SNIPPET_MAX_CHARS),
            start_line: unit.start_line,
            end_line: unit.end_line,
            chunk_type: unit.chunk_type,
            metadata,
            model: self.embedder.model_info().name,
            created_at: Utc::now(),
        }
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

#[async_trait]
impl TaskHandler for Vectorizer {
    #[instrument(skip(self), fields(subsystem = "jobs", component = "vectorizer", document_id = %document_id))]
    async fn run(&self, document_id: Uuid) -> Result<()> {
        let doc = self.documents.get(document_id).await?;

        if !doc.vectorization_ready() {
            return Err(Error::InvalidInput(format!(
                "Document {} not ready for vectorization (status {})",
                document_id, doc.status
            )));
        }

        self.documents
            .advance_vector_status(document_id, VectorStatus::Processing, None)
            .await?;

        match self.vectorize(&doc).await {
            Ok(record_count) => {
                self.documents
                    .advance_vector_status(document_id, VectorStatus::Vectorized, None)
                    .await?;
                info!(
                    owner_id = %doc.owner_id,
                    record_count,
                    "Document vectorized"
                );
                Ok(())
            }
            Err(e) => {
                warn!(error_msg = %e, "Vectorization failed");
                self.documents
                    .advance_vector_status(document_id, VectorStatus::Failed, Some(&e.to_string()))
                    .await?;
                Err(e)
            }
        }
    }
}
