//! Core data model for documents, vector records, and retrieval results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

// =============================================================================
// DOCUMENT LIFECYCLE
// =============================================================================

/// Content lifecycle of a document: upload through extraction and analysis.
///
/// `AnalysisCompleted` and `Completed` are the terminal success states;
/// `ExtractionFailed`, `AnalysisFailed` and `ProcessingError` are terminal
/// failure states, all retriable by re-triggering analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Uploaded,
    PendingExtraction,
    TextExtracted,
    ExtractionFailed,
    PendingAnalysis,
    Analyzing,
    AnalysisCompleted,
    AnalysisFailed,
    ProcessingError,
    Completed,
}

impl DocumentStatus {
    /// True for statuses that record a failure and carry an error detail.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::ExtractionFailed | Self::AnalysisFailed | Self::ProcessingError
        )
    }

    /// True once analysis has finished successfully.
    pub fn analysis_done(&self) -> bool {
        matches!(self, Self::AnalysisCompleted | Self::Completed)
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Uploaded => "uploaded",
            Self::PendingExtraction => "pending_extraction",
            Self::TextExtracted => "text_extracted",
            Self::ExtractionFailed => "extraction_failed",
            Self::PendingAnalysis => "pending_analysis",
            Self::Analyzing => "analyzing",
            Self::AnalysisCompleted => "analysis_completed",
            Self::AnalysisFailed => "analysis_failed",
            Self::ProcessingError => "processing_error",
            Self::Completed => "completed",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for DocumentStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(Self::Uploaded),
            "pending_extraction" => Ok(Self::PendingExtraction),
            "text_extracted" => Ok(Self::TextExtracted),
            "extraction_failed" => Ok(Self::ExtractionFailed),
            "pending_analysis" => Ok(Self::PendingAnalysis),
            "analyzing" => Ok(Self::Analyzing),
            "analysis_completed" => Ok(Self::AnalysisCompleted),
            "analysis_failed" => Ok(Self::AnalysisFailed),
            "processing_error" => Ok(Self::ProcessingError),
            "completed" => Ok(Self::Completed),
            _ => Err(format!("Invalid document status: {}", s)),
        }
    }
}

/// Vectorization lifecycle, tracked independently of [`DocumentStatus`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorStatus {
    #[default]
    NotVectorized,
    Processing,
    Vectorized,
    Failed,
}

impl std::fmt::Display for VectorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotVectorized => "not_vectorized",
            Self::Processing => "processing",
            Self::Vectorized => "vectorized",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for VectorStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "not_vectorized" => Ok(Self::NotVectorized),
            "processing" => Ok(Self::Processing),
            "vectorized" => Ok(Self::Vectorized),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid vector status: {}", s)),
        }
    }
}

// =============================================================================
// ANALYSIS PAYLOAD
// =============================================================================

/// AI analysis output attached to a document.
///
/// The model returns an open schema: known sections are typed optional fields
/// and everything else lands in `extra`. Do not enumerate every possible
/// output shape as a closed type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub semantic_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub knowledge_domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub main_topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_concepts: Vec<String>,
    /// Dynamic fields the known schema does not cover.
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl AnalysisPayload {
    /// True when no known section carries usable text.
    pub fn is_empty(&self) -> bool {
        self.summary.as_deref().map_or(true, |s| s.trim().is_empty())
            && self.semantic_tags.is_empty()
            && self.keywords.is_empty()
            && self.knowledge_domains.is_empty()
            && self.main_topics.is_empty()
            && self.key_concepts.is_empty()
    }
}

// =============================================================================
// DOCUMENT
// =============================================================================

/// Byte offset of the start of a (1-based) line in the extracted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineOffset {
    pub line: u32,
    pub offset: u32,
}

/// A document record owned by a single user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub owner_id: String,
    pub filename: String,
    pub content_type: String,
    pub file_size: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, JsonValue>,
    pub extracted_text: Option<String>,
    pub line_offsets: Option<Vec<LineOffset>>,
    pub analysis: Option<AnalysisPayload>,
    pub status: DocumentStatus,
    pub vector_status: VectorStatus,
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Whether vectorization is allowed to start for this document.
    ///
    /// Requires completed analysis, or an image whose OCR/analysis payload is
    /// already present.
    pub fn vectorization_ready(&self) -> bool {
        self.status.analysis_done()
            || (self.content_type.starts_with("image/") && self.analysis.is_some())
    }
}

/// Request to create a new document record on upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    pub owner_id: String,
    pub filename: String,
    pub content_type: String,
    pub file_size: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, JsonValue>,
}

// =============================================================================
// VECTOR RECORDS
// =============================================================================

/// Logical partition of the vector store: whole-document summaries vs.
/// content sub-chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorKind {
    Summary,
    Chunk,
}

impl std::fmt::Display for VectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Summary => write!(f, "summary"),
            Self::Chunk => write!(f, "chunk"),
        }
    }
}

impl std::str::FromStr for VectorKind {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "summary" => Ok(Self::Summary),
            "chunk" => Ok(Self::Chunk),
            _ => Err(format!("Invalid vector kind: {}", s)),
        }
    }
}

/// One embeddable unit persisted in the vector store.
///
/// All records for a document are deleted and re-created as a set during
/// re-vectorization; there is no partial update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: Uuid,
    pub document_id: Uuid,
    pub owner_id: String,
    pub kind: VectorKind,
    pub vector: Vec<f32>,
    /// Source text actually embedded, truncated to a bounded length.
    pub text: String,
    pub start_line: Option<i64>,
    pub end_line: Option<i64>,
    pub chunk_type: Option<String>,
    /// Exact-match filterable metadata (content type, filename, tags).
    #[serde(default)]
    pub metadata: Map<String, JsonValue>,
    pub model: String,
    pub created_at: DateTime<Utc>,
}

/// Text unit produced by the summarization/chunking stage, pre-embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddableUnit {
    pub kind: VectorKind,
    pub text: String,
    pub start_line: Option<i64>,
    pub end_line: Option<i64>,
    pub chunk_type: Option<String>,
}

// =============================================================================
// VECTOR STORE QUERY / RESULTS
// =============================================================================

/// Similarity query against the vector store.
#[derive(Debug, Clone, Default)]
pub struct VectorQuery {
    pub vector: Vec<f32>,
    pub top_k: usize,
    /// Results scoring below this similarity are excluded.
    pub similarity_threshold: f32,
    /// Mandatory tenant scope when present; applied in SQL, never left to
    /// callers.
    pub owner_id: Option<String>,
    /// Restrict to one partition.
    pub kind: Option<VectorKind>,
    /// Restrict to a candidate document set (stage-2 re-rank).
    pub document_ids: Option<Vec<Uuid>>,
    /// Conjunction of exact-match key/value constraints on record metadata.
    pub metadata_filter: Option<Map<String, JsonValue>>,
}

/// A scored record returned from a vector store search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredRecord {
    pub document_id: Uuid,
    pub kind: VectorKind,
    /// Cosine similarity mapped to [0, 1].
    pub score: f32,
    pub text: String,
    pub start_line: Option<i64>,
    pub end_line: Option<i64>,
    pub chunk_type: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, JsonValue>,
}

/// Final ranked result handed back to retrieval callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub document_id: Uuid,
    pub score: f32,
    pub text: String,
    pub kind: VectorKind,
    pub start_line: Option<i64>,
    pub end_line: Option<i64>,
    #[serde(default)]
    pub metadata: Map<String, JsonValue>,
}

/// Vector store collection statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreStats {
    pub record_count: i64,
    pub dimension: usize,
    pub status: String,
}

/// Outcome of a best-effort batch delete.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchDeleteReport {
    pub processed_count: usize,
    pub failed_ids: Vec<Uuid>,
    pub errors: Vec<String>,
}

// =============================================================================
// QUERY REWRITING
// =============================================================================

/// Explicit time range extracted from a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Structured filters extracted from a question. Populated only from explicit
/// signals, never guessed from content descriptions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewriteFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub document_types: Vec<String>,
}

impl RewriteFilters {
    pub fn is_empty(&self) -> bool {
        self.time_range.is_none() && self.entities.is_empty() && self.document_types.is_empty()
    }
}

/// Result of rewriting a raw user question into search variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRewrite {
    pub original: String,
    /// Ordered variants: keyword-style, paraphrase-style, concept-expansion.
    pub variants: Vec<String>,
    pub intent: String,
    #[serde(default)]
    pub filters: RewriteFilters,
}

impl QueryRewrite {
    /// Degraded rewrite: the original question is the sole variant.
    pub fn fallback(question: &str, reason: &str) -> Self {
        Self {
            original: question.to_string(),
            variants: vec![question.to_string()],
            intent: format!("rewrite unavailable: {}", reason),
            filters: RewriteFilters::default(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_document_status_round_trip() {
        for status in [
            DocumentStatus::Uploaded,
            DocumentStatus::PendingExtraction,
            DocumentStatus::TextExtracted,
            DocumentStatus::ExtractionFailed,
            DocumentStatus::PendingAnalysis,
            DocumentStatus::Analyzing,
            DocumentStatus::AnalysisCompleted,
            DocumentStatus::AnalysisFailed,
            DocumentStatus::ProcessingError,
            DocumentStatus::Completed,
        ] {
            let parsed = DocumentStatus::from_str(&status.to_string()).unwrap();
            assert_eq!(parsed, status);
        }
        assert!(DocumentStatus::from_str("bogus").is_err());
    }

    #[test]
    fn test_document_status_classification() {
        assert!(DocumentStatus::ExtractionFailed.is_error());
        assert!(DocumentStatus::AnalysisFailed.is_error());
        assert!(DocumentStatus::ProcessingError.is_error());
        assert!(!DocumentStatus::AnalysisCompleted.is_error());

        assert!(DocumentStatus::AnalysisCompleted.analysis_done());
        assert!(DocumentStatus::Completed.analysis_done());
        assert!(!DocumentStatus::Analyzing.analysis_done());
    }

    #[test]
    fn test_vector_status_round_trip() {
        for vs in [
            VectorStatus::NotVectorized,
            VectorStatus::Processing,
            VectorStatus::Vectorized,
            VectorStatus::Failed,
        ] {
            assert_eq!(VectorStatus::from_str(&vs.to_string()).unwrap(), vs);
        }
        assert_eq!(VectorStatus::default(), VectorStatus::NotVectorized);
    }

    #[test]
    fn test_vector_kind_round_trip() {
        assert_eq!(VectorKind::from_str("summary").unwrap(), VectorKind::Summary);
        assert_eq!(VectorKind::from_str("chunk").unwrap(), VectorKind::Chunk);
        assert!(VectorKind::from_str("other").is_err());
    }

    #[test]
    fn test_analysis_payload_open_schema() {
        let json = r#"{
            "summary": "Acme invoice",
            "keywords": ["acme", "invoice"],
            "confidence": 0.92,
            "language": "en"
        }"#;
        let payload: AnalysisPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.summary.as_deref(), Some("Acme invoice"));
        assert_eq!(payload.keywords, vec!["acme", "invoice"]);
        assert_eq!(payload.extra.get("language").unwrap(), "en");
        assert!(payload.extra.contains_key("confidence"));
        assert!(!payload.is_empty());
    }

    #[test]
    fn test_analysis_payload_empty() {
        let payload = AnalysisPayload::default();
        assert!(payload.is_empty());

        let whitespace_only = AnalysisPayload {
            summary: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(whitespace_only.is_empty());
    }

    #[test]
    fn test_vectorization_ready_gate() {
        let mut doc = sample_document();
        doc.status = DocumentStatus::Analyzing;
        assert!(!doc.vectorization_ready());

        doc.status = DocumentStatus::AnalysisCompleted;
        assert!(doc.vectorization_ready());

        // Image with analysis present is ready even before AnalysisCompleted
        doc.status = DocumentStatus::TextExtracted;
        doc.content_type = "image/png".to_string();
        doc.analysis = Some(AnalysisPayload {
            summary: Some("a receipt".to_string()),
            ..Default::default()
        });
        assert!(doc.vectorization_ready());

        // Image without analysis is not
        doc.analysis = None;
        assert!(!doc.vectorization_ready());
    }

    #[test]
    fn test_query_rewrite_fallback() {
        let rewrite = QueryRewrite::fallback("what is rust", "timeout");
        assert_eq!(rewrite.variants, vec!["what is rust"]);
        assert!(rewrite.intent.contains("timeout"));
        assert!(rewrite.filters.is_empty());
    }

    fn sample_document() -> Document {
        let now = chrono::Utc::now();
        Document {
            id: Uuid::new_v4(),
            owner_id: "user-1".to_string(),
            filename: "report.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            file_size: 1024,
            tags: Vec::new(),
            metadata: Map::new(),
            extracted_text: None,
            line_offsets: None,
            analysis: None,
            status: DocumentStatus::Uploaded,
            vector_status: VectorStatus::NotVectorized,
            error_detail: None,
            created_at: now,
            updated_at: now,
        }
    }
}
