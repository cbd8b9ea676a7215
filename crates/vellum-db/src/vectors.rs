//! Vector record persistence with in-process cosine scoring.
//!
//! Vectors are stored as little-endian f32 blobs. Candidate rows are
//! pre-filtered in SQL (owner, kind, document set), then scored in process.
//! At the scale a single tenant's document set reaches this stays well under
//! query latency budgets, and it keeps the store on plain SQLite.

use std::str::FromStr;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use sqlx::{Row, SqlitePool};
use tracing::{debug, warn};
use uuid::Uuid;

use vellum_core::{
    BatchDeleteReport, Error, Result, ScoredRecord, VectorKind, VectorQuery, VectorRecord,
    VectorStore, VectorStoreStats,
};

const DIMENSION_KEY: &str = "dimension";

/// SQLite implementation of [`VectorStore`].
#[derive(Clone)]
pub struct SqliteVectorRepository {
    pool: SqlitePool,
}

impl SqliteVectorRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Encode a vector as a little-endian f32 blob.
pub fn vec_to_blob(vector: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        blob.extend_from_slice(&v.to_le_bytes());
    }
    blob
}

/// Decode a little-endian f32 blob back into a vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Cosine similarity as `1 - cosine distance`, clamped to [0, 1]. Negative
/// cosines (opposed vectors) floor at 0 rather than rescaling, so the default
/// threshold cut actually excludes unrelated content. Zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    let cosine = dot / (norm_a.sqrt() * norm_b.sqrt());
    cosine.clamp(0.0, 1.0)
}

/// Exact-match conjunction of the filter over the record metadata.
fn metadata_matches(filter: &Map<String, JsonValue>, metadata: &Map<String, JsonValue>) -> bool {
    filter
        .iter()
        .all(|(key, expected)| metadata.get(key) == Some(expected))
}

async fn insert_one(pool: &SqlitePool, record: &VectorRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO vector_record
            (id, document_id, owner_id, kind, vector, text, start_line, end_line,
             chunk_type, metadata, model, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(record.id.to_string())
    .bind(record.document_id.to_string())
    .bind(&record.owner_id)
    .bind(record.kind.to_string())
    .bind(vec_to_blob(&record.vector))
    .bind(&record.text)
    .bind(record.start_line)
    .bind(record.end_line)
    .bind(&record.chunk_type)
    .bind(serde_json::to_string(&record.metadata)?)
    .bind(&record.model)
    .bind(record.created_at.to_rfc3339())
    .execute(pool)
    .await
    .map_err(Error::Database)?;
    Ok(())
}

#[async_trait]
impl VectorStore for SqliteVectorRepository {
    async fn create_partition(&self, dimension: usize) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO vector_collection (key, value) VALUES (?, ?)")
            .bind(DIMENSION_KEY)
            .bind(dimension.to_string())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn insert(&self, records: &[VectorRecord]) -> Result<bool> {
        let mut all_ok = true;
        for record in records {
            if let Err(e) = insert_one(&self.pool, record).await {
                warn!(
                    document_id = %record.document_id,
                    record_id = %record.id,
                    error_msg = %e,
                    "Vector insert failed, continuing batch"
                );
                all_ok = false;
            }
        }
        Ok(all_ok)
    }

    async fn search(&self, query: &VectorQuery) -> Result<Vec<ScoredRecord>> {
        if query.top_k == 0 {
            return Ok(Vec::new());
        }

        // SQL pre-filter on the indexed columns; similarity and the metadata
        // conjunction are applied in process.
        let mut sql = String::from(
            "SELECT document_id, kind, vector, text, start_line, end_line, chunk_type, metadata \
             FROM vector_record WHERE 1 = 1",
        );
        let mut binds: Vec<String> = Vec::new();

        if let Some(owner_id) = &query.owner_id {
            sql.push_str(" AND owner_id = ?");
            binds.push(owner_id.clone());
        }
        if let Some(kind) = query.kind {
            sql.push_str(" AND kind = ?");
            binds.push(kind.to_string());
        }
        if let Some(ids) = &query.document_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; ids.len()].join(", ");
            sql.push_str(&format!(" AND document_id IN ({placeholders})"));
            binds.extend(ids.iter().map(|id| id.to_string()));
        }

        let mut stmt = sqlx::query(&sql);
        for bind in &binds {
            stmt = stmt.bind(bind);
        }
        let rows = stmt.fetch_all(&self.pool).await.map_err(Error::Database)?;

        let mut scored: Vec<ScoredRecord> = Vec::new();
        for row in &rows {
            let metadata_raw: String = row.get("metadata");
            let metadata: Map<String, JsonValue> = serde_json::from_str(&metadata_raw)?;
            if let Some(filter) = &query.metadata_filter {
                if !metadata_matches(filter, &metadata) {
                    continue;
                }
            }

            let blob: Vec<u8> = row.get("vector");
            let score = cosine_similarity(&query.vector, &blob_to_vec(&blob));
            if score < query.similarity_threshold {
                continue;
            }

            let document_id_raw: String = row.get("document_id");
            let kind_raw: String = row.get("kind");
            scored.push(ScoredRecord {
                document_id: Uuid::parse_str(&document_id_raw).map_err(|e| {
                    Error::Internal(format!("Invalid stored document id {document_id_raw:?}: {e}"))
                })?,
                kind: VectorKind::from_str(&kind_raw).map_err(Error::Internal)?,
                score,
                text: row.get("text"),
                start_line: row.get("start_line"),
                end_line: row.get("end_line"),
                chunk_type: row.get("chunk_type"),
                metadata,
            });
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(query.top_k);

        debug!(
            candidate_count = rows.len(),
            result_count = scored.len(),
            "Vector search complete"
        );
        Ok(scored)
    }

    async fn delete_by_document(&self, document_id: Uuid, owner_id: Option<&str>) -> Result<bool> {
        if let Some(owner_id) = owner_id {
            let record_owner: Option<String> = sqlx::query_scalar(
                "SELECT owner_id FROM vector_record WHERE document_id = ? LIMIT 1",
            )
            .bind(document_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

            if let Some(record_owner) = record_owner {
                if record_owner != owner_id {
                    warn!(document_id = %document_id, owner_id, "Rejected cross-owner vector delete");
                    return Err(Error::Unauthorized(format!(
                        "Vectors for document {document_id} belong to another owner"
                    )));
                }
            }
        }

        let result = sqlx::query("DELETE FROM vector_record WHERE document_id = ?")
            .bind(document_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        debug!(document_id = %document_id, deleted = result.rows_affected(), "Deleted document vectors");
        Ok(true)
    }

    async fn delete_by_documents(&self, document_ids: &[Uuid]) -> Result<BatchDeleteReport> {
        let mut report = BatchDeleteReport::default();
        for id in document_ids {
            match self.delete_by_document(*id, None).await {
                Ok(_) => report.processed_count += 1,
                Err(e) => {
                    warn!(document_id = %id, error_msg = %e, "Batch vector delete failed for id");
                    report.failed_ids.push(*id);
                    report.errors.push(e.to_string());
                }
            }
        }
        Ok(report)
    }

    async fn stats(&self) -> Result<VectorStoreStats> {
        let record_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM vector_record")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;

        let dimension: Option<String> =
            sqlx::query_scalar("SELECT value FROM vector_collection WHERE key = ?")
                .bind(DIMENSION_KEY)
                .fetch_optional(&self.pool)
                .await
                .map_err(Error::Database)?;

        Ok(VectorStoreStats {
            record_count,
            dimension: dimension.and_then(|v| v.parse().ok()).unwrap_or(0),
            status: "green".to_string(),
        })
    }
}
