//! Document repository and lifecycle state machine.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use vellum_core::{
    AnalysisPayload, Document, DocumentStatus, DocumentStore, Error, LineOffset, NewDocument,
    Result, VectorStatus,
};

/// SQLite implementation of [`DocumentStore`].
#[derive(Clone)]
pub struct SqliteDocumentRepository {
    pool: SqlitePool,
}

impl SqliteDocumentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid stored timestamp {raw:?}: {e}")))
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<Document> {
    let id_raw: String = row.get("id");
    let id = Uuid::parse_str(&id_raw)
        .map_err(|e| Error::Internal(format!("Invalid stored document id {id_raw:?}: {e}")))?;

    let status_raw: String = row.get("status");
    let status = DocumentStatus::from_str(&status_raw).map_err(Error::Internal)?;
    let vector_status_raw: String = row.get("vector_status");
    let vector_status = VectorStatus::from_str(&vector_status_raw).map_err(Error::Internal)?;

    let tags_raw: String = row.get("tags");
    let metadata_raw: String = row.get("metadata");
    let line_offsets_raw: Option<String> = row.get("line_offsets");
    let analysis_raw: Option<String> = row.get("analysis");

    let created_at_raw: String = row.get("created_at");
    let updated_at_raw: String = row.get("updated_at");

    Ok(Document {
        id,
        owner_id: row.get("owner_id"),
        filename: row.get("filename"),
        content_type: row.get("content_type"),
        file_size: row.get("file_size"),
        tags: serde_json::from_str(&tags_raw)?,
        metadata: serde_json::from_str(&metadata_raw)?,
        extracted_text: row.get("extracted_text"),
        line_offsets: line_offsets_raw
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?,
        analysis: analysis_raw.as_deref().map(serde_json::from_str).transpose()?,
        status,
        vector_status,
        error_detail: row.get("error_detail"),
        created_at: parse_timestamp(&created_at_raw)?,
        updated_at: parse_timestamp(&updated_at_raw)?,
    })
}

#[async_trait]
impl DocumentStore for SqliteDocumentRepository {
    async fn create(&self, doc: NewDocument) -> Result<Document> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO document
                (id, owner_id, filename, content_type, file_size, tags, metadata,
                 status, vector_status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id.to_string())
        .bind(&doc.owner_id)
        .bind(&doc.filename)
        .bind(&doc.content_type)
        .bind(doc.file_size)
        .bind(serde_json::to_string(&doc.tags)?)
        .bind(serde_json::to_string(&doc.metadata)?)
        .bind(DocumentStatus::Uploaded.to_string())
        .bind(VectorStatus::NotVectorized.to_string())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        info!(document_id = %id, owner_id = %doc.owner_id, "Created document record");
        self.get(id).await
    }

    async fn get(&self, id: Uuid) -> Result<Document> {
        let row = sqlx::query("SELECT * FROM document WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?
            .ok_or(Error::DocumentNotFound(id))?;

        row_to_document(&row)
    }

    async fn advance_status(
        &self,
        id: Uuid,
        status: DocumentStatus,
        error_detail: Option<&str>,
    ) -> Result<Document> {
        let current = self.get(id).await?;

        // Duplicate concurrent analysis triggers are a documented skip, not an
        // error. Callers check current status before transitioning.
        if status == DocumentStatus::Analyzing && current.status == DocumentStatus::Analyzing {
            debug!(document_id = %id, "Already analyzing, skipping duplicate transition");
            return Ok(current);
        }

        // Error-terminal transitions record a detail; everything else clears
        // the previous one.
        let detail: Option<String> = if status.is_error() {
            Some(
                error_detail
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("entered {} without detail", status)),
            )
        } else {
            None
        };

        sqlx::query("UPDATE document SET status = ?, error_detail = ?, updated_at = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(&detail)
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        debug!(document_id = %id, from = %current.status, to = %status, "Status transition");
        self.get(id).await
    }

    async fn advance_vector_status(
        &self,
        id: Uuid,
        vector_status: VectorStatus,
        error_detail: Option<&str>,
    ) -> Result<Document> {
        // Not-found check up front so the caller sees DocumentNotFound rather
        // than a silent zero-row update.
        self.get(id).await?;

        let detail: Option<String> = if vector_status == VectorStatus::Failed {
            Some(
                error_detail
                    .map(str::to_string)
                    .unwrap_or_else(|| "vectorization failed without detail".to_string()),
            )
        } else {
            None
        };

        sqlx::query(
            "UPDATE document SET vector_status = ?, error_detail = ?, updated_at = ? WHERE id = ?",
        )
        .bind(vector_status.to_string())
        .bind(&detail)
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(document_id = %id, to = %vector_status, "Vector status transition");
        self.get(id).await
    }

    async fn update_on_extraction_success(
        &self,
        id: Uuid,
        text: &str,
        line_offsets: &[LineOffset],
    ) -> Result<Document> {
        self.get(id).await?;

        sqlx::query(
            r#"
            UPDATE document
            SET extracted_text = ?, line_offsets = ?, status = ?,
                error_detail = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(text)
        .bind(serde_json::to_string(line_offsets)?)
        .bind(DocumentStatus::TextExtracted.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        self.get(id).await
    }

    async fn set_analysis(&self, id: Uuid, analysis: &AnalysisPayload) -> Result<Document> {
        self.get(id).await?;

        sqlx::query("UPDATE document SET analysis = ?, updated_at = ? WHERE id = ?")
            .bind(serde_json::to_string(analysis)?)
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        self.get(id).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM document WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query("SELECT * FROM document WHERE owner_id = ? ORDER BY created_at DESC")
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        rows.iter().map(row_to_document).collect()
    }
}
