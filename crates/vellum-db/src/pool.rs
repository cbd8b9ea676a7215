//! Connection pool creation and schema bootstrap.

use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::debug;

use vellum_core::Result;

/// Schema statements executed in order at connect time. All idempotent.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS document (
        id             TEXT PRIMARY KEY,
        owner_id       TEXT NOT NULL,
        filename       TEXT NOT NULL,
        content_type   TEXT NOT NULL,
        file_size      INTEGER NOT NULL,
        tags           TEXT NOT NULL DEFAULT '[]',
        metadata       TEXT NOT NULL DEFAULT '{}',
        extracted_text TEXT,
        line_offsets   TEXT,
        analysis       TEXT,
        status         TEXT NOT NULL,
        vector_status  TEXT NOT NULL,
        error_detail   TEXT,
        created_at     TEXT NOT NULL,
        updated_at     TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_document_owner ON document(owner_id, created_at)",
    r#"
    CREATE TABLE IF NOT EXISTS vector_record (
        id          TEXT PRIMARY KEY,
        document_id TEXT NOT NULL,
        owner_id    TEXT NOT NULL,
        kind        TEXT NOT NULL,
        vector      BLOB NOT NULL,
        text        TEXT NOT NULL,
        start_line  INTEGER,
        end_line    INTEGER,
        chunk_type  TEXT,
        metadata    TEXT NOT NULL DEFAULT '{}',
        model       TEXT NOT NULL,
        created_at  TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_vector_owner_kind ON vector_record(owner_id, kind)",
    "CREATE INDEX IF NOT EXISTS idx_vector_document ON vector_record(document_id)",
    r#"
    CREATE TABLE IF NOT EXISTS vector_collection (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
];

/// Open (and create if missing) a file-backed pool in WAL mode.
pub async fn create_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
        .map_err(vellum_core::Error::Database)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(vellum_core::Error::Database)?;

    run_schema(&pool).await?;
    Ok(pool)
}

/// In-memory pool for tests. Pinned to a single connection: every SQLite
/// `:memory:` connection is its own database.
pub async fn create_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .map_err(vellum_core::Error::Database)?;

    run_schema(&pool).await?;
    Ok(pool)
}

async fn run_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(vellum_core::Error::Database)?;
    }
    debug!(statements = SCHEMA.len(), "Schema bootstrap complete");
    Ok(())
}
