//! # vellum-db
//!
//! SQLite persistence for the vellum document engine: the document lifecycle
//! repository and the vector record store, plus pool creation and schema
//! bootstrap.

pub mod documents;
pub mod pool;
pub mod vectors;

pub use documents::SqliteDocumentRepository;
pub use pool::{create_memory_pool, create_pool};
pub use vectors::{blob_to_vec, cosine_similarity, vec_to_blob, SqliteVectorRepository};

use std::path::Path;

use sqlx::SqlitePool;

use vellum_core::Result;

/// Handle bundling the pool with its repositories.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    pub documents: SqliteDocumentRepository,
    pub vectors: SqliteVectorRepository,
}

impl Database {
    /// Open a file-backed database, creating it (and its schema) if missing.
    pub async fn connect(db_path: &Path) -> Result<Self> {
        let pool = pool::create_pool(db_path).await?;
        Ok(Self::from_pool(pool))
    }

    /// In-memory database for tests.
    pub async fn connect_memory() -> Result<Self> {
        let pool = pool::create_memory_pool().await?;
        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            documents: SqliteDocumentRepository::new(pool.clone()),
            vectors: SqliteVectorRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
