//! Image catalog lookups (storage path → image id).

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};

use pictor_core::{Error, ImageResolver, Result};

/// PostgreSQL implementation of ImageResolver.
#[derive(Clone)]
pub struct PgImageCatalog {
    pool: Pool<Postgres>,
}

impl PgImageCatalog {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Register a storage path, returning its id. Idempotent.
    pub async fn register(&self, storage_path: &str) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO image_catalog (storage_path) VALUES ($1)
             ON CONFLICT (storage_path) DO UPDATE SET deleted_at = NULL
             RETURNING id",
        )
        .bind(storage_path)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(id)
    }
}

#[async_trait]
impl ImageResolver for PgImageCatalog {
    async fn resolve_paths(&self, paths: &[String]) -> Result<HashMap<String, i64>> {
        if paths.is_empty() {
            return Ok(HashMap::new());
        }

        let rows = sqlx::query(
            "SELECT id, storage_path FROM image_catalog
             WHERE storage_path = ANY($1) AND deleted_at IS NULL",
        )
        .bind(paths)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("storage_path"), row.get("id")))
            .collect())
    }
}
