//! Filter metrics repository.

use async_trait::async_trait;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use pictor_core::{Error, FilterMetrics, FilterMetricsRepository, Result};

/// PostgreSQL implementation of FilterMetricsRepository.
#[derive(Clone)]
pub struct PgFilterMetricsRepository {
    pool: Pool<Postgres>,
}

impl PgFilterMetricsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FilterMetricsRepository for PgFilterMetricsRepository {
    async fn record(&self, user_id: i64, query_id: Uuid, metrics: &FilterMetrics) -> Result<()> {
        sqlx::query(
            "INSERT INTO image_filter_metrics
             (user_id, query_id, total_candidates, filtered_count, filter_ratio,
              degradation_level, degradation_strategy, final_result_count)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(user_id)
        .bind(query_id)
        .bind(metrics.total_candidates as i32)
        .bind(metrics.filtered_count as i32)
        .bind(metrics.filter_ratio)
        .bind(metrics.degradation_level as i16)
        .bind(metrics.degradation_strategy.as_str())
        .bind(metrics.final_result_count as i32)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }
}
