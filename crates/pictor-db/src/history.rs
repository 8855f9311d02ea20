//! Recommendation history repository.
//!
//! History rows are append-only; the only update is the one-time
//! `selected` mark set when the user picks an image.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use pictor_core::{
    Error, FilterStats, HistoryRepository, RecommendationHistoryEntry, Result, SeenImage,
};

/// PostgreSQL implementation of HistoryRepository.
#[derive(Clone)]
pub struct PgHistoryRepository {
    pool: Pool<Postgres>,
}

impl PgHistoryRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryRepository for PgHistoryRepository {
    async fn record_batch(&self, entries: &[RecommendationHistoryEntry]) -> Result<u64> {
        if entries.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;
        let mut written = 0;

        for entry in entries {
            let result = sqlx::query(
                "INSERT INTO user_image_recommendation_history
                 (user_id, image_id, query_id, session_id, query, source, similarity, rank, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(entry.user_id)
            .bind(entry.image_id)
            .bind(entry.query_id)
            .bind(entry.session_id.as_deref())
            .bind(&entry.query)
            .bind(entry.source.as_str())
            .bind(entry.similarity)
            .bind(entry.rank as i32)
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
            written += result.rows_affected();
        }

        tx.commit().await.map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "history",
            op = "record_batch",
            rows = written,
            "Recorded recommendation history"
        );
        Ok(written)
    }

    async fn seen_since(&self, user_id: i64, since: DateTime<Utc>) -> Result<Vec<SeenImage>> {
        let rows = sqlx::query(
            "SELECT image_id, MAX(created_at) AS shown_at
             FROM user_image_recommendation_history
             WHERE user_id = $1 AND created_at >= $2
             GROUP BY image_id",
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| SeenImage {
                image_id: row.get("image_id"),
                shown_at: row.get("shown_at"),
            })
            .collect())
    }

    async fn seen_in_session(&self, user_id: i64, session_id: &str) -> Result<HashSet<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT DISTINCT image_id
             FROM user_image_recommendation_history
             WHERE user_id = $1 AND session_id = $2",
        )
        .bind(user_id)
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(ids.into_iter().collect())
    }

    async fn mark_selected(&self, query_id: Uuid, image_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE user_image_recommendation_history
             SET selected = TRUE, selected_at = NOW()
             WHERE query_id = $1 AND image_id = $2 AND selected = FALSE",
        )
        .bind(query_id)
        .bind(image_id)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn stats(&self, user_id: i64, window_days: i64) -> Result<FilterStats> {
        let since = Utc::now() - Duration::days(window_days);
        let row = sqlx::query(
            "SELECT COUNT(*) AS total_shown,
                    COUNT(DISTINCT image_id) AS unique_images,
                    COUNT(*) FILTER (WHERE selected) AS total_selected
             FROM user_image_recommendation_history
             WHERE user_id = $1 AND created_at >= $2",
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        let total_shown: i64 = row.get("total_shown");
        let total_selected: i64 = row.get("total_selected");
        Ok(FilterStats {
            user_id,
            window_days,
            total_shown,
            unique_images: row.get("unique_images"),
            total_selected,
            selection_rate: if total_shown > 0 {
                total_selected as f64 / total_shown as f64
            } else {
                0.0
            },
        })
    }
}
