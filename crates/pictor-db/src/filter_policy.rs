//! Per-user filter policy repository.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::info;

use pictor_core::{Error, FilterPolicy, FilterPolicyRepository, Result};

/// PostgreSQL implementation of FilterPolicyRepository.
#[derive(Clone)]
pub struct PgFilterPolicyRepository {
    pool: Pool<Postgres>,
}

impl PgFilterPolicyRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn fetch(&self, user_id: i64) -> Result<Option<FilterPolicy>> {
        let row = sqlx::query(
            "SELECT max_filter_ratio, session_enabled, enabled, window_days
             FROM user_image_filter_config WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(|row| FilterPolicy {
            max_filter_ratio: row.get("max_filter_ratio"),
            session_enabled: row.get("session_enabled"),
            enabled: row.get("enabled"),
            window_days: row.get("window_days"),
        }))
    }
}

#[async_trait]
impl FilterPolicyRepository for PgFilterPolicyRepository {
    async fn get_or_create(&self, user_id: i64, defaults: &FilterPolicy) -> Result<FilterPolicy> {
        if let Some(policy) = self.fetch(user_id).await? {
            return Ok(policy);
        }

        // Concurrent first requests race here; the loser re-reads the winner's row.
        let inserted = sqlx::query(
            "INSERT INTO user_image_filter_config
             (user_id, max_filter_ratio, session_enabled, enabled, window_days)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(defaults.max_filter_ratio)
        .bind(defaults.session_enabled)
        .bind(defaults.enabled)
        .bind(defaults.window_days)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?
        .rows_affected();

        if inserted > 0 {
            info!(
                subsystem = "db",
                component = "filter_policy",
                user_id,
                "Created default filter policy"
            );
            return Ok(defaults.clone());
        }

        self.fetch(user_id)
            .await?
            .ok_or_else(|| Error::Internal(format!("filter policy for user {} vanished", user_id)))
    }

    async fn update(&self, user_id: i64, policy: &FilterPolicy) -> Result<()> {
        if !(0.0..=1.0).contains(&policy.max_filter_ratio) {
            return Err(Error::InvalidInput(format!(
                "max_filter_ratio must be within [0, 1], got {}",
                policy.max_filter_ratio
            )));
        }

        sqlx::query(
            "INSERT INTO user_image_filter_config
             (user_id, max_filter_ratio, session_enabled, enabled, window_days)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_id) DO UPDATE SET
                max_filter_ratio = EXCLUDED.max_filter_ratio,
                session_enabled = EXCLUDED.session_enabled,
                enabled = EXCLUDED.enabled,
                window_days = EXCLUDED.window_days,
                updated_at = NOW()",
        )
        .bind(user_id)
        .bind(policy.max_filter_ratio)
        .bind(policy.session_enabled)
        .bind(policy.enabled)
        .bind(policy.window_days)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(())
    }
}
