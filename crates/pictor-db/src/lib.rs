//! # pictor-db
//!
//! PostgreSQL persistence for the pictor recommender.
//!
//! This crate provides:
//! - Connection pool management
//! - Recommendation history (append-only, with one-time selection marks)
//! - Lazily created per-user filter policies
//! - Filter metrics
//! - Image catalog lookups by storage path
//! - In-memory implementations of all of the above
//!
//! ## Example
//!
//! ```rust,ignore
//! use pictor_db::{Database, PoolConfig};
//!
//! let db = Database::connect("postgres://localhost/pictor", PoolConfig::from_env()).await?;
//! let policy = db.policies.get_or_create(42, &Default::default()).await?;
//! ```

pub mod catalog;
pub mod filter_metrics;
pub mod filter_policy;
pub mod history;
pub mod memory;
pub mod pool;
pub mod test_fixtures;

pub use catalog::PgImageCatalog;
pub use filter_metrics::PgFilterMetricsRepository;
pub use filter_policy::PgFilterPolicyRepository;
pub use history::PgHistoryRepository;
pub use memory::{
    InMemoryFilterMetricsRepository, InMemoryFilterPolicyRepository, InMemoryHistoryRepository,
    InMemoryImageCatalog, StaticImageCatalog,
};
pub use pool::{create_pool, PoolConfig};

// Re-export core traits so callers need only this crate for storage.
pub use pictor_core::{
    FilterMetricsRepository, FilterPolicyRepository, HistoryRepository, ImageResolver,
};

use pictor_core::Result;

/// All PostgreSQL repositories over one pool.
#[derive(Clone)]
pub struct Database {
    pool: sqlx::Pool<sqlx::Postgres>,
    pub history: PgHistoryRepository,
    pub policies: PgFilterPolicyRepository,
    pub metrics: PgFilterMetricsRepository,
    pub catalog: PgImageCatalog,
}

impl Database {
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            history: PgHistoryRepository::new(pool.clone()),
            policies: PgFilterPolicyRepository::new(pool.clone()),
            metrics: PgFilterMetricsRepository::new(pool.clone()),
            catalog: PgImageCatalog::new(pool.clone()),
            pool,
        }
    }

    pub async fn connect(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| pictor_core::Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
