//! Service configuration, aggregated from the per-component configs.

use pictor_core::defaults::SIDE_EFFECT_CAPACITY;
use pictor_db::PoolConfig;
use pictor_inference::{AlgorithmClientConfig, ClassifierConfig, GenerationClientConfig};
use pictor_search::FilterConfig;

use crate::services::query_cache::QueryCacheConfig;

/// Everything the recommendation service needs to start.
///
/// Without `DATABASE_URL` history, policies and metrics are kept in memory
/// for the life of the process.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub algorithm: AlgorithmClientConfig,
    pub generation: GenerationClientConfig,
    pub classifier: ClassifierConfig,
    pub filter: FilterConfig,
    pub query_cache: QueryCacheConfig,
    pub database_url: Option<String>,
    pub pool: PoolConfig,
    /// Buffer size of the best-effort side channel.
    pub side_effect_capacity: usize,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self {
            algorithm: AlgorithmClientConfig::from_env(),
            generation: GenerationClientConfig::from_env(),
            classifier: ClassifierConfig::from_env(),
            filter: FilterConfig::from_env(),
            query_cache: QueryCacheConfig::from_env(),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|u| !u.is_empty()),
            pool: PoolConfig::from_env(),
            side_effect_capacity: std::env::var("SIDE_EFFECT_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(SIDE_EFFECT_CAPACITY),
        }
    }
}
