//! Supporting services used by the pipeline.

pub mod query_cache;
pub mod side_effects;

pub use query_cache::{MemoryQueryCache, QueryCacheConfig, RedisQueryCache};
pub use side_effects::{SideEffect, SideEffectReceiver, SideEffectSink};
