//! Capability traits for pictor collaborators.
//!
//! The pipeline only talks to the outside world through these traits, so
//! every stage can run against in-memory or mock implementations.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// SEARCH & RESOLUTION
// =============================================================================

/// External semantic image search.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Return up to `top_k` hits for `text`. Any error fails this call only.
    async fn search(&self, text: &str, top_k: usize) -> Result<Vec<SearchHit>>;
}

/// Maps storage paths returned by search to internal image ids.
#[async_trait]
pub trait ImageResolver: Send + Sync {
    /// Resolve a batch of paths. Paths with no record are absent from the map.
    async fn resolve_paths(&self, paths: &[String]) -> Result<HashMap<String, i64>>;
}

// =============================================================================
// INFERENCE
// =============================================================================

/// Prompt classifier (content type, emotion, complexity).
#[async_trait]
pub trait PromptClassifier: Send + Sync {
    async fn classify(&self, prompt: &str) -> Result<PromptClassification>;
}

/// Image generation backend.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage>;
}

/// Learning backend that receives user feedback.
#[async_trait]
pub trait FeedbackBackend: Send + Sync {
    async fn submit_feedback(&self, feedback: &FeedbackSubmission) -> Result<()>;
}

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Recommendation history store.
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Append shown recommendations. Returns rows written.
    async fn record_batch(&self, entries: &[RecommendationHistoryEntry]) -> Result<u64>;

    /// Images shown to `user_id` after `since`, with their timestamps.
    async fn seen_since(&self, user_id: i64, since: DateTime<Utc>) -> Result<Vec<SeenImage>>;

    /// Image ids shown to `user_id` within `session_id`.
    async fn seen_in_session(&self, user_id: i64, session_id: &str) -> Result<HashSet<i64>>;

    /// Mark the history row for (query, image) as chosen. Returns false if
    /// there was no unchosen row to mark.
    async fn mark_selected(&self, query_id: Uuid, image_id: i64) -> Result<bool>;

    /// Aggregate statistics over the last `window_days` days.
    async fn stats(&self, user_id: i64, window_days: i64) -> Result<FilterStats>;
}

/// Per-user filter policy store.
#[async_trait]
pub trait FilterPolicyRepository: Send + Sync {
    /// Fetch the user's policy, persisting `defaults` first if none exists.
    async fn get_or_create(&self, user_id: i64, defaults: &FilterPolicy) -> Result<FilterPolicy>;

    async fn update(&self, user_id: i64, policy: &FilterPolicy) -> Result<()>;
}

/// Filter metrics store.
#[async_trait]
pub trait FilterMetricsRepository: Send + Sync {
    async fn record(&self, user_id: i64, query_id: Uuid, metrics: &FilterMetrics) -> Result<()>;
}

// =============================================================================
// QUERY CACHE
// =============================================================================

/// Short-lived store of query records and their feedback state.
#[async_trait]
pub trait QueryCache: Send + Sync {
    async fn put(&self, record: &QueryRecord) -> Result<()>;

    async fn get(&self, query_id: Uuid) -> Result<Option<QueryRecord>>;

    /// Atomically mark feedback as submitted. Returns `true` only for the
    /// first caller; every later or concurrent caller gets `false`.
    async fn mark_feedback_submitted(&self, query_id: Uuid, chosen_id: i64) -> Result<bool>;

    async fn feedback_state(&self, query_id: Uuid) -> Result<FeedbackState>;

    async fn remove(&self, query_id: Uuid) -> Result<()>;
}
