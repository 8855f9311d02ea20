//! Centralized default constants for the pictor recommender.
//!
//! **This module is the single source of truth** for shared default values.
//! Components read these instead of defining their own magic numbers; the
//! config structs in downstream crates use them as their `Default` values.

// =============================================================================
// REQUEST
// =============================================================================

/// Result count applied when a request asks for zero.
pub const TOP_K: usize = 4;

/// Largest result count a single request may ask for.
pub const TOP_K_MAX: usize = 50;

// =============================================================================
// SEARCH
// =============================================================================

/// Share of the requested count sent to the semantic path, in tenths.
/// The theme path receives the remainder.
pub const SEMANTIC_SHARE_TENTHS: usize = 7;

/// Minimum similarity the algorithm service should return.
pub const SEARCH_THRESHOLD: f32 = 0.2;

// =============================================================================
// FUSION
// =============================================================================

/// Weight of the backend similarity in the fused score.
pub const FUSION_SIMILARITY_WEIGHT: f32 = 0.7;

/// Weight of the theme relevance in the fused score.
pub const FUSION_THEME_WEIGHT: f32 = 0.3;

/// Theme relevance used when no theme is selected.
pub const THEME_RELEVANCE_NEUTRAL: f32 = 0.8;

/// Theme relevance for a path that matches the theme's keywords.
pub const THEME_RELEVANCE_MATCH: f32 = 0.9;

// =============================================================================
// GENERATION
// =============================================================================

/// Synthetic similarity given to the first generated image.
pub const GENERATED_BASE_SCORE: f32 = 0.8;

/// Amount the synthetic similarity drops per generated index.
pub const GENERATED_SCORE_STEP: f32 = 0.05;

/// Floor for synthetic similarity so long shortfalls stay in [0,1].
pub const GENERATED_MIN_SCORE: f32 = 0.05;

// =============================================================================
// FILTERING
// =============================================================================

/// Days of history consulted by the default (non-session) filter.
pub const FILTER_WINDOW_DAYS: i64 = 30;

/// Fraction of candidates the filter may remove before degradation.
pub const MAX_FILTER_RATIO: f32 = 0.8;

/// Multiplier applied to the requested count when filtering needs headroom.
pub const SEARCH_EXPANSION_RATIO: f32 = 2.0;

/// History windows tried by time-window degradation, widest first.
pub const DEGRADATION_WINDOWS_DAYS: [i64; 4] = [15, 7, 3, 1];

/// Degradation level reported for similarity-threshold mixing.
pub const SIMILARITY_MIX_LEVEL: u8 = 5;

/// Previously-seen candidates above this similarity may be mixed back in.
pub const HIGH_SIMILARITY_THRESHOLD: f32 = 0.7;

// =============================================================================
// QUERY CACHE
// =============================================================================

/// Retention for query records and feedback marks (24 hours).
pub const QUERY_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

/// Key prefix for query records in Redis.
pub const QUERY_CACHE_PREFIX: &str = "img_rec:";

// =============================================================================
// SIDE EFFECTS
// =============================================================================

/// Buffered side effects (metrics, history) before new ones are dropped.
pub const SIDE_EFFECT_CAPACITY: usize = 256;

// =============================================================================
// BACKENDS
// =============================================================================

/// Default algorithm service endpoint (semantic search + feedback).
pub const ALGORITHM_ENDPOINT: &str = "http://localhost:5000";

/// Default image generation endpoint.
pub const GENERATION_ENDPOINT: &str = "http://localhost:5001";

/// Default OpenAI-compatible endpoint used for prompt classification.
pub const CLASSIFIER_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model for prompt classification.
pub const CLASSIFIER_MODEL: &str = "gpt-4o-mini";

/// HTTP timeout for the algorithm service.
pub const ALGORITHM_TIMEOUT_SECS: u64 = 30;

/// HTTP timeout for a single generation call.
pub const GENERATION_TIMEOUT_SECS: u64 = 60;

/// Upper bound on the classification call before defaults are used.
pub const CLASSIFIER_TIMEOUT_SECS: u64 = 10;

/// Keywords kept by local keyword extraction.
pub const MAX_KEYWORDS: usize = 5;
