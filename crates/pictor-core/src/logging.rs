//! Structured logging schema and field name constants for pictor.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query by the same names across subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Failure surfaced to the caller |
//! | WARN  | Partial failure absorbed, fallback applied, side effect dropped |
//! | INFO  | Lifecycle events, request completions |
//! | DEBUG | Stage decisions, intermediate counts |
//! | TRACE | Per-item iteration (hits, generated images) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "service", "search", "db", "inference", "cache"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "orchestrator", "fuser", "filter", "degradation", "feedback"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "recommend", "search", "fill_shortfall", "submit_feedback"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Query UUID issued with a recommendation.
pub const QUERY_ID: &str = "query_id";

/// User the request is made for.
pub const USER_ID: &str = "user_id";

/// Session identifier for session-scoped filtering.
pub const SESSION_ID: &str = "session_id";

/// Image identifier.
pub const IMAGE_ID: &str = "image_id";

/// Theme tag.
pub const THEME: &str = "theme";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a stage.
pub const RESULT_COUNT: &str = "result_count";

/// Number of results the caller asked for.
pub const REQUESTED_COUNT: &str = "requested_count";

// ─── Pipeline-specific fields ──────────────────────────────────────────────

/// Hits returned by the semantic search path.
pub const SEMANTIC_HITS: &str = "semantic_hits";

/// Hits returned by the theme search path.
pub const THEME_HITS: &str = "theme_hits";

/// Number of generated images that completed.
pub const GENERATED_COUNT: &str = "generated_count";

/// Fraction of candidates removed by filtering.
pub const FILTER_RATIO: &str = "filter_ratio";

/// Degradation level used (0 = none).
pub const DEGRADATION_LEVEL: &str = "degradation_level";
