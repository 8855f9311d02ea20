//! Domain models shared across the recommendation pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults;
use crate::theme::{Complexity, ContentType, ImageProvider, Theme};
use crate::{Error, Result};

// =============================================================================
// REQUEST / RESPONSE
// =============================================================================

/// Caller request for image recommendations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationRequest {
    /// Free-text prompt.
    pub prompt: String,
    /// Requested result count; zero means the default.
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub theme: Theme,
    /// Never fall back to generation when search is short.
    #[serde(default)]
    pub search_only: bool,
    /// User the recommendation is for. Anonymous requests skip filtering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    /// Session identifier for session-scoped filtering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl RecommendationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    pub fn search_only(mut self, search_only: bool) -> Self {
        self.search_only = search_only;
        self
    }

    pub fn for_user(mut self, user_id: i64, session_id: Option<String>) -> Self {
        self.user_id = Some(user_id);
        self.session_id = session_id;
        self
    }

    /// Apply the default count and reject malformed requests.
    ///
    /// After this returns `Ok`, `count` is in `[1, TOP_K_MAX]` and the
    /// prompt is trimmed and non-empty.
    pub fn validated(mut self) -> Result<Self> {
        self.prompt = self.prompt.trim().to_string();
        if self.prompt.is_empty() {
            return Err(Error::InvalidInput("prompt must not be empty".to_string()));
        }
        if self.count == 0 {
            self.count = defaults::TOP_K;
        }
        if self.count > defaults::TOP_K_MAX {
            return Err(Error::InvalidInput(format!(
                "count must be between 1 and {}, got {}",
                defaults::TOP_K_MAX,
                self.count
            )));
        }
        if let Some(session) = &self.session_id {
            if session.trim().is_empty() {
                self.session_id = None;
            }
        }
        Ok(self)
    }
}

/// Ranked recommendation returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub query_id: Uuid,
    /// The optimized prompt the results were produced for.
    pub query: String,
    pub results_count: usize,
    pub results: Vec<CandidateImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_metrics: Option<FilterMetrics>,
}

// =============================================================================
// PROMPT ANALYSIS
// =============================================================================

/// Result of classifying a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptClassification {
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub emotion: String,
    pub complexity: Complexity,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Default for PromptClassification {
    fn default() -> Self {
        Self {
            content_type: ContentType::Default,
            emotion: "neutral".to_string(),
            complexity: Complexity::Simple,
            keywords: Vec::new(),
        }
    }
}

/// Per-request prompt analysis. Built once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptAnalysisContext {
    original_prompt: String,
    theme: Theme,
    classification: PromptClassification,
    optimized_prompt: String,
    semantic_prompt: String,
    theme_prompt: String,
}

impl PromptAnalysisContext {
    /// Context with every variant equal to the original prompt.
    pub fn literal(prompt: impl Into<String>, theme: Theme) -> Self {
        let prompt = prompt.into();
        Self {
            original_prompt: prompt.clone(),
            theme,
            classification: PromptClassification::default(),
            optimized_prompt: prompt.clone(),
            semantic_prompt: prompt.clone(),
            theme_prompt: prompt,
        }
    }

    pub fn new(
        original_prompt: String,
        theme: Theme,
        classification: PromptClassification,
        optimized_prompt: String,
        semantic_prompt: String,
    ) -> Self {
        Self {
            original_prompt,
            theme,
            classification,
            theme_prompt: optimized_prompt.clone(),
            optimized_prompt,
            semantic_prompt,
        }
    }

    pub fn original_prompt(&self) -> &str {
        &self.original_prompt
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn classification(&self) -> &PromptClassification {
        &self.classification
    }

    pub fn optimized_prompt(&self) -> &str {
        &self.optimized_prompt
    }

    pub fn semantic_prompt(&self) -> &str {
        &self.semantic_prompt
    }

    pub fn theme_prompt(&self) -> &str {
        &self.theme_prompt
    }
}

// =============================================================================
// CANDIDATES
// =============================================================================

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Search,
    Generated,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Search => "search",
            Provenance::Generated => "generated",
        }
    }
}

/// An image proposed to the caller.
///
/// `rank` is zero until the final ranking pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateImage {
    pub id: i64,
    #[serde(rename = "image_path")]
    pub path: String,
    pub similarity: f32,
    #[serde(rename = "source")]
    pub provenance: Provenance,
    pub rank: u32,
}

impl CandidateImage {
    pub fn from_search(id: i64, path: impl Into<String>, similarity: f32) -> Self {
        Self {
            id,
            path: path.into(),
            similarity: similarity.clamp(0.0, 1.0),
            provenance: Provenance::Search,
            rank: 0,
        }
    }

    pub fn generated(id: i64, path: impl Into<String>, similarity: f32) -> Self {
        Self {
            id,
            path: path.into(),
            similarity: similarity.clamp(0.0, 1.0),
            provenance: Provenance::Generated,
            rank: 0,
        }
    }
}

/// Assign contiguous ranks `1..=len` in list order.
pub fn assign_ranks(candidates: &mut [CandidateImage]) {
    for (i, candidate) in candidates.iter_mut().enumerate() {
        candidate.rank = i as u32 + 1;
    }
}

/// Raw hit from the semantic search backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub image_path: String,
    pub similarity: f32,
    #[serde(default)]
    pub rank: u32,
}

/// Request for one generated image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub theme: Theme,
    pub provider: ImageProvider,
}

/// Image produced by the generation backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub image_url: String,
    pub resource_id: i64,
}

// =============================================================================
// QUERY RECORDS & FEEDBACK
// =============================================================================

/// Feedback state of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FeedbackState {
    #[default]
    NotSubmitted,
    Submitted { chosen_id: i64 },
}

/// What was shown for a query, kept for later feedback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub query_id: Uuid,
    pub prompt: String,
    /// Shown image ids in rank order.
    pub shown: Vec<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl QueryRecord {
    pub fn new(query_id: Uuid, prompt: impl Into<String>, shown: Vec<i64>) -> Self {
        Self {
            query_id,
            prompt: prompt.into(),
            shown,
            user_id: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_user(mut self, user_id: Option<i64>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn contains(&self, image_id: i64) -> bool {
        self.shown.contains(&image_id)
    }
}

/// Feedback forwarded to the learning backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSubmission {
    pub query_id: Uuid,
    pub prompt: String,
    pub shown: Vec<i64>,
    pub chosen_id: i64,
}

// =============================================================================
// HISTORY
// =============================================================================

/// One shown recommendation. Append-only apart from the chosen mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationHistoryEntry {
    pub user_id: i64,
    pub image_id: i64,
    pub query_id: Uuid,
    pub session_id: Option<String>,
    pub query: String,
    pub source: Provenance,
    pub similarity: f32,
    pub rank: u32,
    pub chosen: bool,
    pub chosen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RecommendationHistoryEntry {
    /// Entries for every candidate shown in a response.
    pub fn from_results(
        user_id: i64,
        session_id: Option<&str>,
        query_id: Uuid,
        query: &str,
        results: &[CandidateImage],
    ) -> Vec<Self> {
        let now = Utc::now();
        results
            .iter()
            .map(|c| Self {
                user_id,
                image_id: c.id,
                query_id,
                session_id: session_id.map(str::to_string),
                query: query.to_string(),
                source: c.provenance,
                similarity: c.similarity,
                rank: c.rank,
                chosen: false,
                chosen_at: None,
                created_at: now,
            })
            .collect()
    }
}

/// Image previously shown to a user, with when it was shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenImage {
    pub image_id: i64,
    pub shown_at: DateTime<Utc>,
}

/// Per-user recommendation statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterStats {
    pub user_id: i64,
    pub window_days: i64,
    pub total_shown: i64,
    pub unique_images: i64,
    pub total_selected: i64,
    pub selection_rate: f64,
}

// =============================================================================
// FILTERING
// =============================================================================

/// Per-user filter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterPolicy {
    /// Fraction of candidates that may be removed before degradation.
    pub max_filter_ratio: f32,
    pub session_enabled: bool,
    pub enabled: bool,
    /// History window for non-session filtering.
    pub window_days: i64,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            max_filter_ratio: defaults::MAX_FILTER_RATIO,
            session_enabled: true,
            enabled: true,
            window_days: defaults::FILTER_WINDOW_DAYS,
        }
    }
}

/// Strategy the degradation pipeline ended on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationStrategy {
    #[default]
    None,
    TimeWindowReduction,
    SimilarityThresholdMixing,
}

impl DegradationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DegradationStrategy::None => "none",
            DegradationStrategy::TimeWindowReduction => "time_window_reduction",
            DegradationStrategy::SimilarityThresholdMixing => "similarity_threshold_mixing",
        }
    }
}

/// Filtering outcome for one request.
///
/// `filtered_count` is `total_candidates - final_result_count` and
/// `filter_ratio` is always `filtered_count / total_candidates` (0 when
/// there were no candidates).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FilterMetrics {
    pub total_candidates: usize,
    pub filtered_count: usize,
    pub filter_ratio: f32,
    pub degradation_level: u8,
    pub degradation_strategy: DegradationStrategy,
    pub final_result_count: usize,
}

impl FilterMetrics {
    pub fn new(
        total_candidates: usize,
        final_result_count: usize,
        degradation_level: u8,
        degradation_strategy: DegradationStrategy,
    ) -> Self {
        let filtered_count = total_candidates.saturating_sub(final_result_count);
        Self {
            total_candidates,
            filtered_count,
            filter_ratio: ratio(filtered_count, total_candidates),
            degradation_level,
            degradation_strategy,
            final_result_count,
        }
    }
}

/// `removed / total`, or 0 when `total` is 0.
pub fn ratio(removed: usize, total: usize) -> f32 {
    if total == 0 {
        0.0
    } else {
        removed as f32 / total as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_count() {
        let req = RecommendationRequest::new("red car").validated().unwrap();
        assert_eq!(req.count, defaults::TOP_K);
    }

    #[test]
    fn test_request_rejects_out_of_range() {
        let err = RecommendationRequest::new("red car")
            .with_count(51)
            .validated()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(RecommendationRequest::new("x")
            .with_count(50)
            .validated()
            .is_ok());
    }

    #[test]
    fn test_request_rejects_empty_prompt() {
        let err = RecommendationRequest::new("   ").validated().unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_request_blank_session_dropped() {
        let req = RecommendationRequest::new("x")
            .for_user(1, Some(" ".to_string()))
            .validated()
            .unwrap();
        assert_eq!(req.session_id, None);
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let req: RecommendationRequest =
            serde_json::from_str(r#"{"prompt":"cat","theme":"cartoon"}"#).unwrap();
        assert_eq!(req.theme, Theme::Cartoon);
        assert_eq!(req.count, 0);
        assert!(!req.search_only);
    }

    #[test]
    fn test_literal_context_uses_prompt_everywhere() {
        let ctx = PromptAnalysisContext::literal("red car", Theme::None);
        assert_eq!(ctx.optimized_prompt(), "red car");
        assert_eq!(ctx.semantic_prompt(), "red car");
        assert_eq!(ctx.theme_prompt(), "red car");
    }

    #[test]
    fn test_theme_prompt_matches_optimized() {
        let ctx = PromptAnalysisContext::new(
            "cat".into(),
            Theme::Cartoon,
            PromptClassification::default(),
            "cat, optimized".into(),
            "cat, light".into(),
        );
        assert_eq!(ctx.theme_prompt(), ctx.optimized_prompt());
        assert_eq!(ctx.semantic_prompt(), "cat, light");
    }

    #[test]
    fn test_candidate_serializes_wire_names() {
        let c = CandidateImage::from_search(7, "a/b.svg", 0.5);
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["image_path"], "a/b.svg");
        assert_eq!(json["source"], "search");
        assert_eq!(json["rank"], 0);
    }

    #[test]
    fn test_candidate_similarity_clamped() {
        assert_eq!(CandidateImage::from_search(1, "p", 1.4).similarity, 1.0);
        assert_eq!(CandidateImage::generated(1, "p", -0.2).similarity, 0.0);
    }

    #[test]
    fn test_assign_ranks_contiguous() {
        let mut list = vec![
            CandidateImage::from_search(1, "a", 0.9),
            CandidateImage::from_search(2, "b", 0.8),
            CandidateImage::generated(3, "c", 0.8),
        ];
        assign_ranks(&mut list);
        let ranks: Vec<u32> = list.iter().map(|c| c.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[test]
    fn test_feedback_state_serde() {
        let json = serde_json::to_string(&FeedbackState::Submitted { chosen_id: 9 }).unwrap();
        assert_eq!(json, r#"{"state":"submitted","chosen_id":9}"#);
        let back: FeedbackState = serde_json::from_str(r#"{"state":"not_submitted"}"#).unwrap();
        assert_eq!(back, FeedbackState::NotSubmitted);
    }

    #[test]
    fn test_filter_metrics_ratio_invariant() {
        let m = FilterMetrics::new(10, 4, 5, DegradationStrategy::SimilarityThresholdMixing);
        assert_eq!(m.filtered_count, 6);
        assert!((m.filter_ratio - 0.6).abs() < f32::EPSILON);

        let empty = FilterMetrics::new(0, 0, 0, DegradationStrategy::None);
        assert_eq!(empty.filter_ratio, 0.0);
    }

    #[test]
    fn test_history_entries_from_results() {
        let mut results = vec![
            CandidateImage::from_search(1, "a", 0.9),
            CandidateImage::generated(2, "b", 0.8),
        ];
        assign_ranks(&mut results);
        let qid = Uuid::now_v7();
        let entries = RecommendationHistoryEntry::from_results(5, Some("s1"), qid, "cat", &results);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].source, Provenance::Generated);
        assert_eq!(entries[1].rank, 2);
        assert_eq!(entries[0].session_id.as_deref(), Some("s1"));
        assert!(entries.iter().all(|e| !e.chosen));
    }
}
