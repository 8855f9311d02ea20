//! History-aware candidate filtering.
//!
//! Removes images the user has already been shown: within the current
//! session when session filtering applies, otherwise within the policy's
//! recent-history window. When that would leave too few results and remove
//! more than the policy's maximum ratio, the [`DegradationPipeline`] relaxes
//! the filter.
//!
//! ## Configuration
//!
//! | Env var | Default | Meaning |
//! |---------|---------|---------|
//! | `IMAGE_FILTER_ENABLED` | `true` | Global switch |
//! | `IMAGE_FILTER_WINDOW_DAYS` | `30` | Default history window for new policies |
//! | `IMAGE_FILTER_MAX_RATIO` | `0.8` | Default max filter ratio for new policies |
//! | `IMAGE_FILTER_EXPANSION_RATIO` | `2.0` | Candidate headroom requested from search |
//! | `IMAGE_FILTER_DEGRADATION` | `true` | Allow degradation |
//! | `IMAGE_FILTER_METRICS` | `true` | Persist filter metrics |

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use pictor_core::defaults::{
    FILTER_WINDOW_DAYS, MAX_FILTER_RATIO, SEARCH_EXPANSION_RATIO, TOP_K_MAX,
};
use pictor_core::{
    ratio, CandidateImage, DegradationStrategy, Error, FilterMetrics, FilterPolicy,
    FilterPolicyRepository, HistoryRepository, Result,
};

use crate::cancel::cancellable;
use crate::degradation::DegradationPipeline;

/// Global filter settings.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterConfig {
    pub enabled: bool,
    pub window_days: i64,
    pub max_filter_ratio: f32,
    pub search_expansion_ratio: f32,
    pub enable_degradation: bool,
    pub enable_metrics: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_days: FILTER_WINDOW_DAYS,
            max_filter_ratio: MAX_FILTER_RATIO,
            search_expansion_ratio: SEARCH_EXPANSION_RATIO,
            enable_degradation: true,
            enable_metrics: true,
        }
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v != "false" && v != "0")
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

impl FilterConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            enabled: env_flag("IMAGE_FILTER_ENABLED", defaults.enabled),
            window_days: env_parse("IMAGE_FILTER_WINDOW_DAYS").unwrap_or(defaults.window_days),
            max_filter_ratio: env_parse::<f32>("IMAGE_FILTER_MAX_RATIO")
                .map(|r| r.clamp(0.0, 1.0))
                .unwrap_or(defaults.max_filter_ratio),
            search_expansion_ratio: env_parse::<f32>("IMAGE_FILTER_EXPANSION_RATIO")
                .filter(|r| *r >= 1.0)
                .unwrap_or(defaults.search_expansion_ratio),
            enable_degradation: env_flag("IMAGE_FILTER_DEGRADATION", defaults.enable_degradation),
            enable_metrics: env_flag("IMAGE_FILTER_METRICS", defaults.enable_metrics),
        }
    }

    /// Config with filtering switched off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_max_filter_ratio(mut self, ratio: f32) -> Self {
        self.max_filter_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn with_search_expansion_ratio(mut self, ratio: f32) -> Self {
        self.search_expansion_ratio = ratio.max(1.0);
        self
    }

    pub fn with_degradation(mut self, enabled: bool) -> Self {
        self.enable_degradation = enabled;
        self
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.enable_metrics = enabled;
        self
    }

    /// Policy given to users who have none yet.
    pub fn default_policy(&self) -> FilterPolicy {
        FilterPolicy {
            max_filter_ratio: self.max_filter_ratio,
            session_enabled: true,
            enabled: true,
            window_days: self.window_days,
        }
    }

    /// Number of candidates to fetch so filtering has headroom.
    pub fn candidate_count(&self, requested: usize) -> usize {
        if !self.enabled {
            return requested;
        }
        let expanded = (requested as f32 * self.search_expansion_ratio).ceil() as usize;
        let cap = (TOP_K_MAX as f32 * self.search_expansion_ratio).ceil() as usize;
        expanded.clamp(requested, cap.max(requested))
    }
}

/// Which history the first filtering pass consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterScope {
    Disabled,
    Session,
    RecentHistory,
}

/// Filtered candidates with their metrics.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub results: Vec<CandidateImage>,
    pub metrics: FilterMetrics,
    pub scope: FilterScope,
}

/// Removes previously-shown candidates, degrading when too many go.
#[derive(Clone)]
pub struct FilterEngine {
    config: FilterConfig,
    history: Arc<dyn HistoryRepository>,
    policies: Arc<dyn FilterPolicyRepository>,
    degradation: DegradationPipeline,
}

impl FilterEngine {
    pub fn new(
        config: FilterConfig,
        history: Arc<dyn HistoryRepository>,
        policies: Arc<dyn FilterPolicyRepository>,
    ) -> Self {
        let degradation = DegradationPipeline::new(history.clone());
        Self {
            config,
            history,
            policies,
            degradation,
        }
    }

    pub fn with_degradation(mut self, degradation: DegradationPipeline) -> Self {
        self.degradation = degradation;
        self
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Filter `candidates` for `user_id`, keeping at most `requested`.
    ///
    /// Store failures fail open; only cancellation is an error.
    pub async fn filter(
        &self,
        cancel: &CancellationToken,
        user_id: i64,
        session_id: Option<&str>,
        query_id: Uuid,
        candidates: Vec<CandidateImage>,
        requested: usize,
    ) -> Result<FilterOutcome> {
        let start = Instant::now();
        let total = candidates.len();

        if !self.config.enabled {
            return Ok(Self::passthrough(candidates, requested));
        }

        let policy = match cancellable(
            cancel,
            self.policies
                .get_or_create(user_id, &self.config.default_policy()),
        )
        .await
        {
            Ok(policy) => policy,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                warn!(
                    subsystem = "search",
                    component = "filter",
                    user_id,
                    error = %e,
                    "Filter policy lookup failed, using defaults"
                );
                self.config.default_policy()
            }
        };

        if !policy.enabled {
            debug!(
                subsystem = "search",
                component = "filter",
                user_id,
                "Filtering disabled for user"
            );
            return Ok(Self::passthrough(candidates, requested));
        }

        let (scope, seen) = match session_id.filter(|_| policy.session_enabled) {
            Some(session) => (
                FilterScope::Session,
                cancellable(cancel, self.history.seen_in_session(user_id, session)).await,
            ),
            None => {
                let since = Utc::now() - Duration::days(policy.window_days);
                let seen = cancellable(cancel, self.history.seen_since(user_id, since))
                    .await
                    .map(|list| list.into_iter().map(|s| s.image_id).collect::<HashSet<_>>());
                (FilterScope::RecentHistory, seen)
            }
        };

        let seen = match seen {
            Ok(seen) => seen,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                warn!(
                    subsystem = "search",
                    component = "filter",
                    user_id,
                    scope = ?scope,
                    error = %e,
                    "History lookup failed, returning unfiltered candidates"
                );
                HashSet::new()
            }
        };

        let filtered: Vec<CandidateImage> = candidates
            .iter()
            .filter(|c| !seen.contains(&c.id))
            .cloned()
            .collect();

        let mut level = 0;
        let mut strategy = DegradationStrategy::None;
        let mut results = filtered;

        if results.len() < requested {
            let filter_ratio = ratio(total - results.len(), total);
            if filter_ratio > policy.max_filter_ratio && self.config.enable_degradation {
                debug!(
                    subsystem = "search",
                    component = "filter",
                    user_id,
                    filter_ratio,
                    max_filter_ratio = policy.max_filter_ratio,
                    "Filter ratio over limit, degrading"
                );
                let outcome = self
                    .degradation
                    .degrade(
                        cancel,
                        user_id,
                        &candidates,
                        &results,
                        requested,
                        policy.max_filter_ratio,
                    )
                    .await?;
                results = outcome.results;
                level = outcome.level;
                strategy = outcome.strategy;
            }
        }

        results.truncate(requested);
        let metrics = FilterMetrics::new(total, results.len(), level, strategy);

        info!(
            subsystem = "search",
            component = "filter",
            op = "filter",
            user_id,
            query_id = %query_id,
            scope = ?scope,
            total_candidates = metrics.total_candidates,
            result_count = metrics.final_result_count,
            filter_ratio = metrics.filter_ratio,
            degradation_level = metrics.degradation_level,
            duration_ms = start.elapsed().as_millis() as u64,
            "Filtering complete"
        );

        Ok(FilterOutcome {
            results,
            metrics,
            scope,
        })
    }

    fn passthrough(mut candidates: Vec<CandidateImage>, requested: usize) -> FilterOutcome {
        let total = candidates.len();
        candidates.truncate(requested);
        FilterOutcome {
            metrics: FilterMetrics::new(
                total,
                candidates.len(),
                0,
                DegradationStrategy::None,
            ),
            results: candidates,
            scope: FilterScope::Disabled,
        }
    }
}
