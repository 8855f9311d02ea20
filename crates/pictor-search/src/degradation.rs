//! Degradation pipeline for over-aggressive filtering.
//!
//! Runs when filtering would leave fewer than the requested number of
//! candidates and remove more than the policy allows. Strategies, in order:
//!
//! 1. Time-window reduction: the user's history is fetched once for the
//!    widest window, then narrower cutoffs (15, 7, 3, 1 days) are applied in
//!    memory. The first level whose filter ratio is within the limit and
//!    which leaves enough candidates wins.
//! 2. Similarity-threshold mixing: start from the largest filtered set seen
//!    so far (the first pass's set counts) and backfill with previously-seen
//!    candidates whose similarity is above the high-confidence threshold.
//!    Kept items stay ahead of backfilled ones.
//!
//! Running out of strategies is not an error; fewer results come back.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pictor_core::defaults::{
    DEGRADATION_WINDOWS_DAYS, HIGH_SIMILARITY_THRESHOLD, SIMILARITY_MIX_LEVEL,
};
use pictor_core::{
    ratio, CandidateImage, DegradationStrategy, Error, HistoryRepository, Result, SeenImage,
};

use crate::cancel::cancellable;

/// Result of a degradation run.
#[derive(Debug, Clone, PartialEq)]
pub struct DegradationOutcome {
    pub results: Vec<CandidateImage>,
    pub strategy: DegradationStrategy,
    /// 0 = none, 1..=windows = time-window level, 5 = similarity mixing.
    pub level: u8,
}

/// Progressive relaxation of history filtering.
#[derive(Clone)]
pub struct DegradationPipeline {
    history: Arc<dyn HistoryRepository>,
    windows_days: Vec<i64>,
    high_similarity_threshold: f32,
}

impl DegradationPipeline {
    pub fn new(history: Arc<dyn HistoryRepository>) -> Self {
        Self {
            history,
            windows_days: DEGRADATION_WINDOWS_DAYS.to_vec(),
            high_similarity_threshold: HIGH_SIMILARITY_THRESHOLD,
        }
    }

    /// Override the window ladder. Windows are tried widest first.
    pub fn with_windows(mut self, mut windows_days: Vec<i64>) -> Self {
        windows_days.sort_unstable_by(|a, b| b.cmp(a));
        windows_days.dedup();
        self.windows_days = windows_days;
        self
    }

    pub fn with_high_similarity_threshold(mut self, threshold: f32) -> Self {
        self.high_similarity_threshold = threshold;
        self
    }

    /// Relax filtering of `candidates` for `user_id`.
    ///
    /// `baseline` is the set the first filtering pass produced; it is returned
    /// unchanged if the history store cannot be read.
    pub async fn degrade(
        &self,
        cancel: &CancellationToken,
        user_id: i64,
        candidates: &[CandidateImage],
        baseline: &[CandidateImage],
        requested: usize,
        max_ratio: f32,
    ) -> Result<DegradationOutcome> {
        let Some(&widest) = self.windows_days.first() else {
            return Ok(Self::undegraded(baseline, requested));
        };

        let now = Utc::now();
        let history = match cancellable(
            cancel,
            self.history.seen_since(user_id, now - Duration::days(widest)),
        )
        .await
        {
            Ok(history) => history,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(e) => {
                warn!(
                    subsystem = "search",
                    component = "degradation",
                    user_id,
                    error = %e,
                    "History fetch failed, returning undegraded results"
                );
                return Ok(Self::undegraded(baseline, requested));
            }
        };

        let total = candidates.len();
        // Window sets are drawn from whole-user history, so in session scope
        // they can be smaller than the first pass.
        let mut best: Vec<CandidateImage> = baseline.to_vec();

        for (index, days) in self.windows_days.iter().enumerate() {
            let filtered = Self::filter_window(candidates, &history, now - Duration::days(*days));
            let level_ratio = ratio(total - filtered.len(), total);
            let level = index as u8 + 1;

            debug!(
                subsystem = "search",
                component = "degradation",
                user_id,
                window_days = days,
                degradation_level = level,
                remaining = filtered.len(),
                filter_ratio = level_ratio,
                "Evaluated time window"
            );

            if level_ratio <= max_ratio && filtered.len() >= requested {
                info!(
                    subsystem = "search",
                    component = "degradation",
                    user_id,
                    window_days = days,
                    degradation_level = level,
                    "Time-window reduction satisfied request"
                );
                let mut results = filtered;
                results.truncate(requested);
                return Ok(DegradationOutcome {
                    results,
                    strategy: DegradationStrategy::TimeWindowReduction,
                    level,
                });
            }

            if filtered.len() > best.len() {
                best = filtered;
            }
        }

        let results = self.mix_high_similarity(candidates, best, requested);
        info!(
            subsystem = "search",
            component = "degradation",
            user_id,
            degradation_level = SIMILARITY_MIX_LEVEL,
            result_count = results.len(),
            requested_count = requested,
            "Similarity-threshold mixing applied"
        );
        Ok(DegradationOutcome {
            results,
            strategy: DegradationStrategy::SimilarityThresholdMixing,
            level: SIMILARITY_MIX_LEVEL,
        })
    }

    fn undegraded(baseline: &[CandidateImage], requested: usize) -> DegradationOutcome {
        DegradationOutcome {
            results: baseline.iter().take(requested).cloned().collect(),
            strategy: DegradationStrategy::None,
            level: 0,
        }
    }

    fn filter_window(
        candidates: &[CandidateImage],
        history: &[SeenImage],
        cutoff: chrono::DateTime<Utc>,
    ) -> Vec<CandidateImage> {
        let seen: HashSet<i64> = history
            .iter()
            .filter(|s| s.shown_at >= cutoff)
            .map(|s| s.image_id)
            .collect();
        candidates
            .iter()
            .filter(|c| !seen.contains(&c.id))
            .cloned()
            .collect()
    }

    /// Rank `kept` by similarity, then backfill from excluded
    /// high-similarity candidates.
    fn mix_high_similarity(
        &self,
        candidates: &[CandidateImage],
        mut kept: Vec<CandidateImage>,
        requested: usize,
    ) -> Vec<CandidateImage> {
        kept.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        if kept.len() < requested {
            let kept_ids: HashSet<i64> = kept.iter().map(|c| c.id).collect();
            let mut excluded: Vec<&CandidateImage> = candidates
                .iter()
                .filter(|c| !kept_ids.contains(&c.id))
                .filter(|c| c.similarity > self.high_similarity_threshold)
                .collect();
            excluded.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));

            let needed = requested - kept.len();
            kept.extend(excluded.into_iter().take(needed).cloned());
        }

        kept.truncate(requested);
        kept
    }
}
