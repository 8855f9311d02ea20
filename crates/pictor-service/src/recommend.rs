//! The recommendation pipeline.
//!
//! ```text
//! validate → analyze → search (expanded) → generate shortfall
//!          → filter (identified users) → truncate → rank → cache → side effects
//! ```
//!
//! Ranks are assigned exactly once, after every stage that can add, drop,
//! or reorder candidates.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use pictor_core::{
    assign_ranks, CandidateImage, FilterMetrics, FilterStats, HistoryRepository, QueryCache,
    QueryRecord, RecommendationHistoryEntry, RecommendationRequest, RecommendationResponse,
    Result,
};
use pictor_inference::PromptAnalyzer;
use pictor_search::{FilterEngine, SearchOrchestrator};

use crate::generation::GenerationFallback;
use crate::services::side_effects::{SideEffect, SideEffectSink};

/// Runs one recommendation request end to end.
#[derive(Clone)]
pub struct RecommendationService {
    analyzer: PromptAnalyzer,
    orchestrator: SearchOrchestrator,
    generation: Option<GenerationFallback>,
    filter: FilterEngine,
    history: Arc<dyn HistoryRepository>,
    cache: Arc<dyn QueryCache>,
    side_effects: SideEffectSink,
}

impl RecommendationService {
    pub fn new(
        analyzer: PromptAnalyzer,
        orchestrator: SearchOrchestrator,
        filter: FilterEngine,
        history: Arc<dyn HistoryRepository>,
        cache: Arc<dyn QueryCache>,
        side_effects: SideEffectSink,
    ) -> Self {
        Self {
            analyzer,
            orchestrator,
            generation: None,
            filter,
            history,
            cache,
            side_effects,
        }
    }

    /// Enable the generation fallback for short search results.
    pub fn with_generation(mut self, generation: GenerationFallback) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Produce up to `request.count` ranked recommendations.
    ///
    /// # Errors
    ///
    /// - [`pictor_core::Error::InvalidInput`] before any I/O for bad requests
    /// - [`pictor_core::Error::Search`] when no search path succeeds
    /// - [`pictor_core::Error::Cancelled`] when `cancel` fires; nothing
    ///   collected so far is returned
    pub async fn recommend(
        &self,
        cancel: &CancellationToken,
        request: RecommendationRequest,
    ) -> Result<RecommendationResponse> {
        let start = Instant::now();
        let request = request.validated()?;
        let query_id = Uuid::now_v7();
        let requested = request.count;
        let theme = request.theme;

        let analysis = self.analyzer.analyze(cancel, &request.prompt, theme).await;

        // Anonymous requests are never filtered, so they need no headroom.
        let search_count = match request.user_id {
            Some(_) => self.filter.config().candidate_count(requested),
            None => requested,
        };

        let mut candidates = self
            .orchestrator
            .search(cancel, &analysis, search_count, theme)
            .await
            .map_err(|e| {
                error!(
                    subsystem = "service",
                    component = "recommend",
                    query_id = %query_id,
                    error = %e,
                    "Search stage failed"
                );
                e
            })?;
        let search_hits = candidates.len();

        let mut generated_count = 0;
        if candidates.len() < requested && !request.search_only {
            if let Some(ref generation) = self.generation {
                let needed = requested - candidates.len();
                let generated = generation
                    .fill_shortfall(
                        cancel,
                        analysis.optimized_prompt(),
                        theme.preferred_provider(),
                        theme,
                        needed,
                        candidates.len() as u32,
                    )
                    .await?;
                generated_count = generated.len();
                candidates.extend(generated);
            } else {
                debug!(
                    subsystem = "service",
                    component = "recommend",
                    query_id = %query_id,
                    shortfall = requested - candidates.len(),
                    "No generation backend configured, returning short result"
                );
            }
        }

        let (mut results, filter_metrics) = match request.user_id {
            Some(user_id) => {
                let outcome = self
                    .filter
                    .filter(
                        cancel,
                        user_id,
                        request.session_id.as_deref(),
                        query_id,
                        candidates,
                        requested,
                    )
                    .await?;
                (outcome.results, Some(outcome.metrics))
            }
            None => (candidates, None),
        };

        results.truncate(requested);
        assign_ranks(&mut results);

        let record = QueryRecord::new(
            query_id,
            analysis.optimized_prompt(),
            results.iter().map(|c| c.id).collect(),
        )
        .with_user(request.user_id);
        if let Err(e) = self.cache.put(&record).await {
            warn!(
                subsystem = "service",
                component = "recommend",
                query_id = %query_id,
                error = %e,
                "Failed to cache query record; feedback will be rejected"
            );
        }

        if let Some(user_id) = request.user_id {
            self.enqueue_side_effects(
                user_id,
                request.session_id.as_deref(),
                query_id,
                analysis.optimized_prompt(),
                &results,
                filter_metrics.as_ref(),
            );
        }

        info!(
            subsystem = "service",
            component = "recommend",
            op = "recommend",
            query_id = %query_id,
            user_id = request.user_id,
            theme = %theme,
            requested_count = requested,
            search_count,
            semantic_hits = search_hits,
            generated_count,
            result_count = results.len(),
            filter_ratio = filter_metrics.as_ref().map(|m| m.filter_ratio),
            degradation_level = filter_metrics.as_ref().map(|m| m.degradation_level),
            duration_ms = start.elapsed().as_millis() as u64,
            "Recommendation complete"
        );

        Ok(RecommendationResponse {
            query_id,
            query: analysis.optimized_prompt().to_string(),
            results_count: results.len(),
            results,
            filter_metrics,
        })
    }

    fn enqueue_side_effects(
        &self,
        user_id: i64,
        session_id: Option<&str>,
        query_id: Uuid,
        prompt: &str,
        results: &[CandidateImage],
        metrics: Option<&FilterMetrics>,
    ) {
        if !results.is_empty() {
            self.side_effects
                .submit(SideEffect::RecordHistory(RecommendationHistoryEntry::from_results(
                    user_id, session_id, query_id, prompt, results,
                )));
        }
        if let Some(metrics) = metrics.filter(|_| self.filter.config().enable_metrics) {
            self.side_effects.submit(SideEffect::RecordFilterMetrics {
                user_id,
                query_id,
                metrics: metrics.clone(),
            });
        }
    }

    /// Shown/selected totals for `user_id` over `window_days`.
    pub async fn filter_stats(&self, user_id: i64, window_days: Option<i64>) -> Result<FilterStats> {
        let window_days = window_days.unwrap_or(self.filter.config().window_days);
        self.history.stats(user_id, window_days).await
    }
}
