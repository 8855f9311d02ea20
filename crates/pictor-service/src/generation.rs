//! Generation fallback: fills a shortfall in search results with freshly
//! generated images.
//!
//! One task per missing item, fanned in over a channel sized to the number
//! of tasks. A failed task only shortens the result; cancellation aborts
//! every task still running and discards what was collected.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use pictor_core::defaults::{GENERATED_BASE_SCORE, GENERATED_MIN_SCORE, GENERATED_SCORE_STEP};
use pictor_core::{
    CandidateImage, Error, GenerationBackend, GenerationRequest, ImageProvider, Result, Theme,
};

/// Synthetic similarity for the `index`-th generated image.
///
/// Starts below typical strong search hits and decreases per index.
pub fn generated_score(index: usize) -> f32 {
    (GENERATED_BASE_SCORE - GENERATED_SCORE_STEP * index as f32).max(GENERATED_MIN_SCORE)
}

/// Fills missing results by generating images concurrently.
#[derive(Clone)]
pub struct GenerationFallback {
    backend: Arc<dyn GenerationBackend>,
}

impl GenerationFallback {
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    /// Generate up to `needed` images for `prompt`.
    ///
    /// Results come back in task order with ranks continuing after
    /// `start_rank`. Only cancellation is an error.
    pub async fn fill_shortfall(
        &self,
        cancel: &CancellationToken,
        prompt: &str,
        provider: ImageProvider,
        theme: Theme,
        needed: usize,
        start_rank: u32,
    ) -> Result<Vec<CandidateImage>> {
        if needed == 0 {
            return Ok(Vec::new());
        }
        let start = Instant::now();

        let (tx, mut rx) = mpsc::channel(needed);
        let mut tasks = JoinSet::new();
        let request = Arc::new(GenerationRequest {
            prompt: prompt.to_string(),
            theme,
            provider,
        });

        for index in 0..needed {
            let backend = self.backend.clone();
            let request = request.clone();
            let tx = tx.clone();
            tasks.spawn(async move {
                let result = backend.generate(&request).await;
                // Receiver gone means the call was cancelled.
                let _ = tx.send((index, result)).await;
            });
        }
        drop(tx);

        let mut collected: Vec<(usize, CandidateImage)> = Vec::with_capacity(needed);
        let mut failed = 0usize;

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    tasks.abort_all();
                    warn!(
                        subsystem = "service",
                        component = "generation",
                        needed,
                        completed = collected.len(),
                        "Generation cancelled, discarding partial results"
                    );
                    return Err(Error::Cancelled);
                }
                message = rx.recv() => {
                    let Some((index, result)) = message else { break };
                    match result {
                        Ok(image) => {
                            let mut candidate = CandidateImage::generated(
                                image.resource_id,
                                image.image_url,
                                generated_score(index),
                            );
                            candidate.rank = start_rank + index as u32 + 1;
                            debug!(
                                subsystem = "service",
                                component = "generation",
                                index,
                                image_id = candidate.id,
                                "Generated image received"
                            );
                            collected.push((index, candidate));
                        }
                        Err(e) => {
                            failed += 1;
                            warn!(
                                subsystem = "service",
                                component = "generation",
                                index,
                                error = %e,
                                "Generation task failed"
                            );
                        }
                    }
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(
                    subsystem = "service",
                    component = "generation",
                    error = ?e,
                    "Generation task panicked"
                );
            }
        }

        collected.sort_by_key(|(index, _)| *index);
        let results: Vec<CandidateImage> = collected.into_iter().map(|(_, c)| c).collect();

        info!(
            subsystem = "service",
            component = "generation",
            op = "fill_shortfall",
            provider = %provider,
            theme = %theme,
            needed,
            generated_count = results.len(),
            failed,
            duration_ms = start.elapsed().as_millis() as u64,
            "Generation fallback complete"
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pictor_core::Provenance;
    use pictor_inference::mock::MockGenerationBackend;

    fn fallback(backend: &MockGenerationBackend) -> GenerationFallback {
        GenerationFallback::new(Arc::new(backend.clone()))
    }

    #[test]
    fn test_generated_score_descends_with_floor() {
        assert!((generated_score(0) - 0.8).abs() < 1e-6);
        assert!((generated_score(1) - 0.75).abs() < 1e-6);
        assert!(generated_score(2) < generated_score(1));
        assert!((generated_score(100) - GENERATED_MIN_SCORE).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_generates_exactly_needed() {
        let backend = MockGenerationBackend::new();
        let results = fallback(&backend)
            .fill_shortfall(
                &CancellationToken::new(),
                "a fox",
                ImageProvider::Recraft,
                Theme::Cartoon,
                3,
                2,
            )
            .await
            .unwrap();

        assert_eq!(backend.call_count(), 3);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|c| c.provenance == Provenance::Generated));
        let ranks: Vec<u32> = results.iter().map(|c| c.rank).collect();
        assert_eq!(ranks, vec![3, 4, 5]);
        assert!(results[0].similarity > results[2].similarity);
    }

    #[tokio::test]
    async fn test_partial_failure_shortens_result() {
        let backend = MockGenerationBackend::new().failing_first(2);
        let results = fallback(&backend)
            .fill_shortfall(
                &CancellationToken::new(),
                "a fox",
                ImageProvider::OpenAi,
                Theme::None,
                4,
                0,
            )
            .await
            .unwrap();

        assert_eq!(backend.call_count(), 4);
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_all_failing_is_not_an_error() {
        let backend = MockGenerationBackend::new().failing();
        let results = fallback(&backend)
            .fill_shortfall(
                &CancellationToken::new(),
                "a fox",
                ImageProvider::OpenAi,
                Theme::None,
                2,
                0,
            )
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_zero_needed_issues_nothing() {
        let backend = MockGenerationBackend::new();
        let results = fallback(&backend)
            .fill_shortfall(
                &CancellationToken::new(),
                "a fox",
                ImageProvider::OpenAi,
                Theme::None,
                0,
                0,
            )
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_returns_promptly() {
        let backend = MockGenerationBackend::new().with_latency_ms(60_000);
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            canceller.cancel();
        });

        let err = fallback(&backend)
            .fill_shortfall(&cancel, "a fox", ImageProvider::OpenAi, Theme::None, 3, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
