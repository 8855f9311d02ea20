//! Prompt analysis: one classification per request, every prompt variant
//! derived from it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use pictor_core::defaults::CLASSIFIER_TIMEOUT_SECS;
use pictor_core::theme::{optimized_prompt, semantic_prompt};
use pictor_core::{PromptAnalysisContext, PromptClassification, PromptClassifier, Theme};

use crate::classifier::extract_keywords;

/// Builds the [`PromptAnalysisContext`] for a request.
///
/// The classifier is called at most once per `analyze`, and never when the
/// theme is `none`. Classification failure, timeout, or cancellation falls
/// back to the default classification; `analyze` itself cannot fail.
#[derive(Clone)]
pub struct PromptAnalyzer {
    classifier: Option<Arc<dyn PromptClassifier>>,
    timeout: Duration,
}

impl PromptAnalyzer {
    pub fn new(classifier: Arc<dyn PromptClassifier>) -> Self {
        Self {
            classifier: Some(classifier),
            timeout: Duration::from_secs(CLASSIFIER_TIMEOUT_SECS),
        }
    }

    /// Analyzer that always uses the default classification.
    pub fn without_classifier() -> Self {
        Self {
            classifier: None,
            timeout: Duration::from_secs(CLASSIFIER_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn analyze(
        &self,
        cancel: &CancellationToken,
        prompt: &str,
        theme: Theme,
    ) -> PromptAnalysisContext {
        if theme.is_none() {
            debug!(
                subsystem = "inference",
                component = "analyzer",
                "No theme, skipping classification"
            );
            return PromptAnalysisContext::literal(prompt, theme);
        }

        let classification = self.classify_once(cancel, prompt).await;
        let optimized = optimized_prompt(
            prompt,
            theme,
            classification.complexity,
            classification.content_type,
        );

        PromptAnalysisContext::new(
            prompt.to_string(),
            theme,
            classification,
            optimized,
            semantic_prompt(prompt, theme),
        )
    }

    async fn classify_once(&self, cancel: &CancellationToken, prompt: &str) -> PromptClassification {
        let fallback = || PromptClassification {
            keywords: extract_keywords(prompt),
            ..PromptClassification::default()
        };

        let Some(classifier) = &self.classifier else {
            return fallback();
        };

        let start = Instant::now();
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = tokio::time::timeout(self.timeout, classifier.classify(prompt)) => Some(result),
        };

        match outcome {
            Some(Ok(Ok(classification))) => {
                debug!(
                    subsystem = "inference",
                    component = "analyzer",
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Classification succeeded"
                );
                classification
            }
            Some(Ok(Err(e))) => {
                warn!(
                    subsystem = "inference",
                    component = "analyzer",
                    error = %e,
                    "Classification failed, using defaults"
                );
                fallback()
            }
            Some(Err(_)) => {
                warn!(
                    subsystem = "inference",
                    component = "analyzer",
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Classification timed out, using defaults"
                );
                fallback()
            }
            None => fallback(),
        }
    }
}
