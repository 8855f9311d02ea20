//! Feedback tracking.
//!
//! A query accepts feedback once. The query record must still be cached and
//! the chosen image must be one that was shown. The mark is set atomically
//! before forwarding; if forwarding fails the mark stays.

use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use pictor_core::{Error, FeedbackBackend, FeedbackState, FeedbackSubmission, QueryCache, Result};

use crate::services::side_effects::{SideEffect, SideEffectSink};

/// Validates, marks, and forwards user feedback.
#[derive(Clone)]
pub struct FeedbackTracker {
    cache: Arc<dyn QueryCache>,
    backend: Arc<dyn FeedbackBackend>,
    side_effects: Option<SideEffectSink>,
}

impl FeedbackTracker {
    pub fn new(cache: Arc<dyn QueryCache>, backend: Arc<dyn FeedbackBackend>) -> Self {
        Self {
            cache,
            backend,
            side_effects: None,
        }
    }

    /// Mark the chosen image as selected in history after a successful mark.
    pub fn with_side_effects(mut self, sink: SideEffectSink) -> Self {
        self.side_effects = Some(sink);
        self
    }

    /// Record that `chosen_id` was picked from the results of `query_id`.
    ///
    /// # Errors
    ///
    /// - [`Error::QueryNotFound`] if the query is unknown or expired
    /// - [`Error::NotInRecommendedSet`] if `chosen_id` was not shown
    /// - [`Error::FeedbackAlreadySubmitted`] for every call after the first
    /// - [`Error::Feedback`] if the learning backend rejects it
    pub async fn submit_feedback(&self, query_id: Uuid, chosen_id: i64) -> Result<()> {
        let record = self
            .cache
            .get(query_id)
            .await?
            .ok_or(Error::QueryNotFound(query_id))?;

        if !record.contains(chosen_id) {
            warn!(
                subsystem = "service",
                component = "feedback",
                query_id = %query_id,
                image_id = chosen_id,
                "Chosen image was not recommended for this query"
            );
            return Err(Error::NotInRecommendedSet {
                query_id,
                image_id: chosen_id,
            });
        }

        if !self.cache.mark_feedback_submitted(query_id, chosen_id).await? {
            return Err(Error::FeedbackAlreadySubmitted(query_id));
        }

        if let Some(ref sink) = self.side_effects {
            sink.submit(SideEffect::MarkSelected {
                query_id,
                image_id: chosen_id,
            });
        }

        let submission = FeedbackSubmission {
            query_id,
            prompt: record.prompt,
            shown: record.shown,
            chosen_id,
        };
        if let Err(e) = self.backend.submit_feedback(&submission).await {
            error!(
                subsystem = "service",
                component = "feedback",
                query_id = %query_id,
                image_id = chosen_id,
                error = %e,
                "Feedback forwarding failed; local mark kept"
            );
            return Err(match e {
                Error::Feedback(msg) => Error::Feedback(msg),
                other => Error::Feedback(other.to_string()),
            });
        }

        info!(
            subsystem = "service",
            component = "feedback",
            op = "submit_feedback",
            query_id = %query_id,
            image_id = chosen_id,
            "Feedback recorded"
        );
        Ok(())
    }

    /// Current feedback state of a query.
    pub async fn feedback_state(&self, query_id: Uuid) -> Result<FeedbackState> {
        self.cache.feedback_state(query_id).await
    }
}
