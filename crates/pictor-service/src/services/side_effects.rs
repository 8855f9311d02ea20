//! Best-effort side channel for writes that must never delay or fail a
//! response: history recording, filter metrics, and selection marks.
//!
//! Effects go through a bounded channel drained by one background task.
//! Submission never blocks; when the buffer is full the effect is dropped
//! and a warning logged.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use pictor_core::{
    FilterMetrics, FilterMetricsRepository, HistoryRepository, RecommendationHistoryEntry,
};

/// A deferred write.
#[derive(Debug, Clone)]
pub enum SideEffect {
    RecordHistory(Vec<RecommendationHistoryEntry>),
    RecordFilterMetrics {
        user_id: i64,
        query_id: Uuid,
        metrics: FilterMetrics,
    },
    MarkSelected {
        query_id: Uuid,
        image_id: i64,
    },
}

impl SideEffect {
    fn kind(&self) -> &'static str {
        match self {
            SideEffect::RecordHistory(_) => "record_history",
            SideEffect::RecordFilterMetrics { .. } => "record_filter_metrics",
            SideEffect::MarkSelected { .. } => "mark_selected",
        }
    }
}

/// Sending half. Cheap to clone.
#[derive(Clone)]
pub struct SideEffectSink {
    tx: mpsc::Sender<SideEffect>,
    dropped: Arc<AtomicU64>,
}

/// Receiving half, consumed by [`SideEffectReceiver::spawn`].
pub struct SideEffectReceiver {
    rx: mpsc::Receiver<SideEffect>,
}

impl SideEffectSink {
    pub fn new(capacity: usize) -> (Self, SideEffectReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            SideEffectReceiver { rx },
        )
    }

    /// Queue an effect. Returns false if it was dropped.
    pub fn submit(&self, effect: SideEffect) -> bool {
        let kind = effect.kind();
        match self.tx.try_send(effect) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                warn!(
                    subsystem = "service",
                    component = "side_effects",
                    effect = kind,
                    dropped_total = dropped,
                    "Side-effect buffer full, dropping"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    subsystem = "service",
                    component = "side_effects",
                    effect = kind,
                    "Side-effect drain stopped, dropping"
                );
                false
            }
        }
    }

    /// Effects dropped so far.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl SideEffectReceiver {
    /// Start draining into the stores. The task ends once every sink clone
    /// has been dropped and the buffer is empty.
    pub fn spawn(
        self,
        history: Arc<dyn HistoryRepository>,
        metrics: Arc<dyn FilterMetricsRepository>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.drain(history, metrics))
    }

    async fn drain(
        mut self,
        history: Arc<dyn HistoryRepository>,
        metrics: Arc<dyn FilterMetricsRepository>,
    ) {
        let mut applied = 0u64;
        while let Some(effect) = self.rx.recv().await {
            let kind = effect.kind();
            let result = match effect {
                SideEffect::RecordHistory(entries) => {
                    history.record_batch(&entries).await.map(|_| ())
                }
                SideEffect::RecordFilterMetrics {
                    user_id,
                    query_id,
                    metrics: m,
                } => metrics.record(user_id, query_id, &m).await,
                SideEffect::MarkSelected { query_id, image_id } => history
                    .mark_selected(query_id, image_id)
                    .await
                    .map(|marked| {
                        if !marked {
                            debug!(
                                subsystem = "service",
                                component = "side_effects",
                                query_id = %query_id,
                                image_id,
                                "No unselected history row to mark"
                            );
                        }
                    }),
            };
            match result {
                Ok(()) => applied += 1,
                Err(e) => warn!(
                    subsystem = "service",
                    component = "side_effects",
                    effect = kind,
                    error = %e,
                    "Side effect failed"
                ),
            }
        }
        info!(
            subsystem = "service",
            component = "side_effects",
            applied,
            "Side-effect drain finished"
        );
    }
}
