//! In-memory implementations of the persistence traits.
//!
//! Used when no database is configured and throughout the test suites.
//! State lives for the lifetime of the value; nothing is global.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use pictor_core::{
    Error, FilterMetrics, FilterMetricsRepository, FilterPolicy, FilterPolicyRepository,
    FilterStats, HistoryRepository, ImageResolver, RecommendationHistoryEntry, Result, SeenImage,
};

// =============================================================================
// HISTORY
// =============================================================================

/// History kept in a vector.
#[derive(Clone, Default)]
pub struct InMemoryHistoryRepository {
    entries: Arc<Mutex<Vec<RecommendationHistoryEntry>>>,
    seen_since_calls: Arc<AtomicUsize>,
    fail_reads: Arc<AtomicBool>,
}

impl InMemoryHistoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every read fail, to exercise fail-open paths.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Number of `seen_since` calls so far.
    pub fn seen_since_calls(&self) -> usize {
        self.seen_since_calls.load(Ordering::SeqCst)
    }

    pub async fn entries(&self) -> Vec<RecommendationHistoryEntry> {
        self.entries.lock().await.clone()
    }

    /// Record that `image_ids` were shown to `user_id` at `shown_at`.
    pub async fn seed_shown(
        &self,
        user_id: i64,
        session_id: Option<&str>,
        image_ids: &[i64],
        shown_at: DateTime<Utc>,
    ) {
        let query_id = Uuid::now_v7();
        let mut entries = self.entries.lock().await;
        for (i, image_id) in image_ids.iter().enumerate() {
            entries.push(RecommendationHistoryEntry {
                user_id,
                image_id: *image_id,
                query_id,
                session_id: session_id.map(str::to_string),
                query: String::new(),
                source: pictor_core::Provenance::Search,
                similarity: 0.0,
                rank: i as u32 + 1,
                chosen: false,
                chosen_at: None,
                created_at: shown_at,
            });
        }
    }

    fn check_reads(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::Internal("history store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryRepository for InMemoryHistoryRepository {
    async fn record_batch(&self, entries: &[RecommendationHistoryEntry]) -> Result<u64> {
        self.entries.lock().await.extend_from_slice(entries);
        Ok(entries.len() as u64)
    }

    async fn seen_since(&self, user_id: i64, since: DateTime<Utc>) -> Result<Vec<SeenImage>> {
        self.seen_since_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reads()?;

        let entries = self.entries.lock().await;
        let mut latest: HashMap<i64, DateTime<Utc>> = HashMap::new();
        for e in entries
            .iter()
            .filter(|e| e.user_id == user_id && e.created_at >= since)
        {
            latest
                .entry(e.image_id)
                .and_modify(|t| *t = (*t).max(e.created_at))
                .or_insert(e.created_at);
        }
        Ok(latest
            .into_iter()
            .map(|(image_id, shown_at)| SeenImage { image_id, shown_at })
            .collect())
    }

    async fn seen_in_session(&self, user_id: i64, session_id: &str) -> Result<HashSet<i64>> {
        self.check_reads()?;
        let entries = self.entries.lock().await;
        Ok(entries
            .iter()
            .filter(|e| e.user_id == user_id && e.session_id.as_deref() == Some(session_id))
            .map(|e| e.image_id)
            .collect())
    }

    async fn mark_selected(&self, query_id: Uuid, image_id: i64) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        match entries
            .iter_mut()
            .find(|e| e.query_id == query_id && e.image_id == image_id && !e.chosen)
        {
            Some(entry) => {
                entry.chosen = true;
                entry.chosen_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn stats(&self, user_id: i64, window_days: i64) -> Result<FilterStats> {
        self.check_reads()?;
        let since = Utc::now() - Duration::days(window_days);
        let entries = self.entries.lock().await;
        let in_window: Vec<_> = entries
            .iter()
            .filter(|e| e.user_id == user_id && e.created_at >= since)
            .collect();

        let total_shown = in_window.len() as i64;
        let total_selected = in_window.iter().filter(|e| e.chosen).count() as i64;
        let unique_images = in_window
            .iter()
            .map(|e| e.image_id)
            .collect::<HashSet<_>>()
            .len() as i64;

        Ok(FilterStats {
            user_id,
            window_days,
            total_shown,
            unique_images,
            total_selected,
            selection_rate: if total_shown > 0 {
                total_selected as f64 / total_shown as f64
            } else {
                0.0
            },
        })
    }
}

// =============================================================================
// FILTER POLICY
// =============================================================================

/// Filter policies keyed by user.
#[derive(Clone, Default)]
pub struct InMemoryFilterPolicyRepository {
    policies: Arc<Mutex<HashMap<i64, FilterPolicy>>>,
}

impl InMemoryFilterPolicyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FilterPolicyRepository for InMemoryFilterPolicyRepository {
    async fn get_or_create(&self, user_id: i64, defaults: &FilterPolicy) -> Result<FilterPolicy> {
        let mut policies = self.policies.lock().await;
        Ok(policies
            .entry(user_id)
            .or_insert_with(|| defaults.clone())
            .clone())
    }

    async fn update(&self, user_id: i64, policy: &FilterPolicy) -> Result<()> {
        if !(0.0..=1.0).contains(&policy.max_filter_ratio) {
            return Err(Error::InvalidInput(format!(
                "max_filter_ratio must be within [0, 1], got {}",
                policy.max_filter_ratio
            )));
        }
        self.policies.lock().await.insert(user_id, policy.clone());
        Ok(())
    }
}

// =============================================================================
// FILTER METRICS
// =============================================================================

/// Recorded filter metrics, in arrival order.
#[derive(Clone, Default)]
pub struct InMemoryFilterMetricsRepository {
    records: Arc<Mutex<Vec<(i64, Uuid, FilterMetrics)>>>,
}

impl InMemoryFilterMetricsRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<(i64, Uuid, FilterMetrics)> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl FilterMetricsRepository for InMemoryFilterMetricsRepository {
    async fn record(&self, user_id: i64, query_id: Uuid, metrics: &FilterMetrics) -> Result<()> {
        self.records
            .lock()
            .await
            .push((user_id, query_id, metrics.clone()));
        Ok(())
    }
}

// =============================================================================
// IMAGE CATALOG
// =============================================================================

/// Fixed path → id table.
#[derive(Clone, Default)]
pub struct StaticImageCatalog {
    images: Arc<HashMap<String, i64>>,
}

impl StaticImageCatalog {
    pub fn new(images: impl IntoIterator<Item = (String, i64)>) -> Self {
        Self {
            images: Arc::new(images.into_iter().collect()),
        }
    }
}

#[async_trait]
impl ImageResolver for StaticImageCatalog {
    async fn resolve_paths(&self, paths: &[String]) -> Result<HashMap<String, i64>> {
        Ok(paths
            .iter()
            .filter_map(|p| self.images.get(p).map(|id| (p.clone(), *id)))
            .collect())
    }
}

/// Catalog that registers unseen paths with sequential ids, like
/// `PgImageCatalog::register` does for the database.
#[derive(Clone)]
pub struct InMemoryImageCatalog {
    images: Arc<Mutex<HashMap<String, i64>>>,
    next_id: Arc<AtomicI64>,
}

impl Default for InMemoryImageCatalog {
    fn default() -> Self {
        Self {
            images: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }
}

impl InMemoryImageCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ImageResolver for InMemoryImageCatalog {
    async fn resolve_paths(&self, paths: &[String]) -> Result<HashMap<String, i64>> {
        let mut images = self.images.lock().await;
        Ok(paths
            .iter()
            .map(|p| {
                let id = *images
                    .entry(p.clone())
                    .or_insert_with(|| self.next_id.fetch_add(1, Ordering::SeqCst));
                (p.clone(), id)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seen_since_respects_cutoff() {
        let repo = InMemoryHistoryRepository::new();
        let now = Utc::now();
        repo.seed_shown(1, None, &[10, 11], now - Duration::days(10))
            .await;
        repo.seed_shown(1, None, &[12], now - Duration::hours(2)).await;
        repo.seed_shown(2, None, &[13], now).await;

        let seen = repo.seen_since(1, now - Duration::days(1)).await.unwrap();
        let ids: HashSet<i64> = seen.iter().map(|s| s.image_id).collect();
        assert_eq!(ids, HashSet::from([12]));
        assert_eq!(repo.seen_since_calls(), 1);
    }

    #[tokio::test]
    async fn test_seen_in_session() {
        let repo = InMemoryHistoryRepository::new();
        repo.seed_shown(1, Some("s1"), &[1, 2], Utc::now()).await;
        repo.seed_shown(1, Some("s2"), &[3], Utc::now()).await;

        let ids = repo.seen_in_session(1, "s1").await.unwrap();
        assert_eq!(ids, HashSet::from([1, 2]));
    }

    #[tokio::test]
    async fn test_mark_selected_only_once() {
        let repo = InMemoryHistoryRepository::new();
        repo.seed_shown(1, None, &[5], Utc::now()).await;
        let query_id = repo.entries().await[0].query_id;

        assert!(repo.mark_selected(query_id, 5).await.unwrap());
        assert!(!repo.mark_selected(query_id, 5).await.unwrap());

        let stats = repo.stats(1, 30).await.unwrap();
        assert_eq!(stats.total_shown, 1);
        assert_eq!(stats.total_selected, 1);
        assert!((stats.selection_rate - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_failing_reads() {
        let repo = InMemoryHistoryRepository::new();
        repo.fail_reads(true);
        assert!(repo.seen_since(1, Utc::now()).await.is_err());
        assert!(repo.seen_in_session(1, "s").await.is_err());
    }

    #[tokio::test]
    async fn test_policy_created_lazily_then_persisted() {
        let repo = InMemoryFilterPolicyRepository::new();
        let defaults = FilterPolicy::default();

        let first = repo.get_or_create(7, &defaults).await.unwrap();
        assert_eq!(first, defaults);

        let custom = FilterPolicy {
            max_filter_ratio: 0.5,
            ..defaults.clone()
        };
        repo.update(7, &custom).await.unwrap();
        assert_eq!(repo.get_or_create(7, &defaults).await.unwrap(), custom);
    }

    #[tokio::test]
    async fn test_policy_update_rejects_bad_ratio() {
        let repo = InMemoryFilterPolicyRepository::new();
        let bad = FilterPolicy {
            max_filter_ratio: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            repo.update(1, &bad).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_static_catalog_drops_unknown() {
        let catalog = StaticImageCatalog::new([("a.svg".to_string(), 1)]);
        let resolved = catalog
            .resolve_paths(&["a.svg".to_string(), "b.svg".to_string()])
            .await
            .unwrap();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved["a.svg"], 1);
    }

    #[tokio::test]
    async fn test_in_memory_catalog_registers_stable_ids() {
        let catalog = InMemoryImageCatalog::new();
        let first = catalog
            .resolve_paths(&["a.svg".to_string(), "b.svg".to_string()])
            .await
            .unwrap();
        let again = catalog.resolve_paths(&["b.svg".to_string()]).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_ne!(first["a.svg"], first["b.svg"]);
        assert_eq!(again["b.svg"], first["b.svg"]);
    }
}
