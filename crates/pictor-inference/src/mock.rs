//! Mock backends for deterministic testing.
//!
//! Every mock logs its calls and can simulate latency and failures, so the
//! orchestration code can be exercised without network services.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pictor_inference::mock::{hits, MockSearchBackend};
//!
//! let backend = MockSearchBackend::new()
//!     .with_hits(hits(&[("img/cat.svg", 0.9)]))
//!     .failing_for("theme prompt");
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use pictor_core::{
    Error, FeedbackBackend, FeedbackSubmission, GeneratedImage, GenerationBackend,
    GenerationRequest, PromptClassification, PromptClassifier, Result, SearchBackend, SearchHit,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn simulate_latency(latency_ms: u64) {
    if latency_ms > 0 {
        tokio::time::sleep(tokio::time::Duration::from_millis(latency_ms)).await;
    }
}

fn roll_failure(rate: f64) -> bool {
    use rand::Rng;
    rate > 0.0 && rand::thread_rng().gen::<f64>() < rate
}

/// Build search hits from `(path, similarity)` pairs, ranked in order.
pub fn hits(items: &[(&str, f32)]) -> Vec<SearchHit> {
    items
        .iter()
        .enumerate()
        .map(|(i, (path, similarity))| SearchHit {
            image_path: path.to_string(),
            similarity: *similarity,
            rank: i as u32 + 1,
        })
        .collect()
}

// =============================================================================
// SEARCH
// =============================================================================

/// A recorded search call.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCall {
    pub text: String,
    pub top_k: usize,
}

#[derive(Debug, Clone, Default)]
struct SearchMockConfig {
    default_hits: Vec<SearchHit>,
    responses: HashMap<String, Vec<SearchHit>>,
    failing_texts: HashSet<String>,
    fail_all: bool,
    latency_ms: u64,
    failure_rate: f64,
}

/// Mock semantic search backend.
#[derive(Clone, Default)]
pub struct MockSearchBackend {
    config: Arc<SearchMockConfig>,
    calls: Arc<Mutex<Vec<SearchCall>>>,
}

impl MockSearchBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hits returned for any text without a specific response.
    pub fn with_hits(mut self, hits: Vec<SearchHit>) -> Self {
        Arc::make_mut(&mut self.config).default_hits = hits;
        self
    }

    /// Hits returned for one exact text.
    pub fn with_response(mut self, text: impl Into<String>, hits: Vec<SearchHit>) -> Self {
        Arc::make_mut(&mut self.config)
            .responses
            .insert(text.into(), hits);
        self
    }

    /// Fail calls for one exact text.
    pub fn failing_for(mut self, text: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config)
            .failing_texts
            .insert(text.into());
        self
    }

    /// Fail every call.
    pub fn failing(mut self) -> Self {
        Arc::make_mut(&mut self.config).fail_all = true;
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Set failure rate (0.0 - 1.0) for testing error handling.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        Arc::make_mut(&mut self.config).failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn get_calls(&self) -> Vec<SearchCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl SearchBackend for MockSearchBackend {
    async fn search(&self, text: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        lock(&self.calls).push(SearchCall {
            text: text.to_string(),
            top_k,
        });
        simulate_latency(self.config.latency_ms).await;

        if self.config.fail_all
            || self.config.failing_texts.contains(text)
            || roll_failure(self.config.failure_rate)
        {
            return Err(Error::Search(format!("simulated search failure for '{}'", text)));
        }

        let mut hits = self
            .config
            .responses
            .get(text)
            .unwrap_or(&self.config.default_hits)
            .clone();
        hits.truncate(top_k);
        Ok(hits)
    }
}

// =============================================================================
// GENERATION
// =============================================================================

#[derive(Debug, Clone, Default)]
struct GenerationMockConfig {
    fail_first: usize,
    fail_all: bool,
    latency_ms: u64,
    failure_rate: f64,
}

/// Mock image generation backend.
///
/// Resource ids are allocated sequentially from 10 000.
#[derive(Clone)]
pub struct MockGenerationBackend {
    config: Arc<GenerationMockConfig>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
    attempts: Arc<AtomicUsize>,
    next_id: Arc<AtomicI64>,
}

impl Default for MockGenerationBackend {
    fn default() -> Self {
        Self {
            config: Arc::new(GenerationMockConfig::default()),
            requests: Arc::new(Mutex::new(Vec::new())),
            attempts: Arc::new(AtomicUsize::new(0)),
            next_id: Arc::new(AtomicI64::new(10_000)),
        }
    }
}

impl MockGenerationBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `n` calls to arrive.
    pub fn failing_first(mut self, n: usize) -> Self {
        Arc::make_mut(&mut self.config).fail_first = n;
        self
    }

    pub fn failing(mut self) -> Self {
        Arc::make_mut(&mut self.config).fail_all = true;
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        Arc::make_mut(&mut self.config).failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn get_requests(&self) -> Vec<GenerationRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationBackend for MockGenerationBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request.clone());
        simulate_latency(self.config.latency_ms).await;

        if self.config.fail_all
            || attempt < self.config.fail_first
            || roll_failure(self.config.failure_rate)
        {
            return Err(Error::Generation("simulated generation failure".to_string()));
        }

        let resource_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(GeneratedImage {
            image_url: format!("https://cdn.example.com/generated/{}.svg", resource_id),
            resource_id,
        })
    }
}

// =============================================================================
// CLASSIFIER
// =============================================================================

#[derive(Debug, Clone, Default)]
struct ClassifierMockConfig {
    classification: PromptClassification,
    fail: bool,
    latency_ms: u64,
}

/// Mock prompt classifier.
#[derive(Clone, Default)]
pub struct MockClassifier {
    config: Arc<ClassifierMockConfig>,
    calls: Arc<AtomicUsize>,
}

impl MockClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_classification(mut self, classification: PromptClassification) -> Self {
        Arc::make_mut(&mut self.config).classification = classification;
        self
    }

    pub fn failing(mut self) -> Self {
        Arc::make_mut(&mut self.config).fail = true;
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PromptClassifier for MockClassifier {
    async fn classify(&self, _prompt: &str) -> Result<PromptClassification> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        simulate_latency(self.config.latency_ms).await;
        if self.config.fail {
            return Err(Error::Inference("simulated classifier failure".to_string()));
        }
        Ok(self.config.classification.clone())
    }
}

// =============================================================================
// FEEDBACK
// =============================================================================

/// Mock learning backend that records submissions.
#[derive(Clone, Default)]
pub struct MockFeedbackBackend {
    fail: bool,
    submissions: Arc<Mutex<Vec<FeedbackSubmission>>>,
}

impl MockFeedbackBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn submissions(&self) -> Vec<FeedbackSubmission> {
        lock(&self.submissions).clone()
    }
}

#[async_trait]
impl FeedbackBackend for MockFeedbackBackend {
    async fn submit_feedback(&self, feedback: &FeedbackSubmission) -> Result<()> {
        lock(&self.submissions).push(feedback.clone());
        if self.fail {
            return Err(Error::Feedback("simulated feedback failure".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pictor_core::{ImageProvider, Theme};

    #[tokio::test]
    async fn test_search_mock_routes_by_text() {
        let backend = MockSearchBackend::new()
            .with_hits(hits(&[("default.svg", 0.5)]))
            .with_response("cat", hits(&[("cat1.svg", 0.9), ("cat2.svg", 0.8)]))
            .failing_for("dog");

        assert_eq!(backend.search("cat", 1).await.unwrap().len(), 1);
        assert_eq!(
            backend.search("bird", 5).await.unwrap()[0].image_path,
            "default.svg"
        );
        assert!(backend.search("dog", 5).await.is_err());
        assert_eq!(backend.call_count(), 3);
        assert_eq!(backend.get_calls()[0].top_k, 1);
    }

    #[tokio::test]
    async fn test_generation_mock_fails_first_n() {
        let backend = MockGenerationBackend::new().failing_first(1);
        let request = GenerationRequest {
            prompt: "cat".into(),
            theme: Theme::Cartoon,
            provider: ImageProvider::Recraft,
        };

        assert!(backend.generate(&request).await.is_err());
        let image = backend.generate(&request).await.unwrap();
        assert_eq!(image.resource_id, 10_000);
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_failure_rate_one_always_fails() {
        let backend = MockSearchBackend::new().with_failure_rate(1.0);
        assert!(backend.search("x", 1).await.is_err());
    }

    #[tokio::test]
    async fn test_feedback_mock_records_even_on_failure() {
        let backend = MockFeedbackBackend::new().failing();
        let submission = FeedbackSubmission {
            query_id: uuid::Uuid::nil(),
            prompt: "cat".into(),
            shown: vec![1, 2],
            chosen_id: 1,
        };
        assert!(backend.submit_feedback(&submission).await.is_err());
        assert_eq!(backend.submissions().len(), 1);
    }
}
