//! End-to-end pipeline tests over mock backends and in-memory stores.

use std::sync::Arc;

use futures::future::join_all;
use pictor_core::{
    Error, FeedbackState, Provenance, QueryCache, RecommendationRequest, Theme,
};
use pictor_db::{
    InMemoryFilterMetricsRepository, InMemoryFilterPolicyRepository, InMemoryHistoryRepository,
    StaticImageCatalog,
};
use pictor_inference::mock::{
    hits, MockClassifier, MockFeedbackBackend, MockGenerationBackend, MockSearchBackend,
};
use pictor_inference::PromptAnalyzer;
use pictor_search::{FilterConfig, FilterEngine, ResultFuser, SearchOrchestrator};
use pictor_service::services::{MemoryQueryCache, SideEffectSink};
use pictor_service::{FeedbackTracker, GenerationFallback, RecommendationService};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Harness {
    search: MockSearchBackend,
    generation: MockGenerationBackend,
    classifier: MockClassifier,
    feedback_backend: MockFeedbackBackend,
    history: InMemoryHistoryRepository,
    metrics: InMemoryFilterMetricsRepository,
    cache: MemoryQueryCache,
    service: RecommendationService,
    tracker: FeedbackTracker,
    drain: JoinHandle<()>,
}

impl Harness {
    fn new(search: MockSearchBackend) -> Self {
        Self::with_generation(search, MockGenerationBackend::new())
    }

    fn with_generation(search: MockSearchBackend, generation: MockGenerationBackend) -> Self {
        let classifier = MockClassifier::new();
        let feedback_backend = MockFeedbackBackend::new();
        let history = InMemoryHistoryRepository::new();
        let metrics = InMemoryFilterMetricsRepository::new();
        let cache = MemoryQueryCache::default();
        let catalog = StaticImageCatalog::new((1..=100).map(|i| (format!("img/{}.svg", i), i)));

        let (sink, receiver) = SideEffectSink::new(64);
        let drain = receiver.spawn(Arc::new(history.clone()), Arc::new(metrics.clone()));

        let service = RecommendationService::new(
            PromptAnalyzer::new(Arc::new(classifier.clone())),
            SearchOrchestrator::new(
                Arc::new(search.clone()),
                Arc::new(catalog),
                ResultFuser::default(),
            ),
            FilterEngine::new(
                FilterConfig::default(),
                Arc::new(history.clone()),
                Arc::new(InMemoryFilterPolicyRepository::new()),
            ),
            Arc::new(history.clone()),
            Arc::new(cache.clone()),
            sink.clone(),
        )
        .with_generation(GenerationFallback::new(Arc::new(generation.clone())));

        let tracker = FeedbackTracker::new(
            Arc::new(cache.clone()),
            Arc::new(feedback_backend.clone()),
        )
        .with_side_effects(sink);

        Self {
            search,
            generation,
            classifier,
            feedback_backend,
            history,
            metrics,
            cache,
            service,
            tracker,
            drain,
        }
    }

    /// Stop accepting side effects and wait until queued ones are written.
    async fn flush(self) -> (InMemoryHistoryRepository, InMemoryFilterMetricsRepository) {
        let Self {
            history,
            metrics,
            service,
            tracker,
            drain,
            ..
        } = self;
        drop(service);
        drop(tracker);
        drain.await.unwrap();
        (history, metrics)
    }
}

fn many_hits(n: usize) -> MockSearchBackend {
    let items: Vec<(String, f32)> = (1..=n)
        .map(|i| (format!("img/{}.svg", i), 0.95 - i as f32 * 0.005))
        .collect();
    let borrowed: Vec<(&str, f32)> = items.iter().map(|(p, s)| (p.as_str(), *s)).collect();
    MockSearchBackend::new().with_hits(hits(&borrowed))
}

#[tokio::test]
async fn test_short_search_is_filled_by_generation() {
    let search = MockSearchBackend::new()
        .with_response("red car", hits(&[("img/1.svg", 0.92), ("img/2.svg", 0.85)]));
    let h = Harness::new(search);

    let response = h
        .service
        .recommend(
            &CancellationToken::new(),
            RecommendationRequest::new("red car").with_count(4),
        )
        .await
        .unwrap();

    assert_eq!(h.generation.call_count(), 2);
    assert_eq!(response.results_count, 4);
    let provenance: Vec<Provenance> = response.results.iter().map(|c| c.provenance).collect();
    assert_eq!(
        provenance,
        vec![
            Provenance::Search,
            Provenance::Search,
            Provenance::Generated,
            Provenance::Generated
        ]
    );
    let ranks: Vec<u32> = response.results.iter().map(|c| c.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_no_theme_is_one_search_call_without_classification() {
    let h = Harness::new(many_hits(10));

    h.service
        .recommend(
            &CancellationToken::new(),
            RecommendationRequest::new("red car").with_count(5),
        )
        .await
        .unwrap();

    let calls = h.search.get_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].text, "red car");
    assert_eq!(calls[0].top_k, 5);
    assert_eq!(h.classifier.call_count(), 0);
}

#[tokio::test]
async fn test_themed_request_classifies_once_and_searches_twice() {
    let h = Harness::new(many_hits(20));

    let response = h
        .service
        .recommend(
            &CancellationToken::new(),
            RecommendationRequest::new("a cat wearing a hat")
                .with_count(10)
                .with_theme(Theme::Cartoon),
        )
        .await
        .unwrap();

    assert_eq!(h.classifier.call_count(), 1);
    assert_eq!(h.search.call_count(), 2);
    assert_eq!(response.results_count, 10);
}

#[tokio::test]
async fn test_ranks_are_contiguous_for_every_count() {
    let h = Harness::new(many_hits(60));
    let cancel = CancellationToken::new();

    for count in 1..=50 {
        let response = h
            .service
            .recommend(
                &cancel,
                RecommendationRequest::new("mountain lake")
                    .with_count(count)
                    .with_theme(Theme::Nature),
            )
            .await
            .unwrap();

        assert!(response.results.len() <= count);
        for (i, c) in response.results.iter().enumerate() {
            assert_eq!(c.rank, i as u32 + 1, "count {}", count);
        }
        let mut paths: Vec<&str> = response.results.iter().map(|c| c.path.as_str()).collect();
        paths.sort_unstable();
        paths.dedup();
        assert_eq!(paths.len(), response.results.len(), "duplicate path for count {}", count);
    }
}

#[tokio::test]
async fn test_search_only_never_generates() {
    let search = MockSearchBackend::new().with_hits(hits(&[("img/1.svg", 0.9)]));
    let h = Harness::new(search);

    let response = h
        .service
        .recommend(
            &CancellationToken::new(),
            RecommendationRequest::new("red car")
                .with_count(4)
                .search_only(true),
        )
        .await
        .unwrap();

    assert_eq!(response.results_count, 1);
    assert_eq!(h.generation.call_count(), 0);
}

#[tokio::test]
async fn test_partial_generation_failure_returns_fewer() {
    let search = MockSearchBackend::new().with_hits(hits(&[("img/1.svg", 0.9), ("img/2.svg", 0.8)]));
    let h = Harness::with_generation(search, MockGenerationBackend::new().failing_first(1));

    let response = h
        .service
        .recommend(
            &CancellationToken::new(),
            RecommendationRequest::new("red car").with_count(4),
        )
        .await
        .unwrap();

    assert_eq!(response.results_count, 3);
    let ranks: Vec<u32> = response.results.iter().map(|c| c.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_total_search_failure_surfaces() {
    let h = Harness::new(MockSearchBackend::new().failing());

    let err = h
        .service
        .recommend(
            &CancellationToken::new(),
            RecommendationRequest::new("red car").with_theme(Theme::Retro),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Search(_)));
    assert_eq!(h.generation.call_count(), 0);
}

#[tokio::test]
async fn test_invalid_requests_do_no_io() {
    let h = Harness::new(many_hits(10));
    let cancel = CancellationToken::new();

    let empty = h
        .service
        .recommend(&cancel, RecommendationRequest::new("   "))
        .await;
    let too_many = h
        .service
        .recommend(&cancel, RecommendationRequest::new("cat").with_count(51))
        .await;

    assert!(matches!(empty, Err(Error::InvalidInput(_))));
    assert!(matches!(too_many, Err(Error::InvalidInput(_))));
    assert_eq!(h.search.call_count(), 0);
}

#[tokio::test]
async fn test_default_count_is_four() {
    let h = Harness::new(many_hits(10));

    let response = h
        .service
        .recommend(&CancellationToken::new(), RecommendationRequest::new("red car"))
        .await
        .unwrap();

    assert_eq!(response.results_count, 4);
}

#[tokio::test]
async fn test_identified_user_is_filtered_and_recorded() {
    let h = Harness::new(many_hits(20));
    h.history
        .seed_shown(42, None, &[1, 2], chrono::Utc::now())
        .await;

    let response = h
        .service
        .recommend(
            &CancellationToken::new(),
            RecommendationRequest::new("red car")
                .with_count(4)
                .for_user(42, Some("sess-1".to_string())),
        )
        .await
        .unwrap();

    // Expanded search gives the filter headroom.
    assert_eq!(h.search.get_calls()[0].top_k, 8);
    let ids: Vec<i64> = response.results.iter().map(|c| c.id).collect();
    assert_eq!(ids.len(), 4);
    // Session scope: the earlier images were shown outside this session.
    assert_eq!(ids, vec![1, 2, 3, 4]);
    let metrics = response.filter_metrics.clone().unwrap();
    assert_eq!(metrics.total_candidates, 8);
    assert_eq!(metrics.final_result_count, 4);

    let query_id = response.query_id;
    let (history, metrics_repo) = h.flush().await;
    let recorded: Vec<_> = history
        .entries()
        .await
        .into_iter()
        .filter(|e| e.query_id == query_id)
        .collect();
    assert_eq!(recorded.len(), 4);
    assert!(recorded.iter().all(|e| e.session_id.as_deref() == Some("sess-1")));
    assert_eq!(metrics_repo.records().await.len(), 1);
}

#[tokio::test]
async fn test_history_filter_without_session() {
    let h = Harness::new(many_hits(20));
    h.history
        .seed_shown(42, None, &[1, 2], chrono::Utc::now())
        .await;

    let response = h
        .service
        .recommend(
            &CancellationToken::new(),
            RecommendationRequest::new("red car")
                .with_count(4)
                .for_user(42, None),
        )
        .await
        .unwrap();

    let ids: Vec<i64> = response.results.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![3, 4, 5, 6]);
}

#[tokio::test]
async fn test_anonymous_request_is_cached_but_not_recorded() {
    let h = Harness::new(many_hits(10));

    let response = h
        .service
        .recommend(
            &CancellationToken::new(),
            RecommendationRequest::new("red car").with_count(3),
        )
        .await
        .unwrap();

    let record = h.cache.get(response.query_id).await.unwrap().unwrap();
    assert_eq!(record.shown, vec![1, 2, 3]);
    assert!(response.filter_metrics.is_none());

    let (history, _) = h.flush().await;
    assert!(history.entries().await.is_empty());
}

#[tokio::test]
async fn test_feedback_round_trip_marks_history() {
    let h = Harness::new(many_hits(10));

    let response = h
        .service
        .recommend(
            &CancellationToken::new(),
            RecommendationRequest::new("red car")
                .with_count(3)
                .for_user(9, None),
        )
        .await
        .unwrap();
    let chosen = response.results[1].id;

    h.tracker
        .submit_feedback(response.query_id, chosen)
        .await
        .unwrap();
    assert_eq!(
        h.cache.feedback_state(response.query_id).await.unwrap(),
        FeedbackState::Submitted { chosen_id: chosen }
    );
    let sent = h.feedback_backend.submissions();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].shown, vec![1, 2, 3]);

    let query_id = response.query_id;
    let (history, _) = h.flush().await;
    let chosen_rows: Vec<_> = history
        .entries()
        .await
        .into_iter()
        .filter(|e| e.query_id == query_id && e.chosen)
        .collect();
    assert_eq!(chosen_rows.len(), 1);
    assert_eq!(chosen_rows[0].image_id, chosen);
}

#[tokio::test]
async fn test_concurrent_feedback_accepts_exactly_one() {
    let h = Harness::new(many_hits(10));

    let response = h
        .service
        .recommend(
            &CancellationToken::new(),
            RecommendationRequest::new("red car").with_count(4),
        )
        .await
        .unwrap();
    let query_id = response.query_id;

    let attempts = response
        .results
        .iter()
        .cycle()
        .take(8)
        .map(|c| {
            let tracker = h.tracker.clone();
            let image_id = c.id;
            tokio::spawn(async move { tracker.submit_feedback(query_id, image_id).await })
        });
    let outcomes: Vec<_> = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(outcomes
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, Error::FeedbackAlreadySubmitted(q) if *q == query_id)));
    assert_eq!(h.feedback_backend.submissions().len(), 1);
}

#[tokio::test]
async fn test_cancelled_request_returns_cancelled() {
    let h = Harness::new(many_hits(10).with_latency_ms(50));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = h
        .service
        .recommend(&cancel, RecommendationRequest::new("red car"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn test_themed_feedback_forwards_optimized_prompt() {
    let h = Harness::new(many_hits(10));
    let raw = "a cat wearing a hat";

    let response = h
        .service
        .recommend(
            &CancellationToken::new(),
            RecommendationRequest::new(raw)
                .with_count(3)
                .with_theme(Theme::Cartoon)
                .for_user(9, None),
        )
        .await
        .unwrap();
    assert_ne!(response.query, raw);
    assert!(response.query.contains(raw));

    let record = h.cache.get(response.query_id).await.unwrap().unwrap();
    assert_eq!(record.prompt, response.query);

    h.tracker
        .submit_feedback(response.query_id, response.results[0].id)
        .await
        .unwrap();
    let sent = h.feedback_backend.submissions();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].prompt, response.query);

    let query_id = response.query_id;
    let expected = response.query.clone();
    let (history, _) = h.flush().await;
    assert!(history
        .entries()
        .await
        .iter()
        .filter(|e| e.query_id == query_id)
        .all(|e| e.query == expected));
}
