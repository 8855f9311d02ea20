//! Search orchestration against mock backends.

use std::sync::Arc;

use pictor_core::{Error, PromptAnalysisContext, PromptClassification, Provenance, Theme};
use pictor_db::StaticImageCatalog;
use pictor_inference::mock::{hits, MockSearchBackend};
use pictor_search::{ConstantThemeRelevance, ResultFuser, SearchOrchestrator};
use tokio_util::sync::CancellationToken;

const SEMANTIC: &str = "a cat wearing a hat, cute cartoon style";
const THEMED: &str = "a cat wearing a hat; Requirements: cartoon";

fn catalog() -> Arc<StaticImageCatalog> {
    Arc::new(StaticImageCatalog::new(
        (1..=20).map(|i| (format!("img/{}.svg", i), i as i64)),
    ))
}

fn themed_analysis() -> PromptAnalysisContext {
    PromptAnalysisContext::new(
        "a cat wearing a hat".to_string(),
        Theme::Cartoon,
        PromptClassification::default(),
        THEMED.to_string(),
        SEMANTIC.to_string(),
    )
}

fn orchestrator(backend: &MockSearchBackend) -> SearchOrchestrator {
    SearchOrchestrator::new(
        Arc::new(backend.clone()),
        catalog(),
        ResultFuser::new(Arc::new(ConstantThemeRelevance(0.8))),
    )
}

#[tokio::test]
async fn test_no_theme_issues_single_semantic_call() {
    let backend = MockSearchBackend::new().with_response(
        "red car",
        hits(&[("img/1.svg", 0.9), ("img/2.svg", 0.8), ("img/3.svg", 0.7)]),
    );

    let results = orchestrator(&backend)
        .search(
            &CancellationToken::new(),
            &PromptAnalysisContext::literal("red car", Theme::None),
            5,
            Theme::None,
        )
        .await
        .unwrap();

    let calls = backend.get_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].text, "red car");
    assert_eq!(calls[0].top_k, 5);
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|c| c.provenance == Provenance::Search));
    // Single path keeps raw similarity.
    assert!((results[0].similarity - 0.9).abs() < 1e-6);
}

#[tokio::test]
async fn test_themed_search_splits_seventy_thirty() {
    let backend = MockSearchBackend::new()
        .with_response(SEMANTIC, hits(&[("img/1.svg", 0.9), ("img/2.svg", 0.6)]))
        .with_response(THEMED, hits(&[("img/3.svg", 0.8)]));

    orchestrator(&backend)
        .search(&CancellationToken::new(), &themed_analysis(), 10, Theme::Cartoon)
        .await
        .unwrap();

    let mut calls = backend.get_calls();
    calls.sort_by_key(|c| std::cmp::Reverse(c.top_k));
    assert_eq!(calls.len(), 2);
    assert_eq!((calls[0].text.as_str(), calls[0].top_k), (SEMANTIC, 7));
    assert_eq!((calls[1].text.as_str(), calls[1].top_k), (THEMED, 3));
}

#[tokio::test]
async fn test_fused_results_are_deduplicated_and_rescored() {
    let backend = MockSearchBackend::new()
        .with_response(SEMANTIC, hits(&[("img/1.svg", 0.5), ("img/2.svg", 0.9)]))
        .with_response(THEMED, hits(&[("img/2.svg", 0.95), ("img/4.svg", 0.7)]));

    let results = orchestrator(&backend)
        .search(&CancellationToken::new(), &themed_analysis(), 4, Theme::Cartoon)
        .await
        .unwrap();

    let ids: Vec<i64> = results.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![2, 4, 1]);
    // 0.7 * 0.9 + 0.3 * 0.8
    assert!((results[0].similarity - 0.87).abs() < 1e-5);
}

#[tokio::test]
async fn test_one_failed_path_returns_the_other() {
    let backend = MockSearchBackend::new()
        .with_response(SEMANTIC, hits(&[("img/1.svg", 0.9), ("img/2.svg", 0.8)]))
        .failing_for(THEMED);

    let results = orchestrator(&backend)
        .search(&CancellationToken::new(), &themed_analysis(), 4, Theme::Cartoon)
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(backend.call_count(), 2);
}

#[tokio::test]
async fn test_both_paths_failing_is_search_error() {
    let backend = MockSearchBackend::new().failing();

    let err = orchestrator(&backend)
        .search(&CancellationToken::new(), &themed_analysis(), 4, Theme::Cartoon)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Search(_)));
}

#[tokio::test]
async fn test_count_one_with_failed_theme_path_is_error() {
    let backend = MockSearchBackend::new().failing_for(THEMED);

    let err = orchestrator(&backend)
        .search(&CancellationToken::new(), &themed_analysis(), 1, Theme::Cartoon)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Search(_)));
    // Zero semantic share issues no call.
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn test_unresolved_paths_are_dropped() {
    let backend = MockSearchBackend::new().with_response(
        "red car",
        hits(&[("img/1.svg", 0.9), ("unknown/x.svg", 0.85), ("img/2.svg", 0.8)]),
    );

    let results = orchestrator(&backend)
        .search(
            &CancellationToken::new(),
            &PromptAnalysisContext::literal("red car", Theme::None),
            4,
            Theme::None,
        )
        .await
        .unwrap();

    let ids: Vec<i64> = results.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_aborts_in_flight_search() {
    let backend = MockSearchBackend::new()
        .with_hits(hits(&[("img/1.svg", 0.9)]))
        .with_latency_ms(60_000);
    let orchestrator = orchestrator(&backend);
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        canceller.cancel();
    });

    let err = orchestrator
        .search(&cancel, &themed_analysis(), 4, Theme::Cartoon)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}
