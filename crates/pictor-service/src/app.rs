//! Process wiring: builds every component once from [`ServiceConfig`] and
//! injects them.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use pictor_core::{
    FilterMetricsRepository, FilterPolicyRepository, HistoryRepository, ImageResolver, Result,
};
use pictor_db::{
    Database, InMemoryFilterMetricsRepository, InMemoryFilterPolicyRepository,
    InMemoryHistoryRepository, InMemoryImageCatalog,
};
use pictor_inference::{AlgorithmClient, HttpGenerationBackend, OpenAiClassifier, PromptAnalyzer};
use pictor_search::{FilterEngine, ResultFuser, SearchOrchestrator};

use crate::config::ServiceConfig;
use crate::feedback::FeedbackTracker;
use crate::generation::GenerationFallback;
use crate::recommend::RecommendationService;
use crate::services::side_effects::SideEffectSink;

struct Stores {
    history: Arc<dyn HistoryRepository>,
    policies: Arc<dyn FilterPolicyRepository>,
    metrics: Arc<dyn FilterMetricsRepository>,
    catalog: Arc<dyn ImageResolver>,
}

async fn open_stores(config: &ServiceConfig) -> Result<Stores> {
    match config.database_url {
        Some(ref url) => {
            let db = Database::connect(url, config.pool.clone()).await?;
            db.migrate().await?;
            Ok(Stores {
                history: Arc::new(db.history.clone()),
                policies: Arc::new(db.policies.clone()),
                metrics: Arc::new(db.metrics.clone()),
                catalog: Arc::new(db.catalog.clone()),
            })
        }
        None => {
            warn!(
                subsystem = "service",
                component = "app",
                "DATABASE_URL not set, history and filter policy are in-memory"
            );
            Ok(Stores {
                history: Arc::new(InMemoryHistoryRepository::new()),
                policies: Arc::new(InMemoryFilterPolicyRepository::new()),
                metrics: Arc::new(InMemoryFilterMetricsRepository::new()),
                catalog: Arc::new(InMemoryImageCatalog::new()),
            })
        }
    }
}

/// A running pictor instance.
pub struct Pictor {
    pub recommendations: RecommendationService,
    pub feedback: FeedbackTracker,
    pub algorithm: AlgorithmClient,
    side_effect_task: JoinHandle<()>,
}

impl Pictor {
    pub async fn start(config: ServiceConfig) -> Result<Self> {
        let stores = open_stores(&config).await?;
        let algorithm = AlgorithmClient::new(config.algorithm.clone())?;
        let cache = config.query_cache.connect().await;

        let (sink, receiver) = SideEffectSink::new(config.side_effect_capacity);
        let side_effect_task = receiver.spawn(stores.history.clone(), stores.metrics.clone());

        let analyzer = match config.classifier.api_key {
            Some(_) => PromptAnalyzer::new(Arc::new(OpenAiClassifier::new(
                config.classifier.clone(),
            )?))
            .with_timeout(config.classifier.timeout),
            None => {
                info!(
                    subsystem = "service",
                    component = "app",
                    "No classifier API key, prompts use default classification"
                );
                PromptAnalyzer::without_classifier()
            }
        };

        let orchestrator = SearchOrchestrator::new(
            Arc::new(algorithm.clone()),
            stores.catalog,
            ResultFuser::default(),
        );
        let filter = FilterEngine::new(
            config.filter.clone(),
            stores.history.clone(),
            stores.policies,
        );
        let generation = GenerationFallback::new(Arc::new(HttpGenerationBackend::new(
            config.generation.clone(),
        )?));

        let recommendations = RecommendationService::new(
            analyzer,
            orchestrator,
            filter,
            stores.history,
            cache.clone(),
            sink.clone(),
        )
        .with_generation(generation);
        let feedback =
            FeedbackTracker::new(cache, Arc::new(algorithm.clone())).with_side_effects(sink);

        info!(
            subsystem = "service",
            component = "app",
            algorithm_endpoint = %config.algorithm.endpoint,
            generation_endpoint = %config.generation.endpoint,
            filter_enabled = config.filter.enabled,
            "pictor started"
        );

        Ok(Self {
            recommendations,
            feedback,
            algorithm,
            side_effect_task,
        })
    }

    /// Drop the services and wait for queued side effects to be written.
    pub async fn shutdown(self) {
        let Self {
            recommendations,
            feedback,
            side_effect_task,
            ..
        } = self;
        drop(recommendations);
        drop(feedback);
        if let Err(e) = side_effect_task.await {
            warn!(
                subsystem = "service",
                component = "app",
                error = ?e,
                "Side-effect task panicked"
            );
        }
    }
}
