//! Client for the algorithm service (semantic search and feedback).
//!
//! Endpoints:
//! - `POST /v1/resource/search` `{text, top_k, threshold}` →
//!   `{query, results_count, results: [{image_path, similarity, rank}]}`
//! - `POST /v1/feedback/submit` `{query_id, query, recommended_pics, chosen_pic}`
//! - `GET /health`

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use pictor_core::defaults::{ALGORITHM_ENDPOINT, ALGORITHM_TIMEOUT_SECS, SEARCH_THRESHOLD};
use pictor_core::{
    Error, FeedbackBackend, FeedbackSubmission, Result, SearchBackend, SearchHit,
};

/// Algorithm service configuration.
///
/// | Env var | Default |
/// |---------|---------|
/// | `ALGORITHM_ENDPOINT` | `http://localhost:5000` |
/// | `ALGORITHM_TIMEOUT_SECS` | `30` |
/// | `ALGORITHM_SEARCH_THRESHOLD` | `0.2` |
#[derive(Debug, Clone)]
pub struct AlgorithmClientConfig {
    pub endpoint: String,
    pub timeout: Duration,
    pub threshold: f32,
}

impl Default for AlgorithmClientConfig {
    fn default() -> Self {
        Self {
            endpoint: ALGORITHM_ENDPOINT.to_string(),
            timeout: Duration::from_secs(ALGORITHM_TIMEOUT_SECS),
            threshold: SEARCH_THRESHOLD,
        }
    }
}

impl AlgorithmClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: std::env::var("ALGORITHM_ENDPOINT").unwrap_or(defaults.endpoint),
            timeout: std::env::var("ALGORITHM_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            threshold: std::env::var("ALGORITHM_SEARCH_THRESHOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.threshold),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    text: &'a str,
    top_k: usize,
    threshold: f32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Serialize)]
struct FeedbackRequest<'a> {
    query_id: String,
    query: &'a str,
    recommended_pics: &'a [i64],
    chosen_pic: i64,
}

/// HTTP client for the algorithm service.
#[derive(Clone)]
pub struct AlgorithmClient {
    config: AlgorithmClientConfig,
    client: reqwest::Client,
}

impl AlgorithmClient {
    pub fn new(config: AlgorithmClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(AlgorithmClientConfig::from_env())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    /// True if the service answers its health endpoint with a success status.
    pub async fn health_check(&self) -> Result<bool> {
        match self
            .client
            .get(self.url("/health"))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(e) => {
                warn!(
                    subsystem = "inference",
                    component = "algorithm",
                    error = %e,
                    "Algorithm service health check failed"
                );
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl SearchBackend for AlgorithmClient {
    async fn search(&self, text: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let start = Instant::now();
        let request = SearchRequest {
            text,
            top_k,
            threshold: self.config.threshold,
        };

        let response = self
            .client
            .post(self.url("/v1/resource/search"))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Search(format!("Search request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Search(format!(
                "Search service returned {}: {}",
                status, body
            )));
        }

        let result: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::Search(format!("Failed to parse search response: {}", e)))?;

        debug!(
            subsystem = "inference",
            component = "algorithm",
            op = "search",
            top_k,
            result_count = result.results.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Search backend responded"
        );
        Ok(result.results)
    }
}

#[async_trait]
impl FeedbackBackend for AlgorithmClient {
    async fn submit_feedback(&self, feedback: &FeedbackSubmission) -> Result<()> {
        let request = FeedbackRequest {
            query_id: feedback.query_id.to_string(),
            query: &feedback.prompt,
            recommended_pics: &feedback.shown,
            chosen_pic: feedback.chosen_id,
        };

        let response = self
            .client
            .post(self.url("/v1/feedback/submit"))
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Feedback(format!("Feedback request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Feedback(format!(
                "Feedback service returned {}: {}",
                status, body
            )));
        }

        debug!(
            subsystem = "inference",
            component = "algorithm",
            op = "submit_feedback",
            query_id = %feedback.query_id,
            "Feedback forwarded"
        );
        Ok(())
    }
}
