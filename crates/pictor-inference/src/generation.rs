//! HTTP image generation backend.
//!
//! `POST {endpoint}/v1/images/generate` with `{prompt, theme, provider}`,
//! answered by `{image_url, resource_id}`.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use pictor_core::defaults::{GENERATION_ENDPOINT, GENERATION_TIMEOUT_SECS};
use pictor_core::{Error, GeneratedImage, GenerationBackend, GenerationRequest, Result};

/// Generation service configuration.
///
/// | Env var | Default |
/// |---------|---------|
/// | `GENERATION_ENDPOINT` | `http://localhost:5001` |
/// | `GENERATION_TIMEOUT_SECS` | `60` |
/// | `GENERATION_API_KEY` | unset |
#[derive(Debug, Clone)]
pub struct GenerationClientConfig {
    pub endpoint: String,
    pub timeout: Duration,
    pub api_key: Option<String>,
}

impl Default for GenerationClientConfig {
    fn default() -> Self {
        Self {
            endpoint: GENERATION_ENDPOINT.to_string(),
            timeout: Duration::from_secs(GENERATION_TIMEOUT_SECS),
            api_key: None,
        }
    }
}

impl GenerationClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            endpoint: std::env::var("GENERATION_ENDPOINT").unwrap_or(defaults.endpoint),
            timeout: std::env::var("GENERATION_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            api_key: std::env::var("GENERATION_API_KEY")
                .ok()
                .filter(|k| !k.is_empty()),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default, alias = "kodo_url")]
    image_url: String,
    #[serde(alias = "ai_resource_id")]
    resource_id: Option<i64>,
}

/// Generation backend over HTTP.
#[derive(Clone)]
pub struct HttpGenerationBackend {
    config: GenerationClientConfig,
    client: reqwest::Client,
}

impl HttpGenerationBackend {
    pub fn new(config: GenerationClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(GenerationClientConfig::from_env())
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let start = Instant::now();
        let url = format!(
            "{}/v1/images/generate",
            self.config.endpoint.trim_end_matches('/')
        );

        let mut req = self.client.post(&url).json(request);
        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req
            .send()
            .await
            .map_err(|e| Error::Generation(format!("Generation request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Generation(format!(
                "Generation service returned {}: {}",
                status, body
            )));
        }

        let result: GenerateResponse = response.json().await.map_err(|e| {
            Error::Generation(format!("Failed to parse generation response: {}", e))
        })?;

        if result.image_url.is_empty() {
            return Err(Error::Generation(
                "Generation service returned no image URL".to_string(),
            ));
        }
        let resource_id = result.resource_id.ok_or_else(|| {
            Error::Generation("Generation service returned no resource id".to_string())
        })?;

        debug!(
            subsystem = "inference",
            component = "generation",
            op = "generate",
            provider = %request.provider,
            theme = %request.theme,
            resource_id,
            duration_ms = start.elapsed().as_millis() as u64,
            "Image generated"
        );

        Ok(GeneratedImage {
            image_url: result.image_url,
            resource_id,
        })
    }
}
