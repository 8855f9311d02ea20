//! Prompt classification over an OpenAI-compatible chat completions API.
//!
//! The model is asked for a JSON object `{type, emotion, complexity,
//! keywords}`. Unrecognised values fall back to defaults; a response that is
//! not JSON at all is an error, which the analyzer absorbs.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use pictor_core::defaults::{
    CLASSIFIER_BASE_URL, CLASSIFIER_MODEL, CLASSIFIER_TIMEOUT_SECS, MAX_KEYWORDS,
};
use pictor_core::theme::{Complexity, ContentType};
use pictor_core::{Error, PromptClassification, PromptClassifier, Result};

const SYSTEM_PROMPT: &str = "You classify image requests. Reply with a single JSON object and \
nothing else: {\"type\": one of animal|object|scene|character|nature|building|food|vehicle|abstract|default, \
\"emotion\": one word, \"complexity\": one of simple|medium|complex, \
\"keywords\": up to 5 short keywords}.";

/// Classifier configuration.
///
/// | Env var | Default |
/// |---------|---------|
/// | `CLASSIFIER_BASE_URL` | `https://api.openai.com/v1` |
/// | `CLASSIFIER_API_KEY` | unset (falls back to `OPENAI_API_KEY`) |
/// | `CLASSIFIER_MODEL` | `gpt-4o-mini` |
/// | `CLASSIFIER_TIMEOUT_SECS` | `10` |
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: CLASSIFIER_BASE_URL.to_string(),
            api_key: None,
            model: CLASSIFIER_MODEL.to_string(),
            timeout: Duration::from_secs(CLASSIFIER_TIMEOUT_SECS),
        }
    }
}

impl ClassifierConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("CLASSIFIER_BASE_URL").unwrap_or(defaults.base_url),
            api_key: std::env::var("CLASSIFIER_API_KEY")
                .or_else(|_| std::env::var("OPENAI_API_KEY"))
                .ok()
                .filter(|k| !k.is_empty()),
            model: std::env::var("CLASSIFIER_MODEL").unwrap_or(defaults.model),
            timeout: std::env::var("CLASSIFIER_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Loosely-typed model output before normalisation.
#[derive(Debug, Default, Deserialize)]
struct RawClassification {
    #[serde(default, rename = "type")]
    content_type: String,
    #[serde(default)]
    emotion: String,
    #[serde(default)]
    complexity: String,
    #[serde(default)]
    keywords: Vec<String>,
}

/// Parse the model's reply into a classification.
///
/// Accepts bare JSON or JSON wrapped in a Markdown code fence.
pub fn parse_classification(content: &str, prompt: &str) -> Result<PromptClassification> {
    let trimmed = content.trim();
    let json = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    let raw: RawClassification = serde_json::from_str(json)
        .map_err(|e| Error::Inference(format!("Classifier returned invalid JSON: {}", e)))?;

    let emotion = raw.emotion.trim();
    let mut keywords: Vec<String> = raw
        .keywords
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .take(MAX_KEYWORDS)
        .collect();
    if keywords.is_empty() {
        keywords = extract_keywords(prompt);
    }

    Ok(PromptClassification {
        content_type: ContentType::parse_lenient(&raw.content_type),
        emotion: if emotion.is_empty() {
            "neutral".to_string()
        } else {
            emotion.to_lowercase()
        },
        complexity: Complexity::parse_lenient(&raw.complexity),
        keywords,
    })
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "of", "and", "or", "with", "in", "on", "at", "to", "for", "is", "are",
    "some", "my", "me", "please", "image", "picture",
];

/// Local keyword extraction used when the model gives none.
///
/// Splits on whitespace and punctuation, drops stop words and duplicates,
/// keeps at most five.
pub fn extract_keywords(prompt: &str) -> Vec<String> {
    let mut keywords: Vec<String> = Vec::new();
    let is_separator = |c: char| {
        c.is_whitespace() || (c.is_ascii_punctuation() && c != '-') || "，。；：！？、".contains(c)
    };
    for word in prompt
        .split(is_separator)
        .map(|w| w.trim().to_lowercase())
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(&w.as_str()))
    {
        if !keywords.contains(&word) {
            keywords.push(word);
        }
        if keywords.len() == MAX_KEYWORDS {
            break;
        }
    }
    keywords
}

/// Prompt classifier backed by a chat completions endpoint.
#[derive(Clone)]
pub struct OpenAiClassifier {
    config: ClassifierConfig,
    client: reqwest::Client,
}

impl OpenAiClassifier {
    pub fn new(config: ClassifierConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    /// Create from environment variables.
    /// Returns None if no API key is configured.
    pub fn from_env() -> Result<Option<Self>> {
        let config = ClassifierConfig::from_env();
        if config.api_key.is_none() {
            return Ok(None);
        }
        Self::new(config).map(Some)
    }

    pub fn model_name(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl PromptClassifier for OpenAiClassifier {
    async fn classify(&self, prompt: &str) -> Result<PromptClassification> {
        let start = Instant::now();
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.0,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let mut req = self.client.post(&url).json(&request);
        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        let response = req
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Classifier request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "Classifier API returned {}: {}",
                status, body
            )));
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            Error::Inference(format!("Failed to parse classifier response: {}", e))
        })?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Inference("Classifier returned no content".to_string()))?;

        let classification = parse_classification(&content, prompt)?;

        debug!(
            subsystem = "inference",
            component = "classifier",
            op = "classify",
            model = %self.config.model,
            content_type = ?classification.content_type,
            complexity = ?classification.complexity,
            duration_ms = start.elapsed().as_millis() as u64,
            "Prompt classified"
        );
        Ok(classification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_classification_plain_json() {
        let c = parse_classification(
            r#"{"type":"animal","emotion":"Happy","complexity":"medium","keywords":["cat"]}"#,
            "a happy cat",
        )
        .unwrap();
        assert_eq!(c.content_type, ContentType::Animal);
        assert_eq!(c.emotion, "happy");
        assert_eq!(c.complexity, Complexity::Medium);
        assert_eq!(c.keywords, vec!["cat"]);
    }

    #[test]
    fn test_parse_classification_code_fence() {
        let c = parse_classification(
            "```json\n{\"type\":\"vehicle\",\"emotion\":\"calm\",\"complexity\":\"complex\"}\n```",
            "red car on a road",
        )
        .unwrap();
        assert_eq!(c.content_type, ContentType::Vehicle);
        assert_eq!(c.keywords, vec!["red", "car", "road"]);
    }

    #[test]
    fn test_parse_classification_unknown_values_default() {
        let c = parse_classification(r#"{"type":"spaceship","complexity":"extreme"}"#, "x")
            .unwrap();
        assert_eq!(c.content_type, ContentType::Default);
        assert_eq!(c.complexity, Complexity::Simple);
        assert_eq!(c.emotion, "neutral");
    }

    #[test]
    fn test_parse_classification_rejects_prose() {
        let err = parse_classification("It is probably an animal.", "x").unwrap_err();
        assert!(matches!(err, Error::Inference(_)));
    }

    #[test]
    fn test_extract_keywords_drops_stop_words_and_dupes() {
        let keywords = extract_keywords("A cat and a cat, sitting on the mat!");
        assert_eq!(keywords, vec!["cat", "sitting", "mat"]);
    }

    #[test]
    fn test_extract_keywords_caps_count() {
        let keywords = extract_keywords("one two three four five six seven");
        assert_eq!(keywords.len(), MAX_KEYWORDS);
    }

    #[test]
    fn test_extract_keywords_keeps_hyphenated() {
        assert_eq!(extract_keywords("sci-fi city"), vec!["sci-fi", "city"]);
    }
}
