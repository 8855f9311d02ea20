//! # pictor-inference
//!
//! Network backends and prompt analysis for the pictor recommender.
//!
//! This crate provides:
//! - [`AlgorithmClient`]: semantic image search and feedback submission
//! - [`HttpGenerationBackend`]: AI image generation
//! - [`OpenAiClassifier`]: prompt classification over an OpenAI-compatible
//!   chat completions endpoint
//! - [`PromptAnalyzer`]: one classification per request, then every
//!   prompt variant the pipeline needs
//!
//! Test doubles for all backend traits live in [`mock`] behind the `mock`
//! feature.

pub mod algorithm;
pub mod analyzer;
pub mod classifier;
pub mod generation;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use algorithm::{AlgorithmClient, AlgorithmClientConfig};
pub use analyzer::PromptAnalyzer;
pub use classifier::{extract_keywords, ClassifierConfig, OpenAiClassifier};
pub use generation::{GenerationClientConfig, HttpGenerationBackend};

// Re-export core traits for convenience
pub use pictor_core::{FeedbackBackend, GenerationBackend, PromptClassifier, SearchBackend};
