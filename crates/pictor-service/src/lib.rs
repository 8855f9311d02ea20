//! # pictor-service
//!
//! The recommendation pipeline and everything around it:
//!
//! - [`RecommendationService`]: analyze, search, generate, filter, rank
//! - [`GenerationFallback`]: concurrent generation for short results
//! - [`FeedbackTracker`]: once-only feedback per query
//! - [`services`]: query cache and best-effort side channel
//! - [`Pictor`]: wiring from [`ServiceConfig`]

pub mod app;
pub mod config;
pub mod feedback;
pub mod generation;
pub mod recommend;
pub mod services;

pub use app::Pictor;
pub use config::ServiceConfig;
pub use feedback::FeedbackTracker;
pub use generation::{generated_score, GenerationFallback};
pub use recommend::RecommendationService;
