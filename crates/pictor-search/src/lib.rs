//! # pictor-search
//!
//! Candidate retrieval and filtering for the pictor recommender.
//!
//! This crate provides:
//! - Dual-path (semantic + theme) concurrent search with path → id resolution
//! - Result fusion: dedup by storage path and weighted re-scoring
//! - Pluggable theme relevance scoring
//! - History-aware filtering with a multi-strategy degradation pipeline
//!
//! ## Example
//!
//! ```ignore
//! use pictor_search::{ResultFuser, SearchOrchestrator};
//!
//! let orchestrator = SearchOrchestrator::new(backend, resolver, ResultFuser::default());
//! let candidates = orchestrator.search(&cancel, &analysis, 8, Theme::Cartoon).await?;
//! ```

pub mod cancel;
pub mod degradation;
pub mod filter;
pub mod fusion;
pub mod orchestrator;
pub mod relevance;

pub use cancel::cancellable;
pub use degradation::{DegradationOutcome, DegradationPipeline};
pub use filter::{FilterConfig, FilterEngine, FilterOutcome, FilterScope};
pub use fusion::ResultFuser;
pub use orchestrator::SearchOrchestrator;
pub use relevance::{ConstantThemeRelevance, KeywordThemeRelevance, ThemeRelevance};
