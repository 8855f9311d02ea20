//! # pictor-core
//!
//! Core types, traits, and abstractions for the pictor image recommender.
//!
//! This crate provides the domain model shared by every stage of the
//! recommendation pipeline (prompt analysis, search, fusion, generation,
//! filtering, feedback) together with the capability traits that the
//! storage, search and inference crates implement.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod theme;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use theme::{Complexity, ContentType, ImageProvider, Theme};
pub use traits::*;
