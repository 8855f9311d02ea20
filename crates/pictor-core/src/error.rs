//! Error types for pictor.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias using pictor's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for pictor operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Request rejected before any I/O
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Every search path failed
    #[error("Search error: {0}")]
    Search(String),

    /// Image generation failed
    #[error("Generation error: {0}")]
    Generation(String),

    /// Classifier or other model call failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Query cache unavailable or inconsistent
    #[error("Cache error: {0}")]
    Cache(String),

    /// Caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// Feedback referenced a query the cache does not know (expired or never issued)
    #[error("Recommendation not found: {0}")]
    QueryNotFound(Uuid),

    /// Chosen image was not part of the recommended set
    #[error("Image {image_id} is not in the recommended set for query {query_id}")]
    NotInRecommendedSet { query_id: Uuid, image_id: i64 },

    /// Feedback for the query has already been recorded
    #[error("Feedback already submitted for query {0}")]
    FeedbackAlreadySubmitted(Uuid),

    /// Forwarding feedback to the learning backend failed
    #[error("Feedback error: {0}")]
    Feedback(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors caused by the request itself, where retrying the
    /// same call cannot succeed.
    pub fn is_policy_violation(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_)
                | Error::QueryNotFound(_)
                | Error::NotInRecommendedSet { .. }
                | Error::FeedbackAlreadySubmitted(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_input() {
        let err = Error::InvalidInput("prompt is empty".to_string());
        assert_eq!(err.to_string(), "Invalid input: prompt is empty");
    }

    #[test]
    fn test_error_display_search() {
        let err = Error::Search("both search paths failed".to_string());
        assert_eq!(err.to_string(), "Search error: both search paths failed");
    }

    #[test]
    fn test_error_display_cancelled() {
        assert_eq!(Error::Cancelled.to_string(), "Operation cancelled");
    }

    #[test]
    fn test_error_display_query_not_found() {
        let id = Uuid::nil();
        let err = Error::QueryNotFound(id);
        assert_eq!(err.to_string(), format!("Recommendation not found: {}", id));
    }

    #[test]
    fn test_error_display_not_in_recommended_set() {
        let id = Uuid::nil();
        let err = Error::NotInRecommendedSet {
            query_id: id,
            image_id: 42,
        };
        assert_eq!(
            err.to_string(),
            format!("Image 42 is not in the recommended set for query {}", id)
        );
    }

    #[test]
    fn test_error_display_feedback_already_submitted() {
        let id = Uuid::nil();
        let err = Error::FeedbackAlreadySubmitted(id);
        assert_eq!(
            err.to_string(),
            format!("Feedback already submitted for query {}", id)
        );
    }

    #[test]
    fn test_policy_violations() {
        assert!(Error::InvalidInput("x".into()).is_policy_violation());
        assert!(Error::FeedbackAlreadySubmitted(Uuid::nil()).is_policy_violation());
        assert!(Error::QueryNotFound(Uuid::nil()).is_policy_violation());
        assert!(!Error::Search("x".into()).is_policy_violation());
        assert!(!Error::Feedback("x".into()).is_policy_violation());
        assert!(!Error::Cancelled.is_policy_violation());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
