//! Error types for the vellum document engine.

use thiserror::Error;

/// Result type alias using vellum's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for vellum operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Document not found
    #[error("Document not found: {0}")]
    DocumentNotFound(uuid::Uuid),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Completion/inference failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Vectorization queue error
    #[error("Queue error: {0}")]
    Queue(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// Owner mismatch on a scoped resource
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
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
    use uuid::Uuid;

    #[test]
    fn test_error_display_document_not_found() {
        let id = Uuid::nil();
        let err = Error::DocumentNotFound(id);
        assert_eq!(err.to_string(), format!("Document not found: {}", id));
    }

    #[test]
    fn test_error_display_embedding() {
        let err = Error::Embedding("failed to generate".to_string());
        assert_eq!(err.to_string(), "Embedding error: failed to generate");
    }

    #[test]
    fn test_error_display_queue() {
        let err = Error::Queue("worker pool not running".to_string());
        assert_eq!(err.to_string(), "Queue error: worker pool not running");
    }

    #[test]
    fn test_error_display_unauthorized() {
        let err = Error::Unauthorized("owner mismatch".to_string());
        assert_eq!(err.to_string(), "Unauthorized: owner mismatch");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
