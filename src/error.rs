/// Unified error types for fadepix
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the service
///
/// Access denials are deliberately absent: a denied request is a normal
/// outcome (`access::AccessOutcome::Denied`), not a fault.
#[derive(Error, Debug)]
pub enum PixError {
    /// Empty or otherwise unusable upload payload
    #[error("Invalid upload: {0}")]
    InvalidInput(String),

    /// Declared content type missing or not in the accepted set
    #[error("Unsupported content type: {0}")]
    UnsupportedType(String),

    /// Payload exceeds the configured size cap
    #[error("Upload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    /// The OS randomness source could not produce token bytes
    #[error("Entropy source unavailable: {0}")]
    Entropy(String),

    /// Blob store adapter fault
    #[error("Blob storage error: {0}")]
    BlobIo(String),

    /// Blob exceeds an adapter-enforced limit
    #[error("Blob of {size} bytes exceeds the adapter's {limit} byte limit")]
    BlobTooLarge { size: usize, limit: usize },

    /// No blob stored under the given reference
    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    /// The metadata index could not be reached
    #[error("Metadata index unavailable: {0}")]
    IndexUnavailable(String),

    /// Metadata index query fault
    #[error("Metadata index error: {0}")]
    IndexIo(#[from] sqlx::Error),

    /// Configuration errors surfaced at startup
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invariant violations (e.g. metadata pointing at a missing blob)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Wire error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert PixError to an HTTP response
impl IntoResponse for PixError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            PixError::InvalidInput(_) => {
                (StatusCode::BAD_REQUEST, "InvalidRequest", self.to_string())
            }
            PixError::UnsupportedType(_) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "UnsupportedMediaType",
                self.to_string(),
            ),
            PixError::TooLarge { .. } | PixError::BlobTooLarge { .. } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PayloadTooLarge",
                self.to_string(),
            ),
            PixError::BlobNotFound(_) => {
                (StatusCode::NOT_FOUND, "NotFound", self.to_string())
            }
            PixError::Entropy(_)
            | PixError::BlobIo(_)
            | PixError::IndexUnavailable(_)
            | PixError::IndexIo(_)
            | PixError::Config(_)
            | PixError::Io(_)
            | PixError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "InternalServerError",
                "Internal server error".to_string(), // Don't leak details
            ),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for service operations
pub type PixResult<T> = Result<T, PixError>;
