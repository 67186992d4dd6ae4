//! Error types for doc-intake
//!
//! This module provides error handling for the library, including:
//! - The top-level [`Error`] returned by coordinator and API operations
//! - [`ItemError`], the per-item failure recorded on a queue item (never propagated to the batch)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::{BatchId, ItemErrorKind};

/// Result type alias for doc-intake operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for doc-intake
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "extraction.endpoint")
        key: Option<String>,
    },

    /// Batch rejected before anything was enqueued
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A batch is still draining and the busy policy rejects new submissions
    #[error("batch {0} is still being processed")]
    BatchInProgress(BatchId),

    /// There is no draining batch to act on
    #[error("no batch is currently being processed")]
    NoActiveBatch,

    /// Shutdown in progress - not accepting new batches
    #[error("shutdown in progress: not accepting new batches")]
    ShuttingDown,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Batch-level validation failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The batch contained zero files with a recognized extension
    #[error("no supported files in batch (received {received}, allowed: {allowed})")]
    NoSupportedFiles {
        /// Number of inputs received
        received: usize,
        /// Comma-separated allow-list, for display
        allowed: String,
    },
}

/// Failure of a single item's extraction call.
///
/// Recorded on the queue item that produced it; it never aborts the batch.
#[derive(Debug, Error)]
pub enum ItemError {
    /// Network failure or non-success HTTP status
    #[error("transport error{}: {message}", status_suffix(.status))]
    Transport {
        /// HTTP status code, when the service answered
        status: Option<u16>,
        /// Failure description
        message: String,
        /// Whether the failure looks transient (connect failure, 5xx, 408, 429)
        transient: bool,
    },

    /// The service answered with success but the body could not be interpreted
    #[error("could not decode extraction response: {0}")]
    Decode(String),

    /// The extraction call did not settle within the configured timeout
    #[error("extraction call timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The source payload could not be read
    #[error("failed to read source file {path}: {source}")]
    Source {
        /// Path of the unreadable file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ItemError {
    /// Classification used on queue items and events.
    ///
    /// Timeouts and unreadable sources count as transport failures.
    pub fn kind(&self) -> ItemErrorKind {
        match self {
            ItemError::Decode(_) => ItemErrorKind::Decode,
            ItemError::Transport { .. } | ItemError::Timeout(_) | ItemError::Source { .. } => {
                ItemErrorKind::Transport
            }
        }
    }
}

impl From<reqwest::Error> for ItemError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return ItemError::Decode(e.to_string());
        }
        let status = e.status().map(|s| s.as_u16());
        let transient = e.is_timeout()
            || e.is_connect()
            || status.is_some_and(is_transient_status);
        ItemError::Transport {
            status,
            message: e.to_string(),
            transient,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

/// HTTP statuses worth retrying: 408, 429 and any 5xx.
pub(crate) fn is_transient_status(status: u16) -> bool {
    status == 408 || status == 429 || (500..600).contains(&status)
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "batch_in_progress",
///     "message": "batch 3 is still being processed",
///     "details": { "batch_id": 3 }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            Error::Config { .. } => 400,
            Error::Validation(_) => 400,

            Error::NoActiveBatch => 404,
            Error::BatchInProgress(_) => 409,

            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Serialization(_) => 500,
            Error::Other(_) => 500,

            Error::Network(_) => 502,

            Error::ShuttingDown => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation(ValidationError::NoSupportedFiles { .. }) => "no_supported_files",
            Error::BatchInProgress(_) => "batch_in_progress",
            Error::NoActiveBatch => "no_active_batch",
            Error::ShuttingDown => "shutting_down",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::BatchInProgress(id) => Some(serde_json::json!({ "batch_id": id })),
            Error::Validation(ValidationError::NoSupportedFiles { received, allowed }) => {
                Some(serde_json::json!({
                    "received": received,
                    "allowed": allowed,
                }))
            }
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({ "key": key })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
