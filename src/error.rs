//! Error types for the caching and coordination layer
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for caches, the registry and the cleanup service.
///
/// A missing or expired key is not an error: stores report it as `None`.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// No cache is registered under the given name
    #[error("Cache not found: {0}")]
    CacheNotFound(String),

    /// A bulk cleanup sweep failed
    #[error("Cleanup failed: {0}")]
    Cleanup(String),
}

// == Queue Error Enum ==
/// Failures of the coordination infrastructure behind distributed single-flight.
///
/// These never reach callers of the coordinator; they trigger direct execution.
#[derive(Error, Debug)]
pub enum QueueError {
    /// No queue is configured, or the queue stopped accepting jobs
    #[error("Queue unavailable: {0}")]
    Unavailable(String),

    /// The queue has no worker registered under this name
    #[error("Unknown queue: {0}")]
    UnknownQueue(String),

    /// The completion event could not be observed
    #[error("Awaiting job completion failed: {0}")]
    Await(String),

    /// Arguments or results could not be converted to JSON
    #[error("Job payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::CacheNotFound(_) => StatusCode::NOT_FOUND,
            CacheError::Cleanup(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache layer.
pub type Result<T> = std::result::Result<T, CacheError>;
