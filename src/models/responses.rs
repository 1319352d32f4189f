//! Response DTOs for the cache status API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::RegistryStats;

/// Response body for GET /cache-status
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatusResponse {
    pub success: bool,
    pub data: CacheStatusData,
}

/// Registry statistics stamped with the time they were taken.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatusData {
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    #[serde(flatten)]
    pub stats: RegistryStats,
}

impl CacheStatusResponse {
    /// Wraps a stats snapshot taken now
    pub fn new(stats: RegistryStats) -> Self {
        Self {
            success: true,
            data: CacheStatusData {
                timestamp: chrono::Utc::now().to_rfc3339(),
                stats,
            },
        }
    }
}

/// Response body for the reset endpoints (DELETE /cache-status[/:name])
#[derive(Debug, Clone, Serialize)]
pub struct ResetResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: String,
}

impl ResetResponse {
    pub fn all() -> Self {
        Self::with_message("All cache metrics have been reset")
    }

    pub fn cache(name: &str) -> Self {
        Self::with_message(format!("Metrics for cache '{}' have been reset", name))
    }

    fn with_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}
