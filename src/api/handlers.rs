//! API Handlers
//!
//! HTTP request handlers for the cache status endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tracing::info;

use crate::cache::CacheRegistry;
use crate::error::{CacheError, Result};
use crate::models::{CacheStatusResponse, ResetResponse};

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Registry the status endpoints report on
    pub registry: Arc<CacheRegistry>,
}

impl AppState {
    pub fn new(registry: Arc<CacheRegistry>) -> Self {
        Self { registry }
    }
}

/// Handler for GET /cache-status
///
/// Returns the aggregated statistics of every registered cache.
pub async fn cache_status_handler(State(state): State<AppState>) -> Json<CacheStatusResponse> {
    Json(CacheStatusResponse::new(state.registry.stats()))
}

/// Handler for DELETE /cache-status
///
/// Resets hit/miss counters and response-time samples of every cache.
pub async fn reset_all_handler(State(state): State<AppState>) -> Json<ResetResponse> {
    state.registry.reset_all_metrics();
    info!("Reset metrics of all caches");
    Json(ResetResponse::all())
}

/// Handler for DELETE /cache-status/:name
pub async fn reset_cache_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ResetResponse>> {
    if !state.registry.reset_cache_metrics(&name) {
        return Err(CacheError::CacheNotFound(name));
    }
    info!(cache = %name, "Reset cache metrics");

    Ok(Json(ResetResponse::cache(&name)))
}
