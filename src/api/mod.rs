//! API Module
//!
//! HTTP handlers and routing for the cache monitoring API.
//!
//! # Endpoints
//! - `GET /cache-status` - Aggregated statistics of every registered cache
//! - `DELETE /cache-status` - Reset the metrics of every cache
//! - `DELETE /cache-status/:name` - Reset the metrics of one cache

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
