//! Background Tasks Module
//!
//! Contains background services that run periodically alongside the caches.
//!
//! # Tasks
//! - TTL Cleanup: sweeps expired cache entries at configured intervals
//! - Cleanup Manager: starts and stops the sweepers of many caches together

mod cleanup;
mod manager;

pub use cleanup::{
    CleanupCallback, CleanupOptions, CleanupService, CleanupableCache, ErrorCallback,
    DEFAULT_CLEANUP_INTERVAL,
};
pub use manager::CleanupManager;
