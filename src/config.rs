//! Configuration Module
//!
//! Handles loading cache and server configuration from environment variables.

use std::env;
use std::time::Duration;

/// Cache layer and status server configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Time-to-live in milliseconds for entries of the default cache
    pub cache_ttl_ms: u64,
    /// Background cleanup sweep period in milliseconds
    pub cleanup_interval_ms: u64,
    /// Number of response-time samples kept per cache
    pub response_time_window: usize,
    /// HTTP status server port
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TTL_MS` - Entry time-to-live in milliseconds (default: 60000)
    /// - `CLEANUP_INTERVAL_MS` - Cleanup period in milliseconds (default: 2000)
    /// - `RESPONSE_TIME_WINDOW` - Response-time samples per cache (default: 100)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_ttl_ms: parse_var("CACHE_TTL_MS").unwrap_or(defaults.cache_ttl_ms),
            cleanup_interval_ms: parse_var("CLEANUP_INTERVAL_MS")
                .unwrap_or(defaults.cleanup_interval_ms),
            response_time_window: parse_var("RESPONSE_TIME_WINDOW")
                .unwrap_or(defaults.response_time_window),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
        }
    }

    /// Entry time-to-live as a `Duration`.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Cleanup period as a `Duration`. Zero is raised to one millisecond.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_ttl_ms: 60_000,
            cleanup_interval_ms: 2_000,
            response_time_window: 100,
            server_port: 3000,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.cache_ttl_ms, 60_000);
        assert_eq!(config.cleanup_interval_ms, 2_000);
        assert_eq!(config.response_time_window, 100);
        assert_eq!(config.server_port, 3000);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("CACHE_TTL_MS");
        env::remove_var("CLEANUP_INTERVAL_MS");
        env::remove_var("RESPONSE_TIME_WINDOW");
        env::remove_var("SERVER_PORT");

        let config = Config::from_env();
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.cleanup_interval(), Duration::from_secs(2));
        assert_eq!(config.response_time_window, 100);
        assert_eq!(config.server_port, 3000);
    }

    #[test]
    fn test_zero_cleanup_interval_is_clamped() {
        let config = Config {
            cleanup_interval_ms: 0,
            ..Config::default()
        };
        assert_eq!(config.cleanup_interval(), Duration::from_millis(1));
    }
}
