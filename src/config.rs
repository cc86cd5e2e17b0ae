//! Engine configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Result, SearchError};

/// Browser-like identity sent with every request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Tunables for fetching, crawling, matching, caching and progress tracking.
///
/// Every field has a default, so a partial JSON document is a valid
/// configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Total attempts per fetch, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay for linear backoff between attempts, in milliseconds.
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,
    /// Response bodies are truncated at this many bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Skip TLS certificate validation. Off unless explicitly requested.
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Maximum number of fetches in flight for one run.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Number of pages searched per progress chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Pause between crawl levels, in milliseconds.
    #[serde(default = "default_level_pause")]
    pub level_pause_ms: u64,
    /// Characters of context captured on each side of a match.
    #[serde(default = "default_context_radius")]
    pub context_radius: usize,
    /// Maximum number of context snippets kept per page.
    #[serde(default = "default_max_snippets")]
    pub max_snippets: usize,
    /// Upper bound applied to the requested crawl depth.
    #[serde(default = "default_max_depth_cap")]
    pub max_depth_cap: usize,
    /// Upper bound applied to the requested page count.
    #[serde(default = "default_max_pages_cap")]
    pub max_pages_cap: usize,
    /// Lifetime of cached results in seconds.
    #[serde(default = "default_ttl")]
    pub cache_ttl_secs: u64,
    /// Lifetime of run progress records in seconds.
    #[serde(default = "default_ttl")]
    pub run_ttl_secs: u64,
    /// Interval of the background sweep in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Minimum gap between two submissions from the same caller, in milliseconds.
    #[serde(default = "default_rate_limit_cooldown")]
    pub rate_limit_cooldown_ms: u64,
    /// Interval between progress feed snapshots, in milliseconds.
    #[serde(default = "default_progress_interval")]
    pub progress_interval_ms: u64,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_request_timeout() -> u64 {
    5
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    500
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_max_concurrency() -> usize {
    10
}

fn default_chunk_size() -> usize {
    10
}

fn default_level_pause() -> u64 {
    100
}

fn default_context_radius() -> usize {
    50
}

fn default_max_snippets() -> usize {
    3
}

fn default_max_depth_cap() -> usize {
    10
}

fn default_max_pages_cap() -> usize {
    100
}

fn default_ttl() -> u64 {
    3600
}

fn default_sweep_interval() -> u64 {
    300
}

fn default_rate_limit_cooldown() -> u64 {
    1000
}

fn default_progress_interval() -> u64 {
    500
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay(),
            max_body_bytes: default_max_body_bytes(),
            accept_invalid_certs: false,
            max_concurrency: default_max_concurrency(),
            chunk_size: default_chunk_size(),
            level_pause_ms: default_level_pause(),
            context_radius: default_context_radius(),
            max_snippets: default_max_snippets(),
            max_depth_cap: default_max_depth_cap(),
            max_pages_cap: default_max_pages_cap(),
            cache_ttl_secs: default_ttl(),
            run_ttl_secs: default_ttl(),
            sweep_interval_secs: default_sweep_interval(),
            rate_limit_cooldown_ms: default_rate_limit_cooldown(),
            progress_interval_ms: default_progress_interval(),
        }
    }
}

impl SearchConfig {
    /// Parses a configuration from JSON, filling missing fields with defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| SearchError::Config(e.to_string()))
    }

    /// Reads a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| SearchError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&json)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn level_pause(&self) -> Duration {
        Duration::from_millis(self.level_pause_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn run_ttl(&self) -> Duration {
        Duration::from_secs(self.run_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_millis(self.rate_limit_cooldown_ms)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = SearchConfig::default();
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.context_radius, 50);
        assert_eq!(config.max_snippets, 3);
        assert_eq!(config.max_depth_cap, 10);
        assert_eq!(config.max_pages_cap, 100);
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.run_ttl(), Duration::from_secs(3600));
        assert_eq!(config.rate_limit_cooldown(), Duration::from_secs(1));
        assert_eq!(config.progress_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_config_verifies_tls_by_default() {
        assert!(!SearchConfig::default().accept_invalid_certs);
    }

    #[test]
    fn test_config_concurrency_distinct_from_chunk_size() {
        let config = SearchConfig::from_json_str(r#"{"max_concurrency":4,"chunk_size":25}"#).unwrap();
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.chunk_size, 25);
    }

    #[test]
    fn test_config_partial_json_takes_defaults() {
        let config = SearchConfig::from_json_str(r#"{"max_attempts":5,"accept_invalid_certs":true}"#)
            .unwrap();
        assert_eq!(config.max_attempts, 5);
        assert!(config.accept_invalid_certs);
        assert_eq!(config.retry_base_delay(), Duration::from_millis(500));
        assert_eq!(config.level_pause(), Duration::from_millis(100));
    }

    #[test]
    fn test_config_empty_json_equals_default() {
        let config = SearchConfig::from_json_str("{}").unwrap();
        assert_eq!(config.max_body_bytes, SearchConfig::default().max_body_bytes);
        assert_eq!(config.sweep_interval(), Duration::from_secs(300));
    }

    #[test]
    fn test_config_invalid_json() {
        let result = SearchConfig::from_json_str("{not json");
        assert!(matches!(result, Err(SearchError::Config(_))));
    }

    #[test]
    fn test_config_missing_file() {
        let result = SearchConfig::from_json_file("/definitely/not/here.json");
        assert!(matches!(result, Err(SearchError::Config(_))));
    }

    #[test]
    fn test_config_serialization_round_trip_keys() {
        let json = serde_json::to_string(&SearchConfig::default()).unwrap();
        assert!(json.contains("\"max_concurrency\":10"));
        assert!(json.contains("\"accept_invalid_certs\":false"));
    }
}
