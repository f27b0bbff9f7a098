use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sizes and TTLs for the various in-memory caches (spec §6).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_rule_list_cache_size")]
    pub rule_list_cache_size: usize,

    #[serde(default = "default_safe_search_cache_size")]
    pub safe_search_cache_size: usize,

    #[serde(default = "default_safe_search_cache_ttl")]
    pub safe_search_cache_ttl_secs: u64,

    #[serde(default = "default_custom_filter_cache_size")]
    pub custom_filter_cache_size: usize,

    #[serde(default = "default_use_rule_list_cache")]
    pub use_rule_list_cache: bool,
}

impl CacheConfig {
    pub fn safe_search_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.safe_search_cache_ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            rule_list_cache_size: default_rule_list_cache_size(),
            safe_search_cache_size: default_safe_search_cache_size(),
            safe_search_cache_ttl_secs: default_safe_search_cache_ttl(),
            custom_filter_cache_size: default_custom_filter_cache_size(),
            use_rule_list_cache: default_use_rule_list_cache(),
        }
    }
}

fn default_rule_list_cache_size() -> usize {
    10_000
}

fn default_safe_search_cache_size() -> usize {
    1_000
}

fn default_safe_search_cache_ttl() -> u64 {
    3600
}

fn default_custom_filter_cache_size() -> usize {
    256
}

fn default_use_rule_list_cache() -> bool {
    true
}
