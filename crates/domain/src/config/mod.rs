//! Configuration types for the filtering core.
//!
//! Loading (file discovery, env overlay, CLI flags) is an external
//! collaborator per spec §1; this module only defines the shapes, following
//! the teacher's one-struct-per-concern convention.

pub mod cache;
pub mod refresh;
pub mod sources;

pub use cache::CacheConfig;
pub use refresh::RefreshConfig;
pub use sources::{HashListSource, SourceUrls};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for the filtering core.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilteringConfig {
    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    pub sources: SourceUrls,

    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("/var/cache/filterdns")
}
