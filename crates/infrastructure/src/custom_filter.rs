use crate::rule_list::RuleListEngine;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Per-profile custom rule list, constructed lazily on first use and keyed
/// by `(profile_id, profile_updated_at)` so a newer profile edit invalidates
/// the cached engine without an explicit invalidation call (spec §4.8).
///
/// Grounded on the teacher's `GroupL0Cache` (`LruCache<_, _, FxBuildHasher>`
/// sized with `NonZeroUsize`) in `block_filter/engine.rs`; this cache is
/// shared rather than thread-local since compiling a `RuleListEngine` is far
/// more expensive than a group-id lookup and is worth sharing across threads.
pub struct CustomFilterCache {
    cache: Mutex<LruCache<(Arc<str>, i64), Arc<RuleListEngine>>>,
}

impl CustomFilterCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(capacity.max(1)).unwrap(),
            )),
        }
    }

    /// Returns the cached engine for this profile if its rules haven't
    /// changed since, otherwise joins `rules` with newlines and compiles a
    /// fresh one. The Result Cache is disabled for custom filters: per-client
    /// constraints (`$client=...`) make cross-request caching unsafe (§4.8).
    pub fn get_or_compile(
        &self,
        profile_id: impl Into<Arc<str>>,
        updated_at: i64,
        rules: &[String],
    ) -> Arc<RuleListEngine> {
        let key = (profile_id.into(), updated_at);
        let mut cache = self.cache.lock().unwrap();
        if let Some(engine) = cache.get(&key) {
            return engine.clone();
        }

        let text = rules.join("\n");
        let engine = Arc::new(RuleListEngine::from_text(&text, None));
        cache.put(key, engine.clone());
        engine
    }

    pub fn len(&self) -> usize {
        self.cache.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_compiled_engine_for_unchanged_profile() {
        let cache = CustomFilterCache::new(4);
        let rules = vec!["||example.com^".to_string()];
        let first = cache.get_or_compile("profile-1", 100, &rules);
        let second = cache.get_or_compile("profile-1", 100, &rules);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn newer_updated_at_invalidates_stale_entry() {
        let cache = CustomFilterCache::new(4);
        let first = cache.get_or_compile("profile-1", 100, &["||example.com^".to_string()]);
        let second = cache.get_or_compile("profile-1", 101, &["||other.com^".to_string()]);
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
