use compact_str::CompactString;
use dashmap::DashMap;
use filterdns_domain::{FilterResult, RecordType};
use rustc_hash::FxBuildHasher;

/// Composite lookup key: `(host, qtype, is_answer)` (spec §4.2).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    host: CompactString,
    qtype: RecordType,
    is_answer: bool,
}

/// A cached decision. `Negative` records "no match; do not recompute",
/// distinguished from a concrete `FilterResult` so callers don't need to
/// special-case `Option<FilterResult>` with a third hidden state.
#[derive(Clone)]
enum CacheEntry {
    Negative,
    Positive(FilterResult),
}

/// Bounded, concurrency-safe cache of `(host, qtype, is_answer) -> Result`
/// shared by every engine that needs one (spec §4.2). Eviction is an
/// approximate LRU backed by `DashMap` sharding rather than a strict single
/// global order — acceptable per spec's "approximate LRU" wording.
pub struct ResultCache {
    inner: DashMap<CacheKey, CacheEntry, FxBuildHasher>,
    capacity: usize,
}

/// What a cache lookup returned.
pub enum CacheLookup {
    Miss,
    Negative,
    Positive(FilterResult),
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: DashMap::with_hasher(FxBuildHasher),
            capacity,
        }
    }

    pub fn get(&self, host: &str, qtype: RecordType, is_answer: bool) -> CacheLookup {
        let key = CacheKey {
            host: CompactString::new(host),
            qtype,
            is_answer,
        };
        match self.inner.get(&key) {
            Some(entry) => match entry.value() {
                CacheEntry::Negative => CacheLookup::Negative,
                CacheEntry::Positive(r) => CacheLookup::Positive(r.clone()),
            },
            None => CacheLookup::Miss,
        }
    }

    pub fn set_negative(&self, host: &str, qtype: RecordType, is_answer: bool) {
        self.evict_if_full();
        self.inner.insert(
            CacheKey {
                host: CompactString::new(host),
                qtype,
                is_answer,
            },
            CacheEntry::Negative,
        );
    }

    pub fn set(&self, host: &str, qtype: RecordType, is_answer: bool, result: FilterResult) {
        self.evict_if_full();
        self.inner.insert(
            CacheKey {
                host: CompactString::new(host),
                qtype,
                is_answer,
            },
            CacheEntry::Positive(result),
        );
    }

    /// Must be called after every matcher/hash-storage refresh (spec §4.3,
    /// §4.5): a freshly compiled source invalidates previously cached
    /// decisions.
    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn item_count(&self) -> usize {
        self.inner.len()
    }

    /// Approximate LRU: when full, evict one arbitrary entry rather than
    /// maintaining a strict recency order across shards.
    fn evict_if_full(&self) {
        if self.inner.len() >= self.capacity {
            if let Some(key) = self.inner.iter().next().map(|e| e.key().clone()) {
                self.inner.remove(&key);
            }
        }
    }
}
