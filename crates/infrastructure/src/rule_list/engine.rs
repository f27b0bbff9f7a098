use super::matcher::{DnsResult, Matcher};
use super::parser::parse_text;
use super::types::{ClientConstraint, DomainPattern};
use crate::refreshable_source::RefreshableSource;
use crate::result_cache::ResultCache;
use arc_swap::ArcSwap;
use filterdns_domain::{FilterError, RuleText};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

static NEXT_LIST_ID: AtomicI64 = AtomicI64::new(1);

/// Compiles rule-list text into a `Matcher` and keeps it fresh (spec §4.3).
///
/// Grounded on the teacher's `ArcSwap<BlockIndex>` hot-swap in `engine.rs`:
/// readers dereference the swap with no locking; a single `Mutex` serializes
/// concurrent refreshes so two callers never race to replace the pointer.
pub struct RuleListEngine {
    list_id: i64,
    source: Option<RefreshableSource>,
    matcher: ArcSwap<Matcher>,
    refresh_lock: Mutex<()>,
    result_cache: Option<Arc<ResultCache>>,
}

impl RuleListEngine {
    /// Compiles `text` immediately with no backing `RefreshableSource` —
    /// used for the per-profile Custom Filter (spec §4.8), which is built
    /// from already-fetched text, not its own URL.
    pub fn from_text(text: &str, result_cache: Option<Arc<ResultCache>>) -> Self {
        let list_id = NEXT_LIST_ID.fetch_add(1, Ordering::Relaxed);
        let matcher = Matcher::compile(list_id, parse_text(text));
        Self {
            list_id,
            source: None,
            matcher: ArcSwap::from_pointee(matcher),
            refresh_lock: Mutex::new(()),
            result_cache,
        }
    }

    pub fn new(source: RefreshableSource, result_cache: Option<Arc<ResultCache>>) -> Self {
        let list_id = NEXT_LIST_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            list_id,
            source: Some(source),
            matcher: ArcSwap::from_pointee(Matcher::compile(list_id, Vec::new())),
            refresh_lock: Mutex::new(()),
            result_cache,
        }
    }

    pub fn list_id(&self) -> i64 {
        self.list_id
    }

    /// Fetches (or accepts stale) source text, recompiles the matcher under
    /// the refresh lock, atomically swaps it in, then clears the Result
    /// Cache — every step spec §4.3 and §4.2 require of a refresh.
    pub async fn refresh(&self, accept_stale: bool) -> Result<(), FilterError> {
        let Some(source) = &self.source else {
            return Ok(());
        };
        let _guard = self.refresh_lock.lock().await;
        let text = source.refresh(accept_stale).await?;
        let compiled = Matcher::compile(self.list_id, parse_text(&text));
        self.matcher.store(Arc::new(compiled));
        if let Some(cache) = &self.result_cache {
            cache.clear();
        }
        Ok(())
    }

    pub fn query(&self, client_ip: IpAddr, client_name: Option<&str>, host: &str) -> OwnedDnsResult {
        let guard = self.matcher.load();
        let result: DnsResult<'_> = guard.query(client_ip, client_name, host);
        OwnedDnsResult {
            network_rules: result
                .network_rules
                .iter()
                .map(|r| OwnedNetworkRule {
                    text: r.text.clone(),
                    is_allow: r.is_allow,
                    important: r.important,
                    rewrite: r.rewrite.clone(),
                    pattern: r.pattern.clone(),
                    client: r.client.clone(),
                })
                .collect(),
            host_rules_v4: result.host_rules_v4,
            host_rules_v6: result.host_rules_v6,
        }
    }

    /// Every `$badfilter` rule this list's current matcher holds, as a
    /// `(pattern, client)` cancellation target (spec §4.3/§9 "Cycles via ID
    /// remapping" neighbor note on matcher swaps). Unlike `query`, this is
    /// host-independent: a badfilter rule cancels by domain pattern and
    /// client constraint alone, so callers merging several lists (spec §8:
    /// `$badfilter` in list B cancels a matching rule in list A) need the
    /// full surviving set, not a per-host lookup.
    pub fn badfilter_targets(&self) -> Vec<(DomainPattern, Option<ClientConstraint>)> {
        self.matcher
            .load()
            .badfilters()
            .iter()
            .map(|r| (r.pattern.clone(), r.client.clone()))
            .collect()
    }

    pub fn rule_count(&self) -> usize {
        self.matcher.load().rule_count()
    }
}

/// One matched network rule, detached from the `Matcher` guard it was read
/// under (see `OwnedDnsResult`). Carries `pattern`/`client` alongside the
/// display `text` so a caller merging several lists can still recognize a
/// cross-list `$badfilter` target (spec §8).
pub struct OwnedNetworkRule {
    pub text: RuleText,
    pub is_allow: bool,
    pub important: bool,
    pub rewrite: Option<super::types::DnsRewrite>,
    pub pattern: DomainPattern,
    pub client: Option<ClientConstraint>,
}

/// `DnsResult` borrows from the `Matcher` guard, which can't outlive the
/// caller's stack frame once the guard is dropped under a hot swap; callers
/// across an `.await` point need an owned snapshot instead.
pub struct OwnedDnsResult {
    pub network_rules: Vec<OwnedNetworkRule>,
    pub host_rules_v4: Vec<(Ipv4Addr, RuleText)>,
    pub host_rules_v6: Vec<(Ipv6Addr, RuleText)>,
}

impl OwnedDnsResult {
    pub fn is_empty(&self) -> bool {
        self.network_rules.is_empty() && self.host_rules_v4.is_empty() && self.host_rules_v6.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn from_text_compiles_without_a_source() {
        let engine = RuleListEngine::from_text("||example.com^\n", None);
        let result = engine.query("1.1.1.1".parse().unwrap(), None, "example.com");
        assert_eq!(result.network_rules.len(), 1);
    }

    #[tokio::test]
    async fn refresh_without_source_is_a_noop() {
        let engine = RuleListEngine::from_text("||example.com^\n", None);
        engine.refresh(true).await.unwrap();
        let result = engine.query("1.1.1.1".parse().unwrap(), None, "example.com");
        assert_eq!(result.network_rules.len(), 1);
    }

    #[tokio::test]
    async fn refresh_clears_result_cache() {
        use filterdns_domain::{FilterListId, FilterResult, RecordType, RuleText as RT};

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.txt");
        std::fs::write(&path, "||example.com^\n").unwrap();

        let source = RefreshableSource::new(
            &path,
            "http://127.0.0.1:0/unreachable",
            std::time::Duration::from_secs(0),
            std::time::Duration::from_secs(1),
            1024,
            reqwest::Client::new(),
        );
        let cache = Arc::new(ResultCache::new(16));
        cache.set(
            "other.com",
            RecordType::A,
            false,
            FilterResult::Blocked {
                list: FilterListId::new("x").unwrap(),
                rule: RT::new("||other.com^").unwrap(),
            },
        );
        assert_eq!(cache.item_count(), 1);

        let engine = RuleListEngine::new(source, Some(cache.clone()));
        engine.refresh(true).await.unwrap();
        assert_eq!(cache.item_count(), 0);
    }
}
