use crate::hash_storage::HashStorage;
use crate::result_cache::{CacheLookup, ResultCache};
use filterdns_application::ports::{AddressFamily, Resolver};
use filterdns_application::RequestContext;
use filterdns_domain::{FilterListId, FilterResult, RecordType, RuleText};
use std::sync::Arc;
use std::time::Duration;

const RESOLVER_TIMEOUT: Duration = Duration::from_secs(1);
/// Candidate generation is capped at the 4 most specific labels (spec §4.5
/// point 2) so a pathologically long hostname can't make one lookup expand
/// into an unbounded number of hash checks.
const MAX_CANDIDATES: usize = 4;

/// Wraps a `HashStorage` and a replacement hostname: on a hash match,
/// resolves the replacement and rewrites the response (spec §4.5).
pub struct HashPrefixFilter {
    storage: Arc<HashStorage>,
    replacement_host: String,
    list_id: FilterListId,
    resolver: Arc<dyn Resolver>,
    result_cache: Arc<ResultCache>,
}

impl HashPrefixFilter {
    pub fn new(
        storage: Arc<HashStorage>,
        replacement_host: impl Into<String>,
        list_id: FilterListId,
        resolver: Arc<dyn Resolver>,
        result_cache: Arc<ResultCache>,
    ) -> Self {
        Self {
            storage,
            replacement_host: replacement_host.into(),
            list_id,
            resolver,
            result_cache,
        }
    }

    pub async fn filter_request(&self, ctx: &RequestContext) -> Option<FilterResult> {
        if !ctx.qtype.is_address() {
            return None;
        }

        match self.result_cache.get(&ctx.host, ctx.qtype, ctx.is_answer) {
            CacheLookup::Positive(r) => return Some(r),
            CacheLookup::Negative => return None,
            CacheLookup::Miss => {}
        }

        let matched_candidate = hashable_subdomains(&ctx.host)
            .into_iter()
            .find(|candidate| self.storage.matches(candidate));

        let Some(matched) = matched_candidate else {
            self.result_cache.set_negative(&ctx.host, ctx.qtype, ctx.is_answer);
            return None;
        };

        let family = match ctx.qtype {
            RecordType::A => AddressFamily::V4,
            RecordType::AAAA => AddressFamily::V6,
            _ => unreachable!("qtype already checked to be A/AAAA"),
        };

        let rule = RuleText::new(&matched).unwrap_or_else(|_| RuleText::new("hash-prefix-match").unwrap());
        let resolved = tokio::time::timeout(
            RESOLVER_TIMEOUT,
            self.resolver.lookup_ip(family, &self.replacement_host),
        )
        .await;

        let msg = match resolved {
            Ok(Ok(ips)) if !ips.is_empty() => {
                ctx.msg_builder.new_ip_resp_msg(&ctx.request, &ips, ctx.ttl_secs())
            }
            _ => ctx.msg_builder.new_msg_servfail(&ctx.request),
        };

        let result = FilterResult::ModifiedResponse {
            msg,
            list: self.list_id.clone(),
            rule,
        };

        self.result_cache
            .set(&ctx.host, ctx.qtype, ctx.is_answer, result.clone());
        Some(result)
    }
}

/// "Hashable subdomains" per spec §4.5 point 2: every proper subdomain of
/// `host` down to (but not including) its public ICANN suffix, most specific
/// first, capped at `MAX_CANDIDATES` entries. Hosts with no recognized
/// ICANN suffix (private namespaces) enumerate the same way with no
/// suffix-based cutoff, i.e. the entire private space is eligible.
fn hashable_subdomains(host: &str) -> Vec<String> {
    let suffix = psl::suffix_str(host);
    let labels: Vec<&str> = host.split('.').collect();
    let mut candidates = Vec::new();

    for start in 0..labels.len() {
        let candidate = labels[start..].join(".");
        if let Some(suffix) = suffix {
            if candidate == suffix {
                break;
            }
        }
        candidates.push(candidate);
        if candidates.len() == MAX_CANDIDATES {
            break;
        }
    }

    candidates
}
