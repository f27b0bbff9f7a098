use super::types::{DnsRewrite, DomainPattern, HostRule, NetworkRule, ParsedRule};
use aho_corasick::AhoCorasick;
use compact_str::CompactString;
use filterdns_domain::RuleText;
use rustc_hash::FxBuildHasher;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Reversed-label suffix trie mapping `||domain^` patterns to the indices of
/// the `NetworkRule`s anchored there. Grounded on the teacher's
/// `SuffixTrie`/`wildcard_mask` shape in `suffix_trie.rs`, generalized from a
/// 64-bit source bitmask to a list of rule indices (list sizes here are rule
/// counts per list, not "which of 63 external sources matched").
#[derive(Default)]
struct SuffixTrie {
    children: HashMap<CompactString, SuffixTrieNode, FxBuildHasher>,
}

#[derive(Default)]
struct SuffixTrieNode {
    children: HashMap<CompactString, SuffixTrieNode, FxBuildHasher>,
    /// Rules anchored exactly at this node (matches this host and subdomains).
    rule_indices: SmallVec<[u32; 4]>,
}

impl SuffixTrie {
    /// `||example.com^` is stored by walking reversed labels `com`, `example`
    /// from the root, with `rule_index` recorded at the final node.
    fn insert(&mut self, domain: &str, rule_index: u32) {
        let mut labels = domain.split('.').rev().peekable();
        let mut current = &mut self.children;
        while let Some(label) = labels.next() {
            let entry = current
                .entry(CompactString::new(label))
                .or_default();
            if labels.peek().is_none() {
                entry.rule_indices.push(rule_index);
                return;
            }
            current = &mut entry.children;
        }
    }

    /// Returns every rule index anchored at or above `host`'s labels —
    /// `||example.com^` matches both `example.com` and `sub.example.com`.
    fn lookup(&self, host: &str) -> SmallVec<[u32; 8]> {
        let mut result = SmallVec::new();
        let mut children = &self.children;
        for label in host.split('.').rev() {
            match children.get(label) {
                Some(node) => {
                    result.extend(node.rule_indices.iter().copied());
                    children = &node.children;
                }
                None => break,
            }
        }
        result
    }
}

/// The compiled form of one rule-list's text (spec §4.3). Immutable once
/// built; a `RuleListEngine` swaps this atomically on refresh.
pub struct Matcher {
    list_id: i64,
    rules: Vec<NetworkRule>,
    exact_index: HashMap<CompactString, SmallVec<[u32; 4]>, FxBuildHasher>,
    anchored_index: SuffixTrie,
    substring_ac: Option<(AhoCorasick, Vec<u32>)>,
    hosts_v4: HashMap<CompactString, Vec<(Ipv4Addr, RuleText)>, FxBuildHasher>,
    hosts_v6: HashMap<CompactString, Vec<(Ipv6Addr, RuleText)>, FxBuildHasher>,
    /// Surviving `$badfilter` rules, kept (not discarded) after same-list
    /// cancellation so a caller merging several compiled lists can still
    /// cancel a matching rule in a *different* list (spec §8: list A
    /// `||example.com^`, list B `||example.com^$badfilter` → no result).
    badfilters: Vec<NetworkRule>,
}

/// What matched for one `(clientIp, clientName, host, qtype, isAnswer)`
/// query (spec §4.3's `DNSResult`). Host rules carry their originating line's
/// text alongside the address so callers can report it as the matched
/// `Rule` (spec §8 seed scenario 3).
pub struct DnsResult<'a> {
    pub network_rules: Vec<&'a NetworkRule>,
    pub host_rules_v4: Vec<(Ipv4Addr, RuleText)>,
    pub host_rules_v6: Vec<(Ipv6Addr, RuleText)>,
}

impl<'a> DnsResult<'a> {
    pub fn is_empty(&self) -> bool {
        self.network_rules.is_empty() && self.host_rules_v4.is_empty() && self.host_rules_v6.is_empty()
    }

    pub fn dns_rewrites(&self) -> impl Iterator<Item = (&'a NetworkRule, &'a DnsRewrite)> + '_ {
        self.network_rules
            .iter()
            .filter_map(|r| r.rewrite.as_ref().map(|rw| (*r, rw)))
    }
}

impl Matcher {
    /// Compiles parsed rules into indexed lookup structures. `$badfilter`
    /// rules cancel any earlier-or-later rule in the same list sharing their
    /// domain pattern and client constraint, then are themselves discarded
    /// (they carry no standalone meaning).
    pub fn compile(list_id: i64, parsed: Vec<ParsedRule>) -> Self {
        let mut network_rules = Vec::new();
        let mut badfilters = Vec::new();
        let mut host_lines: Vec<HostRule> = Vec::new();

        for entry in parsed {
            match entry {
                ParsedRule::Network(r) if r.badfilter => badfilters.push(r),
                ParsedRule::Network(r) => network_rules.push(r),
                ParsedRule::Host(h) => host_lines.push(h),
            }
        }

        let rules: Vec<NetworkRule> = network_rules
            .into_iter()
            .filter(|r| !badfilters.iter().any(|b| b.same_target(r)))
            .collect();

        let mut exact_index: HashMap<CompactString, SmallVec<[u32; 4]>, FxBuildHasher> =
            HashMap::with_hasher(FxBuildHasher);
        let mut anchored_index = SuffixTrie::default();
        let mut substring_patterns: Vec<String> = Vec::new();
        let mut substring_rule_ids: Vec<u32> = Vec::new();

        for (idx, rule) in rules.iter().enumerate() {
            let idx = idx as u32;
            match &rule.pattern {
                DomainPattern::Exact(host) => {
                    exact_index
                        .entry(CompactString::new(host))
                        .or_default()
                        .push(idx);
                }
                DomainPattern::AnchoredSuffix(domain) => {
                    anchored_index.insert(domain, idx);
                }
                DomainPattern::Substring(pattern) => {
                    substring_patterns.push(pattern.clone());
                    substring_rule_ids.push(idx);
                }
            }
        }

        let substring_ac = if substring_patterns.is_empty() {
            None
        } else {
            AhoCorasick::builder()
                .ascii_case_insensitive(true)
                .build(&substring_patterns)
                .ok()
                .map(|ac| (ac, substring_rule_ids))
        };

        let mut hosts_v4: HashMap<CompactString, Vec<(Ipv4Addr, RuleText)>, FxBuildHasher> =
            HashMap::with_hasher(FxBuildHasher);
        let mut hosts_v6: HashMap<CompactString, Vec<(Ipv6Addr, RuleText)>, FxBuildHasher> =
            HashMap::with_hasher(FxBuildHasher);
        for host_rule in host_lines {
            match host_rule.ip {
                IpAddr::V4(ip) => hosts_v4
                    .entry(CompactString::new(&host_rule.host))
                    .or_default()
                    .push((ip, host_rule.text.clone())),
                IpAddr::V6(ip) => hosts_v6
                    .entry(CompactString::new(&host_rule.host))
                    .or_default()
                    .push((ip, host_rule.text.clone())),
            }
        }

        Self {
            list_id,
            rules,
            exact_index,
            anchored_index,
            substring_ac,
            hosts_v4,
            hosts_v6,
            badfilters,
        }
    }

    pub fn list_id(&self) -> i64 {
        self.list_id
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// This list's surviving `$badfilter` rules (spec §8 cross-list
    /// cancellation; see the `badfilters` field doc).
    pub fn badfilters(&self) -> &[NetworkRule] {
        &self.badfilters
    }

    /// Evaluates this list against `host` for a request from `client_ip`
    /// (optionally named `client_name`), filtering out rules whose
    /// `$client` constraint doesn't match.
    pub fn query(&self, client_ip: IpAddr, client_name: Option<&str>, host: &str) -> DnsResult<'_> {
        let mut indices: SmallVec<[u32; 8]> = SmallVec::new();

        if let Some(exact) = self.exact_index.get(host) {
            indices.extend(exact.iter().copied());
        }
        indices.extend(self.anchored_index.lookup(host));
        if let Some((ac, ids)) = &self.substring_ac {
            for m in ac.find_iter(host) {
                indices.push(ids[m.pattern().as_usize()]);
            }
        }

        let network_rules: Vec<&NetworkRule> = indices
            .into_iter()
            .map(|i| &self.rules[i as usize])
            .filter(|r| match &r.client {
                Some(c) => c.matches(client_ip, client_name),
                None => true,
            })
            .collect();

        DnsResult {
            network_rules,
            host_rules_v4: self.hosts_v4.get(host).cloned().unwrap_or_default(),
            host_rules_v6: self.hosts_v6.get(host).cloned().unwrap_or_default(),
        }
    }
}
