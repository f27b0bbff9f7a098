use crate::hash_prefix_filter::HashPrefixFilter;
use crate::rule_list::{ClientConstraint, DnsRewrite, DomainPattern, RuleListEngine};
use crate::safe_search_filter::SafeSearchFilter;
use filterdns_application::RequestContext;
use filterdns_domain::{BlockedServiceId, FilterListId, FilterResult, RecordType, RuleText};
use hickory_proto::op::Message;
use hickory_proto::rr::rdata::CNAME;
use hickory_proto::rr::RData;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

/// One profile rule list, tagged with the `FilterListId` it reports matches
/// under (spec §9 "Cycles via ID remapping" — here the mapping is just the
/// list this `CompositeFilter` was constructed with, not a synthetic-id
/// lookup table, since the composite owns exactly the engines it was given).
pub struct ListSource {
    pub list_id: FilterListId,
    pub engine: Arc<RuleListEngine>,
}

/// A blocked-service's compiled rule list, reported under the service id
/// itself rather than `blocked_service` (spec §4.7: "the reported `Rule` is
/// the `BlockedServiceID` itself, not the rule text").
pub struct ServiceSource {
    pub service_id: BlockedServiceId,
    pub engine: Arc<RuleListEngine>,
}

/// The request-scoped assembly of engines that produces a single
/// `FilterResult` (spec §4.9). Built fresh per request by `Storage`; holds
/// borrowed (`Arc`-shared) engines plus an exclusively-owned custom filter.
pub struct CompositeFilter {
    pub rule_lists: Vec<ListSource>,
    pub custom: Option<Arc<RuleListEngine>>,
    pub blocked_services: Vec<ServiceSource>,
    pub safe_browsing: Option<Arc<HashPrefixFilter>>,
    pub adult_blocking: Option<Arc<HashPrefixFilter>>,
    pub newly_registered_domains: Option<Arc<HashPrefixFilter>>,
    pub safe_search_general: Option<Arc<SafeSearchFilter>>,
    pub safe_search_youtube: Option<Arc<SafeSearchFilter>>,
}

struct MatchedNetworkRule {
    list: FilterListId,
    rule: RuleText,
    is_allow: bool,
    important: bool,
    rewrite: Option<DnsRewrite>,
    /// Carried alongside the display `rule` text so a `$badfilter` rule from
    /// a *different* compiled list can still recognize this one as its
    /// cancellation target (spec §8; `NetworkRule::same_target` compares
    /// exactly these two fields).
    pattern: DomainPattern,
    client: Option<ClientConstraint>,
}

impl MatchedNetworkRule {
    /// `$important` block/allow outranks a non-important rule of either
    /// kind; among rules of equal importance, `@@` allow outranks block
    /// (standard adblock precedence, spec §4.9 step 2).
    fn precedence_tier(&self) -> u8 {
        (self.important as u8) * 2 + (self.is_allow as u8)
    }

    /// Whether a `$badfilter` rule carrying `target` (pattern + client)
    /// cancels this matched rule (spec §8 cross-list `$badfilter`).
    fn is_cancelled_by(&self, target: &(DomainPattern, Option<ClientConstraint>)) -> bool {
        self.pattern == target.0 && self.client == target.1
    }
}

struct MatchedHostRule {
    list: FilterListId,
    rule: RuleText,
    family: RecordType,
}

impl CompositeFilter {
    /// Runs pass A (spec §4.9 step 1-3) over `host`/`qtype` for the given
    /// client, returning the first decisive result: a `custom`
    /// `$dnsrewrite`, a network-rule block/allow, or a hosts-style block.
    /// The tentative allow (if any) is returned alongside so the full
    /// pipeline can fall through to safe-browsing/safe-search before
    /// committing to it.
    fn pass_a(
        &self,
        ctx: &RequestContext,
        host: &str,
    ) -> (Option<FilterResult>, Option<FilterResult>) {
        let mut network_rules: Vec<MatchedNetworkRule> = Vec::new();
        let mut host_rules: Vec<MatchedHostRule> = Vec::new();
        let mut badfilter_targets: Vec<(DomainPattern, Option<ClientConstraint>)> = Vec::new();

        for list in &self.rule_lists {
            collect_list(
                ctx,
                host,
                &list.list_id,
                &list.engine,
                &mut network_rules,
                &mut host_rules,
                &mut badfilter_targets,
            );
        }

        if let Some(custom) = &self.custom {
            collect_list(
                ctx,
                host,
                &FilterListId::custom(),
                custom,
                &mut network_rules,
                &mut host_rules,
                &mut badfilter_targets,
            );
        }

        for service in &self.blocked_services {
            let (before_net, before_host) = (network_rules.len(), host_rules.len());
            collect_list(
                ctx,
                host,
                &FilterListId::blocked_service(),
                &service.engine,
                &mut network_rules,
                &mut host_rules,
                &mut badfilter_targets,
            );
            // Reported rule for a blocked-service match is the service id
            // itself (spec §4.7), not the underlying rule text.
            let service_rule = RuleText::new(service.service_id.as_str()).unwrap();
            for rule in &mut network_rules[before_net..] {
                rule.rule = service_rule.clone();
            }
            for rule in &mut host_rules[before_host..] {
                rule.rule = service_rule.clone();
            }
        }

        // §8: a `$badfilter` rule cancels a matching rule regardless of
        // which compiled list either one came from — apply it once, across
        // the fully merged set, before anything downstream inspects
        // `network_rules` (custom rewrites, precedence, `$important`/`@@`).
        network_rules.retain(|rule| !badfilter_targets.iter().any(|target| rule.is_cancelled_by(target)));

        // §4.9 step 1: a `$dnsrewrite` rule from `custom` is honored
        // immediately and short-circuits everything else (including the
        // rest of pass A) — non-custom `$dnsrewrite` rules are parsed for
        // `$badfilter`/precedence purposes only (spec §9) and never rewrite
        // or block on their own.
        let custom_rules = network_rules.iter().filter(|r| r.list.as_str() == "custom");
        if let Some(result) = custom_dnsrewrite_result(ctx, custom_rules) {
            return (Some(result), None);
        }

        // Step 2: highest-priority network rule across all lists, first
        // occurrence wins ties. A non-custom `$dnsrewrite` rule is excluded
        // here too (spec §9 open question: only `custom` ever acts on a
        // rewrite; elsewhere it neither blocks nor rewrites).
        let mut best: Option<&MatchedNetworkRule> = None;
        for rule in &network_rules {
            if rule.rewrite.is_some() && rule.list.as_str() != "custom" {
                continue;
            }
            match best {
                Some(current) if current.precedence_tier() >= rule.precedence_tier() => {}
                _ => best = Some(rule),
            }
        }

        if let Some(rule) = best {
            if !rule.is_allow {
                return (
                    Some(FilterResult::Blocked {
                        list: rule.list.clone(),
                        rule: rule.rule.clone(),
                    }),
                    None,
                );
            }
            let allowed = FilterResult::Allowed {
                list: rule.list.clone(),
                rule: rule.rule.clone(),
            };
            if rule.list.as_str() == "custom" {
                // §4.9 step 2: a custom allow short-circuits downstream
                // safe-browsing/safe-search entirely.
                return (Some(allowed), None);
            }
            return (None, Some(allowed));
        }

        // Step 3: no network rule anywhere — fall back to hosts-style rules.
        if let Some(rule) = pick_host_rule(&host_rules, ctx.qtype) {
            return (
                Some(FilterResult::Blocked {
                    list: rule.list.clone(),
                    rule: rule.rule.clone(),
                }),
                None,
            );
        }

        (None, None)
    }

    /// `FilterRequest(question)` (spec §4.9): the full pipeline for a single
    /// question, in fixed precedence order.
    pub async fn filter_request(&self, ctx: &RequestContext) -> Option<FilterResult> {
        let (decisive, tentative_allow) = self.pass_a(ctx, &ctx.host);
        if let Some(result) = decisive {
            return Some(result);
        }

        for filter in [&self.safe_browsing, &self.adult_blocking, &self.newly_registered_domains]
            .into_iter()
            .flatten()
        {
            if let Some(result) = filter.filter_request(ctx).await {
                return Some(result);
            }
        }

        for filter in [&self.safe_search_general, &self.safe_search_youtube]
            .into_iter()
            .flatten()
        {
            if let Some(result) = filter.filter_request(ctx).await {
                return Some(result);
            }
        }

        tentative_allow
    }

    /// `FilterResponse(answer)` (spec §4.9): re-runs pass A over every
    /// answer RR — A/AAAA by IP string, CNAME by target (trailing dot
    /// stripped) — terminating on the first non-nil result.
    pub fn filter_response(&self, ctx: &RequestContext, answer: &Message) -> Option<FilterResult> {
        for record in &answer.answers {
            let host = match &record.data {
                RData::A(ip) => Ipv4Addr::from(*ip).to_string(),
                RData::AAAA(ip) => Ipv6Addr::from(*ip).to_string(),
                RData::CNAME(CNAME(name)) => name.to_utf8().trim_end_matches('.').to_ascii_lowercase(),
                _ => continue,
            };
            let answer_ctx = ctx.for_host(host.clone());
            let (decisive, _) = self.pass_a(&answer_ctx, &host);
            if decisive.is_some() {
                return decisive;
            }
        }
        None
    }
}

fn collect_list(
    ctx: &RequestContext,
    host: &str,
    list_id: &FilterListId,
    engine: &RuleListEngine,
    network_rules: &mut Vec<MatchedNetworkRule>,
    host_rules: &mut Vec<MatchedHostRule>,
    badfilter_targets: &mut Vec<(DomainPattern, Option<ClientConstraint>)>,
) {
    let owned = engine.query(ctx.client_ip, ctx.client_name.as_deref(), host);
    for rule in owned.network_rules {
        network_rules.push(MatchedNetworkRule {
            list: list_id.clone(),
            rule: rule.text,
            is_allow: rule.is_allow,
            important: rule.important,
            rewrite: rule.rewrite,
            pattern: rule.pattern,
            client: rule.client,
        });
    }
    badfilter_targets.extend(engine.badfilter_targets());
    for (_, text) in owned.host_rules_v4 {
        host_rules.push(MatchedHostRule {
            list: list_id.clone(),
            rule: text,
            family: RecordType::A,
        });
    }
    for (_, text) in owned.host_rules_v6 {
        host_rules.push(MatchedHostRule {
            list: list_id.clone(),
            rule: text,
            family: RecordType::AAAA,
        });
    }
}

/// Picks the host rule matching `qtype`'s family, falling back to the
/// opposite family when no entry exists for the preferred one (spec §8 seed
/// scenario 3).
fn pick_host_rule(host_rules: &[MatchedHostRule], qtype: RecordType) -> Option<&MatchedHostRule> {
    let preferred = match qtype {
        RecordType::AAAA => RecordType::AAAA,
        _ => RecordType::A,
    };
    host_rules
        .iter()
        .find(|r| r.family == preferred)
        .or_else(|| host_rules.first())
}

/// Honors a `custom` list's `$dnsrewrite` rules exactly (spec §9 open
/// question: non-custom lists never act on their rewrites). `REFUSED` wins
/// outright; otherwise every `$dnsrewrite=<ip>` rule whose family matches
/// `qtype` combines into one multi-answer RR set (spec §8 seed scenario 5);
/// a `$dnsrewrite=<cname>` is forwarded as a `ModifiedRequest` for upstream
/// re-resolution (spec §9).
fn custom_dnsrewrite_result<'a>(
    ctx: &RequestContext,
    rules: impl Iterator<Item = &'a MatchedNetworkRule>,
) -> Option<FilterResult> {
    let rewrites: Vec<&MatchedNetworkRule> = rules.filter(|r| r.rewrite.is_some()).collect();
    if rewrites.is_empty() {
        return None;
    }

    let rule_text = rewrites[0].rule.clone();

    if rewrites.iter().any(|r| matches!(r.rewrite, Some(DnsRewrite::Refused))) {
        return Some(FilterResult::ModifiedResponse {
            msg: ctx.msg_builder.new_refused_msg(&ctx.request),
            list: FilterListId::custom(),
            rule: rule_text,
        });
    }

    let matching_family = |ip: &IpAddr| {
        matches!(
            (ip, ctx.qtype),
            (IpAddr::V4(_), RecordType::A) | (IpAddr::V6(_), RecordType::AAAA)
        )
    };
    let ips: Vec<IpAddr> = rewrites
        .iter()
        .filter_map(|r| match &r.rewrite {
            Some(DnsRewrite::Ip(ip)) if matching_family(ip) => Some(*ip),
            _ => None,
        })
        .collect();
    if !ips.is_empty() {
        return Some(FilterResult::ModifiedResponse {
            msg: ctx.msg_builder.new_ip_resp_msg(&ctx.request, &ips, ctx.ttl_secs()),
            list: FilterListId::custom(),
            rule: rule_text,
        });
    }

    if let Some(target) = rewrites.iter().find_map(|r| match &r.rewrite {
        Some(DnsRewrite::Cname(target)) => Some(target.clone()),
        _ => None,
    }) {
        return Some(FilterResult::ModifiedRequest {
            msg: ctx.msg_builder.new_cname_msg(&ctx.request, &target, ctx.ttl_secs()),
            list: FilterListId::custom(),
            rule: rule_text,
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use filterdns_application::ports::{AddressFamily, DnsMessageBuilder, Resolver};
    use crate::result_cache::ResultCache;
    use filterdns_domain::FilterError;
    use hickory_proto::op::{Message, MessageType, OpCode, Query, UpdateMessage};
    use hickory_proto::rr::{Name, Record, RecordType as HickoryRecordType};
    use std::str::FromStr;
    use std::time::Duration;

    struct NullResolver;

    #[async_trait]
    impl Resolver for NullResolver {
        async fn lookup_ip(&self, _family: AddressFamily, _host: &str) -> Result<Vec<IpAddr>, FilterError> {
            Ok(vec!["9.9.9.9".parse().unwrap()])
        }
    }

    struct StubMsgBuilder;

    impl DnsMessageBuilder for StubMsgBuilder {
        fn new_msg_servfail(&self, req: &Message) -> Message {
            let mut msg = Message::new(req.id(), MessageType::Response, OpCode::Query);
            msg.metadata.response_code = hickory_proto::op::ResponseCode::ServFail;
            msg
        }

        fn new_ip_resp_msg(&self, req: &Message, ips: &[IpAddr], ttl: u32) -> Message {
            let mut msg = Message::new(req.id(), MessageType::Response, OpCode::Query);
            for ip in ips {
                let rdata = match ip {
                    IpAddr::V4(v4) => RData::A((*v4).into()),
                    IpAddr::V6(v6) => RData::AAAA((*v6).into()),
                };
                msg.add_answer(Record::from_rdata(Name::from_str("x.").unwrap(), ttl, rdata));
            }
            msg
        }

        fn new_cname_msg(&self, req: &Message, target: &str, ttl: u32) -> Message {
            let mut msg = Message::new(req.id(), MessageType::Response, OpCode::Query);
            msg.add_answer(Record::from_rdata(
                Name::from_str("x.").unwrap(),
                ttl,
                RData::CNAME(CNAME(Name::from_str(&format!("{target}.")).unwrap())),
            ));
            msg
        }

        fn new_refused_msg(&self, req: &Message) -> Message {
            let mut msg = Message::new(req.id(), MessageType::Response, OpCode::Query);
            msg.metadata.response_code = hickory_proto::op::ResponseCode::Refused;
            msg
        }
    }

    fn ctx(host: &str, qtype: RecordType) -> RequestContext {
        let mut request = Message::new(1, MessageType::Query, OpCode::Query);
        request.add_query(Query::query(Name::from_str("x.").unwrap(), HickoryRecordType::A));
        RequestContext {
            client_ip: "127.0.0.1".parse().unwrap(),
            client_name: None,
            host: host.into(),
            qtype,
            is_answer: false,
            request,
            msg_builder: Arc::new(StubMsgBuilder),
            filtered_response_ttl: Duration::from_secs(10),
        }
    }

    fn composite_with(rule_lists: Vec<ListSource>, custom: Option<Arc<RuleListEngine>>) -> CompositeFilter {
        CompositeFilter {
            rule_lists,
            custom,
            blocked_services: Vec::new(),
            safe_browsing: None,
            adult_blocking: None,
            newly_registered_domains: None,
            safe_search_general: None,
            safe_search_youtube: None,
        }
    }

    #[tokio::test]
    async fn seed_scenario_1_block_rule_reports_list_and_rule() {
        let engine = Arc::new(RuleListEngine::from_text("||example.com^\n", None));
        let composite = composite_with(
            vec![ListSource {
                list_id: FilterListId::new("fl1").unwrap(),
                engine,
            }],
            None,
        );
        let result = composite
            .filter_request(&ctx("www.example.com", RecordType::A))
            .await
            .unwrap();
        match result {
            FilterResult::Blocked { list, rule } => {
                assert_eq!(list.as_str(), "fl1");
                assert_eq!(rule.as_str(), "||example.com^");
            }
            other => panic!("expected Blocked, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn seed_scenario_2_badfilter_cancels_block() {
        let engine = Arc::new(RuleListEngine::from_text(
            "||example.com^\n||example.com^$badfilter\n",
            None,
        ));
        let composite = composite_with(
            vec![ListSource {
                list_id: FilterListId::new("fl1").unwrap(),
                engine,
            }],
            None,
        );
        let result = composite.filter_request(&ctx("example.com", RecordType::A)).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn seed_scenario_3_hosts_style_fallback_on_opposite_family() {
        let engine = Arc::new(RuleListEngine::from_text(
            "127.0.0.1 www.example.com\n::1 www.example.net\n",
            None,
        ));
        let composite = composite_with(
            vec![ListSource {
                list_id: FilterListId::new("fl1").unwrap(),
                engine,
            }],
            None,
        );
        let result = composite
            .filter_request(&ctx("www.example.com", RecordType::AAAA))
            .await
            .unwrap();
        match result {
            FilterResult::Blocked { rule, .. } => {
                assert_eq!(rule.as_str(), "127.0.0.1 www.example.com");
            }
            other => panic!("expected Blocked, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn seed_scenario_4_custom_dnsrewrite_refused() {
        let custom = Arc::new(RuleListEngine::from_text(
            "||example.com^$dnsrewrite=REFUSED\n",
            None,
        ));
        let composite = composite_with(Vec::new(), Some(custom));
        let result = composite
            .filter_request(&ctx("www.example.com", RecordType::A))
            .await
            .unwrap();
        match result {
            FilterResult::ModifiedResponse { msg, list, .. } => {
                assert_eq!(list.as_str(), "custom");
                assert_eq!(msg.response_code, hickory_proto::op::ResponseCode::Refused);
            }
            other => panic!("expected ModifiedResponse, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn seed_scenario_5_custom_dnsrewrite_multi_answer() {
        let custom = Arc::new(RuleListEngine::from_text(
            "||example.com^$dnsrewrite=1.2.3.4\n||example.com^$dnsrewrite=1.2.3.5\n",
            None,
        ));
        let composite = composite_with(Vec::new(), Some(custom));
        let result = composite
            .filter_request(&ctx("www.example.com", RecordType::A))
            .await
            .unwrap();
        match result {
            FilterResult::ModifiedResponse { msg, .. } => {
                assert_eq!(msg.answers.len(), 2);
            }
            other => panic!("expected ModifiedResponse, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cross_list_badfilter_cancels_block_in_a_different_list() {
        let list_a = Arc::new(RuleListEngine::from_text("||example.com^\n", None));
        let list_b = Arc::new(RuleListEngine::from_text("||example.com^$badfilter\n", None));
        let composite = composite_with(
            vec![
                ListSource {
                    list_id: FilterListId::new("fl1").unwrap(),
                    engine: list_a,
                },
                ListSource {
                    list_id: FilterListId::new("fl2").unwrap(),
                    engine: list_b,
                },
            ],
            None,
        );
        let result = composite.filter_request(&ctx("example.com", RecordType::A)).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn non_custom_dnsrewrite_neither_blocks_nor_rewrites() {
        let engine = Arc::new(RuleListEngine::from_text("||tracker.com^$dnsrewrite=0.0.0.0\n", None));
        let composite = composite_with(
            vec![ListSource {
                list_id: FilterListId::new("fl1").unwrap(),
                engine,
            }],
            None,
        );
        let result = composite.filter_request(&ctx("tracker.com", RecordType::A)).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn custom_allow_short_circuits_everything() {
        let custom = Arc::new(RuleListEngine::from_text("@@||example.com^\n", None));
        let sb_storage = Arc::new(crate::hash_storage::HashStorage::new());
        sb_storage.reset("example.com\n");
        let safe_browsing = Arc::new(HashPrefixFilter::new(
            sb_storage,
            "replacement.example.net",
            FilterListId::safe_browsing(),
            Arc::new(NullResolver),
            Arc::new(ResultCache::new(16)),
        ));
        let mut composite = composite_with(Vec::new(), Some(custom));
        composite.safe_browsing = Some(safe_browsing);

        let result = composite
            .filter_request(&ctx("example.com", RecordType::A))
            .await
            .unwrap();
        assert!(result.is_allow());
    }
}
