use super::types::{ClientConstraint, DnsRewrite, DomainPattern, HostRule, NetworkRule, ParsedRule};
use filterdns_domain::RuleText;
use std::net::IpAddr;

/// Parse one line of rule-list text (spec §4.3, §6 "Rule-list file format").
///
/// Recognizes, in order: comments/blank lines, `/etc/hosts`-style `IP HOST`
/// lines, and adblock network rules (`@@` allow prefix, `||domain^` anchored
/// suffix or bare substring, trailing `$modifier,modifier=value` list).
/// Grounded on the teacher's `parse_list_line` classifier in `compiler.rs`,
/// generalized from "host → source bitmask" to "host → typed rule".
pub fn parse_line(line: &str) -> Option<ParsedRule> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
        return None;
    }

    match parse_hosts_line(line) {
        HostsLine::Rule(host_rule) => return Some(ParsedRule::Host(host_rule)),
        HostsLine::Skip => return None,
        HostsLine::NotHostsSyntax => {}
    }

    parse_network_rule(line).map(ParsedRule::Network)
}

pub fn parse_text(text: &str) -> Vec<ParsedRule> {
    text.lines().filter_map(parse_line).collect()
}

enum HostsLine {
    Rule(HostRule),
    /// Shaped like an `/etc/hosts` line but names a self-referential host.
    Skip,
    /// First token isn't an IP address — not hosts syntax at all.
    NotHostsSyntax,
}

fn parse_hosts_line(line: &str) -> HostsLine {
    let mut parts = line.split_whitespace();
    let Some(addr) = parts.next() else {
        return HostsLine::NotHostsSyntax;
    };
    let Some(host) = parts.next() else {
        return HostsLine::NotHostsSyntax;
    };

    let Ok(ip) = addr.parse::<IpAddr>() else {
        return HostsLine::NotHostsSyntax;
    };

    if matches!(
        host,
        "localhost" | "0.0.0.0" | "broadcasthost" | "ip6-localhost" | "ip6-loopback"
    ) || !host.contains('.')
    {
        return HostsLine::Skip;
    }

    match RuleText::new(line) {
        Ok(text) => HostsLine::Rule(HostRule {
            ip,
            host: host.to_ascii_lowercase(),
            text,
        }),
        Err(_) => HostsLine::Skip,
    }
}

fn parse_network_rule(line: &str) -> Option<NetworkRule> {
    let text = RuleText::new(line).ok()?;

    let mut rest = line;
    let is_allow = if let Some(stripped) = rest.strip_prefix("@@") {
        rest = stripped;
        true
    } else {
        false
    };

    let (body, modifiers_raw) = match rest.split_once('$') {
        Some((b, m)) => (b, Some(m)),
        None => (rest, None),
    };

    let pattern = parse_domain_pattern(body)?;

    let mut important = false;
    let mut badfilter = false;
    let mut client = None;
    let mut rewrite = None;

    if let Some(modifiers) = modifiers_raw {
        for modifier in modifiers.split(',') {
            let modifier = modifier.trim();
            if modifier.is_empty() {
                continue;
            }
            if modifier == "important" {
                important = true;
            } else if modifier == "badfilter" {
                badfilter = true;
            } else if let Some(value) = modifier.strip_prefix("client=") {
                client = ClientConstraint::parse(value);
            } else if let Some(value) = modifier.strip_prefix("dnsrewrite=") {
                rewrite = parse_dnsrewrite(value);
            }
        }
    }

    Some(NetworkRule {
        pattern,
        is_allow,
        important,
        badfilter,
        client,
        rewrite,
        text,
    })
}

fn parse_domain_pattern(body: &str) -> Option<DomainPattern> {
    if body.is_empty() {
        return None;
    }
    if let Some(inner) = body.strip_prefix("||").and_then(|s| s.strip_suffix('^')) {
        return Some(DomainPattern::AnchoredSuffix(inner.to_ascii_lowercase()));
    }
    if body.starts_with('/') && body.ends_with('/') && body.len() > 2 {
        return Some(DomainPattern::Substring(
            body[1..body.len() - 1].to_ascii_lowercase(),
        ));
    }
    if body.contains('.') {
        return Some(DomainPattern::Exact(body.to_ascii_lowercase()));
    }
    None
}

fn parse_dnsrewrite(value: &str) -> Option<DnsRewrite> {
    if value.eq_ignore_ascii_case("REFUSED") {
        return Some(DnsRewrite::Refused);
    }
    if let Ok(ip) = value.parse::<IpAddr>() {
        return Some(DnsRewrite::Ip(ip));
    }
    Some(DnsRewrite::Cname(value.trim_end_matches('.').to_string()))
}
