use filterdns_domain::RuleText;
use std::net::IpAddr;

/// How a network rule's domain operand is matched against a request host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainPattern {
    /// `||example.com^` — matches `example.com` and any subdomain.
    AnchoredSuffix(String),
    /// A bare `example.com` token — matches that host only.
    Exact(String),
    /// `/substr/` — matches any host containing the substring.
    Substring(String),
}

/// A `$dnsrewrite=...` modifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsRewrite {
    Refused,
    Cname(String),
    Ip(IpAddr),
}

/// `$client=<name|CIDR>` — restricts a rule to requests from a matching
/// client name or address range. CIDR parsing is hand-rolled (prefix-bit
/// arithmetic over `std::net::IpAddr`) since it's the only consumer of CIDR
/// syntax in this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientConstraint {
    Name(String),
    Cidr { network: IpAddr, prefix_len: u8 },
}

impl ClientConstraint {
    pub fn parse(raw: &str) -> Option<Self> {
        if let Some((addr, len)) = raw.split_once('/') {
            let network: IpAddr = addr.parse().ok()?;
            let prefix_len: u8 = len.parse().ok()?;
            let max = match network {
                IpAddr::V4(_) => 32,
                IpAddr::V6(_) => 128,
            };
            if prefix_len > max {
                return None;
            }
            return Some(Self::Cidr { network, prefix_len });
        }
        if let Ok(addr) = raw.parse::<IpAddr>() {
            let prefix_len = match addr {
                IpAddr::V4(_) => 32,
                IpAddr::V6(_) => 128,
            };
            return Some(Self::Cidr { network: addr, prefix_len });
        }
        Some(Self::Name(raw.to_string()))
    }

    pub fn matches(&self, client_ip: IpAddr, client_name: Option<&str>) -> bool {
        match self {
            Self::Name(name) => client_name.is_some_and(|n| n.eq_ignore_ascii_case(name)),
            Self::Cidr { network, prefix_len } => cidr_contains(*network, *prefix_len, client_ip),
        }
    }
}

fn cidr_contains(network: IpAddr, prefix_len: u8, candidate: IpAddr) -> bool {
    match (network, candidate) {
        (IpAddr::V4(net), IpAddr::V4(cand)) => {
            let mask = if prefix_len == 0 {
                0
            } else {
                u32::MAX << (32 - prefix_len as u32)
            };
            (u32::from(net) & mask) == (u32::from(cand) & mask)
        }
        (IpAddr::V6(net), IpAddr::V6(cand)) => {
            let mask = if prefix_len == 0 {
                0u128
            } else {
                u128::MAX << (128 - prefix_len as u32)
            };
            (u128::from(net) & mask) == (u128::from(cand) & mask)
        }
        _ => false,
    }
}

/// A compiled adblock-style network rule (spec §4.3).
#[derive(Debug, Clone)]
pub struct NetworkRule {
    pub pattern: DomainPattern,
    pub is_allow: bool,
    pub important: bool,
    pub badfilter: bool,
    pub client: Option<ClientConstraint>,
    pub rewrite: Option<DnsRewrite>,
    pub text: RuleText,
}

impl NetworkRule {
    /// Whether two rules are the same "badfilter target": same domain
    /// pattern and same client constraint, ignoring allow/important/rewrite.
    pub fn same_target(&self, other: &NetworkRule) -> bool {
        self.pattern == other.pattern && self.client == other.client
    }
}

/// A single `/etc/hosts`-style `IP HOST` line.
#[derive(Debug, Clone)]
pub struct HostRule {
    pub ip: IpAddr,
    pub host: String,
    pub text: RuleText,
}

#[derive(Debug)]
pub enum ParsedRule {
    Network(NetworkRule),
    Host(HostRule),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cidr_v4_matches_within_range() {
        let c = ClientConstraint::parse("192.168.1.0/24").unwrap();
        assert!(c.matches("192.168.1.42".parse().unwrap(), None));
        assert!(!c.matches("192.168.2.1".parse().unwrap(), None));
    }

    #[test]
    fn name_constraint_is_case_insensitive() {
        let c = ClientConstraint::parse("kids-laptop").unwrap();
        assert!(c.matches("10.0.0.1".parse().unwrap(), Some("Kids-Laptop")));
        assert!(!c.matches("10.0.0.1".parse().unwrap(), Some("other")));
    }

    #[test]
    fn bare_ip_matches_exact_host_only() {
        let c = ClientConstraint::parse("10.0.0.5").unwrap();
        assert!(c.matches("10.0.0.5".parse().unwrap(), None));
        assert!(!c.matches("10.0.0.6".parse().unwrap(), None));
    }
}
