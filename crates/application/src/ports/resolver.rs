use async_trait::async_trait;
use filterdns_domain::FilterError;
use std::net::IpAddr;

/// Address family for a resolver lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    V4,
    V6,
}

/// The external resolver the hash-prefix and safe-search filters call to
/// turn a replacement hostname into an IP, per spec §4.5/§4.6. IP-resolution
/// of replacement hosts is explicitly out of scope for this crate (spec §1);
/// only the port is defined here.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn lookup_ip(&self, family: AddressFamily, host: &str) -> Result<Vec<IpAddr>, FilterError>;
}
