//! Rule-list compiler and matcher (spec §4.3): text in, typed network/host/
//! rewrite rules out.

pub mod engine;
pub mod matcher;
pub mod parser;
pub mod types;

pub use engine::{OwnedDnsResult, OwnedNetworkRule, RuleListEngine};
pub use matcher::{DnsResult, Matcher};
pub use types::{ClientConstraint, DnsRewrite, DomainPattern, HostRule, NetworkRule, ParsedRule};
