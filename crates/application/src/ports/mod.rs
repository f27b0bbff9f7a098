pub mod dns_message;
pub mod error_collector;
pub mod metrics;
pub mod resolver;

pub use dns_message::DnsMessageBuilder;
pub use error_collector::{CollectingErrorCollector, ErrorCollectorPort};
pub use metrics::{MetricsPort, NoopMetrics, RefreshOutcome};
pub use resolver::{AddressFamily, Resolver};
