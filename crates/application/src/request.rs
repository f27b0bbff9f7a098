use crate::ports::DnsMessageBuilder;
use filterdns_domain::RecordType;
use hickory_proto::op::Message;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

/// Everything a filter engine needs to evaluate one question or answer RR
/// (spec §3 "Request context").
#[derive(Clone)]
pub struct RequestContext {
    pub client_ip: IpAddr,
    pub client_name: Option<Arc<str>>,
    /// Lowercase host, no trailing dot.
    pub host: Arc<str>,
    pub qtype: RecordType,
    /// False for questions, true when filtering an upstream answer.
    pub is_answer: bool,
    /// The original request message, threaded through so message-builder
    /// ports can copy its header ID and question section.
    pub request: Message,
    pub msg_builder: Arc<dyn DnsMessageBuilder>,
    pub filtered_response_ttl: Duration,
}

impl RequestContext {
    pub fn for_host(&self, host: impl Into<Arc<str>>) -> Self {
        Self {
            host: host.into(),
            ..self.clone()
        }
    }

    pub fn ttl_secs(&self) -> u32 {
        self.filtered_response_ttl.as_secs() as u32
    }
}
