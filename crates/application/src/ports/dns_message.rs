use hickory_proto::op::Message;
use std::net::IpAddr;

/// Constructs DNS wire messages on behalf of the filtering core.
///
/// The wire codec itself is an external collaborator (spec §1); this port
/// only needs the handful of constructors the pipeline calls out by name in
/// spec §6: `NewMsgSERVFAIL`, `NewIPRespMsg`, and the rewrite builders for
/// CNAME/REFUSED responses.
pub trait DnsMessageBuilder: Send + Sync {
    fn new_msg_servfail(&self, req: &Message) -> Message;

    fn new_ip_resp_msg(&self, req: &Message, ips: &[IpAddr], ttl: u32) -> Message;

    fn new_cname_msg(&self, req: &Message, target: &str, ttl: u32) -> Message;

    fn new_refused_msg(&self, req: &Message) -> Message;
}
