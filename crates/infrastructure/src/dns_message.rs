use filterdns_application::ports::DnsMessageBuilder;
use hickory_proto::op::{Message, MessageType, ResponseCode, UpdateMessage};
use hickory_proto::rr::rdata::CNAME;
use hickory_proto::rr::{Name, RData, Record};
use std::net::IpAddr;
use std::str::FromStr;

/// Reference `DnsMessageBuilder` over `hickory-proto` (the teacher's wire
/// format crate). A real deployment injects its own builder tied to its DNS
/// server loop (spec §1); this implementation exists so the filtering core
/// is independently testable without that collaborator.
#[derive(Debug, Default, Clone, Copy)]
pub struct HickoryMessageBuilder;

impl HickoryMessageBuilder {
    pub fn new() -> Self {
        Self
    }

    fn base_response(req: &Message) -> Message {
        let mut msg = Message::new(req.id(), MessageType::Response, req.op_code);
        msg.metadata.recursion_desired = req.recursion_desired;
        msg.metadata.recursion_available = true;
        for query in &req.queries {
            msg.add_query(query.clone());
        }
        msg
    }

    fn question_name(req: &Message) -> Name {
        req.queries
            .first()
            .map(|q| q.name().clone())
            .unwrap_or_else(Name::root)
    }
}

impl DnsMessageBuilder for HickoryMessageBuilder {
    fn new_msg_servfail(&self, req: &Message) -> Message {
        let mut msg = Self::base_response(req);
        msg.metadata.response_code = ResponseCode::ServFail;
        msg
    }

    fn new_ip_resp_msg(&self, req: &Message, ips: &[IpAddr], ttl: u32) -> Message {
        let mut msg = Self::base_response(req);
        let name = Self::question_name(req);
        for ip in ips {
            let rdata = match ip {
                IpAddr::V4(v4) => RData::A((*v4).into()),
                IpAddr::V6(v6) => RData::AAAA((*v6).into()),
            };
            msg.add_answer(Record::from_rdata(name.clone(), ttl, rdata));
        }
        msg
    }

    fn new_cname_msg(&self, req: &Message, target: &str, ttl: u32) -> Message {
        let mut msg = Self::base_response(req);
        let name = Self::question_name(req);
        let cname_target = target.trim_end_matches('.');
        if let Ok(cname) = Name::from_str(&format!("{cname_target}.")) {
            msg.add_answer(Record::from_rdata(name, ttl, RData::CNAME(CNAME(cname))));
        } else {
            msg.metadata.response_code = ResponseCode::ServFail;
        }
        msg
    }

    fn new_refused_msg(&self, req: &Message) -> Message {
        let mut msg = Self::base_response(req);
        msg.metadata.response_code = ResponseCode::Refused;
        msg
    }
}
