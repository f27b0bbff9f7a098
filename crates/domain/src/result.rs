use crate::ids::{FilterListId, RuleText};
use hickory_proto::op::Message;

/// Outcome of a single filter engine call.
///
/// A plain tagged enum, not a trait-object hierarchy — dispatch only ever
/// needs the common `matched_rule` accessor (spec §9).
#[derive(Debug, Clone)]
pub enum FilterResult {
    /// An allow rule matched; the caller should stop filtering this request.
    Allowed { list: FilterListId, rule: RuleText },

    /// A block rule matched; the caller synthesizes NXDOMAIN/NODATA/REFUSED.
    Blocked { list: FilterListId, rule: RuleText },

    /// The response to return to the client verbatim (e.g. a rewritten
    /// A/AAAA RR set, or a REFUSED rcode).
    ModifiedResponse {
        msg: Message,
        list: FilterListId,
        rule: RuleText,
    },

    /// The request to forward upstream in place of the original — used for
    /// CNAME rewrites whose target must still be resolved (spec §9).
    ModifiedRequest {
        msg: Message,
        list: FilterListId,
        rule: RuleText,
    },
}

impl FilterResult {
    /// Returns the list and the rule text responsible for this result.
    pub fn matched_rule(&self) -> (&FilterListId, &RuleText) {
        match self {
            FilterResult::Allowed { list, rule }
            | FilterResult::Blocked { list, rule }
            | FilterResult::ModifiedResponse { list, rule, .. }
            | FilterResult::ModifiedRequest { list, rule, .. } => (list, rule),
        }
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, FilterResult::Allowed { .. })
    }

    pub fn is_block(&self) -> bool {
        matches!(self, FilterResult::Blocked { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matched_rule_reports_list_and_rule() {
        let r = FilterResult::Blocked {
            list: FilterListId::new("fl1").unwrap(),
            rule: RuleText::new("||example.com^").unwrap(),
        };
        let (list, rule) = r.matched_rule();
        assert_eq!(list.as_str(), "fl1");
        assert_eq!(rule.as_str(), "||example.com^");
        assert!(r.is_block());
    }
}
