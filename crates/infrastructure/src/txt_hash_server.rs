use crate::hash_storage::HashStorage;
use filterdns_domain::FilterError;
use std::sync::Arc;

const SAFE_BROWSING_SUFFIX: &str = ".sb.dns.adguard.com";
const ADULT_BLOCKING_SUFFIX: &str = ".pc.dns.adguard.com";

/// Secondary TXT-based query surface over a `HashStorage` (spec §4.11): lets
/// a client ask "do you know any hash under this prefix" without handing
/// over the underlying hostname list.
pub struct TxtHashServer {
    safe_browsing: Arc<HashStorage>,
    adult_blocking: Arc<HashStorage>,
}

/// `(hex-encoded hashes, matched)` for a recognized suffix; `matched` is
/// false only when the suffix itself is unrecognized, per spec §4.11
/// "non-matching suffixes yield `(nil, false, nil)`".
pub struct TxtHashResponse {
    pub hashes: Vec<String>,
    pub matched: bool,
}

impl TxtHashServer {
    pub fn new(safe_browsing: Arc<HashStorage>, adult_blocking: Arc<HashStorage>) -> Self {
        Self {
            safe_browsing,
            adult_blocking,
        }
    }

    /// Strips a known suffix from `qname`, parses the remaining `.`-joined
    /// hex prefixes (4 chars; legacy 8-char prefixes are truncated), and
    /// looks each up in the matching storage. An unrecognized suffix yields
    /// a non-matched empty response; a malformed prefix is an error.
    pub fn query(&self, qname: &str) -> Result<TxtHashResponse, FilterError> {
        let qname = qname.trim_end_matches('.');

        let (label, storage) = if let Some(label) = qname.strip_suffix(SAFE_BROWSING_SUFFIX) {
            (label, &self.safe_browsing)
        } else if let Some(label) = qname.strip_suffix(ADULT_BLOCKING_SUFFIX) {
            (label, &self.adult_blocking)
        } else {
            return Ok(TxtHashResponse {
                hashes: Vec::new(),
                matched: false,
            });
        };

        let mut prefixes = Vec::new();
        for part in label.split('.') {
            prefixes.push(parse_prefix(part)?);
        }
        prefixes.sort_unstable();
        prefixes.dedup();

        let (buffer, ranges) = storage.hashes(&prefixes);
        let hashes = ranges.into_iter().map(|r| buffer[r].to_string()).collect();

        Ok(TxtHashResponse { hashes, matched: true })
    }
}

/// Parses a 4-hex-char prefix, or an 8-hex-char legacy prefix truncated to
/// its first 4 characters (spec §4.11/§6).
fn parse_prefix(part: &str) -> Result<[u8; 2], FilterError> {
    let truncated = match part.len() {
        4 => part,
        8 => &part[..4],
        _ => return Err(FilterError::InvalidHashPrefix(part.to_string())),
    };
    let bytes = hex::decode(truncated).map_err(|_| FilterError::InvalidHashPrefix(part.to_string()))?;
    Ok([bytes[0], bytes[1]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    fn prefix_label(host: &str) -> String {
        let digest = Sha256::digest(host.as_bytes());
        hex::encode([digest[0], digest[1]])
    }

    #[test]
    fn safe_browsing_suffix_returns_matching_hash() {
        let sb = Arc::new(HashStorage::new());
        sb.reset("malware.example.com\n");
        let server = TxtHashServer::new(sb, Arc::new(HashStorage::new()));

        let label = prefix_label("malware.example.com");
        let qname = format!("{label}.sb.dns.adguard.com");
        let response = server.query(&qname).unwrap();
        assert!(response.matched);
        assert_eq!(response.hashes.len(), 1);

        let digest = Sha256::digest(b"malware.example.com");
        assert_eq!(response.hashes[0], hex::encode(digest));
    }

    #[test]
    fn adult_blocking_suffix_routes_to_its_own_storage() {
        let sb = Arc::new(HashStorage::new());
        let adult = Arc::new(HashStorage::new());
        adult.reset("adult.example.com\n");
        let server = TxtHashServer::new(sb, adult);

        let label = prefix_label("adult.example.com");
        let qname = format!("{label}.pc.dns.adguard.com");
        let response = server.query(&qname).unwrap();
        assert!(response.matched);
        assert_eq!(response.hashes.len(), 1);
    }

    #[test]
    fn legacy_eight_char_prefix_is_truncated() {
        let sb = Arc::new(HashStorage::new());
        sb.reset("malware.example.com\n");
        let server = TxtHashServer::new(sb, Arc::new(HashStorage::new()));

        let digest = Sha256::digest(b"malware.example.com");
        let legacy = hex::encode(&digest[0..4]);
        let qname = format!("{legacy}.sb.dns.adguard.com");
        let response = server.query(&qname).unwrap();
        assert!(response.matched);
        assert_eq!(response.hashes.len(), 1);
    }

    #[test]
    fn unrecognized_suffix_is_not_matched() {
        let server = TxtHashServer::new(Arc::new(HashStorage::new()), Arc::new(HashStorage::new()));
        let response = server.query("abcd.other.suffix.com").unwrap();
        assert!(!response.matched);
        assert!(response.hashes.is_empty());
    }

    #[test]
    fn malformed_prefix_is_an_error() {
        let server = TxtHashServer::new(Arc::new(HashStorage::new()), Arc::new(HashStorage::new()));
        let qname = "not-hex.sb.dns.adguard.com";
        assert!(server.query(qname).is_err());
    }

    #[test]
    fn multiple_prefixes_deduplicate() {
        let sb = Arc::new(HashStorage::new());
        sb.reset("a.example.com\nb.example.com\n");
        let server = TxtHashServer::new(sb, Arc::new(HashStorage::new()));

        let label_a = prefix_label("a.example.com");
        let qname = format!("{label_a}.{label_a}.sb.dns.adguard.com");
        let response = server.query(&qname).unwrap();
        assert!(response.matched);
        assert_eq!(response.hashes.len(), 1);
    }
}
