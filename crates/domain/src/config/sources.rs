use serde::{Deserialize, Serialize};

/// A single hash-prefix filter's remote list plus the replacement host its
/// resolver call rewrites matches to (spec §4.5 "wraps a Hash Storage and a
/// replacement hostname"). Optional as a group: a deployment that doesn't
/// enable a given hash storage (e.g. newly-registered-domains) omits it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HashListSource {
    pub hash_list_url: String,
    pub replacement_host: String,
}

/// URLs of the externally-maintained indices and rule lists (spec §6), plus
/// the optional hash-storage sources the safe-browsing/adult-blocking/
/// newly-registered-domains hash-prefix filters refresh from (spec §4.9
/// pipeline, §5 "Hash Storages have their own refresh workers").
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceUrls {
    pub filter_index_url: String,
    pub blocked_service_index_url: String,
    pub general_safe_search_rules_url: String,
    pub youtube_safe_search_rules_url: String,

    #[serde(default)]
    pub safe_browsing: Option<HashListSource>,
    #[serde(default)]
    pub adult_blocking: Option<HashListSource>,
    #[serde(default)]
    pub newly_registered_domains: Option<HashListSource>,
}

impl SourceUrls {
    /// Every configured URL must be http/https per spec §6.
    pub fn validate(&self) -> Result<(), String> {
        let mut required = vec![
            &self.filter_index_url,
            &self.blocked_service_index_url,
            &self.general_safe_search_rules_url,
            &self.youtube_safe_search_rules_url,
        ];
        for source in [&self.safe_browsing, &self.adult_blocking, &self.newly_registered_domains]
            .into_iter()
            .flatten()
        {
            required.push(&source.hash_list_url);
        }
        for url in required {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(format!("source url must be http(s): {url}"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SourceUrls {
        SourceUrls {
            filter_index_url: "https://example.com/filters.json".into(),
            blocked_service_index_url: "https://example.com/s.json".into(),
            general_safe_search_rules_url: "https://example.com/g.txt".into(),
            youtube_safe_search_rules_url: "https://example.com/y.txt".into(),
            safe_browsing: None,
            adult_blocking: None,
            newly_registered_domains: None,
        }
    }

    #[test]
    fn rejects_non_http_url() {
        let mut urls = base();
        urls.filter_index_url = "ftp://example.com/filters.json".into();
        assert!(urls.validate().is_err());
    }

    #[test]
    fn rejects_non_http_hash_list_url() {
        let mut urls = base();
        urls.safe_browsing = Some(HashListSource {
            hash_list_url: "ftp://example.com/sb.txt".into(),
            replacement_host: "safe.example.net".into(),
        });
        assert!(urls.validate().is_err());
    }

    #[test]
    fn accepts_without_optional_hash_sources() {
        assert!(base().validate().is_ok());
    }
}
