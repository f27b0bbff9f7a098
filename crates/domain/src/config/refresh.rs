use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Refresh cadence and timeout knobs (spec §6 "Configuration options").
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefreshConfig {
    /// Drives both periodic refresh and the `RefreshableSource` staleness check.
    #[serde(with = "humantime_secs", default = "default_refresh_interval")]
    pub refresh_interval: Duration,

    #[serde(with = "humantime_secs", default = "default_index_timeout")]
    pub index_refresh_timeout: Duration,

    #[serde(with = "humantime_secs", default = "default_list_timeout")]
    pub rule_list_refresh_timeout: Duration,

    /// Download size cap in bytes (default ~128 MiB per spec §4.1).
    #[serde(default = "default_max_rule_list_size")]
    pub max_rule_list_size: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            refresh_interval: default_refresh_interval(),
            index_refresh_timeout: default_index_timeout(),
            rule_list_refresh_timeout: default_list_timeout(),
            max_rule_list_size: default_max_rule_list_size(),
        }
    }
}

fn default_refresh_interval() -> Duration {
    Duration::from_secs(4 * 3600)
}

fn default_index_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_list_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_max_rule_list_size() -> u64 {
    128 * 1024 * 1024
}

/// Serializes a `Duration` as whole seconds, the common config-file idiom for
/// humantime-sourced durations.
mod humantime_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
