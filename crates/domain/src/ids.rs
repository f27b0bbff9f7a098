use crate::errors::FilterError;
use compact_str::CompactString;
use std::fmt;

/// Reserved `FilterListId` values with well-known meaning to the pipeline.
pub mod reserved {
    pub const ADGUARD_DNS_FILTER: &str = "adguard_dns_filter";
    pub const ADULT_BLOCKING: &str = "adult_blocking";
    pub const BLOCKED_SERVICE: &str = "blocked_service";
    pub const CUSTOM: &str = "custom";
    pub const GENERAL_SAFE_SEARCH: &str = "general_safe_search";
    pub const NEWLY_REGISTERED_DOMAINS: &str = "newly_registered_domains";
    pub const SAFE_BROWSING: &str = "safe_browsing";
    pub const YOUTUBE_SAFE_SEARCH: &str = "youtube_safe_search";
}

fn is_valid_identifier_byte(b: u8) -> bool {
    b.is_ascii_graphic() && b != b'/'
}

fn validate_identifier(kind: &'static str, value: &str, max_len: usize) -> Result<(), FilterError> {
    if value.is_empty() {
        return Ok(()); // the empty FilterListId means "none" (§3)
    }
    if value.len() > max_len || !value.bytes().all(is_valid_identifier_byte) {
        return Err(FilterError::InvalidIdentifier {
            kind,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Opaque identifier for a compiled rule list (1-128 bytes, ASCII, printable,
/// no whitespace or slash). The empty id means "no list" per spec §3.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterListId(CompactString);

impl FilterListId {
    pub fn new(value: impl AsRef<str>) -> Result<Self, FilterError> {
        let value = value.as_ref();
        validate_identifier("FilterListId", value, 128)?;
        Ok(Self(CompactString::new(value)))
    }

    pub fn none() -> Self {
        Self(CompactString::new(""))
    }

    pub fn is_none(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! reserved_ctor {
    ($name:ident, $konst:expr) => {
        impl FilterListId {
            pub fn $name() -> Self {
                Self(CompactString::new($konst))
            }
        }
    };
}

reserved_ctor!(adguard_dns_filter, reserved::ADGUARD_DNS_FILTER);
reserved_ctor!(adult_blocking, reserved::ADULT_BLOCKING);
reserved_ctor!(blocked_service, reserved::BLOCKED_SERVICE);
reserved_ctor!(custom, reserved::CUSTOM);
reserved_ctor!(general_safe_search, reserved::GENERAL_SAFE_SEARCH);
reserved_ctor!(newly_registered_domains, reserved::NEWLY_REGISTERED_DOMAINS);
reserved_ctor!(safe_browsing, reserved::SAFE_BROWSING);
reserved_ctor!(youtube_safe_search, reserved::YOUTUBE_SAFE_SEARCH);

impl fmt::Display for FilterListId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier for a blocked-service entry (1-64 bytes).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockedServiceId(CompactString);

impl BlockedServiceId {
    pub fn new(value: impl AsRef<str>) -> Result<Self, FilterError> {
        let value = value.as_ref();
        if value.is_empty() {
            return Err(FilterError::InvalidIdentifier {
                kind: "BlockedServiceId",
                value: value.to_string(),
            });
        }
        validate_identifier("BlockedServiceId", value, 64)?;
        Ok(Self(CompactString::new(value)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockedServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The text of a single matched rule, reported back to callers for
/// diagnostics. Bounded to 1024 Unicode scalars per spec §3.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleText(CompactString);

impl RuleText {
    pub fn new(value: impl AsRef<str>) -> Result<Self, FilterError> {
        let value = value.as_ref();
        if value.chars().count() > 1024 {
            return Err(FilterError::InvalidIdentifier {
                kind: "RuleText",
                value: value.chars().take(32).collect::<String>() + "...",
            });
        }
        Ok(Self(CompactString::new(value)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
