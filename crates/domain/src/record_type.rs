use hickory_proto::rr::RecordType as HickoryRecordType;

/// The subset of RR types the filtering core reasons about directly.
/// Any other query type is treated as `Other` and only affects pass-through
/// behavior (the pipeline still runs, but A/AAAA-specific engines decline).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    AAAA,
    CNAME,
    TXT,
    Other(u16),
}

impl RecordType {
    pub fn is_address(self) -> bool {
        matches!(self, RecordType::A | RecordType::AAAA)
    }

    /// Converts to the hickory-proto type used at the wire boundary, the way
    /// the teacher's `RecordTypeMapper` does for the full DNS server.
    pub fn to_hickory(self) -> HickoryRecordType {
        match self {
            RecordType::A => HickoryRecordType::A,
            RecordType::AAAA => HickoryRecordType::AAAA,
            RecordType::CNAME => HickoryRecordType::CNAME,
            RecordType::TXT => HickoryRecordType::TXT,
            RecordType::Other(v) => HickoryRecordType::from(v),
        }
    }

    pub fn from_hickory(value: HickoryRecordType) -> Self {
        match value {
            HickoryRecordType::A => RecordType::A,
            HickoryRecordType::AAAA => RecordType::AAAA,
            HickoryRecordType::CNAME => RecordType::CNAME,
            HickoryRecordType::TXT => RecordType::TXT,
            other => RecordType::Other(u16::from(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_types() {
        assert!(RecordType::A.is_address());
        assert!(RecordType::AAAA.is_address());
        assert!(!RecordType::CNAME.is_address());
    }

    #[test]
    fn hickory_roundtrip() {
        for rt in [RecordType::A, RecordType::AAAA, RecordType::CNAME, RecordType::TXT] {
            assert_eq!(RecordType::from_hickory(rt.to_hickory()), rt);
        }
    }
}
