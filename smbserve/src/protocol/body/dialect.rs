use serde::{Deserialize, Serialize};

/// Legacy dialect string negotiated by the older family.
pub const NT_LAN_MANAGER_DIALECT: &str = "NT LM 0.12";
/// Wildcard dialect string a legacy-framed negotiate uses to probe for the
/// modern family.
pub const SMB2_WILDCARD_DIALECT: &str = "SMB 2.???";
/// Wire code of the modern-family wildcard dialect.
pub const SMB2_WILDCARD_CODE: u16 = 0x02FF;

/// Negotiated protocol dialect of a connection.
///
/// `NotSet` is the initial state; once a connection moves to any other value
/// it never changes again.
#[derive(Debug, Eq, PartialEq, Serialize, Deserialize, Copy, Clone, Ord, PartialOrd, Default, Hash)]
#[allow(non_camel_case_types)]
pub enum SMBDialect {
    #[default]
    NotSet,
    NtLm012,
    V2_0_2,
    V2_1_0,
    V3_0_0,
}

impl SMBDialect {
    pub fn is_smb2(&self) -> bool {
        matches!(self, SMBDialect::V2_0_2 | SMBDialect::V2_1_0 | SMBDialect::V3_0_0)
    }

    pub fn wire_code(&self) -> Option<u16> {
        match self {
            SMBDialect::V2_0_2 => Some(0x0202),
            SMBDialect::V2_1_0 => Some(0x0210),
            SMBDialect::V3_0_0 => Some(0x0300),
            _ => None,
        }
    }

    pub fn from_wire_code(code: u16) -> Option<Self> {
        match code {
            0x0202 => Some(SMBDialect::V2_0_2),
            0x0210 => Some(SMBDialect::V2_1_0),
            0x0300 => Some(SMBDialect::V3_0_0),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_values_match_spec() {
        assert_eq!(SMBDialect::V2_0_2.wire_code(), Some(0x0202));
        assert_eq!(SMBDialect::V2_1_0.wire_code(), Some(0x0210));
        assert_eq!(SMBDialect::V3_0_0.wire_code(), Some(0x0300));
        assert_eq!(SMBDialect::NotSet.wire_code(), None);
        assert_eq!(SMBDialect::NtLm012.wire_code(), None);
    }

    #[test]
    fn family_classification() {
        assert!(!SMBDialect::NotSet.is_smb2());
        assert!(!SMBDialect::NtLm012.is_smb2());
        assert!(SMBDialect::V2_0_2.is_smb2());
        assert!(SMBDialect::V3_0_0.is_smb2());
    }

    #[test]
    fn dialect_ordering_prefers_newest() {
        assert!(SMBDialect::V2_0_2 < SMBDialect::V2_1_0);
        assert!(SMBDialect::V2_1_0 < SMBDialect::V3_0_0);
    }
}
