use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

#[repr(u16)]
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, Serialize, Deserialize, Copy, Clone, Hash)]
pub enum SMBCommandCode {
    Negotiate = 0x00,
    SessionSetup = 0x01,
    Logoff = 0x02,
    TreeConnect = 0x03,
    TreeDisconnect = 0x04,
    Create = 0x05,
    Close = 0x06,
    Flush = 0x07,
    Read = 0x08,
    Write = 0x09,
    Lock = 0x0A,
    IoCtl = 0x0B,
    Cancel = 0x0C,
    Echo = 0x0D,
    QueryDirectory = 0x0E,
    ChangeNotify = 0x0F,
    QueryInfo = 0x10,
    SetInfo = 0x11,
    OplockBreak = 0x12,
    // Dialect negotiation arriving in a legacy-framed request; answered with
    // a wildcard negotiate response from the modern engine.
    LegacyNegotiate = 0xFF,
}

#[repr(u8)]
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, Serialize, Deserialize, Copy, Clone, Hash)]
pub enum LegacySMBCommandCode {
    Close = 0x04,
    Flush = 0x05,
    Echo = 0x2B,
    ReadAndX = 0x2E,
    WriteAndX = 0x2F,
    Transaction2 = 0x32,
    FindClose2 = 0x34,
    TreeDisconnect = 0x71,
    Negotiate = 0x72,
    SessionSetupAndX = 0x73,
    LogoffAndX = 0x74,
    TreeConnectAndX = 0x75,
    NTTransact = 0xA0,
    NTCreateAndX = 0xA2,
    NTCancel = 0xA4,
}

impl LegacySMBCommandCode {
    /// AndX command responses may carry a follow-up command in the same
    /// message; all other responses terminate a batch.
    pub fn is_andx(&self) -> bool {
        matches!(
            self,
            LegacySMBCommandCode::ReadAndX
                | LegacySMBCommandCode::WriteAndX
                | LegacySMBCommandCode::SessionSetupAndX
                | LegacySMBCommandCode::LogoffAndX
                | LegacySMBCommandCode::TreeConnectAndX
                | LegacySMBCommandCode::NTCreateAndX
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_codes_match_command_set() {
        assert_eq!(LegacySMBCommandCode::Negotiate as u8, 0x72);
        assert_eq!(LegacySMBCommandCode::SessionSetupAndX as u8, 0x73);
        assert_eq!(LegacySMBCommandCode::NTCreateAndX as u8, 0xA2);
        assert_eq!(LegacySMBCommandCode::NTCancel as u8, 0xA4);
    }

    #[test]
    fn andx_classification() {
        assert!(LegacySMBCommandCode::TreeConnectAndX.is_andx());
        assert!(LegacySMBCommandCode::NTCreateAndX.is_andx());
        assert!(!LegacySMBCommandCode::Close.is_andx());
        assert!(!LegacySMBCommandCode::Negotiate.is_andx());
    }
}
