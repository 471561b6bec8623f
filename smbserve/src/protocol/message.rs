use serde::{Deserialize, Serialize};

use smbserve_core::error::SMBError;
use smbserve_core::SMBResult;

use crate::protocol::body::{LegacySMBBody, SMBBody};
use crate::protocol::header::{Header, LegacySMBHeader, SMBSyncHeader};
use crate::util::crypto;

pub type SMBMessageType = SMBMessage<SMBSyncHeader, SMBBody>;

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBMessage<S: Header, T> {
    pub header: S,
    pub body: T,
}

impl<S: Header, T> SMBMessage<S, T> {
    pub fn new(header: S, body: T) -> Self {
        SMBMessage { header, body }
    }
}

impl SMBMessage<SMBSyncHeader, SMBBody> {
    /// Canonical byte form of this message with the signature field zeroed;
    /// the integrity tag is computed over these bytes.
    fn signing_bytes(&self) -> SMBResult<Vec<u8>> {
        let mut unsigned = self.clone();
        unsigned.header.signature = [0; 16];
        bincode::serialize(&unsigned).map_err(SMBError::crypto_error)
    }

    pub fn signature(&self, signing_key: &[u8]) -> SMBResult<[u8; 16]> {
        let bytes = self.signing_bytes()?;
        crypto::sign_message_bytes(signing_key, &bytes)
    }

    /// Compute and stamp the integrity tag.
    pub fn sign(&mut self, signing_key: &[u8]) -> SMBResult<()> {
        self.header.signature = self.signature(signing_key)?;
        Ok(())
    }

    /// Check a stamped tag against the message content.
    pub fn verify_signature(&self, signing_key: &[u8]) -> SMBResult<bool> {
        Ok(self.signature(signing_key)? == self.header.signature)
    }
}

/// One legacy-family message: a shared header and an AndX command batch.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LegacySMBMessage {
    pub header: LegacySMBHeader,
    pub commands: Vec<LegacySMBBody>,
}

impl LegacySMBMessage {
    pub fn new(header: LegacySMBHeader, commands: Vec<LegacySMBBody>) -> Self {
        Self { header, commands }
    }

    pub fn single(header: LegacySMBHeader, command: LegacySMBBody) -> Self {
        Self {
            header,
            commands: vec![command],
        }
    }
}

/// One decoded transport unit, as delivered by (and handed to) the framing
/// layer.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub enum SMBFrame {
    /// Modern-family message chain; more than one entry means a compound
    /// request.
    Smb2(Vec<SMBMessageType>),
    Legacy(LegacySMBMessage),
}

impl SMBFrame {
    pub fn single(message: SMBMessageType) -> Self {
        SMBFrame::Smb2(vec![message])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::body::empty::SMBEchoRequest;
    use crate::protocol::header::SMBCommandCode;

    #[test]
    fn signing_round_trip() {
        let header = SMBSyncHeader::request(SMBCommandCode::Echo, 1, 2, 0);
        let mut message = SMBMessage::new(header, SMBBody::EchoRequest(SMBEchoRequest::default()));
        let key = [7u8; 16];
        message.sign(&key).unwrap();
        assert_ne!(message.header.signature, [0; 16]);
        assert!(message.verify_signature(&key).unwrap());
    }

    #[test]
    fn signature_depends_on_key_and_content() {
        let header = SMBSyncHeader::request(SMBCommandCode::Echo, 1, 2, 0);
        let mut message = SMBMessage::new(header, SMBBody::EchoRequest(SMBEchoRequest::default()));
        message.sign(&[7u8; 16]).unwrap();
        assert!(!message.verify_signature(&[8u8; 16]).unwrap());

        let mut tampered = message.clone();
        tampered.header.message_id = 99;
        assert!(!tampered.verify_signature(&[7u8; 16]).unwrap());
    }
}
