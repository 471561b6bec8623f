use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use smbserve_core::error::SMBError;
use smbserve_core::SMBResult;

const SIGNING_KEY_LABEL: &[u8] = b"SMBSigningKey\0";

/// Derive the per-session signing key from the provider session key.
pub fn derive_signing_key(session_key: &[u8]) -> SMBResult<[u8; 16]> {
    let hkdf = Hkdf::<Sha256>::new(None, session_key);
    let mut okm = [0u8; 16];
    hkdf.expand(SIGNING_KEY_LABEL, &mut okm)
        .map_err(SMBError::crypto_error)?;
    Ok(okm)
}

/// HMAC-SHA256 integrity tag over canonical message bytes, truncated to the
/// header's 16-byte signature field.
pub fn sign_message_bytes(signing_key: &[u8], bytes: &[u8]) -> SMBResult<[u8; 16]> {
    let mut hmac = Hmac::<Sha256>::new_from_slice(signing_key).map_err(SMBError::crypto_error)?;
    hmac.update(bytes);
    let full = hmac.finalize().into_bytes();
    let mut signature = [0u8; 16];
    signature.copy_from_slice(&full[..16]);
    Ok(signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_key_is_stable() {
        let a = derive_signing_key(b"session key material").unwrap();
        let b = derive_signing_key(b"session key material").unwrap();
        assert_eq!(a, b);
        let c = derive_signing_key(b"different material").unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn signatures_differ_by_content() {
        let key = derive_signing_key(b"k").unwrap();
        let a = sign_message_bytes(&key, b"one").unwrap();
        let b = sign_message_bytes(&key, b"two").unwrap();
        assert_ne!(a, b);
    }
}
