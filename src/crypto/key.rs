use super::{KEY_LEN, SUBKEY_LEN};
use base64::Engine as _;
use thiserror::Error;
use zeroize::Zeroize;

use crate::format::URL_SAFE_LENIENT;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid key: expected {KEY_LEN} bytes of url-safe base64")]
    Malformed,
}

/// A 32-byte secret split into an HMAC signing half and an AES encryption half.
///
/// Both halves are wiped when the key is dropped.
#[derive(Clone)]
pub struct SecretKey {
    signing_key: [u8; SUBKEY_LEN],
    encryption_key: [u8; SUBKEY_LEN],
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.signing_key.zeroize();
        self.encryption_key.zeroize();
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

impl SecretKey {
    pub fn from_bytes(bytes: &[u8; KEY_LEN]) -> Self {
        let mut signing_key = [0u8; SUBKEY_LEN];
        let mut encryption_key = [0u8; SUBKEY_LEN];
        signing_key.copy_from_slice(&bytes[..SUBKEY_LEN]);
        encryption_key.copy_from_slice(&bytes[SUBKEY_LEN..]);
        Self {
            signing_key,
            encryption_key,
        }
    }

    pub fn signing_key(&self) -> &[u8; SUBKEY_LEN] {
        &self.signing_key
    }

    pub fn encryption_key(&self) -> &[u8; SUBKEY_LEN] {
        &self.encryption_key
    }
}

/// Parse a url-safe base64 secret.
///
/// Any 32-byte value is accepted; a wrong key only surfaces later as a
/// failed token verification.
pub fn load_key(raw: &str) -> Result<SecretKey, KeyError> {
    let mut decoded = URL_SAFE_LENIENT
        .decode(raw.trim())
        .map_err(|_| KeyError::Malformed)?;

    let result = match <&[u8; KEY_LEN]>::try_from(decoded.as_slice()) {
        Ok(bytes) => Ok(SecretKey::from_bytes(bytes)),
        Err(_) => Err(KeyError::Malformed),
    };
    decoded.zeroize();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};

    #[test]
    fn key_is_split_in_halves() {
        let mut raw = [0u8; KEY_LEN];
        for (i, b) in raw.iter_mut().enumerate() {
            *b = i as u8;
        }
        let key = load_key(&URL_SAFE.encode(raw)).unwrap();

        assert_eq!(key.signing_key(), &raw[..16]);
        assert_eq!(key.encryption_key(), &raw[16..]);
    }

    #[test]
    fn padded_key_is_44_chars() {
        let encoded = URL_SAFE.encode([7u8; KEY_LEN]);
        assert_eq!(encoded.len(), 44);
        assert!(load_key(&encoded).is_ok());
    }

    #[test]
    fn unpadded_key_and_trailing_newline_accepted() {
        let encoded = URL_SAFE_NO_PAD.encode([7u8; KEY_LEN]);
        assert!(load_key(&encoded).is_ok());
        assert!(load_key(&format!("{encoded}\n")).is_ok());
    }

    #[test]
    fn short_key_is_malformed() {
        let encoded = URL_SAFE.encode([1u8; 10]);
        assert_eq!(load_key(&encoded).unwrap_err(), KeyError::Malformed);
    }

    #[test]
    fn long_key_is_malformed() {
        let encoded = URL_SAFE.encode([1u8; 33]);
        assert_eq!(load_key(&encoded).unwrap_err(), KeyError::Malformed);
    }

    #[test]
    fn non_base64_key_is_malformed() {
        assert_eq!(
            load_key("MySuperUnhackableKey!").unwrap_err(),
            KeyError::Malformed
        );
        assert_eq!(load_key("").unwrap_err(), KeyError::Malformed);
    }

    #[test]
    fn standard_alphabet_is_rejected() {
        // 0xfb 0xff encodes to "+/" in the standard alphabet
        let encoded = base64::engine::general_purpose::STANDARD.encode([0xfbu8; KEY_LEN]);
        assert!(encoded.contains('+') || encoded.contains('/'));
        assert_eq!(load_key(&encoded).unwrap_err(), KeyError::Malformed);
    }

    #[test]
    fn debug_does_not_leak_key() {
        let key = SecretKey::from_bytes(&[0xab; KEY_LEN]);
        assert_eq!(format!("{key:?}"), "SecretKey(..)");
    }
}
