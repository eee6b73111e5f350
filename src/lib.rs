pub mod crypto;
mod error;
pub mod format;
pub mod storage;

pub use crate::crypto::{CryptoError, KeyError, SecretKey, load_key};
pub use crate::error::Error;
pub use crate::format::{CodecError, Token};
pub use crate::storage::{Storage, StorageError};
use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

/// Encrypts and decrypts file contents under one secret key.
pub struct Filecrypt {
    key: SecretKey,
}

impl Filecrypt {
    pub fn new(key: SecretKey) -> Self {
        Self { key }
    }

    pub fn from_encoded_key(raw: &str) -> Result<Self, KeyError> {
        Ok(Self::new(load_key(raw)?))
    }

    /// Seals `plaintext` into token text stamped with the current time.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String, Error> {
        self.encrypt_at(plaintext, unix_now())
    }

    pub fn encrypt_at(&self, plaintext: &[u8], now: u64) -> Result<String, Error> {
        let token = crypto::seal(plaintext, &self.key, now)?;
        debug!(
            timestamp = token.timestamp(),
            ciphertext_len = token.ciphertext().len(),
            "token sealed"
        );
        Ok(format::encode(&token))
    }

    /// Verifies and decrypts token text.
    ///
    /// With `ttl`, tokens older than `ttl` seconds are rejected as expired.
    pub fn decrypt(&self, text: &str, ttl: Option<u64>) -> Result<Zeroizing<Vec<u8>>, Error> {
        self.decrypt_at(text, ttl, unix_now())
    }

    pub fn decrypt_at(
        &self,
        text: &str,
        ttl: Option<u64>,
        now: u64,
    ) -> Result<Zeroizing<Vec<u8>>, Error> {
        let token = format::decode(text)?;
        Ok(crypto::open(&token, &self.key, ttl, now)?)
    }

    /// Reads a whole file and returns its contents as token text.
    pub fn encrypt_file(&self, source: &Storage) -> Result<String> {
        source.check_source()?;
        let plaintext = Zeroizing::new(source.load()?);

        info!(
            path = %source.path().display(),
            bytes = plaintext.len(),
            "encrypting file"
        );

        Ok(self.encrypt(&plaintext)?)
    }

    /// Reads a file holding token text and returns the recovered plaintext.
    pub fn decrypt_file(&self, source: &Storage, ttl: Option<u64>) -> Result<Zeroizing<Vec<u8>>> {
        source.check_source()?;
        let data = source.load()?;
        let text = std::str::from_utf8(&data).map_err(|_| Error::Codec(CodecError::Malformed))?;

        info!(path = %source.path().display(), "decrypting file");

        match self.decrypt(text, ttl) {
            Ok(plaintext) => Ok(plaintext),
            Err(e) => {
                warn!(path = %source.path().display(), "file could not be decrypted");
                Err(e.into())
            }
        }
    }
}

/// Current Unix time in whole seconds; clocks before 1970 read as 0.
pub fn unix_now() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{Engine as _, engine::general_purpose::URL_SAFE};
    use tempfile::tempdir;

    fn encoded_key(fill: u8) -> String {
        URL_SAFE.encode([fill; 32])
    }

    #[test]
    fn filecrypt_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Filecrypt>();
        assert_send_sync::<SecretKey>();
        assert_send_sync::<Token>();
    }

    #[test]
    fn encrypt_decrypt_text_roundtrip() {
        let fc = Filecrypt::from_encoded_key(&encoded_key(1)).unwrap();
        let token = fc.encrypt(b"groceries: 42.10").unwrap();

        assert_eq!(fc.decrypt(&token, None).unwrap().as_slice(), b"groceries: 42.10");
    }

    #[test]
    fn malformed_key_rejected_before_encrypting() {
        let short = URL_SAFE.encode([1u8; 10]);
        assert!(matches!(
            Filecrypt::from_encoded_key(&short),
            Err(KeyError::Malformed)
        ));
    }

    #[test]
    fn decrypt_reports_codec_error_for_garbage() {
        let fc = Filecrypt::from_encoded_key(&encoded_key(2)).unwrap();
        assert_eq!(
            fc.decrypt("plain old notes", None).unwrap_err(),
            Error::Codec(CodecError::Malformed)
        );
    }

    #[test]
    fn wrong_key_and_tamper_look_the_same() {
        let fc = Filecrypt::from_encoded_key(&encoded_key(3)).unwrap();
        let other = Filecrypt::from_encoded_key(&encoded_key(4)).unwrap();
        let token = fc.encrypt_at(b"data", 1000).unwrap();

        let mut bytes = URL_SAFE.decode(&token).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x80;
        let tampered = URL_SAFE.encode(&bytes);

        let wrong_key = other.decrypt_at(&token, None, 1000).unwrap_err();
        let tamper = fc.decrypt_at(&tampered, None, 1000).unwrap_err();

        assert_eq!(wrong_key, tamper);
        assert_eq!(wrong_key.to_string(), tamper.to_string());
    }

    #[test]
    fn decrypt_at_honours_ttl() {
        let fc = Filecrypt::from_encoded_key(&encoded_key(5)).unwrap();
        let token = fc.encrypt_at(b"data", 1000).unwrap();

        assert!(fc.decrypt_at(&token, Some(10), 1010).is_ok());
        assert_eq!(
            fc.decrypt_at(&token, Some(10), 1011).unwrap_err(),
            Error::Crypto(CryptoError::Expired)
        );
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempdir().unwrap();
        let source = Storage::new(dir.path().join("notes.md"));
        source.save(b"# Raw thoughts\n").unwrap();

        let fc = Filecrypt::from_encoded_key(&encoded_key(6)).unwrap();
        let token = fc.encrypt_file(&source).unwrap();

        let encrypted = Storage::new(dir.path().join("notes_encrypt.md"));
        encrypted.save(format!("{token}\n").as_bytes()).unwrap();

        let plaintext = fc.decrypt_file(&encrypted, None).unwrap();
        assert_eq!(plaintext.as_slice(), b"# Raw thoughts\n");
    }

    #[test]
    fn encrypt_file_refuses_directory() {
        let dir = tempdir().unwrap();
        let fc = Filecrypt::from_encoded_key(&encoded_key(7)).unwrap();

        let err = fc
            .encrypt_file(&Storage::new(dir.path().to_path_buf()))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StorageError>(),
            Some(StorageError::SourceIsDirectory(_))
        ));
    }

    #[test]
    fn decrypt_file_rejects_binary_content() {
        let dir = tempdir().unwrap();
        let source = Storage::new(dir.path().join("blob.bin"));
        source.save(&[0xff, 0xfe, 0x00, 0x80]).unwrap();

        let fc = Filecrypt::from_encoded_key(&encoded_key(8)).unwrap();
        let err = fc.decrypt_file(&source, None).unwrap_err();
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::Codec(CodecError::Malformed))
        );
    }

    #[test]
    fn unix_now_is_after_2020() {
        assert!(unix_now() > 1_577_836_800);
    }
}
