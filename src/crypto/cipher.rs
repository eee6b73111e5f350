//! AES-128-CBC encryption authenticated with HMAC-SHA256.
//!
//! The tag covers `version || timestamp || iv || ciphertext` and is checked
//! before the timestamp or the ciphertext are looked at.

use aes::Aes128;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use hmac::digest::{Key, KeyInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

use super::{BLOCK_LEN, IV_LEN, MAX_CLOCK_SKEW, SUBKEY_LEN, TAG_LEN, key::SecretKey};
use crate::format::Token;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type HmacSha256 = Hmac<Sha256>;

/// SHA-256 block size; HMAC zero-pads shorter keys to this length.
const HMAC_BLOCK_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Tag mismatch, bad padding, or a timestamp too far in the future.
    /// Never says which.
    #[error("invalid token")]
    InvalidToken,

    #[error("token has expired")]
    Expired,

    #[error("OS random generator unavailable")]
    Entropy,
}

/// Encrypt `plaintext` under a fresh IV drawn from the OS CSPRNG.
pub fn seal(plaintext: &[u8], key: &SecretKey, now: u64) -> Result<Token, CryptoError> {
    let mut iv = [0u8; IV_LEN];
    getrandom::fill(&mut iv).map_err(|_| CryptoError::Entropy)?;
    seal_with_iv(plaintext, key, now, iv)
}

/// Encrypt with a caller-chosen IV. Only for known-answer tests.
pub(crate) fn seal_with_iv(
    plaintext: &[u8],
    key: &SecretKey,
    now: u64,
    iv: [u8; IV_LEN],
) -> Result<Token, CryptoError> {
    let ciphertext = Aes128CbcEnc::new(&(*key.encryption_key()).into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut token = Token::new(now, iv, ciphertext, [0u8; TAG_LEN]);

    let mut mac = keyed_mac(key);
    mac.update(&token.authenticated_bytes());
    token.set_tag(mac.finalize().into_bytes().into());

    Ok(token)
}

/// Verify and decrypt a token.
///
/// With `ttl`, a token older than `ttl` seconds at `now` is [`CryptoError::Expired`];
/// that check only runs once the tag has verified.
pub fn open(
    token: &Token,
    key: &SecretKey,
    ttl: Option<u64>,
    now: u64,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let mut mac = keyed_mac(key);
    mac.update(&token.authenticated_bytes());
    // constant-time comparison
    mac.verify_slice(token.tag())
        .map_err(|_| CryptoError::InvalidToken)?;

    if let Some(ttl) = ttl {
        if token.timestamp() > now.saturating_add(MAX_CLOCK_SKEW) {
            return Err(CryptoError::InvalidToken);
        }
        if now.saturating_sub(token.timestamp()) > ttl {
            return Err(CryptoError::Expired);
        }
    }

    let ciphertext = token.ciphertext();
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(CryptoError::InvalidToken);
    }

    Aes128CbcDec::new(&(*key.encryption_key()).into(), &(*token.iv()).into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::InvalidToken)
}

fn keyed_mac(key: &SecretKey) -> HmacSha256 {
    let mut block = Zeroizing::new([0u8; HMAC_BLOCK_LEN]);
    block[..SUBKEY_LEN].copy_from_slice(key.signing_key());
    <HmacSha256 as KeyInit>::new(Key::<HmacSha256>::from_slice(&block[..]))
}
