//! Token wire format.
//!
//! A token is the url-safe base64 text of a version-tagged binary layout.
//! Parsing dispatches on the leading version byte.

use base64::{
    Engine as _,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::crypto::{IV_LEN, TAG_LEN};

pub mod v1;

/// Url-safe alphabet; padded on output, padding optional on input.
pub const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Latest token version
pub const CURRENT_VERSION: u8 = v1::VERSION_V1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("not a valid token")]
    Malformed,
}

/// A parsed token.
///
/// Nothing in it is trustworthy until [`crate::crypto::open`] has verified the tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    version: u8,
    timestamp: u64,
    iv: [u8; IV_LEN],
    ciphertext: Vec<u8>,
    tag: [u8; TAG_LEN],
}

impl Token {
    pub fn new(timestamp: u64, iv: [u8; IV_LEN], ciphertext: Vec<u8>, tag: [u8; TAG_LEN]) -> Self {
        Self {
            version: CURRENT_VERSION,
            timestamp,
            iv,
            ciphertext,
            tag,
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Seconds since the Unix epoch at which the token was sealed.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// The timestamp as a UTC date, if it is representable.
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.timestamp).ok()?;
        DateTime::from_timestamp(secs, 0)
    }

    pub fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }

    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    pub fn tag(&self) -> &[u8; TAG_LEN] {
        &self.tag
    }

    pub(crate) fn set_tag(&mut self, tag: [u8; TAG_LEN]) {
        self.tag = tag;
    }

    /// The bytes covered by the tag: everything before it on the wire.
    pub fn authenticated_bytes(&self) -> Vec<u8> {
        v1::signed_parts(self.timestamp, &self.iv, &self.ciphertext)
    }

    /// Full binary layout, tag included.
    pub fn to_bytes(&self) -> Vec<u8> {
        v1::serialize(self)
    }
}

/// Parses raw token bytes.
///
/// # Errors
///
/// Returns [`CodecError::Malformed`] if the data is empty, the version is
/// unsupported, or the layout is too short.
pub fn parse(data: &[u8]) -> Result<Token, CodecError> {
    match data.first() {
        Some(&v1::VERSION_V1) => v1::parse(data),
        _ => Err(CodecError::Malformed),
    }
}

/// Encodes a token as url-safe base64 text without line breaks.
pub fn encode(token: &Token) -> String {
    URL_SAFE_LENIENT.encode(token.to_bytes())
}

/// Decodes token text produced by [`encode`].
///
/// Leading and trailing whitespace is ignored.
pub fn decode(text: &str) -> Result<Token, CodecError> {
    let data = URL_SAFE_LENIENT
        .decode(text.trim())
        .map_err(|_| CodecError::Malformed)?;
    parse(&data)
}
