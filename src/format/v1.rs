//! Token layout, version 0x80.
//!
//! ```text
//! VERSION (1) | TIMESTAMP (8, big-endian) | IV (16) | CIPHERTEXT (16·n) | HMAC-SHA256 (32)
//! ```

use super::{CodecError, Token};
use crate::crypto::{IV_LEN, TAG_LEN};

/// Version byte of the only supported layout.
pub const VERSION_V1: u8 = 0x80;

const VER_LEN: usize = 1;
const TIMESTAMP_LEN: usize = 8;

const HEADER_LEN: usize = VER_LEN + TIMESTAMP_LEN + IV_LEN;

/// Smallest well-formed token: header and tag with no ciphertext.
pub const MIN_LEN: usize = HEADER_LEN + TAG_LEN;

/// `version || timestamp || iv || ciphertext`
pub fn signed_parts(timestamp: u64, iv: &[u8; IV_LEN], ciphertext: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + ciphertext.len() + TAG_LEN);

    buf.push(VERSION_V1);
    buf.extend_from_slice(&timestamp.to_be_bytes());
    buf.extend_from_slice(iv);
    buf.extend_from_slice(ciphertext);

    buf
}

pub fn parse(data: &[u8]) -> Result<Token, CodecError> {
    if data.len() < MIN_LEN || data[0] != VERSION_V1 {
        return Err(CodecError::Malformed);
    }

    let mut offset = VER_LEN;

    let timestamp = u64::from_be_bytes(
        data[offset..offset + TIMESTAMP_LEN]
            .try_into()
            .map_err(|_| CodecError::Malformed)?,
    );
    offset += TIMESTAMP_LEN;

    let iv: [u8; IV_LEN] = data[offset..offset + IV_LEN]
        .try_into()
        .map_err(|_| CodecError::Malformed)?;
    offset += IV_LEN;

    let tag_start = data.len() - TAG_LEN;
    let ciphertext = data[offset..tag_start].to_vec();

    let tag: [u8; TAG_LEN] = data[tag_start..]
        .try_into()
        .map_err(|_| CodecError::Malformed)?;

    Ok(Token::new(timestamp, iv, ciphertext, tag))
}

pub fn serialize(token: &Token) -> Vec<u8> {
    let mut buf = signed_parts(token.timestamp(), token.iv(), token.ciphertext());
    buf.extend_from_slice(token.tag());
    buf
}
