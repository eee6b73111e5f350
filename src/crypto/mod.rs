//! Cryptographic primitives for file tokens.
//!
//! Provides key loading, authenticated encryption, and token verification.

pub mod cipher;
pub mod key;

pub use cipher::{CryptoError, open, seal};
pub use key::{KeyError, SecretKey, load_key};

/// Length of the encoded secret once decoded (32 bytes).
pub const KEY_LEN: usize = 32;
/// Length of each half of the secret (16 bytes / 128 bits).
pub const SUBKEY_LEN: usize = 16;
/// Length of the CBC initialization vector (16 bytes).
pub const IV_LEN: usize = 16;
/// AES block size (16 bytes).
pub const BLOCK_LEN: usize = 16;
/// Length of the HMAC-SHA256 tag (32 bytes).
pub const TAG_LEN: usize = 32;
/// Accepted distance of a token timestamp into the future, in seconds.
pub const MAX_CLOCK_SKEW: u64 = 60;
