use thiserror::Error;

use crate::crypto::{CryptoError, KeyError};
use crate::format::CodecError;

/// Any failure of the in-memory encrypt/decrypt path.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}
