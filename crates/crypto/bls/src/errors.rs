use thiserror::Error;

use crate::supranational::errors::BlstError;

#[derive(Error, Debug)]
pub enum BLSError {
    #[error("blst error: {0}")]
    BlstError(#[from] BlstError),
    #[error("invalid hex string")]
    InvalidHexString,
    #[error("invalid byte length")]
    InvalidByteLength,
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("invalid signature")]
    InvalidSignature,
}
