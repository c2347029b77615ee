//! Error types for ingestion and chain organization.
use thiserror::Error;

use tarn_codec::CodecError;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("bad magic at file offset {offset}: got {got:02x?}, expected {expected:02x?}")]
    BadMagic { offset: u64, got: [u8; 4], expected: [u8; 4] },
    #[error("bad size: {0}")]
    BadSize(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
