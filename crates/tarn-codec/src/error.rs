//! Error type for the wire codec.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("truncated: need {need} more bytes, {have} remain")] Truncated { need: usize, have: usize },
}
