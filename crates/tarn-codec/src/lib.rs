//! # tarn-codec
//! Wire codec for Bitcoin-shaped block data.
//!
//! Provides the binary cursor, the owning record types
//! ([`types::Transaction`], [`types::BlockHeader`], …), and the zero-copy
//! view types ([`view::TxView`], …) that borrow directly into a block
//! buffer with precomputed field offsets.

pub mod cursor;
pub mod error;
pub mod script;
pub mod types;
pub mod view;

pub use cursor::{Cursor, Writer, varint_len};
pub use error::CodecError;
pub use types::{BlockHeader, Hash256, OutPoint, Transaction, TxIn, TxOut, HEADER_SIZE};
