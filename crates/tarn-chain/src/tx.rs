//! Indexed transactions: an owning transaction plus its derived identity.

use tarn_codec::types::{Hash256, OutPoint, Transaction};

/// A transaction admitted to the index, keyed by its hash, together with
/// its serialized length and the hash of the block that carried it.
#[derive(Clone, Debug)]
pub struct IndexedTx {
    /// The decoded transaction.
    pub tx: Transaction,
    this_hash: Hash256,
    n_bytes: u32,
    block_hash: Hash256,
}

impl IndexedTx {
    pub(crate) fn new(tx: Transaction, this_hash: Hash256, n_bytes: u32, block_hash: Hash256) -> Self {
        Self { tx, this_hash, n_bytes, block_hash }
    }

    /// Double SHA-256 of the serialized transaction, computed at ingest.
    pub fn this_hash(&self) -> Hash256 {
        self.this_hash
    }

    /// Serialized length in bytes.
    pub fn n_bytes(&self) -> u32 {
        self.n_bytes
    }

    /// Hash of the block header this transaction arrived under.
    pub fn block_hash(&self) -> Hash256 {
        self.block_hash
    }

    /// The outpoint naming this transaction's `index`-th output.
    pub fn outpoint(&self, index: u32) -> OutPoint {
        OutPoint::new(self.this_hash, index)
    }
}
