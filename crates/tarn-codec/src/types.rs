//! Owning record types for the chain wire format.
//!
//! Each record encodes and decodes through [`Cursor`]/[`Writer`] in the
//! exact on-wire layout (little-endian integers, canonical varints,
//! length-prefixed byte strings). Owning records are safe to outlive the
//! buffer they were parsed from; during bulk scans prefer the borrowed
//! shapes in [`crate::view`].

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::cursor::{Cursor, Writer, varint_len};
use crate::error::CodecError;
use crate::script;

/// Serialized block header size in bytes.
pub const HEADER_SIZE: usize = 80;

/// Serialized outpoint size in bytes.
pub const OUTPOINT_SIZE: usize = 36;

/// A 32-byte hash. Canonical record hashes are double SHA-256 over the
/// serialized record. Ordering is lexicographic over the raw bytes.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash. Marks the genesis parent and null outpoints.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Double SHA-256 of `data`.
    pub fn double_sha256(data: &[u8]) -> Self {
        let first = Sha256::digest(data);
        Self(Sha256::digest(first).into())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let raw = hex::decode(s).ok()?;
        let bytes: [u8; 32] = raw.try_into().ok()?;
        Some(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Reference to one output of a previous transaction: 32-byte tx hash plus
/// output index. Ordering is by (hash, index) so outpoints can key ordered
/// maps.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
pub struct OutPoint {
    pub tx_hash: Hash256,
    pub tx_out_index: u32,
}

impl OutPoint {
    pub fn new(tx_hash: Hash256, tx_out_index: u32) -> Self {
        Self { tx_hash, tx_out_index }
    }

    /// The null outpoint: zero hash, index `0xFFFF_FFFF`. Coinbase inputs
    /// spend this sentinel.
    pub fn null() -> Self {
        Self { tx_hash: Hash256::ZERO, tx_out_index: u32::MAX }
    }

    pub fn is_null(&self) -> bool {
        self.tx_hash.is_zero() && self.tx_out_index == u32::MAX
    }

    pub fn decode(c: &mut Cursor<'_>) -> Result<Self, CodecError> {
        let tx_hash = Hash256(c.read_array()?);
        let tx_out_index = c.read_u32()?;
        Ok(Self { tx_hash, tx_out_index })
    }

    pub fn encode(&self, w: &mut Writer) {
        w.put_bytes(self.tx_hash.as_bytes());
        w.put_u32(self.tx_out_index);
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.tx_hash, self.tx_out_index)
    }
}

/// A transaction input: the outpoint it spends, the unlock script, and the
/// sequence number.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxIn {
    pub outpoint: OutPoint,
    pub script: Vec<u8>,
    pub sequence: u32,
}

impl TxIn {
    /// A coinbase input spends the null outpoint.
    pub fn is_coinbase(&self) -> bool {
        self.outpoint.is_null()
    }

    pub fn decode(c: &mut Cursor<'_>) -> Result<Self, CodecError> {
        let outpoint = OutPoint::decode(c)?;
        let script_len = c.read_varint()? as usize;
        let script = c.read_bytes(script_len)?;
        let sequence = c.read_u32()?;
        Ok(Self { outpoint, script, sequence })
    }

    pub fn encode(&self, w: &mut Writer) {
        self.outpoint.encode(w);
        w.put_varint(self.script.len() as u64);
        w.put_bytes(&self.script);
        w.put_u32(self.sequence);
    }

    /// Serialized length in bytes.
    pub fn byte_len(&self) -> usize {
        OUTPOINT_SIZE + varint_len(self.script.len() as u64) + self.script.len() + 4
    }
}

/// A transaction output: value in satoshis and the locking script.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxOut {
    pub value: u64,
    pub pk_script: Vec<u8>,
}

impl TxOut {
    /// Whether the locking script matches one of the standard templates.
    pub fn is_standard(&self) -> bool {
        script::classify(&self.pk_script) != script::ScriptClass::NonStandard
    }

    /// The 20-byte recipient address, when the script carries one.
    pub fn recipient_address(&self) -> Option<script::AddressHash> {
        script::recipient_address(&self.pk_script)
    }

    pub fn decode(c: &mut Cursor<'_>) -> Result<Self, CodecError> {
        let value = c.read_u64()?;
        let script_len = c.read_varint()? as usize;
        let pk_script = c.read_bytes(script_len)?;
        Ok(Self { value, pk_script })
    }

    pub fn encode(&self, w: &mut Writer) {
        w.put_u64(self.value);
        w.put_varint(self.pk_script.len() as u64);
        w.put_bytes(&self.pk_script);
    }

    /// Serialized length in bytes.
    pub fn byte_len(&self) -> usize {
        8 + varint_len(self.pk_script.len() as u64) + self.pk_script.len()
    }
}

/// A transaction: version, inputs, outputs, lock time.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
}

impl Transaction {
    /// Compute the transaction hash: double SHA-256 of the serialization.
    pub fn hash(&self) -> Hash256 {
        Hash256::double_sha256(&self.to_bytes())
    }

    /// Whether this is a coinbase transaction (single null-outpoint input).
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }

    /// The outpoint naming this transaction's `index`-th output.
    pub fn outpoint(&self, index: u32) -> OutPoint {
        OutPoint::new(self.hash(), index)
    }

    pub fn decode(c: &mut Cursor<'_>) -> Result<Self, CodecError> {
        let version = c.read_u32()?;
        let num_in = c.read_varint()?;
        let mut inputs = Vec::new();
        for _ in 0..num_in {
            inputs.push(TxIn::decode(c)?);
        }
        let num_out = c.read_varint()?;
        let mut outputs = Vec::new();
        for _ in 0..num_out {
            outputs.push(TxOut::decode(c)?);
        }
        let lock_time = c.read_u32()?;
        Ok(Self { version, inputs, outputs, lock_time })
    }

    pub fn encode(&self, w: &mut Writer) {
        w.put_u32(self.version);
        w.put_varint(self.inputs.len() as u64);
        for input in &self.inputs {
            input.encode(w);
        }
        w.put_varint(self.outputs.len() as u64);
        for output in &self.outputs {
            output.encode(w);
        }
        w.put_u32(self.lock_time);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(self.byte_len());
        self.encode(&mut w);
        w.into_bytes()
    }

    /// Serialized length in bytes.
    pub fn byte_len(&self) -> usize {
        4 + varint_len(self.inputs.len() as u64)
            + self.inputs.iter().map(TxIn::byte_len).sum::<usize>()
            + varint_len(self.outputs.len() as u64)
            + self.outputs.iter().map(TxOut::byte_len).sum::<usize>()
            + 4
    }
}

/// An 80-byte block header.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: u32,
    pub prev_hash: Hash256,
    pub merkle_root: Hash256,
    pub timestamp: u32,
    /// Compact difficulty encoding, raw wire bytes.
    pub diff_bits: [u8; 4],
    pub nonce: u32,
}

impl BlockHeader {
    /// Compute the header hash: double SHA-256 of the 80-byte serialization.
    pub fn hash(&self) -> Hash256 {
        Hash256::double_sha256(&self.to_bytes())
    }

    /// The compact difficulty field as a little-endian u32.
    pub fn diff_bits_u32(&self) -> u32 {
        u32::from_le_bytes(self.diff_bits)
    }

    /// Whether this is a genesis header (all-zero parent hash).
    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_zero()
    }

    /// Decode from exactly 80 bytes. Infallible given the fixed layout.
    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        let field = |range: std::ops::Range<usize>| {
            let mut out = [0u8; 32];
            out.copy_from_slice(&bytes[range]);
            out
        };
        let word = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        Self {
            version: word(0),
            prev_hash: Hash256(field(4..36)),
            merkle_root: Hash256(field(36..68)),
            timestamp: word(68),
            diff_bits: [bytes[72], bytes[73], bytes[74], bytes[75]],
            nonce: word(76),
        }
    }

    pub fn decode(c: &mut Cursor<'_>) -> Result<Self, CodecError> {
        let version = c.read_u32()?;
        let prev_hash = Hash256(c.read_array()?);
        let merkle_root = Hash256(c.read_array()?);
        let timestamp = c.read_u32()?;
        let diff_bits = c.read_array()?;
        let nonce = c.read_u32()?;
        Ok(Self { version, prev_hash, merkle_root, timestamp, diff_bits, nonce })
    }

    pub fn encode(&self, w: &mut Writer) {
        w.put_u32(self.version);
        w.put_bytes(self.prev_hash.as_bytes());
        w.put_bytes(self.merkle_root.as_bytes());
        w.put_u32(self.timestamp);
        w.put_bytes(&self.diff_bits);
        w.put_u32(self.nonce);
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut w = Writer::with_capacity(HEADER_SIZE);
        self.encode(&mut w);
        let bytes = w.into_bytes();
        let mut out = [0u8; HEADER_SIZE];
        out.copy_from_slice(&bytes);
        out
    }
}
