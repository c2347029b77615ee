//! Zero-copy views over serialized records.
//!
//! A view borrows its record's bytes out of the backing buffer and exposes
//! field accessors by fixed or precomputed offset; nothing is copied until
//! [`to_owned`](TxView::to_owned) is called. Parsing a view computes the
//! record's total byte length, so a scan can skip to the next record in
//! constant time.
//!
//! [`TxView`] additionally precomputes per-input and per-output offset
//! tables. The tables index the concatenation of the input records and
//! output records (the count varints are excluded): `offsets_in` has
//! `num_inputs + 1` entries with the last equal to the total length of the
//! inputs block, `offsets_out` continues from there, and its last entry is
//! the combined length of both blocks. `input_at(i)` and `output_at(i)`
//! are O(1).

use crate::cursor::{Cursor, varint_len};
use crate::error::CodecError;
use crate::script::{self, AddressHash};
use crate::types::{BlockHeader, Hash256, OutPoint, Transaction, TxIn, TxOut};
use crate::types::{HEADER_SIZE, OUTPOINT_SIZE};

fn u32_at(slice: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([slice[at], slice[at + 1], slice[at + 2], slice[at + 3]])
}

fn u64_at(slice: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&slice[at..at + 8]);
    u64::from_le_bytes(raw)
}

fn hash_at(slice: &[u8], at: usize) -> Hash256 {
    let mut raw = [0u8; 32];
    raw.copy_from_slice(&slice[at..at + 32]);
    Hash256(raw)
}

/// Borrowed view of an 80-byte block header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeaderView<'a> {
    slice: &'a [u8],
}

impl<'a> HeaderView<'a> {
    /// View the first 80 bytes of `buf` as a header.
    pub fn parse(buf: &'a [u8]) -> Result<Self, CodecError> {
        if buf.len() < HEADER_SIZE {
            return Err(CodecError::Truncated { need: HEADER_SIZE - buf.len(), have: buf.len() });
        }
        Ok(Self { slice: &buf[..HEADER_SIZE] })
    }

    pub fn version(&self) -> u32 {
        u32_at(self.slice, 0)
    }

    pub fn prev_hash(&self) -> Hash256 {
        hash_at(self.slice, 4)
    }

    pub fn merkle_root(&self) -> Hash256 {
        hash_at(self.slice, 36)
    }

    pub fn timestamp(&self) -> u32 {
        u32_at(self.slice, 68)
    }

    pub fn diff_bits(&self) -> [u8; 4] {
        [self.slice[72], self.slice[73], self.slice[74], self.slice[75]]
    }

    pub fn nonce(&self) -> u32 {
        u32_at(self.slice, 76)
    }

    /// Double SHA-256 of the 80 header bytes.
    pub fn hash(&self) -> Hash256 {
        Hash256::double_sha256(self.slice)
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.slice
    }

    pub fn to_owned(&self) -> BlockHeader {
        let mut raw = [0u8; HEADER_SIZE];
        raw.copy_from_slice(self.slice);
        BlockHeader::from_bytes(&raw)
    }
}

/// Borrowed view of a 36-byte outpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutPointView<'a> {
    slice: &'a [u8],
}

impl<'a> OutPointView<'a> {
    pub fn parse(buf: &'a [u8]) -> Result<Self, CodecError> {
        if buf.len() < OUTPOINT_SIZE {
            return Err(CodecError::Truncated { need: OUTPOINT_SIZE - buf.len(), have: buf.len() });
        }
        Ok(Self { slice: &buf[..OUTPOINT_SIZE] })
    }

    pub fn tx_hash(&self) -> Hash256 {
        hash_at(self.slice, 0)
    }

    pub fn tx_out_index(&self) -> u32 {
        u32_at(self.slice, 32)
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.slice
    }

    pub fn to_owned(&self) -> OutPoint {
        OutPoint::new(self.tx_hash(), self.tx_out_index())
    }
}

/// Borrowed view of a transaction input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxInView<'a> {
    slice: &'a [u8],
    script_offset: usize,
}

impl<'a> TxInView<'a> {
    /// Parse one input at the start of `buf`, computing its total length.
    pub fn parse(buf: &'a [u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        c.advance(OUTPOINT_SIZE)?;
        let script_len = c.read_varint()? as usize;
        let script_offset = c.position();
        c.advance(script_len)?;
        c.advance(4)?;
        Ok(Self { slice: &buf[..c.position()], script_offset })
    }

    /// Total serialized length of this input.
    pub fn byte_len(&self) -> usize {
        self.slice.len()
    }

    pub fn outpoint_view(&self) -> OutPointView<'a> {
        OutPointView { slice: &self.slice[..OUTPOINT_SIZE] }
    }

    pub fn outpoint(&self) -> OutPoint {
        self.outpoint_view().to_owned()
    }

    /// Offset of the script bytes within the record.
    pub fn script_offset(&self) -> usize {
        self.script_offset
    }

    pub fn script(&self) -> &'a [u8] {
        &self.slice[self.script_offset..self.slice.len() - 4]
    }

    pub fn sequence(&self) -> u32 {
        u32_at(self.slice, self.slice.len() - 4)
    }

    pub fn is_coinbase(&self) -> bool {
        self.outpoint().is_null()
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.slice
    }

    pub fn to_owned(&self) -> TxIn {
        TxIn {
            outpoint: self.outpoint(),
            script: self.script().to_vec(),
            sequence: self.sequence(),
        }
    }
}

/// Borrowed view of a transaction output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxOutView<'a> {
    slice: &'a [u8],
    script_offset: usize,
}

impl<'a> TxOutView<'a> {
    /// Parse one output at the start of `buf`, computing its total length.
    pub fn parse(buf: &'a [u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        c.advance(8)?;
        let script_len = c.read_varint()? as usize;
        let script_offset = c.position();
        c.advance(script_len)?;
        Ok(Self { slice: &buf[..c.position()], script_offset })
    }

    /// Total serialized length of this output.
    pub fn byte_len(&self) -> usize {
        self.slice.len()
    }

    pub fn value(&self) -> u64 {
        u64_at(self.slice, 0)
    }

    pub fn pk_script(&self) -> &'a [u8] {
        &self.slice[self.script_offset..]
    }

    pub fn is_standard(&self) -> bool {
        script::classify(self.pk_script()) != script::ScriptClass::NonStandard
    }

    pub fn recipient_address(&self) -> Option<AddressHash> {
        script::recipient_address(self.pk_script())
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.slice
    }

    pub fn to_owned(&self) -> TxOut {
        TxOut { value: self.value(), pk_script: self.pk_script().to_vec() }
    }
}

/// Borrowed view of a whole transaction with precomputed offset tables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxView<'a> {
    slice: &'a [u8],
    /// Absolute offset of the first input within the record.
    inputs_start: usize,
    /// Width of the output-count varint.
    out_count_len: usize,
    offsets_in: Vec<u32>,
    offsets_out: Vec<u32>,
}

impl<'a> TxView<'a> {
    /// Parse one transaction at the start of `buf`, computing its total
    /// length and the input/output offset tables.
    pub fn parse(buf: &'a [u8]) -> Result<Self, CodecError> {
        let mut c = Cursor::new(buf);
        c.advance(4)?;
        let num_in = c.read_varint()?;
        let inputs_start = c.position();

        let mut offsets_in = Vec::new();
        offsets_in.push(0u32);
        for _ in 0..num_in {
            c.advance(OUTPOINT_SIZE)?;
            let script_len = c.read_varint()? as usize;
            c.advance(script_len)?;
            c.advance(4)?;
            offsets_in.push((c.position() - inputs_start) as u32);
        }
        let inputs_len = *offsets_in.last().unwrap_or(&0);

        let num_out = c.read_varint()?;
        let out_count_len = varint_len(num_out);
        let outputs_start = c.position();

        let mut offsets_out = Vec::new();
        offsets_out.push(inputs_len);
        for _ in 0..num_out {
            c.advance(8)?;
            let script_len = c.read_varint()? as usize;
            c.advance(script_len)?;
            offsets_out.push(inputs_len + (c.position() - outputs_start) as u32);
        }

        c.advance(4)?;
        Ok(Self {
            slice: &buf[..c.position()],
            inputs_start,
            out_count_len,
            offsets_in,
            offsets_out,
        })
    }

    /// Total serialized length of the transaction.
    pub fn byte_len(&self) -> usize {
        self.slice.len()
    }

    pub fn version(&self) -> u32 {
        u32_at(self.slice, 0)
    }

    pub fn lock_time(&self) -> u32 {
        u32_at(self.slice, self.slice.len() - 4)
    }

    pub fn num_inputs(&self) -> usize {
        self.offsets_in.len() - 1
    }

    pub fn num_outputs(&self) -> usize {
        self.offsets_out.len() - 1
    }

    /// Offset table over the concatenated input records.
    pub fn offsets_in(&self) -> &[u32] {
        &self.offsets_in
    }

    /// Offset table over the concatenated output records, continuing from
    /// the end of the inputs block.
    pub fn offsets_out(&self) -> &[u32] {
        &self.offsets_out
    }

    /// The `i`-th input, located in O(1). `None` when out of range.
    pub fn input_at(&self, i: usize) -> Option<TxInView<'a>> {
        let start = self.inputs_start + *self.offsets_in.get(i)? as usize;
        let end = self.inputs_start + *self.offsets_in.get(i + 1)? as usize;
        TxInView::parse(&self.slice[start..end]).ok()
    }

    /// The `i`-th output, located in O(1). `None` when out of range.
    pub fn output_at(&self, i: usize) -> Option<TxOutView<'a>> {
        let base = self.inputs_start + self.out_count_len;
        let start = base + *self.offsets_out.get(i)? as usize;
        let end = base + *self.offsets_out.get(i + 1)? as usize;
        TxOutView::parse(&self.slice[start..end]).ok()
    }

    /// Double SHA-256 of the serialized transaction.
    pub fn hash(&self) -> Hash256 {
        Hash256::double_sha256(self.slice)
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.slice
    }

    pub fn to_owned(&self) -> Result<Transaction, CodecError> {
        Transaction::decode(&mut Cursor::new(self.slice))
    }
}
