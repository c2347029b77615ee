//! Block file and header file ingestion.
//!
//! A block file is a concatenation of framed blocks:
//! `magic(4) | block_len: u32 LE | header(80) | varint num_tx | txs…`.
//! The scan keeps a bounded window of the file in memory and runs a small
//! state machine over it (`NeedMagic`, `NeedLen`, `NeedHeader`,
//! `NeedTxBody`), refilling the window whenever the current step needs more
//! bytes than remain buffered. Headers and transactions are materialized as
//! owning records, so nothing admitted to the index borrows the window.
//!
//! A header file is framing-free: contiguous 80-byte headers whose hashes
//! are computed on load.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use tracing::{debug, info};

use tarn_codec::CodecError;
use tarn_codec::cursor::Cursor;
use tarn_codec::types::{HEADER_SIZE, Hash256};
use tarn_codec::view::{HeaderView, TxView};

use crate::error::ChainError;
use crate::graph::HeaderGraph;
use crate::header::ChainHeader;
use crate::params::NetworkParams;
use crate::tx::IndexedTx;

/// Frame-scan state. Each state names the bytes the scan is waiting for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FrameState {
    NeedMagic,
    NeedLen,
    NeedHeader,
    NeedTxBody,
}

/// A bounded, refillable window over a file.
///
/// `fill_to(n)` grows the window until at least `n` unconsumed bytes are
/// buffered (or the file ends); `consume(n)` releases bytes to be dropped
/// on the next refill. The window therefore stays near the configured
/// chunk size regardless of file size.
struct StreamBuffer {
    file: File,
    buf: Vec<u8>,
    start: usize,
    consumed_total: u64,
    chunk: usize,
    eof: bool,
}

impl StreamBuffer {
    fn new(file: File, chunk: usize) -> Self {
        Self { file, buf: Vec::new(), start: 0, consumed_total: 0, chunk: chunk.max(1), eof: false }
    }

    /// Unconsumed bytes currently buffered.
    fn available(&self) -> usize {
        self.buf.len() - self.start
    }

    /// File offset of the next unconsumed byte.
    fn file_offset(&self) -> u64 {
        self.consumed_total
    }

    /// Buffer at least `n` unconsumed bytes. Returns false when the file
    /// ends first.
    fn fill_to(&mut self, n: usize) -> std::io::Result<bool> {
        while self.available() < n && !self.eof {
            if self.start > 0 {
                self.buf.drain(..self.start);
                self.start = 0;
            }
            let old_len = self.buf.len();
            let want = self.chunk.max(n - old_len);
            self.buf.resize(old_len + want, 0);
            let read = self.file.read(&mut self.buf[old_len..])?;
            self.buf.truncate(old_len + read);
            if read == 0 {
                self.eof = true;
            }
        }
        Ok(self.available() >= n)
    }

    /// The next `n` buffered bytes; callers must `fill_to(n)` first.
    fn window(&self, n: usize) -> &[u8] {
        &self.buf[self.start..self.start + n]
    }

    fn consume(&mut self, n: usize) {
        self.start += n;
        self.consumed_total += n as u64;
    }
}

fn short_read(need: usize, have: usize) -> ChainError {
    ChainError::Codec(CodecError::Truncated { need: need - have, have })
}

/// Scan a framed block file into the graph and transaction map.
///
/// Admits every well-formed frame; a malformed frame aborts the scan with
/// an error while everything already admitted stays in place. Returns the
/// number of frames read from this file.
pub(crate) fn scan_block_file(
    graph: &mut HeaderGraph,
    txs: &mut HashMap<Hash256, IndexedTx>,
    params: &NetworkParams,
    path: &Path,
    headers_only: bool,
) -> Result<usize, ChainError> {
    let file = File::open(path)?;
    let mut stream = StreamBuffer::new(file, params.stream_buffer);

    let mut state = FrameState::NeedMagic;
    let mut block_len: u32 = 0;
    let mut header_idx = 0usize;
    let mut payload_loc = 0u64;
    let mut blocks_read = 0usize;

    loop {
        match state {
            FrameState::NeedMagic => {
                if !stream.fill_to(4)? {
                    if stream.available() == 0 {
                        break; // clean end between frames
                    }
                    return Err(short_read(4, stream.available()));
                }
                let offset = stream.file_offset();
                let mut got = [0u8; 4];
                got.copy_from_slice(stream.window(4));
                if got != params.magic {
                    return Err(ChainError::BadMagic { offset, got, expected: params.magic });
                }
                stream.consume(4);
                state = FrameState::NeedLen;
            }
            FrameState::NeedLen => {
                if !stream.fill_to(4)? {
                    return Err(short_read(4, stream.available()));
                }
                let mut raw = [0u8; 4];
                raw.copy_from_slice(stream.window(4));
                block_len = u32::from_le_bytes(raw);
                stream.consume(4);
                if (block_len as usize) < HEADER_SIZE {
                    return Err(ChainError::BadSize(format!(
                        "block length {block_len} below header size"
                    )));
                }
                state = FrameState::NeedHeader;
            }
            FrameState::NeedHeader => {
                if !stream.fill_to(HEADER_SIZE)? {
                    return Err(short_read(HEADER_SIZE, stream.available()));
                }
                payload_loc = stream.file_offset() + HEADER_SIZE as u64;
                let view = HeaderView::parse(stream.window(HEADER_SIZE))?;
                let mut header = ChainHeader::new(view.to_owned(), view.hash());
                header.file_byte_loc = payload_loc;
                let (idx, _) = graph.insert(header);
                header_idx = idx;
                stream.consume(HEADER_SIZE);
                state = FrameState::NeedTxBody;
            }
            FrameState::NeedTxBody => {
                let body_len = block_len as usize - HEADER_SIZE;
                if !stream.fill_to(body_len)? {
                    return Err(short_read(body_len, stream.available()));
                }
                let body = stream.window(body_len);
                read_tx_body(graph, txs, header_idx, payload_loc, body, headers_only)?;
                stream.consume(body_len);
                blocks_read += 1;
                state = FrameState::NeedMagic;
            }
        }
    }

    info!(
        path = %path.display(),
        blocks = blocks_read,
        headers = graph.len(),
        txs = txs.len(),
        "block file scan complete"
    );
    Ok(blocks_read)
}

/// Parse one frame's transaction body and attach it to its header.
///
/// A duplicate frame keeps the first sighting's transaction list, but a
/// header first seen without a payload (from a header file or a
/// headers-only scan) adopts this frame's metadata.
fn read_tx_body(
    graph: &mut HeaderGraph,
    txs: &mut HashMap<Hash256, IndexedTx>,
    header_idx: usize,
    payload_loc: u64,
    body: &[u8],
    headers_only: bool,
) -> Result<(), ChainError> {
    let mut c = Cursor::new(body);
    let num_tx = c.read_varint()?;
    let attach = graph.at_mut(header_idx).tx_refs.is_empty();
    if attach {
        let header = graph.at_mut(header_idx);
        header.num_tx = num_tx as u32;
        header.file_byte_loc = payload_loc;
    }
    if headers_only {
        return Ok(());
    }

    let block_hash = graph.at_mut(header_idx).this_hash();
    let mut refs = Vec::new();
    let mut pos = c.position();
    for _ in 0..num_tx {
        let view = TxView::parse(&body[pos..])?;
        pos += view.byte_len();
        let hash = view.hash();
        refs.push(hash);
        if !txs.contains_key(&hash) {
            let owned = view.to_owned()?;
            txs.insert(hash, IndexedTx::new(owned, hash, view.byte_len() as u32, block_hash));
        }
    }
    if attach {
        graph.at_mut(header_idx).tx_refs = refs;
    } else {
        debug!(block = %block_hash, "duplicate block frame, transactions kept from first sighting");
    }
    Ok(())
}

/// Load a framing-free header file: contiguous 80-byte headers.
///
/// Returns the number of bytes read. The file length must be a positive
/// multiple of the header size.
pub(crate) fn load_header_file(graph: &mut HeaderGraph, path: &Path) -> Result<u64, ChainError> {
    let data = fs::read(path)?;
    if data.is_empty() || data.len() % HEADER_SIZE != 0 {
        return Err(ChainError::BadSize(format!(
            "header file is {} bytes, not a positive multiple of {HEADER_SIZE}",
            data.len()
        )));
    }
    for chunk in data.chunks_exact(HEADER_SIZE) {
        let view = HeaderView::parse(chunk)?;
        graph.insert(ChainHeader::new(view.to_owned(), view.hash()));
    }
    info!(path = %path.display(), bytes = data.len(), headers = graph.len(), "header file loaded");
    Ok(data.len() as u64)
}
