//! The chain index facade.
//!
//! [`ChainIndex`] owns the header graph and the transaction map and ties
//! together ingestion, organization, and lookup. It is an explicit value:
//! construct one per data directory and pass it where needed.

use std::collections::HashMap;
use std::path::Path;

use tarn_codec::types::{BlockHeader, HEADER_SIZE, Hash256};

use crate::error::ChainError;
use crate::graph::HeaderGraph;
use crate::header::ChainHeader;
use crate::ingest;
use crate::organize;
use crate::params::NetworkParams;
use crate::tx::IndexedTx;

/// In-memory index over a chain's headers and transactions.
pub struct ChainIndex {
    params: NetworkParams,
    graph: HeaderGraph,
    txs: HashMap<Hash256, IndexedTx>,
    top: Option<usize>,
}

impl ChainIndex {
    /// Create an empty index for the given network.
    pub fn new(params: NetworkParams) -> Self {
        Self { params, graph: HeaderGraph::new(), txs: HashMap::new(), top: None }
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    /// The header graph, for hash/height lookups beyond the accessors here.
    pub fn graph(&self) -> &HeaderGraph {
        &self.graph
    }

    /// Load a framing-free file of contiguous 80-byte headers. Returns the
    /// number of bytes read.
    pub fn load_header_file(&mut self, path: impl AsRef<Path>) -> Result<u64, ChainError> {
        ingest::load_header_file(&mut self.graph, path.as_ref())
    }

    /// Scan a framed block file, indexing headers and transactions.
    /// Returns the total number of headers indexed.
    pub fn load_block_file(&mut self, path: impl AsRef<Path>) -> Result<usize, ChainError> {
        ingest::scan_block_file(&mut self.graph, &mut self.txs, &self.params, path.as_ref(), false)?;
        Ok(self.graph.len())
    }

    /// Scan a framed block file, indexing headers but skipping transaction
    /// bodies. Returns the total number of headers indexed.
    pub fn load_block_file_headers_only(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<usize, ChainError> {
        ingest::scan_block_file(&mut self.graph, &mut self.txs, &self.params, path.as_ref(), true)?;
        Ok(self.graph.len())
    }

    /// Insert a single serialized header (e.g. received from a peer).
    /// Returns whether the header was newly inserted.
    pub fn add_header(&mut self, bytes: &[u8; HEADER_SIZE]) -> bool {
        let header = BlockHeader::from_bytes(bytes);
        let (_, fresh) = self.graph.insert(ChainHeader::from_header(header));
        fresh
    }

    /// Organize the chain: annotate heights and cumulative difficulty,
    /// select the tip, and label the main branch.
    ///
    /// Returns `false` when the previous tip is no longer on the main
    /// branch (a reorg happened and the annotations were rebuilt).
    pub fn organize_chain(&mut self, force_rebuild: bool) -> bool {
        organize::organize(&mut self.graph, &mut self.top, force_rebuild)
    }

    /// The current main-branch tip, once organized.
    pub fn top_block(&self) -> Option<&ChainHeader> {
        self.top.and_then(|idx| self.graph.at(idx))
    }

    /// The genesis header, if one has been indexed.
    pub fn genesis_block(&self) -> Option<&ChainHeader> {
        self.graph.genesis_index().and_then(|idx| self.graph.at(idx))
    }

    pub fn header_by_hash(&self, hash: &Hash256) -> Option<&ChainHeader> {
        self.graph.get(hash)
    }

    /// The main-branch header at `height`, once organized.
    pub fn header_by_height(&self, height: u64) -> Option<&ChainHeader> {
        self.graph.at_height(height)
    }

    pub fn transaction(&self, hash: &Hash256) -> Option<&IndexedTx> {
        self.txs.get(hash)
    }

    /// Iterate all indexed transactions. Order is unspecified.
    pub fn transactions(&self) -> impl Iterator<Item = &IndexedTx> {
        self.txs.values()
    }

    pub fn header_count(&self) -> usize {
        self.graph.len()
    }

    pub fn tx_count(&self) -> usize {
        self.txs.len()
    }
}
