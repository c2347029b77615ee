//! Chain headers: an on-wire block header plus the organizer's annotations.

use std::fmt;

use tarn_codec::types::{BlockHeader, Hash256};

/// A block header together with the chain-position annotations the
/// organizer maintains: its own hash, the forward pointer to its
/// main-branch child, height, floating-point and cumulative difficulty,
/// branch labels, and the location of its payload in the source file.
///
/// Difficulty fields hold a −1.0 sentinel until the organizer traces the
/// header; the public accessors clamp the sentinel to 0.0, which is the
/// cumulative difficulty of any chain that does not reach genesis.
#[derive(Clone, Debug)]
pub struct ChainHeader {
    /// The 80-byte wire header.
    pub header: BlockHeader,
    pub(crate) this_hash: Hash256,
    pub(crate) next_hash: Hash256,
    pub(crate) block_height: u64,
    pub(crate) difficulty_flt: f64,
    pub(crate) difficulty_sum: f64,
    pub(crate) is_main_branch: bool,
    pub(crate) is_orphan: bool,
    pub(crate) is_finished_calc: bool,
    pub(crate) num_tx: u32,
    pub(crate) file_byte_loc: u64,
    pub(crate) tx_refs: Vec<Hash256>,
}

impl ChainHeader {
    /// Wrap a wire header whose hash is already known.
    pub fn new(header: BlockHeader, this_hash: Hash256) -> Self {
        Self {
            header,
            this_hash,
            next_hash: Hash256::ZERO,
            block_height: 0,
            difficulty_flt: -1.0,
            difficulty_sum: -1.0,
            is_main_branch: false,
            is_orphan: false,
            is_finished_calc: false,
            num_tx: 0,
            file_byte_loc: 0,
            tx_refs: Vec::new(),
        }
    }

    /// Wrap a wire header, computing its hash.
    pub fn from_header(header: BlockHeader) -> Self {
        let hash = header.hash();
        Self::new(header, hash)
    }

    pub fn this_hash(&self) -> Hash256 {
        self.this_hash
    }

    pub fn prev_hash(&self) -> Hash256 {
        self.header.prev_hash
    }

    /// Hash of the main-branch child, zero for the tip and for unlabeled
    /// headers. Reassigned on reorg.
    pub fn next_hash(&self) -> Hash256 {
        self.next_hash
    }

    /// Height above genesis; meaningful once traced.
    pub fn block_height(&self) -> u64 {
        self.block_height
    }

    /// Floating-point difficulty of this header; 0.0 until traced.
    pub fn difficulty(&self) -> f64 {
        self.difficulty_flt.max(0.0)
    }

    /// Cumulative difficulty from genesis through this header, inclusive;
    /// 0.0 for orphans and untraced headers.
    pub fn difficulty_sum(&self) -> f64 {
        self.difficulty_sum.max(0.0)
    }

    /// Whether this header lies on the winning chain.
    pub fn is_main_branch(&self) -> bool {
        self.is_main_branch
    }

    /// Whether this header's ancestor chain fails to reach genesis within
    /// the current header map.
    pub fn is_orphan(&self) -> bool {
        self.is_orphan
    }

    /// Organizer bookkeeping: annotations are current.
    pub fn is_finished_calc(&self) -> bool {
        self.is_finished_calc
    }

    /// Number of transactions carried by this block, when known.
    pub fn num_tx(&self) -> u32 {
        self.num_tx
    }

    /// Byte offset of the block payload in the source file.
    pub fn file_byte_loc(&self) -> u64 {
        self.file_byte_loc
    }

    /// Hashes of this block's transactions, in block order.
    pub fn tx_refs(&self) -> &[Hash256] {
        &self.tx_refs
    }

    /// Reset the organizer annotations to their sentinels, as done before
    /// a forced rebuild.
    pub(crate) fn reset_annotations(&mut self) {
        self.next_hash = Hash256::ZERO;
        self.block_height = 0;
        self.difficulty_flt = -1.0;
        self.difficulty_sum = -1.0;
        self.is_main_branch = false;
        self.is_orphan = false;
        self.is_finished_calc = false;
    }
}

impl fmt::Display for ChainHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Block {}", self.block_height)?;
        writeln!(f, "  hash:        {}", self.this_hash)?;
        writeln!(f, "  prev hash:   {}", self.header.prev_hash)?;
        writeln!(f, "  merkle root: {}", self.header.merkle_root)?;
        writeln!(f, "  timestamp:   {}", self.header.timestamp)?;
        writeln!(
            f,
            "  difficulty:  {:.2} ({:08x})",
            self.difficulty(),
            self.header.diff_bits_u32()
        )?;
        writeln!(f, "  cumulative:  {:.2}", self.difficulty_sum())?;
        writeln!(f, "  nonce:       {}", self.header.nonce)?;
        write!(f, "  file offset: {}", self.file_byte_loc)
    }
}
