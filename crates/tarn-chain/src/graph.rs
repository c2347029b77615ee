//! The in-memory header graph.
//!
//! Headers live in an append-only arena; a hash index gives O(1) average
//! lookup and the arena position doubles as insertion order. The height
//! index covers main-branch headers only and is regenerated by the
//! organizer; the hash index is authoritative.

use std::collections::HashMap;

use tarn_codec::types::Hash256;

use crate::header::ChainHeader;

/// Arena of chain headers with hash and main-branch height indexes.
#[derive(Debug, Default)]
pub struct HeaderGraph {
    arena: Vec<ChainHeader>,
    by_hash: HashMap<Hash256, usize>,
    by_height: Vec<usize>,
    genesis: Option<usize>,
}

impl HeaderGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of headers in the graph.
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Insert a header. Returns its arena index and whether it was newly
    /// inserted; a duplicate hash keeps the first insertion.
    pub fn insert(&mut self, header: ChainHeader) -> (usize, bool) {
        if let Some(&idx) = self.by_hash.get(&header.this_hash()) {
            return (idx, false);
        }
        let idx = self.arena.len();
        self.by_hash.insert(header.this_hash(), idx);
        if self.genesis.is_none() && header.header.is_genesis() {
            self.genesis = Some(idx);
        }
        self.arena.push(header);
        (idx, true)
    }

    /// Arena index of the header with `hash`.
    pub fn index_of(&self, hash: &Hash256) -> Option<usize> {
        self.by_hash.get(hash).copied()
    }

    pub fn contains(&self, hash: &Hash256) -> bool {
        self.by_hash.contains_key(hash)
    }

    /// Look up a header by hash.
    pub fn get(&self, hash: &Hash256) -> Option<&ChainHeader> {
        self.index_of(hash).map(|i| &self.arena[i])
    }

    pub(crate) fn get_mut(&mut self, hash: &Hash256) -> Option<&mut ChainHeader> {
        let idx = self.index_of(hash)?;
        Some(&mut self.arena[idx])
    }

    /// Header at an arena index.
    pub fn at(&self, idx: usize) -> Option<&ChainHeader> {
        self.arena.get(idx)
    }

    pub(crate) fn at_mut(&mut self, idx: usize) -> &mut ChainHeader {
        &mut self.arena[idx]
    }

    /// The main-branch header at `height`, once organized.
    pub fn at_height(&self, height: u64) -> Option<&ChainHeader> {
        let idx = *self.by_height.get(height as usize)?;
        self.arena.get(idx)
    }

    /// Height of the highest main-branch entry, if any.
    pub fn max_height(&self) -> Option<u64> {
        if self.by_height.is_empty() { None } else { Some(self.by_height.len() as u64 - 1) }
    }

    /// Arena index of the genesis header, if present.
    pub fn genesis_index(&self) -> Option<usize> {
        self.genesis
    }

    /// Iterate headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ChainHeader> {
        self.arena.iter()
    }

    /// Resize the height index to cover `0..=tip_height`. Existing entries
    /// below the new tip are preserved; new slots hold a vacant sentinel
    /// until the organizer's labeling walk fills them.
    pub(crate) fn resize_height_index(&mut self, tip_height: u64) {
        self.by_height.resize(tip_height as usize + 1, usize::MAX);
    }

    pub(crate) fn set_height_entry(&mut self, height: u64, idx: usize) {
        let slot = height as usize;
        if slot < self.by_height.len() {
            self.by_height[slot] = idx;
        }
    }

    pub(crate) fn clear_height_index(&mut self) {
        self.by_height.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tarn_codec::types::BlockHeader;

    fn header_with(prev: Hash256, nonce: u32) -> ChainHeader {
        ChainHeader::from_header(BlockHeader {
            version: 1,
            prev_hash: prev,
            merkle_root: Hash256::ZERO,
            timestamp: 0,
            diff_bits: 0x1D00_FFFF_u32.to_le_bytes(),
            nonce,
        })
    }

    #[test]
    fn insert_and_lookup() {
        let mut g = HeaderGraph::new();
        let h = header_with(Hash256([1; 32]), 0);
        let hash = h.this_hash();
        let (idx, fresh) = g.insert(h);
        assert!(fresh);
        assert_eq!(idx, 0);
        assert_eq!(g.len(), 1);
        assert_eq!(g.index_of(&hash), Some(0));
        assert_eq!(g.get(&hash).unwrap().this_hash(), hash);
        assert!(g.contains(&hash));
    }

    #[test]
    fn duplicate_insert_keeps_first() {
        let mut g = HeaderGraph::new();
        let h = header_with(Hash256([1; 32]), 0);
        let (first, _) = g.insert(h.clone());
        let (second, fresh) = g.insert(h);
        assert_eq!(first, second);
        assert!(!fresh);
        assert_eq!(g.len(), 1);
    }

    #[test]
    fn genesis_tracked_on_insert() {
        let mut g = HeaderGraph::new();
        assert_eq!(g.genesis_index(), None);
        g.insert(header_with(Hash256([1; 32]), 0));
        assert_eq!(g.genesis_index(), None);
        let (idx, _) = g.insert(header_with(Hash256::ZERO, 1));
        assert_eq!(g.genesis_index(), Some(idx));
    }

    #[test]
    fn height_index_empty_until_rebuilt() {
        let mut g = HeaderGraph::new();
        g.insert(header_with(Hash256::ZERO, 0));
        assert!(g.at_height(0).is_none());
        assert_eq!(g.max_height(), None);

        g.resize_height_index(0);
        g.set_height_entry(0, 0);
        assert!(g.at_height(0).is_some());
        assert_eq!(g.max_height(), Some(0));
    }

    #[test]
    fn missing_hash_lookup() {
        let g = HeaderGraph::new();
        assert!(g.get(&Hash256([9; 32])).is_none());
        assert!(g.at(3).is_none());
    }

    #[test]
    fn iter_follows_insertion_order() {
        let mut g = HeaderGraph::new();
        let a = header_with(Hash256([1; 32]), 0);
        let b = header_with(Hash256([2; 32]), 1);
        let (ha, hb) = (a.this_hash(), b.this_hash());
        g.insert(a);
        g.insert(b);
        let order: Vec<Hash256> = g.iter().map(|h| h.this_hash()).collect();
        assert_eq!(order, vec![ha, hb]);
    }
}
