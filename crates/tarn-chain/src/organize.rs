//! Chain organization: cumulative-difficulty tracing, tip selection,
//! main-branch labeling, and reorg detection.
//!
//! The organizer annotates every header in the graph with its height,
//! floating-point difficulty, and cumulative difficulty from genesis, then
//! selects the header with the maximum cumulative difficulty as the tip and
//! labels the path from genesis to it as the main branch. A header whose
//! ancestor chain does not reach genesis is marked orphan and contributes
//! cumulative difficulty 0, so an orphan subtree can never win tip
//! selection.
//!
//! When the previous tip is no longer an ancestor of the new tip the old
//! annotations cannot be trusted; they are reset wholesale and recomputed,
//! and [`organize`] reports the reorg by returning `false`.

use tarn_codec::types::Hash256;
use tracing::{debug, warn};

use crate::graph::HeaderGraph;

/// Decode the compact difficulty encoding into a floating-point
/// difficulty: `(0xFFFF / mantissa) × 256^(29 − shift)` with
/// `shift = bits >> 24` and `mantissa = bits & 0x00FF_FFFF`.
pub fn compact_to_difficulty(bits: u32) -> f64 {
    let shift = ((bits >> 24) & 0xFF) as i32;
    let mantissa = (bits & 0x00FF_FFFF) as f64;
    (0xFFFF as f64 / mantissa) * 256f64.powi(29 - shift)
}

/// Cumulative difficulty at `start`, memoized on the headers.
///
/// Walks `prev_hash` links down to the nearest header with a known
/// cumulative difficulty, then unwinds the walked chain writing height and
/// difficulty annotations. Returns 0 after marking the walked chain orphan
/// when an ancestor is missing from the graph.
pub(crate) fn trace_chain_down(graph: &mut HeaderGraph, start: usize) -> f64 {
    let mut stack: Vec<usize> = Vec::new();
    let mut cur = start;
    loop {
        let header = graph.at_mut(cur);
        if header.difficulty_sum >= 0.0 {
            break;
        }
        stack.push(cur);
        // A walk longer than the graph means a prev-hash cycle, which can
        // never reach genesis.
        if stack.len() > graph.len() {
            mark_orphan_chain(graph, start);
            return 0.0;
        }
        let prev = graph.at_mut(cur).prev_hash();
        match graph.index_of(&prev) {
            Some(parent) => cur = parent,
            None => {
                mark_orphan_chain(graph, start);
                return 0.0;
            }
        }
    }

    let seed = graph.at_mut(cur);
    let mut sum = seed.difficulty_sum;
    let mut height = seed.block_height;
    for &idx in stack.iter().rev() {
        let diff = compact_to_difficulty(graph.at_mut(idx).header.diff_bits_u32());
        sum += diff;
        height += 1;
        let header = graph.at_mut(idx);
        header.difficulty_flt = diff;
        header.difficulty_sum = sum;
        header.block_height = height;
        header.is_orphan = false;
    }
    sum
}

/// Mark `start` and every in-graph ancestor as an orphan chain.
fn mark_orphan_chain(graph: &mut HeaderGraph, start: usize) {
    let mut cur = Some(start);
    let mut walked = 0;
    while let Some(idx) = cur {
        let header = graph.at_mut(idx);
        header.is_orphan = true;
        header.is_main_branch = false;
        walked += 1;
        if walked > graph.len() {
            break;
        }
        let prev = graph.at_mut(idx).prev_hash();
        cur = graph.index_of(&prev);
    }
}

/// Organize the chain: trace every header, select the tip, label the main
/// branch, and rebuild the height index.
///
/// `top` carries the previous tip between calls. Returns `false` when the
/// previous tip is no longer on the main branch (a reorg); the annotations
/// are rebuilt from scratch before returning, so a subsequent call returns
/// `true`.
pub(crate) fn organize(graph: &mut HeaderGraph, top: &mut Option<usize>, force_rebuild: bool) -> bool {
    if force_rebuild {
        debug!(headers = graph.len(), "rebuilding chain annotations from scratch");
        for idx in 0..graph.len() {
            graph.at_mut(idx).reset_annotations();
        }
        graph.clear_height_index();
    }

    let Some(genesis_idx) = graph.genesis_index() else {
        // Without genesis nothing can anchor a chain; everything traces to
        // a missing parent and is marked orphan.
        for idx in 0..graph.len() {
            trace_chain_down(graph, idx);
        }
        return true;
    };

    let genesis = graph.at_mut(genesis_idx);
    genesis.block_height = 0;
    genesis.difficulty_flt = 1.0;
    genesis.difficulty_sum = 1.0;
    genesis.is_main_branch = true;
    genesis.is_orphan = false;
    genesis.is_finished_calc = true;

    let prev_top = top.unwrap_or(genesis_idx);

    // Trace everything, tracking the maximum cumulative difficulty. The
    // strict comparison keeps the earliest-inserted header on ties.
    let mut best = prev_top;
    let mut max_sum = 0.0;
    for idx in 0..graph.len() {
        let sum = trace_chain_down(graph, idx);
        if sum > max_sum {
            max_sum = sum;
            best = idx;
        }
    }
    *top = Some(best);

    // Walk from the tip toward genesis: set the forward pointers, label the
    // main branch, and fill the height index down to the first header whose
    // annotations are already current.
    let tip_height = graph.at_mut(best).block_height;
    graph.at_mut(best).next_hash = Hash256::ZERO;
    graph.resize_height_index(tip_height);
    graph.set_height_entry(0, genesis_idx);

    let mut prev_chain_still_valid = best == prev_top;
    let mut cur = best;
    while !graph.at_mut(cur).is_finished_calc {
        let header = graph.at_mut(cur);
        header.is_finished_calc = true;
        header.is_main_branch = true;
        let height = header.block_height;
        let child_hash = header.this_hash();
        let prev_hash = header.prev_hash();
        graph.set_height_entry(height, cur);

        let Some(parent) = graph.index_of(&prev_hash) else {
            // Traced main-branch chains always reach a finished ancestor.
            break;
        };
        graph.at_mut(parent).next_hash = child_hash;
        cur = parent;
        if cur == prev_top {
            prev_chain_still_valid = true;
        }
    }

    if !prev_chain_still_valid {
        warn!("previous tip left the main branch, rebuilding");
        organize(graph, top, true);
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::ChainHeader;
    use tarn_codec::types::{BlockHeader, Hash256};

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Unit-difficulty compact bits (shift 29, full mantissa).
    const UNIT_BITS: u32 = 0x1D00_FFFF;

    fn make_header(prev: Hash256, nonce: u32) -> ChainHeader {
        ChainHeader::from_header(BlockHeader {
            version: 1,
            prev_hash: prev,
            merkle_root: Hash256::ZERO,
            timestamp: 1_300_000_000 + nonce,
            diff_bits: UNIT_BITS.to_le_bytes(),
            nonce,
        })
    }

    /// Insert a header chain of `len` blocks on top of `prev`, returning
    /// the inserted hashes.
    fn extend_chain(graph: &mut HeaderGraph, mut prev: Hash256, len: usize, salt: u32) -> Vec<Hash256> {
        let mut hashes = Vec::new();
        for i in 0..len {
            let h = make_header(prev, salt + i as u32);
            prev = h.this_hash();
            hashes.push(prev);
            graph.insert(h);
        }
        hashes
    }

    fn organize_graph(graph: &mut HeaderGraph, top: &mut Option<usize>) -> bool {
        organize(graph, top, false)
    }

    // ------------------------------------------------------------------
    // Difficulty decode
    // ------------------------------------------------------------------

    #[test]
    fn unit_bits_decode_to_one() {
        assert_eq!(compact_to_difficulty(UNIT_BITS), 1.0);
    }

    #[test]
    fn lower_shift_scales_by_256() {
        assert_eq!(compact_to_difficulty(0x1C00_FFFF), 256.0);
        assert_eq!(compact_to_difficulty(0x1E00_FFFF), 1.0 / 256.0);
    }

    #[test]
    fn smaller_mantissa_is_harder() {
        let d = compact_to_difficulty(0x1D00_7FFF);
        assert!((d - 2.0).abs() < 1e-3, "got {d}");
    }

    // ------------------------------------------------------------------
    // Two-header chain
    // ------------------------------------------------------------------

    #[test]
    fn two_header_chain_heights_and_sums() {
        let mut graph = HeaderGraph::new();
        let genesis = make_header(Hash256::ZERO, 0);
        let genesis_hash = genesis.this_hash();
        graph.insert(genesis);
        let h1 = make_header(genesis_hash, 1);
        let h1_hash = h1.this_hash();
        graph.insert(h1);

        let mut top = None;
        assert!(organize_graph(&mut graph, &mut top));

        let tip = graph.at(top.unwrap()).unwrap();
        assert_eq!(tip.this_hash(), h1_hash);
        assert_eq!(tip.block_height(), 1);
        assert_eq!(tip.difficulty_sum(), 2.0);
        assert!(tip.is_main_branch());

        let genesis = graph.get(&genesis_hash).unwrap();
        assert_eq!(genesis.block_height(), 0);
        assert_eq!(genesis.difficulty_sum(), 1.0);
        assert_eq!(genesis.next_hash(), h1_hash);
        assert_eq!(tip.next_hash(), Hash256::ZERO);
    }

    #[test]
    fn height_index_covers_genesis_and_tip() {
        let mut graph = HeaderGraph::new();
        let hashes = extend_chain(&mut graph, Hash256::ZERO, 3, 0);
        let mut top = None;
        organize_graph(&mut graph, &mut top);

        for (height, hash) in hashes.iter().enumerate() {
            let at = graph.at_height(height as u64).unwrap();
            assert_eq!(at.this_hash(), *hash);
            assert_eq!(at.block_height(), height as u64);
        }
        assert_eq!(graph.max_height(), Some(2));
        assert!(graph.at_height(3).is_none());
    }

    // ------------------------------------------------------------------
    // Chain algebra
    // ------------------------------------------------------------------

    #[test]
    fn main_branch_parent_child_relations() {
        let mut graph = HeaderGraph::new();
        extend_chain(&mut graph, Hash256::ZERO, 5, 0);
        let mut top = None;
        organize_graph(&mut graph, &mut top);

        for height in 1..5u64 {
            let child = graph.at_height(height).unwrap();
            let parent = graph.at_height(height - 1).unwrap();
            assert_eq!(child.block_height(), parent.block_height() + 1);
            assert_eq!(child.difficulty_sum(), parent.difficulty_sum() + child.difficulty());
            assert_eq!(parent.next_hash(), child.this_hash());
            assert_eq!(child.prev_hash(), parent.this_hash());
        }
    }

    #[test]
    fn tip_has_maximum_difficulty_sum() {
        let mut graph = HeaderGraph::new();
        extend_chain(&mut graph, Hash256::ZERO, 4, 0);
        let mut top = None;
        organize_graph(&mut graph, &mut top);

        let tip_sum = graph.at(top.unwrap()).unwrap().difficulty_sum();
        for header in graph.iter() {
            if header.is_main_branch() {
                assert!(header.difficulty_sum() <= tip_sum);
            }
        }
    }

    // ------------------------------------------------------------------
    // Orphans
    // ------------------------------------------------------------------

    #[test]
    fn orphan_marked_and_excluded() {
        let mut graph = HeaderGraph::new();
        let hashes = extend_chain(&mut graph, Hash256::ZERO, 2, 0);
        let orphan = make_header(Hash256([0xFF; 32]), 99);
        let orphan_hash = orphan.this_hash();
        graph.insert(orphan);

        let mut top = None;
        assert!(organize_graph(&mut graph, &mut top));

        let x = graph.get(&orphan_hash).unwrap();
        assert!(x.is_orphan());
        assert!(!x.is_main_branch());
        assert_eq!(x.difficulty_sum(), 0.0);
        // Tip unaffected by the orphan.
        assert_eq!(graph.at(top.unwrap()).unwrap().this_hash(), hashes[1]);
    }

    #[test]
    fn orphan_chain_marked_through_ancestors() {
        let mut graph = HeaderGraph::new();
        extend_chain(&mut graph, Hash256::ZERO, 1, 0);
        // Two-block chain hanging off an unknown parent.
        let hanging = extend_chain(&mut graph, Hash256([0xEE; 32]), 2, 50);

        let mut top = None;
        organize_graph(&mut graph, &mut top);
        for hash in &hanging {
            assert!(graph.get(hash).unwrap().is_orphan(), "{hash}");
        }
    }

    #[test]
    fn orphan_adopted_once_parent_arrives() {
        let mut graph = HeaderGraph::new();
        let genesis = extend_chain(&mut graph, Hash256::ZERO, 1, 0);
        // A child whose parent is not yet inserted.
        let parent = make_header(genesis[0], 10);
        let child = make_header(parent.this_hash(), 11);
        let child_hash = child.this_hash();
        graph.insert(child);

        let mut top = None;
        organize_graph(&mut graph, &mut top);
        assert!(graph.get(&child_hash).unwrap().is_orphan());

        // Parent arrives; the orphan joins the main branch.
        graph.insert(parent);
        assert!(organize_graph(&mut graph, &mut top));
        let adopted = graph.get(&child_hash).unwrap();
        assert!(!adopted.is_orphan());
        assert!(adopted.is_main_branch());
        assert_eq!(adopted.block_height(), 2);
    }

    #[test]
    fn no_genesis_marks_everything_orphan() {
        let mut graph = HeaderGraph::new();
        let hashes = extend_chain(&mut graph, Hash256([0x55; 32]), 3, 0);
        let mut top = None;
        assert!(organize_graph(&mut graph, &mut top));
        assert!(top.is_none());
        for hash in &hashes {
            assert!(graph.get(hash).unwrap().is_orphan());
        }
    }

    // ------------------------------------------------------------------
    // Reorgs
    // ------------------------------------------------------------------

    #[test]
    fn heavier_fork_triggers_reorg() {
        let mut graph = HeaderGraph::new();
        let genesis = extend_chain(&mut graph, Hash256::ZERO, 1, 0);
        let old_branch = extend_chain(&mut graph, genesis[0], 2, 10); // A, B

        let mut top = None;
        assert!(organize_graph(&mut graph, &mut top));
        assert_eq!(graph.at(top.unwrap()).unwrap().this_hash(), old_branch[1]);

        // Fork from genesis with three blocks: heavier than the old tip.
        let new_branch = extend_chain(&mut graph, genesis[0], 3, 20); // A', B', C'

        // The detecting call returns false; the next call returns true.
        assert!(!organize_graph(&mut graph, &mut top));
        assert!(organize_graph(&mut graph, &mut top));

        let tip = graph.at(top.unwrap()).unwrap();
        assert_eq!(tip.this_hash(), new_branch[2]);
        assert_eq!(tip.block_height(), 3);
        assert_eq!(tip.difficulty_sum(), 4.0);

        // The displaced branch is fully unlabeled.
        for hash in &old_branch {
            let header = graph.get(hash).unwrap();
            assert!(!header.is_main_branch(), "{hash}");
        }
        // Forward pointers follow the new branch.
        assert_eq!(graph.get(&genesis[0]).unwrap().next_hash(), new_branch[0]);
        assert_eq!(graph.at_height(1).unwrap().this_hash(), new_branch[0]);
    }

    #[test]
    fn extending_tip_is_not_a_reorg() {
        let mut graph = HeaderGraph::new();
        let genesis = extend_chain(&mut graph, Hash256::ZERO, 1, 0);
        let chain = extend_chain(&mut graph, genesis[0], 2, 10);

        let mut top = None;
        assert!(organize_graph(&mut graph, &mut top));

        // One more block on the same branch.
        let more = extend_chain(&mut graph, chain[1], 1, 30);
        assert!(organize_graph(&mut graph, &mut top));
        assert_eq!(graph.at(top.unwrap()).unwrap().this_hash(), more[0]);
    }

    #[test]
    fn lighter_fork_does_not_move_tip() {
        let mut graph = HeaderGraph::new();
        let genesis = extend_chain(&mut graph, Hash256::ZERO, 1, 0);
        let main = extend_chain(&mut graph, genesis[0], 3, 10);

        let mut top = None;
        organize_graph(&mut graph, &mut top);

        // Shorter fork from genesis.
        extend_chain(&mut graph, genesis[0], 1, 40);
        assert!(organize_graph(&mut graph, &mut top));
        assert_eq!(graph.at(top.unwrap()).unwrap().this_hash(), main[2]);
    }

    #[test]
    fn repeat_organize_is_stable() {
        let mut graph = HeaderGraph::new();
        extend_chain(&mut graph, Hash256::ZERO, 4, 0);
        let mut top = None;
        organize_graph(&mut graph, &mut top);
        let tip_before = graph.at(top.unwrap()).unwrap().this_hash();

        for _ in 0..3 {
            assert!(organize_graph(&mut graph, &mut top));
            assert_eq!(graph.at(top.unwrap()).unwrap().this_hash(), tip_before);
        }
    }

    #[test]
    fn forced_rebuild_reproduces_annotations() {
        let mut graph = HeaderGraph::new();
        extend_chain(&mut graph, Hash256::ZERO, 3, 0);
        let mut top = None;
        organize_graph(&mut graph, &mut top);
        let sums: Vec<f64> = graph.iter().map(|h| h.difficulty_sum()).collect();

        assert!(organize(&mut graph, &mut top, true));
        let rebuilt: Vec<f64> = graph.iter().map(|h| h.difficulty_sum()).collect();
        assert_eq!(sums, rebuilt);
    }
}
