//! In-memory DAG state: pivot tree + total graph, non-finalized block
//! tracking, anchor bookkeeping and frontier computation. Persistence is
//! the caller's responsibility (the consensus crate commits alongside
//! PBFT finalization).

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use taraxa_core::Hash;

use crate::block::{DagBlock, DagFrontier};
use crate::dag::{Dag, PivotTree};
use crate::error::{DagError, Result};

pub struct DagManager {
    pivot_tree: PivotTree,
    total_dag: Dag,
    genesis: Hash,
    max_level: AtomicU64,
    state: RwLock<ManagerState>,
}

struct ManagerState {
    anchor: Hash,
    old_anchor: Hash,
    period: u64,
    non_finalized: BTreeMap<u64, Vec<Hash>>,
    finalized: BTreeMap<u64, Vec<Hash>>,
    frontier: DagFrontier,
}

impl DagManager {
    pub fn new(genesis: Hash) -> Self {
        Self {
            pivot_tree: PivotTree::new(genesis),
            total_dag: Dag::new(genesis),
            genesis,
            max_level: AtomicU64::new(0),
            state: RwLock::new(ManagerState {
                anchor: genesis,
                old_anchor: genesis,
                period: 0,
                non_finalized: BTreeMap::new(),
                finalized: BTreeMap::new(),
                frontier: DagFrontier::new(genesis, Vec::new()),
            }),
        }
    }

    pub fn genesis(&self) -> &Hash {
        &self.genesis
    }

    pub fn max_level(&self) -> u64 {
        self.max_level.load(Ordering::Relaxed)
    }

    pub fn get_anchors(&self) -> (Hash, Hash) {
        let s = self.state.read();
        (s.old_anchor, s.anchor)
    }

    pub fn latest_period(&self) -> u64 {
        self.state.read().period
    }

    pub fn get_dag_frontier(&self) -> DagFrontier {
        self.state.read().frontier.clone()
    }

    pub fn get_non_finalized_blocks(&self) -> BTreeMap<u64, Vec<Hash>> {
        self.state.read().non_finalized.clone()
    }

    /// Look up the DAG level of a known block (genesis is level 0). Used by
    /// the proposer to derive the next block's level from its frontier.
    pub fn level_of(&self, hash: &Hash) -> Option<u64> {
        if *hash == self.genesis {
            return Some(0);
        }
        let s = self.state.read();
        for (level, blocks) in s.non_finalized.iter().chain(s.finalized.iter()) {
            if blocks.contains(hash) {
                return Some(*level);
            }
        }
        None
    }

    /// Insert a validated block into both the pivot tree and total graph,
    /// track it as non-finalized at its level, and refresh the frontier.
    pub fn add_dag_block(&self, block: &DagBlock, finalized: bool) {
        let hash = *block.hash();
        let pivot = *block.pivot();
        let tips = block.tips().to_vec();
        let level = block.level();

        self.pivot_tree.add_vee(hash, pivot);
        self.total_dag.add_vees(hash, Some(pivot), &tips);

        self.max_level.fetch_max(level, Ordering::Relaxed);

        let mut s = self.state.write();
        if finalized {
            s.finalized.entry(level).or_default().push(hash);
        } else {
            s.non_finalized.entry(level).or_default().push(hash);
        }

        let leaves = self.total_dag.get_leaves();
        let new_pivot = leaves.first().copied().unwrap_or(hash);
        s.frontier = DagFrontier::new(new_pivot, leaves);
    }

    /// The current heaviest pivot chain and its tips (the leaves of the
    /// total DAG), used when proposing the next block.
    pub fn get_latest_pivot_and_tips(&self) -> (Hash, Vec<Hash>) {
        let anchor = self.state.read().anchor;
        let pivot_chain = self.pivot_tree.get_ghost_path(&anchor);
        let pivot = pivot_chain.last().copied().unwrap_or(anchor);
        let tips = self.total_dag.get_leaves();
        (pivot, tips)
    }

    pub fn get_ghost_path(&self, source: &Hash) -> Vec<Hash> {
        self.pivot_tree.get_ghost_path(source)
    }

    /// Deterministic ordering of all non-finalized blocks that can reach
    /// `anchor`, for the PBFT block proposer. Does not mutate state.
    pub fn get_dag_block_order(&self, anchor: &Hash) -> Result<(u64, Vec<Hash>)> {
        let s = self.state.read();
        let order = self
            .total_dag
            .compute_order(anchor, &s.non_finalized)
            .ok_or_else(|| DagError::UnknownAnchor(hex::encode(anchor)))?;
        Ok((s.period + 1, order))
    }

    /// Commit the order produced above: move the listed blocks from
    /// non-finalized to finalized, advance the period and anchors.
    pub fn set_dag_block_order(&self, anchor: Hash, period: u64, order: &[Hash]) -> usize {
        let mut s = self.state.write();
        for blocks in s.non_finalized.values_mut() {
            blocks.retain(|b| !order.contains(b));
        }
        s.non_finalized.retain(|_, v| !v.is_empty());

        s.finalized.entry(period).or_default().extend(order.iter().copied());
        s.old_anchor = s.anchor;
        s.anchor = anchor;
        s.period = period;
        order.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taraxa_crypto::KeyPair;
    use taraxa_vdf::{VdfConfig, VdfSortition};

    fn block_on(pivot: Hash, level: u64) -> DagBlock {
        let keypair = KeyPair::generate();
        let config = VdfConfig { threshold_vdf_omit: u16::MAX, ..VdfConfig::default() };
        let vdf = VdfSortition::compute(&config, &[1u8; 32], b"x").unwrap();
        DagBlock::build(pivot, level, vec![], vec![], 1, vdf, &keypair).unwrap()
    }

    #[test]
    fn add_block_updates_frontier() {
        let genesis = [0u8; 32];
        let manager = DagManager::new(genesis);
        let block = block_on(genesis, 0);
        manager.add_dag_block(&block, false);
        let frontier = manager.get_dag_frontier();
        assert_eq!(frontier.pivot, *block.hash());
    }

    #[test]
    fn set_dag_block_order_advances_period() {
        let genesis = [0u8; 32];
        let manager = DagManager::new(genesis);
        let block = block_on(genesis, 0);
        manager.add_dag_block(&block, false);
        let (period, order) = manager.get_dag_block_order(block.hash()).unwrap();
        assert_eq!(period, 1);
        let moved = manager.set_dag_block_order(*block.hash(), period, &order);
        assert_eq!(moved, order.len());
        assert_eq!(manager.latest_period(), 1);
    }
}
