//! Verifier pipeline and block queues: blocks arrive unverified, pass
//! signature + VDF checks, and move to the verified queue in level order.
//! DPOS eligibility and proposal-period mapping are delegated to an
//! `EligibilityChecker` — the staking/state-trie machinery that decides
//! them lives outside this crate.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use taraxa_core::Hash;

use crate::block::{vdf_sortition_message, DagBlock};
use crate::error::{DagError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    Invalid,
    Proposed,
    Broadcasted,
}

/// Hook for the proposer-eligibility check this crate does not own
/// (DPOS stake lookups against chain state). Always-eligible by default.
pub trait EligibilityChecker: Send + Sync {
    fn is_eligible(&self, proposer: &taraxa_core::Address, period: u64) -> bool;
}

pub struct AlwaysEligible;

impl EligibilityChecker for AlwaysEligible {
    fn is_eligible(&self, _proposer: &taraxa_core::Address, _period: u64) -> bool {
        true
    }
}

pub struct DagBlockManager<E: EligibilityChecker = AlwaysEligible> {
    status: RwLock<HashMap<Hash, BlockStatus>>,
    seen: RwLock<HashSet<Hash>>,
    unverified: RwLock<BTreeMap<u64, VecDeque<DagBlock>>>,
    verified: RwLock<BTreeMap<u64, VecDeque<DagBlock>>>,
    queue_limit: usize,
    eligibility: E,
}

impl DagBlockManager<AlwaysEligible> {
    pub fn new(queue_limit: usize) -> Self {
        Self::with_eligibility_checker(queue_limit, AlwaysEligible)
    }
}

impl<E: EligibilityChecker> DagBlockManager<E> {
    pub fn with_eligibility_checker(queue_limit: usize, eligibility: E) -> Self {
        Self {
            status: RwLock::new(HashMap::new()),
            seen: RwLock::new(HashSet::new()),
            unverified: RwLock::new(BTreeMap::new()),
            verified: RwLock::new(BTreeMap::new()),
            queue_limit,
            eligibility,
        }
    }

    /// True if the block is already known (seen or part of the DAG).
    pub fn is_dag_block_known(&self, hash: &Hash) -> bool {
        self.seen.read().contains(hash)
    }

    /// Mark a block as seen. Returns false if it was already marked.
    pub fn mark_dag_block_as_seen(&self, hash: &Hash) -> bool {
        self.seen.write().insert(*hash)
    }

    pub fn mark_block_invalid(&self, hash: Hash) {
        self.status.write().insert(hash, BlockStatus::Invalid);
    }

    pub fn block_status(&self, hash: &Hash) -> Option<BlockStatus> {
        self.status.read().get(hash).copied()
    }

    pub fn queue_sizes(&self) -> (usize, usize) {
        let u: usize = self.unverified.read().values().map(VecDeque::len).sum();
        let v: usize = self.verified.read().values().map(VecDeque::len).sum();
        (u, v)
    }

    pub fn max_dag_level_in_queue(&self) -> u64 {
        self.unverified.read().keys().next_back().copied().unwrap_or(0)
    }

    /// Queue a block for verification, keyed by level. Rejects if the
    /// queue is at capacity (`queue_limit == 0` means unbounded).
    pub fn push_unverified_block(&self, block: DagBlock) -> Result<()> {
        let mut q = self.unverified.write();
        if self.queue_limit > 0 {
            let total: usize = q.values().map(VecDeque::len).sum();
            if total >= self.queue_limit {
                return Err(DagError::DuplicateBlock(hex::encode(block.hash())));
            }
        }
        q.entry(block.level()).or_default().push_back(block);
        Ok(())
    }

    /// Run the verifier pipeline on every queued block: signature, VDF,
    /// then eligibility. Verified blocks move to the verified queue;
    /// failures are marked invalid and dropped.
    pub fn verify_queued_blocks(&self, vdf_config: &taraxa_vdf::VdfConfig, period: u64) {
        let drained: Vec<DagBlock> = {
            let mut q = self.unverified.write();
            let mut out = Vec::new();
            for (_, dq) in q.iter_mut() {
                out.extend(dq.drain(..));
            }
            q.clear();
            out
        };

        for block in drained {
            match self.verify_one(&block, vdf_config, period) {
                Ok(()) => {
                    self.verified.write().entry(block.level()).or_default().push_back(block);
                }
                Err(_) => {
                    self.mark_block_invalid(*block.hash());
                }
            }
        }
    }

    fn verify_one(&self, block: &DagBlock, vdf_config: &taraxa_vdf::VdfConfig, period: u64) -> Result<()> {
        block.verify_sig()?;
        block
            .vdf()
            .verify(vdf_config, &vdf_sortition_message(block.pivot(), block.tips()))
            .map_err(|e| DagError::InvalidVdf(hex::encode(block.hash()), e.to_string()))?;
        if !self.eligibility.is_eligible(block.sender(), period) {
            return Err(DagError::InvalidSignature(hex::encode(block.hash())));
        }
        Ok(())
    }

    /// Pop one verified block, optionally only below `level` (used by the
    /// proposer to respect `level_limit`).
    pub fn pop_verified_block(&self, level_limit: Option<u64>) -> Option<DagBlock> {
        let mut q = self.verified.write();
        let key = match level_limit {
            Some(limit) => *q.range(..=limit).next()?.0,
            None => *q.keys().next()?,
        };
        let dq = q.get_mut(&key)?;
        let block = dq.pop_front();
        if dq.is_empty() {
            q.remove(&key);
        }
        block
    }

    pub fn push_verified_block(&self, block: DagBlock) {
        self.verified.write().entry(block.level()).or_default().push_back(block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taraxa_crypto::KeyPair;
    use taraxa_vdf::{VdfConfig, VdfSortition};

    fn sample_block() -> DagBlock {
        let keypair = KeyPair::generate();
        let config = VdfConfig { threshold_vdf_omit: u16::MAX, ..VdfConfig::default() };
        let vdf = VdfSortition::compute(&config, &[2u8; 32], &[1u8; 32]).unwrap();
        DagBlock::build([1u8; 32], 0, vec![], vec![], 1, vdf, &keypair).unwrap()
    }

    #[test]
    fn seen_marking_is_idempotent() {
        let manager: DagBlockManager = DagBlockManager::new(0);
        let hash = [5u8; 32];
        assert!(manager.mark_dag_block_as_seen(&hash));
        assert!(!manager.mark_dag_block_as_seen(&hash));
    }

    #[test]
    fn verified_block_round_trips_through_queues() {
        let manager: DagBlockManager = DagBlockManager::new(0);
        let config = VdfConfig { threshold_vdf_omit: u16::MAX, ..VdfConfig::default() };
        let block = sample_block();
        manager.push_unverified_block(block.clone()).unwrap();
        manager.verify_queued_blocks(&config, 1);
        let popped = manager.pop_verified_block(None).unwrap();
        assert_eq!(popped.hash(), block.hash());
    }
}
