//! Block proposer: VDF/VRF-gated DAG block production (spec §4.F).
//!
//! Runs as a background worker with a minimum spacing between attempts,
//! the same `running: Arc<RwLock<bool>>` start/stop shape used by the
//! rest of this codebase's dispatch loops.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use taraxa_core::{Address, Hash};
use taraxa_crypto::KeyPair;
use taraxa_dag::block_manager::{AlwaysEligible, EligibilityChecker};
use taraxa_dag::{vdf_sortition_message, DagBlock, DagBlockManager, DagManager};
use taraxa_vdf::{VdfConfig, VdfSortition};

use crate::error::Result;

/// Transactions this node's mempool makes available for packing into the
/// next DAG block. Gas estimation and weight accounting are the
/// implementation's responsibility; the sender address is passed through
/// for proposer-eligibility bookkeeping, while sharding itself keys off
/// the transaction hash.
pub trait TransactionSource: Send + Sync {
    fn candidate_transactions(&self, weight_limit: u64) -> Vec<(Hash, Address)>;
}

/// No candidates — drives the proposer loop with an empty mempool
/// (tests, or a node that only ever relays).
pub struct NoTransactions;

impl TransactionSource for NoTransactions {
    fn candidate_transactions(&self, _weight_limit: u64) -> Vec<(Hash, Address)> {
        Vec::new()
    }
}

/// `addr[0..3] mod total_shards` — the shard a proposer at this address serves.
fn proposer_shard(addr: &Address, total_shards: u16) -> u16 {
    if total_shards <= 1 {
        return 0;
    }
    let b = addr.as_bytes();
    let v = u32::from_be_bytes([0, b[0], b[1], b[2]]);
    (v % total_shards as u32) as u16
}

/// First 10 hex digits (5 bytes) of the transaction hash mod total_shards
/// — the shard a transaction belongs to.
fn transaction_shard(hash: &Hash, total_shards: u16) -> u16 {
    if total_shards <= 1 {
        return 0;
    }
    let v = u64::from_be_bytes([0, 0, 0, hash[0], hash[1], hash[2], hash[3], hash[4]]);
    (v % total_shards as u64) as u16
}

pub struct ProposerConfig {
    pub node_sk: [u8; 32],
    pub vdf: VdfConfig,
    pub total_shards: u16,
    pub weight_limit: u64,
    pub propose_spacing: Duration,
    pub max_vdf_retries: u32,
}

impl Default for ProposerConfig {
    fn default() -> Self {
        Self {
            node_sk: [0u8; 32],
            vdf: VdfConfig::default(),
            total_shards: taraxa_core::constants::proposer::DEFAULT_TOTAL_SHARDS,
            weight_limit: taraxa_dag::MAX_TRXS_PER_BLOCK as u64,
            propose_spacing: Duration::from_millis(taraxa_core::constants::proposer::MIN_PROPOSE_SPACING_MS),
            max_vdf_retries: taraxa_core::constants::proposer::MAX_VDF_RETRIES,
        }
    }
}

pub struct BlockProposer<E: EligibilityChecker = AlwaysEligible> {
    dag: Arc<DagManager>,
    block_mgr: Arc<DagBlockManager<E>>,
    eligibility: Arc<E>,
    trx_source: Arc<dyn TransactionSource>,
    config: ProposerConfig,
    address: Address,
    shard_id: u16,
    running: Arc<RwLock<bool>>,
    last_attempted_level: AtomicU64,
    stale_retries: AtomicU32,
}

impl<E: EligibilityChecker + 'static> BlockProposer<E> {
    pub fn new(
        dag: Arc<DagManager>,
        block_mgr: Arc<DagBlockManager<E>>,
        eligibility: Arc<E>,
        trx_source: Arc<dyn TransactionSource>,
        config: ProposerConfig,
    ) -> Self {
        let keypair = KeyPair::from_secret(&config.node_sk).expect("proposer secret key must be valid");
        let address: Address = keypair.address().into_bytes().into();
        let shard_id = proposer_shard(&address, config.total_shards);
        Self {
            dag,
            block_mgr,
            eligibility,
            trx_source,
            config,
            address,
            shard_id,
            running: Arc::new(RwLock::new(false)),
            last_attempted_level: AtomicU64::new(0),
            stale_retries: AtomicU32::new(0),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub async fn start(&self, synced: impl Fn() -> bool + Send + Sync + 'static) {
        *self.running.write() = true;
        info!("block proposer started, shard {}", self.shard_id);

        while *self.running.read() {
            if synced() {
                match self.try_propose() {
                    Ok(Some(hash)) => info!("proposed dag block {}", hex::encode(hash)),
                    Ok(None) => {}
                    Err(e) => warn!("block proposal attempt failed: {}", e),
                }
            }
            tokio::time::sleep(self.config.propose_spacing).await;
        }

        info!("block proposer stopped");
    }

    pub fn stop(&self) {
        *self.running.write() = false;
    }

    /// One pass of the spec §4.F pipeline. Returns the built block's hash
    /// when a block was produced, `None` when this cycle proposes nothing.
    pub fn try_propose(&self) -> Result<Option<Hash>> {
        let (pivot, mut tips) = self.dag.get_latest_pivot_and_tips();
        let pivot_level = self.dag.level_of(&pivot).unwrap_or(0);
        let tip_level = tips.iter().filter_map(|t| self.dag.level_of(t)).max().unwrap_or(pivot_level);
        let level = 1 + pivot_level.max(tip_level);

        if level == self.last_attempted_level.load(Ordering::Relaxed) {
            if self.stale_retries.load(Ordering::Relaxed) >= self.config.max_vdf_retries {
                debug!("skipping proposal at level {}: exhausted stale-VDF retries", level);
                return Ok(None);
            }
        } else {
            self.last_attempted_level.store(level, Ordering::Relaxed);
            self.stale_retries.store(0, Ordering::Relaxed);
        }

        let msg = vdf_sortition_message(&pivot, &tips);
        let vdf = VdfSortition::compute(&self.config.vdf, &self.config.node_sk, &msg)?;
        if vdf.is_stale(&self.config.vdf) {
            self.stale_retries.fetch_add(1, Ordering::Relaxed);
            debug!("vdf sortition stale at level {}, retry {}", level, self.stale_retries.load(Ordering::Relaxed));
            return Ok(None);
        }

        let expected_period = self.dag.latest_period() + 1;
        if !self.eligibility.is_eligible(&self.address, expected_period) {
            debug!("not eligible to propose for period {}", expected_period);
            return Ok(None);
        }

        let candidates = self.trx_source.candidate_transactions(self.config.weight_limit);
        let trxs: Vec<Hash> =
            candidates.into_iter().filter(|(h, _)| transaction_shard(h, self.config.total_shards) == self.shard_id).map(|(h, _)| h).collect();
        if trxs.is_empty() {
            return Ok(None);
        }

        // Frontier may have shifted while packing; if a known tip now
        // equals the newly observed pivot, swap it back in for the old one.
        let (new_pivot, _) = self.dag.get_latest_pivot_and_tips();
        let pivot = if new_pivot != pivot {
            if let Some(slot) = tips.iter_mut().find(|t| **t == new_pivot) {
                *slot = pivot;
            }
            new_pivot
        } else {
            pivot
        };

        let keypair = KeyPair::from_secret(&self.config.node_sk)?;
        let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        let block = DagBlock::build(pivot, pivot_level, tips, trxs, timestamp, vdf, &keypair)?;
        let hash = *block.hash();

        self.block_mgr.push_unverified_block(block)?;
        self.stale_retries.store(0, Ordering::Relaxed);
        Ok(Some(hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taraxa_dag::block_manager::AlwaysEligible;

    struct OneTransaction(Address);

    impl TransactionSource for OneTransaction {
        fn candidate_transactions(&self, _weight_limit: u64) -> Vec<(Hash, Address)> {
            vec![([7u8; 32], self.0)]
        }
    }

    fn lenient_vdf_config() -> VdfConfig {
        VdfConfig { threshold_vdf_omit: u16::MAX, ..VdfConfig::default() }
    }

    #[test]
    fn skips_when_no_transactions_survive_sharding() {
        let dag = Arc::new(DagManager::new([0u8; 32]));
        let block_mgr = Arc::new(DagBlockManager::<AlwaysEligible>::new(0));
        let config = ProposerConfig { vdf: lenient_vdf_config(), node_sk: [1u8; 32], ..ProposerConfig::default() };
        let proposer =
            BlockProposer::new(dag, block_mgr, Arc::new(AlwaysEligible), Arc::new(NoTransactions), config);
        assert_eq!(proposer.try_propose().unwrap(), None);
    }

    #[test]
    fn proposes_a_block_when_a_transaction_matches_its_shard() {
        let dag = Arc::new(DagManager::new([0u8; 32]));
        let block_mgr = Arc::new(DagBlockManager::<AlwaysEligible>::new(0));
        let node_sk = [2u8; 32];
        let config =
            ProposerConfig { vdf: lenient_vdf_config(), node_sk, total_shards: 1, ..ProposerConfig::default() };
        let proposer_address: Address = KeyPair::from_secret(&node_sk).unwrap().address().into_bytes().into();
        let trx_source = Arc::new(OneTransaction(proposer_address));
        let proposer = BlockProposer::new(dag, block_mgr.clone(), Arc::new(AlwaysEligible), trx_source, config);

        let hash = proposer.try_propose().unwrap().expect("should propose");
        let (unverified, _) = block_mgr.queue_sizes();
        assert_eq!(unverified, 1);
        assert_ne!(hash, [0u8; 32]);
    }

    #[test]
    fn shard_helpers_are_deterministic() {
        let addr = Address::new([0xAB; 20]);
        let hash: Hash = [0xCD; 32];
        assert_eq!(proposer_shard(&addr, 1), 0);
        assert_eq!(transaction_shard(&hash, 1), 0);
        assert_eq!(proposer_shard(&addr, 4), proposer_shard(&addr, 4));
        assert_eq!(transaction_shard(&hash, 4), transaction_shard(&hash, 4));
    }
}
