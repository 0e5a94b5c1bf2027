//! Five-phase PBFT round state machine (spec §4.G): Propose, Filter
//! (soft-vote), Certify (cert-vote), First-finish and Second-finish
//! (next-vote), driven by a fixed-tick loop the same shape as
//! `BlockProposer`'s.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use parking_lot::RwLock;
use rug::integer::Order;
use rug::Integer;
use tracing::{debug, error, info, warn};

use taraxa_core::{Address, Hash};
use taraxa_crypto::KeyPair;
use taraxa_dag::block_manager::{AlwaysEligible, EligibilityChecker};
use taraxa_dag::{DagBlockManager, DagManager};
use taraxa_storage::{ConsensusDb, PbftChainHead};
use taraxa_vote::{
    sortition_threshold, two_t_plus_one, PbftVoteType, PreviousRoundNextVotes, Vote, VoteManager, VrfPbftMsg,
    VrfPbftSortition,
};

use crate::error::{ConsensusError, Result};
use crate::executor::Executor;
use crate::pbft_chain::{PbftBlock, PbftChain, NULL_BLOCK_HASH};

const TICK_INTERVAL_MS: u64 = 50;

/// DPOS stake boundary (spec §6): total weighted vote count and a single
/// voter's weight for a given period. Staking and the state trie backing
/// it live outside this crate.
pub trait DposReader: Send + Sync {
    fn total_votes_count(&self, period: u64) -> u64;
    fn eligible_vote_count(&self, voter: &Address, period: u64) -> u64;
}

/// Fixed weights, every period. Useful for a single-validator node or tests.
pub struct StaticDposReader {
    pub total_votes: u64,
    pub weight_per_voter: u64,
}

impl Default for StaticDposReader {
    fn default() -> Self {
        Self { total_votes: 1, weight_per_voter: 1 }
    }
}

impl DposReader for StaticDposReader {
    fn total_votes_count(&self, _period: u64) -> u64 {
        self.total_votes
    }

    fn eligible_vote_count(&self, _voter: &Address, _period: u64) -> u64 {
        self.weight_per_voter
    }
}

/// Why a sync was requested, mirrored onto the outgoing packet so peers
/// can answer with the right slice of chain state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncRequestReason {
    MissingDagBlock,
    InvalidCertVotedBlock,
    InvalidSoftVotedBlock,
    ExceededMaxSteps,
}

/// Outbound broadcast boundary (spec §6): votes and PBFT blocks leave the
/// manager through here. The tiered packet thread pool and gossip layer
/// live in `taraxa-network`, outside this crate.
pub trait PbftNetwork: Send + Sync {
    fn broadcast_vote(&self, vote: &Vote);
    fn broadcast_pbft_block(&self, block: &PbftBlock);
    fn request_sync(&self, reason: SyncRequestReason, round: u64);
}

/// No-op network: votes and blocks are cast into the void. Drives the
/// manager in isolation (tests, single-node fixtures).
pub struct NullPbftNetwork;

impl PbftNetwork for NullPbftNetwork {
    fn broadcast_vote(&self, _vote: &Vote) {}
    fn broadcast_pbft_block(&self, _block: &PbftBlock) {}
    fn request_sync(&self, _reason: SyncRequestReason, _round: u64) {}
}

pub struct PbftConfig {
    pub lambda_ms: u64,
    pub step4_delay_ms: u64,
    pub committee_size: u64,
    pub dag_blocks_size: usize,
    pub ghost_path_move_back: usize,
    pub max_steps_without_sync: u64,
}

impl Default for PbftConfig {
    fn default() -> Self {
        Self {
            lambda_ms: taraxa_core::constants::DEFAULT_LAMBDA_MS,
            step4_delay_ms: taraxa_core::constants::pbft::STEP4_DELAY_MS,
            committee_size: taraxa_core::constants::pbft::DEFAULT_COMMITTEE_SIZE,
            dag_blocks_size: taraxa_core::constants::dag::DAG_BLOCKS_SIZE,
            ghost_path_move_back: taraxa_core::constants::dag::GHOST_PATH_MOVE_BACK,
            max_steps_without_sync: taraxa_core::constants::pbft::MAX_STEPS_WITHOUT_SYNC,
        }
    }
}

/// The step boundary (ms since round start) at which `step` ends. Steps
/// 1/2/3 are Propose/Filter/Certify, each a fixed multiple of lambda;
/// steps 4 and on alternate First-finish/Second-finish every 2 lambda.
fn step_boundary_ms(step: u64, cfg: &PbftConfig) -> u64 {
    let lambda = cfg.lambda_ms;
    match step {
        1 => 2 * lambda,
        2 => 4 * lambda,
        3 => 4 * lambda + cfg.step4_delay_ms,
        s => (4 * lambda + cfg.step4_delay_ms) + (s - 3) * 2 * lambda,
    }
}

struct RoundState {
    round: u64,
    step: u64,
    round_started_at: Instant,
    own_starting_value: Hash,
    previous_round_ended_null: bool,
    proposed_block_hash: Option<Hash>,
    soft_voted_value: Option<Hash>,
    cert_voted_value: Option<Hash>,
    executed_this_round: bool,
    last_sync_request_step: Option<u64>,
}

impl RoundState {
    fn new(round: u64, own_starting_value: Hash, previous_round_ended_null: bool) -> Self {
        Self {
            round,
            step: 1,
            round_started_at: Instant::now(),
            own_starting_value,
            previous_round_ended_null,
            proposed_block_hash: None,
            soft_voted_value: None,
            cert_voted_value: None,
            executed_this_round: false,
            last_sync_request_step: None,
        }
    }
}

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

/// Drives one validator's participation in PBFT: proposes, votes, and
/// finalizes periods by feeding the DAG's deterministic order to the
/// executor and committing the result atomically alongside the chain
/// head advance.
pub struct PbftManager<E: EligibilityChecker = AlwaysEligible> {
    dag: Arc<DagManager>,
    dag_block_mgr: Arc<DagBlockManager<E>>,
    vote_mgr: Arc<VoteManager>,
    prev_next_votes: Arc<PreviousRoundNextVotes>,
    chain: Arc<PbftChain>,
    db: Arc<ConsensusDb>,
    executor: Arc<dyn Executor>,
    dpos: Arc<dyn DposReader>,
    network: Arc<dyn PbftNetwork>,
    config: PbftConfig,
    node_sk: [u8; 32],
    address: Address,
    running: Arc<RwLock<bool>>,
    state: RwLock<RoundState>,
    two_t_plus_one: AtomicU64,
    sortition_threshold: AtomicU64,
}

impl<E: EligibilityChecker + 'static> PbftManager<E> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dag: Arc<DagManager>,
        dag_block_mgr: Arc<DagBlockManager<E>>,
        vote_mgr: Arc<VoteManager>,
        prev_next_votes: Arc<PreviousRoundNextVotes>,
        chain: Arc<PbftChain>,
        db: Arc<ConsensusDb>,
        executor: Arc<dyn Executor>,
        dpos: Arc<dyn DposReader>,
        network: Arc<dyn PbftNetwork>,
        config: PbftConfig,
        node_sk: [u8; 32],
    ) -> Self {
        let address: Address = KeyPair::from_secret(&node_sk)
            .expect("pbft node secret key must be valid")
            .address()
            .into_bytes()
            .into();
        let committee_size = config.committee_size;
        let total_votes = dpos.total_votes_count(chain.size() + 1);
        let manager = Self {
            dag,
            dag_block_mgr,
            vote_mgr,
            prev_next_votes,
            chain,
            db,
            executor,
            dpos,
            network,
            config,
            node_sk,
            address,
            running: Arc::new(RwLock::new(false)),
            state: RwLock::new(RoundState::new(1, NULL_BLOCK_HASH, false)),
            two_t_plus_one: AtomicU64::new(two_t_plus_one(committee_size, total_votes)),
            sortition_threshold: AtomicU64::new(sortition_threshold(committee_size, total_votes)),
        };
        let own_starting_value = manager.fresh_ghost_anchor();
        manager.state.write().own_starting_value = own_starting_value;
        manager
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn current_round(&self) -> u64 {
        self.state.read().round
    }

    pub fn current_step(&self) -> u64 {
        self.state.read().step
    }

    pub async fn start(&self) {
        *self.running.write() = true;
        info!("pbft manager started, round {}", self.current_round());

        while *self.running.read() {
            if let Err(e) = self.tick().await {
                if matches!(e, ConsensusError::ExecutorFailed(..)) {
                    error!("executor failed, stopping pbft manager: {}", e);
                    break;
                }
                warn!("pbft tick error: {}", e);
            }
            tokio::time::sleep(Duration::from_millis(TICK_INTERVAL_MS)).await;
        }

        *self.running.write() = false;
        info!("pbft manager stopped");
    }

    pub fn stop(&self) {
        *self.running.write() = false;
    }

    async fn tick(&self) -> Result<()> {
        self.verify_pending_votes();
        self.push_synced_blocks().await?;
        self.try_finalize_current_round().await?;
        self.determine_round();
        self.run_step_actions();
        self.advance_step_if_elapsed();
        self.maybe_request_sync();
        Ok(())
    }

    fn verify_pending_votes(&self) {
        let round = self.state.read().round;
        let period = self.chain.size() + 1;
        let threshold = self.sortition_threshold.load(Ordering::Relaxed);
        let total = self.dpos.total_votes_count(period);
        let dpos = &self.dpos;
        self.vote_mgr.verify_votes(round, threshold, total, |addr| dpos.eligible_vote_count(addr, period));
    }

    // -- stateOperations --------------------------------------------------

    /// Push one synced PBFT block certificate into the chain per tick.
    /// A certificate whose anchor is not yet locally reachable is left at
    /// the front of the queue to retry once its DAG epoch arrives.
    async fn push_synced_blocks(&self) -> Result<()> {
        let Some(cert) = self.chain.pop_synced_front() else { return Ok(()) };
        match self.schedule_matches_dag(cert.pbft_block.anchor_hash()) {
            Ok(_) if cert.cert_votes.len() as u64 >= self.two_t_plus_one.load(Ordering::Relaxed) => {
                self.finalize_block(&cert.pbft_block, cert.cert_votes).await?;
            }
            Ok(_) => {
                debug!("synced block {} has too few cert votes, dropping", hex::encode(cert.pbft_block.hash()));
            }
            Err(ConsensusError::EpochNotSynced) => {
                if self.dag_block_mgr.queue_sizes().0 == 0 {
                    self.network.request_sync(SyncRequestReason::MissingDagBlock, self.state.read().round);
                }
                self.chain.push_synced_block(cert);
            }
            Err(e) => {
                warn!("dropping invalid synced block {}: {}", hex::encode(cert.pbft_block.hash()), e);
                self.chain.clear_synced_queue();
            }
        }
        Ok(())
    }

    /// If we are in the Certify step and already hold 2t+1 cert-votes for
    /// a schedule-valid block this round, finalize without waiting for
    /// the round to formally end.
    async fn try_finalize_current_round(&self) -> Result<()> {
        let (round, step, executed, cert_voted) = {
            let s = self.state.read();
            (s.round, s.step, s.executed_this_round, s.cert_voted_value)
        };
        if step != 3 || executed {
            return Ok(());
        }
        let Some(value) = cert_voted else { return Ok(()) };
        if value == NULL_BLOCK_HASH {
            return Ok(());
        }
        let two_t = self.two_t_plus_one.load(Ordering::Relaxed) as usize;
        let bundle = self.vote_mgr.votes_bundle_for_round_step(round, 3, two_t);
        if !bundle.enough || bundle.voted_block_hash != value {
            return Ok(());
        }
        if self.schedule_matches_dag(&value).is_err() {
            return Ok(());
        }
        let Some(block) = self.chain.find_unverified_block(&value) else { return Ok(()) };
        self.finalize_block(&block, bundle.votes).await?;
        self.state.write().executed_this_round = true;
        Ok(())
    }

    /// If a later round already has 2t+1 next-votes recorded, the network
    /// has moved on; jump straight there carrying that bundle forward.
    fn determine_round(&self) {
        let two_t = self.two_t_plus_one.load(Ordering::Relaxed) as usize;
        let current_round = self.state.read().round;
        let Some(decided_round) = self.vote_mgr.round_determined_from_votes(two_t) else { return };
        if decided_round < current_round {
            return;
        }
        let max_step = 4 + self.config.max_steps_without_sync * 2;
        for step in 4..=max_step {
            let bundle = self.vote_mgr.votes_bundle_for_round_step(decided_round, step, two_t);
            if bundle.enough {
                self.prev_next_votes.update_next_votes(&bundle.votes, two_t);
                self.enter_round(decided_round + 1);
                return;
            }
        }
    }

    // -- per-step actions --------------------------------------------------

    fn run_step_actions(&self) {
        let step = self.state.read().step;
        match step {
            1 => self.try_propose(),
            2 => self.try_identify_and_soft_vote(),
            3 => self.try_cert_vote(),
            s if s >= 4 && (s - 4) % 2 == 0 => self.try_first_finish(),
            _ => self.try_second_finish(),
        }
    }

    fn try_propose(&self) {
        let (round, anchor, already_proposed) = {
            let s = self.state.read();
            (s.round, s.own_starting_value, s.proposed_block_hash.is_some())
        };
        if already_proposed {
            return;
        }
        let prev_hash = self.chain.last_pbft_block_hash();
        let period = self.chain.size() + 1;
        let keypair = match KeyPair::from_secret(&self.node_sk) {
            Ok(k) => k,
            Err(e) => {
                warn!("cannot propose, bad node key: {}", e);
                return;
            }
        };
        let block = match PbftBlock::build(prev_hash, anchor, period, now_secs(), &keypair) {
            Ok(b) => b,
            Err(e) => {
                warn!("failed to build pbft block: {}", e);
                return;
            }
        };
        let hash = *block.hash();
        self.chain.push_unverified_block(block.clone());
        self.network.broadcast_pbft_block(&block);
        self.cast_vote(PbftVoteType::Propose, round, 1, anchor);
        self.state.write().proposed_block_hash = Some(hash);
    }

    fn try_identify_and_soft_vote(&self) {
        let round = self.state.read().round;
        if self.state.read().soft_voted_value.is_some() {
            return;
        }
        let propose_votes = self.vote_mgr.votes_for_round_step(round, 1);
        let Some(leader) = propose_votes.iter().min_by(|a, b| vrf_ticket_cmp(a, b)) else { return };
        let value = *leader.block_hash();
        self.cast_vote(PbftVoteType::SoftVote, round, 2, value);
        self.state.write().soft_voted_value = Some(value);
    }

    fn try_cert_vote(&self) {
        let (round, already_cert_voted) = {
            let s = self.state.read();
            (s.round, s.cert_voted_value.is_some())
        };
        if already_cert_voted {
            return;
        }
        let two_t = self.two_t_plus_one.load(Ordering::Relaxed) as usize;
        let bundle = self.vote_mgr.votes_bundle_for_round_step(round, 2, two_t);
        if !bundle.enough {
            return;
        }
        let value = bundle.voted_block_hash;
        if value == NULL_BLOCK_HASH || self.schedule_matches_dag(&value).is_err() {
            return;
        }
        self.cast_vote(PbftVoteType::CertVote, round, 3, value);
        self.state.write().cert_voted_value = Some(value);
    }

    fn try_first_finish(&self) {
        let (round, step, cert_voted, previous_round_ended_null, own_value) = {
            let s = self.state.read();
            (s.round, s.step, s.cert_voted_value, s.previous_round_ended_null, s.own_starting_value)
        };
        let value = match cert_voted {
            Some(v) => v,
            None if previous_round_ended_null => NULL_BLOCK_HASH,
            None => own_value,
        };
        self.cast_vote_once_per_step(PbftVoteType::NextVote, round, step, value);
    }

    fn try_second_finish(&self) {
        let (round, step, previous_round_ended_null, cert_voted) = {
            let s = self.state.read();
            (s.round, s.step, s.previous_round_ended_null, s.cert_voted_value)
        };
        let two_t = self.two_t_plus_one.load(Ordering::Relaxed) as usize;
        let soft_bundle = self.vote_mgr.votes_bundle_for_round_step(round, 2, two_t);
        if soft_bundle.enough {
            self.cast_vote_once_per_step(PbftVoteType::NextVote, round, step, soft_bundle.voted_block_hash);
        } else if previous_round_ended_null && cert_voted.is_none() {
            self.cast_vote_once_per_step(PbftVoteType::NextVote, round, step, NULL_BLOCK_HASH);
        }
    }

    /// Finish-step next-votes are keyed by (round, step) in the vote
    /// manager, so re-entrancy is naturally idempotent: casting the same
    /// vote twice just fails to insert the second time.
    fn cast_vote_once_per_step(&self, vote_type: PbftVoteType, round: u64, step: u64, value: Hash) {
        if !self.vote_mgr.votes_for_round_step(round, step).iter().any(|v| v.voter() == &self.address) {
            self.cast_vote(vote_type, round, step, value);
        }
    }

    fn cast_vote(&self, vote_type: PbftVoteType, round: u64, step: u64, value: Hash) {
        let msg = VrfPbftMsg { vote_type, round, step, weighted_index: 0 };
        let sortition = match VrfPbftSortition::compute(&self.node_sk, msg) {
            Ok(s) => s,
            Err(e) => {
                warn!("failed to compute vote sortition: {}", e);
                return;
            }
        };
        let period = self.chain.size() + 1;
        let threshold = self.sortition_threshold.load(Ordering::Relaxed);
        let total = self.dpos.total_votes_count(period);
        if !sortition.can_speak(threshold, total) {
            return;
        }
        let vote = match Vote::new(&self.node_sk, sortition, value) {
            Ok(v) => v,
            Err(e) => {
                warn!("failed to sign vote: {}", e);
                return;
            }
        };
        self.vote_mgr.add_verified_vote(vote.clone());
        self.network.broadcast_vote(&vote);
    }

    // -- round/step clock ---------------------------------------------------

    fn advance_step_if_elapsed(&self) {
        let (round, step, elapsed_ms) = {
            let s = self.state.read();
            (s.round, s.step, s.round_started_at.elapsed().as_millis() as u64)
        };
        if elapsed_ms >= step_boundary_ms(step, &self.config) {
            let mut s = self.state.write();
            if s.round == round && s.step == step {
                s.step += 1;
            }
        }
    }

    fn maybe_request_sync(&self) {
        let (round, step, last_requested) = {
            let s = self.state.read();
            (s.round, s.step, s.last_sync_request_step)
        };
        if step < 4 + self.config.max_steps_without_sync * 2 {
            return;
        }
        if last_requested == Some(step) {
            return;
        }
        self.network.request_sync(SyncRequestReason::ExceededMaxSteps, round);
        self.state.write().last_sync_request_step = Some(step);
    }

    fn enter_round(&self, new_round: u64) {
        let previous_round_ended_null = self.prev_next_votes.have_enough_votes_for_null_block_hash();
        let own_starting_value = self.select_own_starting_value();
        let total_votes = self.dpos.total_votes_count(self.chain.size() + 1);
        let two_t = two_t_plus_one(self.config.committee_size, total_votes);
        self.two_t_plus_one.store(two_t, Ordering::Relaxed);
        *self.state.write() = RoundState::new(new_round, own_starting_value, previous_round_ended_null);
        info!("entering pbft round {}", new_round);
    }

    fn select_own_starting_value(&self) -> Hash {
        if self.prev_next_votes.enough_next_votes() && !self.prev_next_votes.have_enough_votes_for_null_block_hash() {
            return self.prev_next_votes.voted_value();
        }
        self.fresh_ghost_anchor()
    }

    /// Walk back `ghost_path_move_back` positions along the GHOST path
    /// from the last anchor, clamped to the last anchor itself if the
    /// DAG hasn't grown by at least `dag_blocks_size` blocks since.
    fn fresh_ghost_anchor(&self) -> Hash {
        let (_, anchor) = self.dag.get_anchors();
        let non_finalized_count: usize = self.dag.get_non_finalized_blocks().values().map(Vec::len).sum();
        if non_finalized_count < self.config.dag_blocks_size {
            return anchor;
        }
        let path = self.dag.get_ghost_path(&anchor);
        if path.len() <= self.config.ghost_path_move_back {
            return anchor;
        }
        path[path.len() - 1 - self.config.ghost_path_move_back]
    }

    /// The cert-vote guard (spec §4.G): never cert-vote, or finalize,
    /// until every block that reaches `anchor` but not the previous
    /// anchor is locally available.
    fn schedule_matches_dag(&self, anchor: &Hash) -> Result<(u64, Vec<Hash>)> {
        self.dag.get_dag_block_order(anchor).map_err(|e| match e {
            taraxa_dag::DagError::UnknownAnchor(_) => ConsensusError::EpochNotSynced,
            other => ConsensusError::Dag(other),
        })
    }

    // -- finalization --------------------------------------------------

    async fn finalize_block(&self, pbft_block: &PbftBlock, cert_votes: Vec<Vote>) -> Result<()> {
        let anchor = *pbft_block.anchor_hash();
        let (period, order) = self.schedule_matches_dag(&anchor)?;

        self.executor
            .finalize(anchor, period, &order, *pbft_block.producer(), pbft_block.timestamp(), *pbft_block.hash())
            .await
            .map_err(|e| ConsensusError::ExecutorFailed(period, e.to_string()))?;

        let new_head = PbftChainHead { head_hash: *pbft_block.hash(), size: self.chain.size() + 1, last_pbft_block_hash: *pbft_block.hash() };
        self.db.finalize_round(pbft_block.hash(), &pbft_block.to_storage_bytes(), period, &cert_votes, &order, &new_head)?;

        self.dag.set_dag_block_order(anchor, period, &order);
        self.chain.advance(*pbft_block.hash());
        self.chain.cleanup_unverified(pbft_block);

        let total_votes = self.dpos.total_votes_count(period + 1);
        let threshold = sortition_threshold(self.config.committee_size, total_votes);
        self.sortition_threshold.store(threshold, Ordering::Relaxed);
        let two_t = two_t_plus_one(self.config.committee_size, total_votes);
        self.two_t_plus_one.store(two_t, Ordering::Relaxed);
        self.vote_mgr.cleanup_votes(self.state.read().round);

        info!("finalized period {} via pbft block {}", period, hex::encode(pbft_block.hash()));
        Ok(())
    }
}

fn vrf_ticket_cmp(a: &Vote, b: &Vote) -> std::cmp::Ordering {
    let ta = Integer::from_digits(a.vrf_sortition().output.as_bytes(), Order::MsfBe);
    let tb = Integer::from_digits(b.vrf_sortition().output.as_bytes(), Order::MsfBe);
    ta.cmp(&tb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::NullExecutor;
    use tempfile::tempdir;

    fn build_manager(node_sk: [u8; 32]) -> PbftManager<AlwaysEligible> {
        let dag = Arc::new(DagManager::new([0u8; 32]));
        let dag_block_mgr = Arc::new(DagBlockManager::<AlwaysEligible>::new(0));
        let vote_mgr = Arc::new(VoteManager::new());
        let prev_next_votes = Arc::new(PreviousRoundNextVotes::new());
        let chain = Arc::new(PbftChain::new([0u8; 32]));
        let dir = tempdir().unwrap();
        let db = Arc::new(ConsensusDb::open(dir.path()).unwrap());
        let executor: Arc<dyn Executor> = Arc::new(NullExecutor);
        let dpos: Arc<dyn DposReader> = Arc::new(StaticDposReader::default());
        let network: Arc<dyn PbftNetwork> = Arc::new(NullPbftNetwork);
        PbftManager::new(dag, dag_block_mgr, vote_mgr, prev_next_votes, chain, db, executor, dpos, network, PbftConfig::default(), node_sk)
    }

    #[test]
    fn starts_at_round_one_step_one() {
        let manager = build_manager([1u8; 32]);
        assert_eq!(manager.current_round(), 1);
        assert_eq!(manager.current_step(), 1);
    }

    #[test]
    fn propose_step_broadcasts_a_propose_vote() {
        let manager = build_manager([2u8; 32]);
        manager.try_propose();
        let votes = manager.vote_mgr.votes_for_round_step(1, 1);
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].vote_type(), PbftVoteType::Propose);
        assert!(manager.state.read().proposed_block_hash.is_some());
    }

    #[test]
    fn soft_vote_follows_lowest_vrf_ticket_leader() {
        let manager = build_manager([3u8; 32]);
        let msg_a = VrfPbftMsg { vote_type: PbftVoteType::Propose, round: 1, step: 1, weighted_index: 0 };
        let sortition_a = VrfPbftSortition::compute(&[10u8; 32], msg_a).unwrap();
        let vote_a = Vote::new(&[10u8; 32], sortition_a, [11u8; 32]).unwrap();
        manager.vote_mgr.add_verified_vote(vote_a);

        manager.try_identify_and_soft_vote();
        assert!(manager.state.read().soft_voted_value.is_some());
        let soft_votes = manager.vote_mgr.votes_for_round_step(1, 2);
        assert_eq!(soft_votes.len(), 1);
        assert_eq!(soft_votes[0].vote_type(), PbftVoteType::SoftVote);
    }

    #[test]
    fn step_boundaries_are_monotonic() {
        let cfg = PbftConfig::default();
        assert!(step_boundary_ms(1, &cfg) < step_boundary_ms(2, &cfg));
        assert!(step_boundary_ms(2, &cfg) < step_boundary_ms(3, &cfg));
        assert!(step_boundary_ms(3, &cfg) < step_boundary_ms(4, &cfg));
        assert!(step_boundary_ms(4, &cfg) < step_boundary_ms(5, &cfg));
    }
}
