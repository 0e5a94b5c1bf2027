//! Unverified/verified vote tables and 2t+1 tallying per round/step.

use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap, HashSet};
use taraxa_core::{Address, Hash};

use crate::error::{Result, VoteError};
use crate::vote::Vote;

/// Result of tallying votes for a (round, step): either an exact 2t+1
/// bundle on some value, or not-yet-enough.
#[derive(Debug, Clone)]
pub struct VotesBundle {
    pub enough: bool,
    pub voted_block_hash: Hash,
    pub votes: Vec<Vote>,
}

impl Default for VotesBundle {
    fn default() -> Self {
        Self { enough: false, voted_block_hash: [0u8; 32], votes: Vec::new() }
    }
}

pub struct VoteManager {
    unverified: RwLock<BTreeMap<u64, HashMap<Hash, Vote>>>,
    // round -> step -> voted value -> vote hashes
    verified_index: RwLock<BTreeMap<u64, BTreeMap<u64, HashMap<Hash, HashSet<Hash>>>>>,
    verified_votes: RwLock<HashMap<Hash, Vote>>,
}

impl Default for VoteManager {
    fn default() -> Self {
        Self::new()
    }
}

impl VoteManager {
    pub fn new() -> Self {
        Self {
            unverified: RwLock::new(BTreeMap::new()),
            verified_index: RwLock::new(BTreeMap::new()),
            verified_votes: RwLock::new(HashMap::new()),
        }
    }

    pub fn add_unverified_vote(&self, vote: Vote) -> bool {
        let mut u = self.unverified.write();
        let round_table = u.entry(vote.round()).or_default();
        if round_table.contains_key(vote.hash()) {
            return false;
        }
        round_table.insert(*vote.hash(), vote);
        true
    }

    pub fn add_unverified_votes(&self, votes: Vec<Vote>) {
        for v in votes {
            self.add_unverified_vote(v);
        }
    }

    pub fn remove_unverified_vote(&self, round: u64, vote_hash: &Hash) {
        if let Some(table) = self.unverified.write().get_mut(&round) {
            table.remove(vote_hash);
        }
    }

    pub fn vote_in_unverified_map(&self, round: u64, vote_hash: &Hash) -> bool {
        self.unverified.read().get(&round).map(|t| t.contains_key(vote_hash)).unwrap_or(false)
    }

    pub fn unverified_votes(&self) -> Vec<Vote> {
        self.unverified.read().values().flat_map(|t| t.values().cloned()).collect()
    }

    pub fn clear_unverified_votes_table(&self) {
        self.unverified.write().clear();
    }

    pub fn unverified_votes_size(&self) -> u64 {
        self.unverified.read().values().map(|t| t.len() as u64).sum()
    }

    pub fn add_verified_vote(&self, vote: Vote) {
        let mut index = self.verified_index.write();
        index
            .entry(vote.round())
            .or_default()
            .entry(vote.step())
            .or_default()
            .entry(*vote.block_hash())
            .or_default()
            .insert(*vote.hash());
        self.verified_votes.write().insert(*vote.hash(), vote);
    }

    pub fn vote_in_verified_map(&self, vote: &Vote) -> bool {
        self.verified_votes.read().contains_key(vote.hash())
    }

    pub fn clear_verified_votes_table(&self) {
        self.verified_index.write().clear();
        self.verified_votes.write().clear();
    }

    pub fn verified_votes_size(&self) -> u64 {
        self.verified_votes.read().len() as u64
    }

    /// Drain the unverified table and check signature, VRF proof and
    /// sortition threshold for each vote, promoting passes into the
    /// verified tables.
    pub fn verify_votes(
        &self,
        round: u64,
        sortition_threshold: u64,
        dpos_total_votes_count: u64,
        eligible_vote_count: impl Fn(&Address) -> u64,
    ) {
        let drained: Vec<Vote> = {
            let mut u = self.unverified.write();
            u.remove(&round).map(|t| t.into_values().collect()).unwrap_or_default()
        };

        for vote in drained {
            if self.validate_one(&vote, sortition_threshold, dpos_total_votes_count, &eligible_vote_count).is_ok() {
                self.add_verified_vote(vote);
            }
        }
    }

    fn validate_one(
        &self,
        vote: &Vote,
        sortition_threshold: u64,
        dpos_total_votes_count: u64,
        eligible_vote_count: &impl Fn(&Address) -> u64,
    ) -> Result<()> {
        vote.verify_vote()?;
        vote.verify_vrf_sortition()?;
        let weight = eligible_vote_count(vote.voter());
        if weight == 0 {
            return Err(VoteError::SortitionFailed(hex::encode(vote.hash())));
        }
        if !vote.verify_can_speak(sortition_threshold, dpos_total_votes_count) {
            return Err(VoteError::SortitionFailed(hex::encode(vote.hash())));
        }
        Ok(())
    }

    /// Drop all state for rounds strictly below `round`.
    pub fn cleanup_votes(&self, round: u64) {
        self.unverified.write().retain(|r, _| *r >= round);
        let mut index = self.verified_index.write();
        let stale_hashes: Vec<Hash> = index
            .iter()
            .filter(|(r, _)| **r < round)
            .flat_map(|(_, steps)| steps.values().flat_map(|vals| vals.values().flat_map(|hs| hs.iter().copied())))
            .collect();
        index.retain(|r, _| *r >= round);
        let mut votes = self.verified_votes.write();
        for h in stale_hashes {
            votes.remove(&h);
        }
    }

    /// Tally votes at (round, step): if any voted value has reached
    /// `two_t_plus_one` votes, return that bundle.
    pub fn votes_bundle_for_round_step(&self, round: u64, step: u64, two_t_plus_one: usize) -> VotesBundle {
        let index = self.verified_index.read();
        let votes = self.verified_votes.read();
        let Some(steps) = index.get(&round) else { return VotesBundle::default() };
        let Some(values) = steps.get(&step) else { return VotesBundle::default() };

        for (value, hashes) in values {
            if hashes.len() >= two_t_plus_one {
                let bundle_votes = hashes.iter().filter_map(|h| votes.get(h).cloned()).collect();
                return VotesBundle { enough: true, voted_block_hash: *value, votes: bundle_votes };
            }
        }
        VotesBundle::default()
    }

    /// All verified votes cast for a given (round, step), regardless of
    /// whether any value has reached quorum yet. Used by the Filter step
    /// to scan every propose-vote's VRF credential for the round leader.
    pub fn votes_for_round_step(&self, round: u64, step: u64) -> Vec<Vote> {
        let index = self.verified_index.read();
        let votes = self.verified_votes.read();
        let Some(steps) = index.get(&round) else { return Vec::new() };
        let Some(values) = steps.get(&step) else { return Vec::new() };
        values.values().flat_map(|hs| hs.iter()).filter_map(|h| votes.get(h).cloned()).collect()
    }

    /// The highest round for which some step has reached 2t+1 next-votes,
    /// i.e. the round the network has moved past.
    pub fn round_determined_from_votes(&self, two_t_plus_one: usize) -> Option<u64> {
        let index = self.verified_index.read();
        for (round, steps) in index.iter().rev() {
            for values in steps.values() {
                if values.values().any(|hs| hs.len() >= two_t_plus_one) {
                    return Some(*round);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vote::{PbftVoteType, VrfPbftMsg, VrfPbftSortition};

    fn make_vote(sk: [u8; 32], round: u64, step: u64, blockhash: Hash) -> Vote {
        let msg = VrfPbftMsg { vote_type: PbftVoteType::CertVote, round, step, weighted_index: 0 };
        let sortition = VrfPbftSortition::compute(&sk, msg).unwrap();
        Vote::new(&sk, sortition, blockhash).unwrap()
    }

    #[test]
    fn unverified_votes_promote_on_verify() {
        let manager = VoteManager::new();
        let vote = make_vote([3u8; 32], 1, 3, [9u8; 32]);
        manager.add_unverified_vote(vote.clone());
        assert_eq!(manager.unverified_votes_size(), 1);
        manager.verify_votes(1, u64::MAX, 10, |_| 1);
        assert_eq!(manager.verified_votes_size(), 1);
        assert!(manager.vote_in_verified_map(&vote));
    }

    #[test]
    fn votes_bundle_reaches_threshold() {
        let manager = VoteManager::new();
        let v1 = make_vote([1u8; 32], 2, 5, [4u8; 32]);
        let v2 = make_vote([2u8; 32], 2, 5, [4u8; 32]);
        manager.add_verified_vote(v1);
        manager.add_verified_vote(v2);
        let bundle = manager.votes_bundle_for_round_step(2, 5, 2);
        assert!(bundle.enough);
        assert_eq!(bundle.voted_block_hash, [4u8; 32]);
        assert_eq!(bundle.votes.len(), 2);
    }

    #[test]
    fn cleanup_drops_stale_rounds() {
        let manager = VoteManager::new();
        let v1 = make_vote([1u8; 32], 1, 1, [1u8; 32]);
        manager.add_verified_vote(v1);
        manager.cleanup_votes(2);
        assert_eq!(manager.verified_votes_size(), 0);
    }
}
