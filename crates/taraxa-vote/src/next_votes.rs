//! Tracks the previous round's next-votes bundle: the set of next-votes
//! that reached 2t+1 on some value (or on the null block hash), carried
//! forward so the next round can preserve asynchronous safety.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use taraxa_core::Hash;

use crate::vote::Vote;

pub const NULL_BLOCK_HASH: Hash = [0u8; 32];

#[derive(Default)]
struct State {
    enough_for_null: bool,
    voted_value: Hash,
    votes_by_value: HashMap<Hash, Vec<Vote>>,
    vote_hashes: HashSet<Hash>,
}

pub struct PreviousRoundNextVotes {
    state: RwLock<State>,
}

impl Default for PreviousRoundNextVotes {
    fn default() -> Self {
        Self::new()
    }
}

impl PreviousRoundNextVotes {
    pub fn new() -> Self {
        Self { state: RwLock::new(State::default()) }
    }

    pub fn clear(&self) {
        let mut s = self.state.write();
        *s = State::default();
    }

    pub fn find(&self, vote_hash: &Hash) -> bool {
        self.state.read().vote_hashes.contains(vote_hash)
    }

    pub fn enough_next_votes(&self) -> bool {
        let s = self.state.read();
        s.enough_for_null || !s.votes_by_value.is_empty()
    }

    pub fn have_enough_votes_for_null_block_hash(&self) -> bool {
        self.state.read().enough_for_null
    }

    pub fn voted_value(&self) -> Hash {
        self.state.read().voted_value
    }

    pub fn next_votes(&self) -> Vec<Vote> {
        self.state.read().votes_by_value.values().flatten().cloned().collect()
    }

    pub fn size(&self) -> usize {
        self.state.read().vote_hashes.len()
    }

    /// Record `votes` as the bundle for this round, replacing any prior
    /// bundle. Only called once a caller has confirmed `votes.len() >=
    /// pbft_2t_plus_1` for a single voted value.
    pub fn add_next_votes(&self, votes: &[Vote], pbft_2t_plus_1: usize) {
        if votes.len() < pbft_2t_plus_1 || votes.is_empty() {
            return;
        }
        let value = *votes[0].block_hash();
        let mut s = self.state.write();
        for v in votes {
            s.vote_hashes.insert(*v.hash());
        }
        if value == NULL_BLOCK_HASH {
            s.enough_for_null = true;
        } else {
            s.voted_value = value;
        }
        s.votes_by_value.insert(value, votes.to_vec());
    }

    pub fn update_next_votes(&self, votes: &[Vote], pbft_2t_plus_1: usize) {
        self.clear();
        self.add_next_votes(votes, pbft_2t_plus_1);
    }

    pub fn update_with_synced_votes(&self, votes: &[Vote], pbft_2t_plus_1: usize) {
        self.update_next_votes(votes, pbft_2t_plus_1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vote::{PbftVoteType, VrfPbftMsg, VrfPbftSortition};

    fn make_vote(sk: [u8; 32], round: u64, blockhash: Hash) -> Vote {
        let msg = VrfPbftMsg { vote_type: PbftVoteType::NextVote, round, step: 4, weighted_index: 0 };
        let sortition = VrfPbftSortition::compute(&sk, msg).unwrap();
        Vote::new(&sk, sortition, blockhash).unwrap()
    }

    #[test]
    fn bundle_below_threshold_is_ignored() {
        let next_votes = PreviousRoundNextVotes::new();
        let votes = vec![make_vote([1u8; 32], 1, [7u8; 32])];
        next_votes.add_next_votes(&votes, 2);
        assert!(!next_votes.enough_next_votes());
    }

    #[test]
    fn bundle_at_threshold_is_recorded() {
        let next_votes = PreviousRoundNextVotes::new();
        let votes = vec![make_vote([1u8; 32], 1, [7u8; 32]), make_vote([2u8; 32], 1, [7u8; 32])];
        next_votes.add_next_votes(&votes, 2);
        assert!(next_votes.enough_next_votes());
        assert_eq!(next_votes.voted_value(), [7u8; 32]);
        assert_eq!(next_votes.size(), 2);
    }

    #[test]
    fn null_block_hash_bundle_sets_flag() {
        let next_votes = PreviousRoundNextVotes::new();
        let votes = vec![make_vote([1u8; 32], 1, NULL_BLOCK_HASH), make_vote([2u8; 32], 1, NULL_BLOCK_HASH)];
        next_votes.add_next_votes(&votes, 2);
        assert!(next_votes.have_enough_votes_for_null_block_hash());
    }
}
