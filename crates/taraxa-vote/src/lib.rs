//! VRF-weighted PBFT vote subsystem: vote construction/verification,
//! sortition threshold arithmetic, 2t+1 tallying and previous-round
//! next-votes carry-over.

pub mod error;
pub mod manager;
pub mod next_votes;
pub mod sortition_threshold;
pub mod vote;

pub use error::{Result, VoteError};
pub use manager::{VoteManager, VotesBundle};
pub use next_votes::{PreviousRoundNextVotes, NULL_BLOCK_HASH};
pub use sortition_threshold::{can_speak, sortition_threshold, two_t_plus_one};
pub use vote::{PbftVoteType, Vote, VrfPbftMsg, VrfPbftSortition};
