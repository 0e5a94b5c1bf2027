//! PBFT consensus core: the five-phase round state machine, the block
//! proposer feeding it, and the liveness monitor watching both.

pub mod error;
pub mod executor;
pub mod liveness;
pub mod pbft;
pub mod pbft_chain;
pub mod proposer;

pub use error::{ConsensusError, Result};
pub use executor::{Executor, NullExecutor};
pub use liveness::{LivenessAction, LivenessConfig, LivenessMonitor, LivenessStats};
pub use pbft::{DposReader, NullPbftNetwork, PbftConfig, PbftManager, PbftNetwork, StaticDposReader, SyncRequestReason};
pub use pbft_chain::{PbftBlock, PbftBlockCert, PbftChain, NULL_BLOCK_HASH};
pub use proposer::{BlockProposer, NoTransactions, ProposerConfig, TransactionSource};
