use taraxa_core::Hash;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error("pbft block {0} not found")]
    BlockNotFound(Hash),

    #[error("pbft block {0} already in chain")]
    DuplicateBlock(Hash),

    #[error("pbft block {0} has unknown previous block {1}")]
    OrphanBlock(Hash, Hash),

    #[error("pbft block {0} failed validation: {1}")]
    InvalidBlock(Hash, String),

    #[error("cert-vote set for {0} does not reach 2t+1")]
    InsufficientCertVotes(Hash),

    #[error("anchor's epoch vertices are not fully synced, deferring cert-vote")]
    EpochNotSynced,

    #[error("executor failed to finalize period {0}: {1}")]
    ExecutorFailed(u64, String),

    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),

    #[error(transparent)]
    Dag(#[from] taraxa_dag::DagError),

    #[error(transparent)]
    Vote(#[from] taraxa_vote::VoteError),

    #[error(transparent)]
    Vdf(#[from] taraxa_vdf::VdfError),

    #[error(transparent)]
    Crypto(#[from] taraxa_crypto::CryptoError),

    #[error(transparent)]
    Storage(#[from] taraxa_storage::StorageError),

    #[error(transparent)]
    Core(#[from] taraxa_core::CoreError),
}

pub type Result<T> = std::result::Result<T, ConsensusError>;
