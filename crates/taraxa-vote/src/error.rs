use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoteError {
    #[error("vote {0} failed vrf sortition verification")]
    InvalidVrfSortition(String),

    #[error("vote {0} failed signature verification")]
    InvalidSignature(String),

    #[error("vote {0} does not meet the sortition threshold")]
    SortitionFailed(String),

    #[error("vote {0} already present in the unverified table")]
    DuplicateUnverifiedVote(String),

    #[error("failed to decode a persisted vote: {0}")]
    Codec(String),

    #[error(transparent)]
    Crypto(#[from] taraxa_crypto::CryptoError),

    #[error(transparent)]
    Core(#[from] taraxa_core::CoreError),
}

pub type Result<T> = std::result::Result<T, VoteError>;
