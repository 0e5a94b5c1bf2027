use thiserror::Error;

#[derive(Error, Debug)]
pub enum DagError {
    #[error("dag block {0} already present")]
    DuplicateBlock(String),

    #[error("dag block {0} has unknown pivot {1}")]
    UnknownPivot(String, String),

    #[error("dag block {0} has unknown tip {1}")]
    UnknownTip(String, String),

    #[error("dag block {0} exceeds max tips ({1} > {2})")]
    TooManyTips(String, usize, usize),

    #[error("dag block {0} exceeds max transactions ({1} > {2})")]
    TooManyTransactions(String, usize, usize),

    #[error("dag block {0} level {1} is not greater than pivot level {2}")]
    LevelNotMonotonic(String, u64, u64),

    #[error("dag block {0} failed signature verification")]
    InvalidSignature(String),

    #[error("dag block {0} failed vdf verification: {1}")]
    InvalidVdf(String, String),

    #[error("anchor {0} not found in non-finalized blocks")]
    UnknownAnchor(String),

    #[error("failed to decode a persisted dag block: {0}")]
    Codec(String),

    #[error(transparent)]
    Vdf(#[from] taraxa_vdf::VdfError),

    #[error(transparent)]
    Crypto(#[from] taraxa_crypto::CryptoError),

    #[error(transparent)]
    Core(#[from] taraxa_core::CoreError),
}

pub type Result<T> = std::result::Result<T, DagError>;
