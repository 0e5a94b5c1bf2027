use taraxa_core::Hash;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("network error: {0}")]
    General(String),

    #[error("peer connection error")]
    PeerConnectionError,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("block not found: {0:?}")]
    BlockNotFound(Hash),

    #[error("no peers available")]
    NoPeersAvailable,

    #[error("already syncing")]
    AlreadySyncing,

    #[error("invalid chain: {0}")]
    InvalidChain(String),

    #[error("sync error: {0}")]
    Sync(String),

    #[error("timeout")]
    Timeout,

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("packet pool is stopping")]
    PoolStopped,
}

pub type Result<T> = std::result::Result<T, NetworkError>;
