//! Persistence for the consensus core: a single RocksDB-backed
//! `ConsensusDb` with the columns the DAG, vote and PBFT layers need
//! across restarts.

pub mod db;
pub mod error;

pub use db::{ConsensusDb, PbftChainHead};
pub use error::{Result, StorageError};
