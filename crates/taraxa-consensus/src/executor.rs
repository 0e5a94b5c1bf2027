//! The executor boundary (spec §6): finalization hands a batch of work
//! to whatever owns DPOS/state-trie application, and the core only
//! needs to know it completed. A real node wires a state-execution
//! implementation here; tests and tooling use `NullExecutor`.

use async_trait::async_trait;
use taraxa_core::{Address, Hash};

use crate::error::Result;

/// Everything the five-phase machine needs in order to deliver a
/// finalized period. The implementation is expected to be deterministic
/// in its inputs and to have durably applied its own state changes by
/// the time `finalize` returns Ok — a failure here is fatal to the node
/// (spec §7, ExecutorError).
#[async_trait]
pub trait Executor: Send + Sync {
    async fn finalize(
        &self,
        anchor_hash: Hash,
        period: u64,
        dag_block_order: &[Hash],
        beneficiary: Address,
        timestamp: u64,
        pbft_block_hash: Hash,
    ) -> Result<()>;
}

/// No-op executor: accepts every period without touching any state.
/// Useful for driving the PBFT machine in isolation (tests, fixtures).
pub struct NullExecutor;

#[async_trait]
impl Executor for NullExecutor {
    async fn finalize(
        &self,
        _anchor_hash: Hash,
        _period: u64,
        _dag_block_order: &[Hash],
        _beneficiary: Address,
        _timestamp: u64,
        _pbft_block_hash: Hash,
    ) -> Result<()> {
        Ok(())
    }
}
