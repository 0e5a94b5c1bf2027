//! Production `Executor` (the boundary `taraxa_consensus::PbftManager`
//! finalizes periods against). Applying the finalized DAG block order to
//! an account/state trie is outside this repository's scope (spec's
//! staking/state-trie Non-goals); this implementation records each
//! finalized period and forwards it to an optional injected hook so a
//! state-transition layer can be wired in without touching the consensus
//! core.

use async_trait::async_trait;
use tracing::info;

use taraxa_consensus::{Executor, Result};
use taraxa_core::{Address, Hash};

type FinalizeHook = Box<dyn Fn(u64, &[Hash]) + Send + Sync>;

pub struct NodeExecutor {
    on_finalize: Option<FinalizeHook>,
}

impl NodeExecutor {
    pub fn new() -> Self {
        Self { on_finalize: None }
    }

    pub fn with_hook(hook: impl Fn(u64, &[Hash]) + Send + Sync + 'static) -> Self {
        Self { on_finalize: Some(Box::new(hook)) }
    }
}

impl Default for NodeExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Executor for NodeExecutor {
    async fn finalize(
        &self,
        anchor_hash: Hash,
        period: u64,
        dag_block_order: &[Hash],
        beneficiary: Address,
        timestamp: u64,
        pbft_block_hash: Hash,
    ) -> Result<()> {
        info!(
            period,
            blocks = dag_block_order.len(),
            anchor = %hex::encode(anchor_hash),
            beneficiary = %hex::encode(beneficiary.as_bytes()),
            timestamp,
            pbft_block = %hex::encode(pbft_block_hash),
            "finalized period"
        );
        if let Some(hook) = &self.on_finalize {
            hook(period, dag_block_order);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[tokio::test]
    async fn hook_fires_with_the_finalized_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let executor = NodeExecutor::with_hook(move |period, order| {
            seen_clone.lock().push((period, order.to_vec()));
        });
        executor.finalize([1u8; 32], 7, &[[2u8; 32], [3u8; 32]], Address::zero(), 1_700_000_000, [4u8; 32]).await.unwrap();
        let recorded = seen.lock();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].0, 7);
        assert_eq!(recorded[0].1.len(), 2);
    }
}
