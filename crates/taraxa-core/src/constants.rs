//! Chain-wide consensus parameters.
//!
//! Defaults mirror the upstream Taraxa mainnet configuration; a running
//! node may override all of these via `NodeConfig`.

/// PBFT round clock unit, in milliseconds. Phase boundaries are multiples of this.
pub const DEFAULT_LAMBDA_MS: u64 = 2000;

/// Upper bound on the VDF lambda parameter (protocol-wide, not node-configurable).
pub const VDF_LAMBDA_BOUND: u16 = 1500;

/// DAG and PBFT sizing bounds.
pub mod dag {
    /// Maximum tip hashes a single DAG block may reference.
    pub const MAX_TIPS: usize = 16;
    /// Maximum transaction hashes a single DAG block may carry.
    pub const MAX_TRXS_PER_BLOCK: usize = 20_000;
    /// How many GHOST-path positions to walk back before picking an anchor,
    /// to avoid racing with peers proposing at the same level.
    pub const GHOST_PATH_MOVE_BACK: usize = 5;
    /// Minimum DAG growth (in blocks) required before advancing the anchor.
    pub const DAG_BLOCKS_SIZE: usize = 5;
}

/// PBFT state machine parameters.
pub mod pbft {
    /// Default committee size used for sortition threshold computation.
    pub const DEFAULT_COMMITTEE_SIZE: u64 = 3;
    /// Extra wall-clock delay (ms) added before the Certify step boundary.
    pub const STEP4_DELAY_MS: u64 = 500;
    /// Steps without progress before a sync request is triggered.
    pub const MAX_STEPS_WITHOUT_SYNC: u64 = 20;
}

/// Block proposer parameters.
pub mod proposer {
    /// Minimum spacing between proposal attempts.
    pub const MIN_PROPOSE_SPACING_MS: u64 = 100;
    /// Maximum retries on a stale VDF for the same DAG level before skipping.
    pub const MAX_VDF_RETRIES: u32 = 20;
    /// Number of transaction shards.
    pub const DEFAULT_TOTAL_SHARDS: u16 = 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        assert!(DEFAULT_LAMBDA_MS > 0);
        assert!(dag::GHOST_PATH_MOVE_BACK < dag::DAG_BLOCKS_SIZE * 10);
    }
}
