//! Block-DAG: the block type, the graph itself, in-memory anchor/period
//! bookkeeping, and the verifier pipeline feeding it.

pub mod block;
pub mod block_manager;
pub mod dag;
pub mod error;
pub mod manager;

pub use block::{vdf_sortition_message, DagBlock, DagFrontier, MAX_TIPS, MAX_TRXS_PER_BLOCK};
pub use block_manager::{BlockStatus, DagBlockManager, EligibilityChecker};
pub use dag::{Dag, PivotTree};
pub use error::{DagError, Result};
pub use manager::DagManager;
