use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use rand::RngCore;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use taraxa_consensus::{
    BlockProposer, LivenessMonitor, NoTransactions, NullPbftNetwork, PbftChain, PbftManager, ProposerConfig,
    StaticDposReader,
};
use taraxa_core::Hash;
use taraxa_crypto::KeyPair;
use taraxa_dag::block_manager::AlwaysEligible;
use taraxa_dag::{DagBlockManager, DagManager};
use taraxa_network::PacketThreadPool;
use taraxa_storage::ConsensusDb;
use taraxa_vote::{PreviousRoundNextVotes, VoteManager};

use crate::config::Config;
use crate::executor::NodeExecutor;

/// Genesis DAG/PBFT anchor. A real network would derive this from the
/// network's genesis config; here it's simply the zero hash.
const GENESIS_HASH: Hash = [0u8; 32];

/// Orchestrates the consensus core: DAG, votes, PBFT, proposer, liveness,
/// and the packet thread pool, wired around a shared `ConsensusDb`.
pub struct NodeService {
    config: Config,
    db: Arc<ConsensusDb>,
    chain: Arc<PbftChain>,
    liveness: Arc<LivenessMonitor>,
    packet_pool: Arc<PacketThreadPool>,
    pbft: Option<Arc<PbftManager<AlwaysEligible>>>,
    proposer: Option<Arc<BlockProposer<AlwaysEligible>>>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl NodeService {
    pub async fn new(config: Config) -> Result<Self> {
        info!("initializing node: {}", config.node.name);
        config.validate()?;

        std::fs::create_dir_all(&config.node.data_dir).context("creating data dir")?;
        let db_path = config.resolved_db_path();
        info!("opening consensus database at {:?}", db_path);
        let db = Arc::new(ConsensusDb::open(&db_path).context("opening consensus db")?);

        let node_sk = load_or_generate_key(&config.resolved_key_path())?;
        let address = KeyPair::from_secret(&node_sk)?.address();
        info!("node address: {}", address);

        let dag = Arc::new(DagManager::new(GENESIS_HASH));
        let dag_block_mgr = Arc::new(DagBlockManager::<AlwaysEligible>::new(config.pbft.dag_blocks_size * 4));
        let vote_mgr = Arc::new(VoteManager::new());
        let prev_next_votes = Arc::new(PreviousRoundNextVotes::new());
        let chain = Arc::new(PbftChain::new(GENESIS_HASH));
        let liveness = Arc::new(LivenessMonitor::new(config.liveness.to_liveness_config()));
        let packet_pool = Arc::new(PacketThreadPool::new(config.packets.worker_count));

        let (pbft, proposer) = if config.node.is_validator {
            let executor: Arc<dyn taraxa_consensus::Executor> = Arc::new(NodeExecutor::new());
            let dpos: Arc<dyn taraxa_consensus::DposReader> = Arc::new(StaticDposReader::default());
            let network: Arc<dyn taraxa_consensus::PbftNetwork> = Arc::new(NullPbftNetwork);

            let pbft = Arc::new(PbftManager::<AlwaysEligible>::new(
                dag.clone(),
                dag_block_mgr.clone(),
                vote_mgr.clone(),
                prev_next_votes.clone(),
                chain.clone(),
                db.clone(),
                executor,
                dpos,
                network,
                config.pbft.to_pbft_config(),
                node_sk,
            ));

            let proposer_config: ProposerConfig = config.proposer.to_proposer_config(node_sk);
            let proposer = Arc::new(BlockProposer::<AlwaysEligible>::new(
                dag.clone(),
                dag_block_mgr.clone(),
                Arc::new(AlwaysEligible),
                Arc::new(NoTransactions),
                proposer_config,
            ));

            (Some(pbft), Some(proposer))
        } else {
            (None, None)
        };

        let (shutdown_tx, _) = broadcast::channel(16);

        Ok(Self {
            config,
            db,
            chain,
            liveness,
            packet_pool,
            pbft,
            proposer,
            shutdown_tx,
            tasks: Vec::new(),
        })
    }

    /// Start the consensus core's background loops. A non-validator node
    /// currently just idles with its packet pool open for a future
    /// transport layer; full sync/follower support is out of scope.
    pub async fn start(&mut self) -> Result<()> {
        info!("starting node services");

        if let Some(pbft) = &self.pbft {
            let pbft = pbft.clone();
            self.tasks.push(tokio::spawn(async move {
                pbft.start().await;
            }));
            info!("pbft manager started");
        }

        if let Some(proposer) = &self.proposer {
            let proposer = proposer.clone();
            self.tasks.push(tokio::spawn(async move {
                proposer.start(|| true).await;
            }));
            info!("block proposer started");
        }

        let liveness = self.liveness.clone();
        let chain = self.chain.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        self.tasks.push(tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(5));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let height = chain.size();
                        liveness.record_block(height);
                        match liveness.check_liveness(height) {
                            taraxa_consensus::LivenessAction::Healthy => {}
                            action => warn!("liveness check: {:?}", action),
                        }
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        }));

        info!("all services started");
        self.print_status();
        Ok(())
    }

    pub async fn wait_for_shutdown(&mut self) -> Result<()> {
        info!("node running, press ctrl+c to shut down");
        tokio::signal::ctrl_c().await?;
        info!("received shutdown signal");
        self.shutdown().await
    }

    async fn shutdown(&mut self) -> Result<()> {
        info!("shutting down node services");
        if let Some(pbft) = &self.pbft {
            pbft.stop();
        }
        if let Some(proposer) = &self.proposer {
            proposer.stop();
        }
        self.packet_pool.stop();
        let _ = self.shutdown_tx.send(());

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                error!("task panicked during shutdown: {}", e);
            }
        }

        info!("shutdown complete");
        Ok(())
    }

    fn print_status(&self) {
        info!("----------------------------------------");
        info!("  node status");
        info!("----------------------------------------");
        info!("  name:           {}", self.config.node.name);
        info!("  validator:      {}", self.config.node.is_validator);
        info!("  pbft round:     {}", self.pbft.as_ref().map(|p| p.current_round()).unwrap_or(0));
        info!("  chain size:     {}", self.chain.size());
        info!("  packet workers: {}", self.config.packets.worker_count);
        info!("----------------------------------------");
    }

    pub async fn get_stats(&self) -> Result<NodeStats> {
        Ok(NodeStats {
            chain_size: self.chain.size(),
            is_validator: self.config.node.is_validator,
            pbft_round: self.pbft.as_ref().map(|p| p.current_round()).unwrap_or(0),
        })
    }
}

/// Load the node's secp256k1 secret key from `path`, generating and
/// persisting a fresh one if it doesn't exist yet.
fn load_or_generate_key(path: &Path) -> Result<[u8; 32]> {
    if path.exists() {
        let contents = std::fs::read_to_string(path).context("reading key file")?;
        let bytes = hex::decode(contents.trim()).context("decoding key file")?;
        let mut sk = [0u8; 32];
        if bytes.len() != 32 {
            anyhow::bail!("key file {:?} does not contain a 32-byte key", path);
        }
        sk.copy_from_slice(&bytes);
        KeyPair::from_secret(&sk).context("validating loaded key")?;
        return Ok(sk);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("creating key dir")?;
    }
    let mut sk = [0u8; 32];
    loop {
        rand::rngs::OsRng.fill_bytes(&mut sk);
        if KeyPair::from_secret(&sk).is_ok() {
            break;
        }
    }
    std::fs::write(path, hex::encode(sk)).context("writing key file")?;
    info!("generated new node key at {:?}", path);
    Ok(sk)
}

#[derive(Debug, Clone)]
pub struct NodeStats {
    pub chain_size: u64,
    pub is_validator: bool,
    pub pbft_round: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn creates_db_and_key_on_first_run() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.node.data_dir = temp_dir.path().to_path_buf();
        config.node.is_validator = false;

        let service = NodeService::new(config).await.unwrap();
        assert!(service.config.resolved_key_path().exists());
        let stats = service.get_stats().await.unwrap();
        assert_eq!(stats.chain_size, 0);
        assert!(!stats.is_validator);
    }

    #[tokio::test]
    async fn reuses_key_on_second_run() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.node.data_dir = temp_dir.path().to_path_buf();
        config.node.is_validator = false;
        config.storage.db_path = std::path::PathBuf::from("db1");

        let _first = NodeService::new(config.clone()).await.unwrap();
        let key_bytes_first = std::fs::read_to_string(config.resolved_key_path()).unwrap();

        config.storage.db_path = std::path::PathBuf::from("db2");
        let _second = NodeService::new(config.clone()).await.unwrap();
        let key_bytes_second = std::fs::read_to_string(config.resolved_key_path()).unwrap();

        assert_eq!(key_bytes_first, key_bytes_second);
    }
}
