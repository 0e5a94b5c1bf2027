//! Node configuration (ambient stack): on-disk layout mirrors the
//! teacher's `Config`/`NodeConfig`/... nested-table shape, loaded from
//! TOML, validated once at startup.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use taraxa_consensus::{LivenessConfig, PbftConfig, ProposerConfig};
use taraxa_vdf::VdfConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub node: NodeConfig,
    pub pbft: PbftSettings,
    pub proposer: ProposerSettings,
    pub liveness: LivenessSettings,
    pub storage: StorageConfig,
    pub packets: PacketPoolConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node name, used only for logging.
    pub name: String,

    /// Data directory: holds the consensus database and the node's key
    /// file if one isn't configured explicitly.
    pub data_dir: PathBuf,

    /// Whether this node participates in PBFT voting and DAG block
    /// proposal, or just follows and relays.
    pub is_validator: bool,

    /// Path to this node's secp256k1 secret key (hex-encoded, 32 bytes).
    /// Generated on first run if missing.
    #[serde(default)]
    pub validator_key_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PbftSettings {
    pub lambda_ms: u64,
    pub step4_delay_ms: u64,
    pub committee_size: u64,
    pub dag_blocks_size: usize,
    pub ghost_path_move_back: usize,
    pub max_steps_without_sync: u64,
}

impl Default for PbftSettings {
    fn default() -> Self {
        let cfg = PbftConfig::default();
        Self {
            lambda_ms: cfg.lambda_ms,
            step4_delay_ms: cfg.step4_delay_ms,
            committee_size: cfg.committee_size,
            dag_blocks_size: cfg.dag_blocks_size,
            ghost_path_move_back: cfg.ghost_path_move_back,
            max_steps_without_sync: cfg.max_steps_without_sync,
        }
    }
}

impl PbftSettings {
    pub fn to_pbft_config(&self) -> PbftConfig {
        PbftConfig {
            lambda_ms: self.lambda_ms,
            step4_delay_ms: self.step4_delay_ms,
            committee_size: self.committee_size,
            dag_blocks_size: self.dag_blocks_size,
            ghost_path_move_back: self.ghost_path_move_back,
            max_steps_without_sync: self.max_steps_without_sync,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposerSettings {
    pub total_shards: u16,
    pub weight_limit: u64,
    pub propose_spacing_ms: u64,
    pub max_vdf_retries: u32,
}

impl Default for ProposerSettings {
    fn default() -> Self {
        let cfg = ProposerConfig::default();
        Self {
            total_shards: cfg.total_shards,
            weight_limit: cfg.weight_limit,
            propose_spacing_ms: cfg.propose_spacing.as_millis() as u64,
            max_vdf_retries: cfg.max_vdf_retries,
        }
    }
}

impl ProposerSettings {
    /// `node_sk` is threaded in separately since it's loaded from the key
    /// file, not the TOML config.
    pub fn to_proposer_config(&self, node_sk: [u8; 32]) -> ProposerConfig {
        ProposerConfig {
            node_sk,
            vdf: VdfConfig::default(),
            total_shards: self.total_shards,
            weight_limit: self.weight_limit,
            propose_spacing: std::time::Duration::from_millis(self.propose_spacing_ms),
            max_vdf_retries: self.max_vdf_retries,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessSettings {
    pub block_stall_threshold: u64,
    pub max_consecutive_misses: u32,
    pub extended_stall_threshold: u64,
    pub min_healthy_peers: usize,
}

impl Default for LivenessSettings {
    fn default() -> Self {
        let cfg = LivenessConfig::default();
        Self {
            block_stall_threshold: cfg.block_stall_threshold,
            max_consecutive_misses: cfg.max_consecutive_misses,
            extended_stall_threshold: cfg.extended_stall_threshold,
            min_healthy_peers: cfg.min_healthy_peers,
        }
    }
}

impl LivenessSettings {
    pub fn to_liveness_config(&self) -> LivenessConfig {
        LivenessConfig {
            block_stall_threshold: self.block_stall_threshold,
            max_consecutive_misses: self.max_consecutive_misses,
            extended_stall_threshold: self.extended_stall_threshold,
            min_healthy_peers: self.min_healthy_peers,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// RocksDB data path, under `node.data_dir` unless absolute.
    pub db_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { db_path: PathBuf::from("db") }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacketPoolConfig {
    /// Worker count for the tiered packet thread pool (spec §4.H).
    pub worker_count: usize,
}

impl Default for PacketPoolConfig {
    fn default() -> Self {
        Self { worker_count: 4 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), json_format: false }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "taraxa-node".to_string(),
            data_dir: PathBuf::from("./data"),
            is_validator: true,
            validator_key_path: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node: NodeConfig::default(),
            pbft: PbftSettings::default(),
            proposer: ProposerSettings::default(),
            liveness: LivenessSettings::default(),
            storage: StorageConfig::default(),
            packets: PacketPoolConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Full storage path, `data_dir` joined with `storage.db_path` unless
    /// the latter is already absolute.
    pub fn resolved_db_path(&self) -> PathBuf {
        if self.storage.db_path.is_absolute() {
            self.storage.db_path.clone()
        } else {
            self.node.data_dir.join(&self.storage.db_path)
        }
    }

    /// Full key-file path, `data_dir/node.key` unless overridden.
    pub fn resolved_key_path(&self) -> PathBuf {
        self.node.validator_key_path.clone().unwrap_or_else(|| self.node.data_dir.join("node.key"))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.pbft.committee_size == 0 {
            anyhow::bail!("pbft.committee_size must be greater than 0");
        }
        if self.pbft.lambda_ms == 0 {
            anyhow::bail!("pbft.lambda_ms must be greater than 0");
        }
        if self.proposer.total_shards == 0 {
            anyhow::bail!("proposer.total_shards must be greater than 0");
        }
        if self.packets.worker_count == 0 {
            anyhow::bail!("packets.worker_count must be greater than 0");
        }
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            anyhow::bail!("invalid log level: {}", self.logging.level);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn round_trips_through_toml() {
        let config = Config::default();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        config.to_file(path.to_str().unwrap()).unwrap();
        let loaded = Config::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(loaded.node.name, config.node.name);
        assert_eq!(loaded.pbft.committee_size, config.pbft.committee_size);
    }

    #[test]
    fn rejects_zero_committee_size() {
        let mut config = Config::default();
        config.pbft.committee_size = 0;
        assert!(config.validate().is_err());
    }
}
