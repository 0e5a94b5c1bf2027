//! RocksDB-backed persistence for the consensus core: DAG blocks, PBFT
//! blocks and chain head, votes, and the round-indexed caches the PBFT
//! state machine needs across restarts.
//!
//! Finalization (§4.G) is the only multi-column write in this crate and
//! must be atomic: cert-votes, the period map, the PBFT block, the DAG
//! block -> period map and the chain head all land in a single
//! `WriteBatch`, or none of them do.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{ColumnFamilyDescriptor, Options, WriteBatch, DB};
use serde::{Deserialize, Serialize};

use taraxa_core::Hash;
use taraxa_dag::DagBlock;
use taraxa_vote::Vote;

use crate::error::{Result, StorageError};

const CF_DAG_BLOCKS: &str = "dag_blocks";
const CF_DAG_BLOCK_STATE: &str = "dag_block_state";
const CF_PBFT_BLOCKS: &str = "pbft_blocks";
const CF_PBFT_HEAD: &str = "pbft_head";
const CF_PERIOD_TO_PBFT_HASH: &str = "period_to_pbft_block_hash";
const CF_DAG_BLOCK_TO_PERIOD: &str = "dag_block_to_period";
const CF_CERT_VOTES: &str = "cert_votes";
const CF_SOFT_VOTES_FOR_ROUND: &str = "soft_votes_for_round";
const CF_NEXT_VOTES_FOR_ROUND: &str = "next_votes_for_round";
const CF_TWO_T_PLUS_ONE_FOR_ROUND: &str = "pbft_2t_plus_1_for_round";
const CF_PROPOSAL_PERIOD_DAG_LEVELS: &str = "proposal_period_dag_levels_map";
const CF_STATUS_FIELDS: &str = "status_fields";

const ALL_COLUMN_FAMILIES: &[&str] = &[
    CF_DAG_BLOCKS,
    CF_DAG_BLOCK_STATE,
    CF_PBFT_BLOCKS,
    CF_PBFT_HEAD,
    CF_PERIOD_TO_PBFT_HASH,
    CF_DAG_BLOCK_TO_PERIOD,
    CF_CERT_VOTES,
    CF_SOFT_VOTES_FOR_ROUND,
    CF_NEXT_VOTES_FOR_ROUND,
    CF_TWO_T_PLUS_ONE_FOR_ROUND,
    CF_PROPOSAL_PERIOD_DAG_LEVELS,
    CF_STATUS_FIELDS,
];

const HEAD_KEY: &[u8] = b"head";

/// PBFT chain head: last block hash, executed chain size, and the last
/// block hash seen (possibly not yet executed).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PbftChainHead {
    pub head_hash: Hash,
    pub size: u64,
    pub last_pbft_block_hash: Hash,
}

pub struct ConsensusDb {
    db: Arc<DB>,
}

impl ConsensusDb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let cfs: Vec<ColumnFamilyDescriptor> =
            ALL_COLUMN_FAMILIES.iter().map(|name| ColumnFamilyDescriptor::new(*name, Options::default())).collect();

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;
        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| StorageError::MissingColumnFamily(name.to_string()))
    }

    // -- dag blocks -----------------------------------------------------

    pub fn put_dag_block(&self, block: &DagBlock, finalized: bool) -> Result<()> {
        let mut batch = WriteBatch::default();
        batch.put_cf(self.cf(CF_DAG_BLOCKS)?, block.hash(), block.to_storage_bytes());
        batch.put_cf(self.cf(CF_DAG_BLOCK_STATE)?, block.hash(), [finalized as u8]);
        self.db.write(batch)?;
        Ok(())
    }

    pub fn get_dag_block(&self, hash: &Hash) -> Result<Option<DagBlock>> {
        match self.db.get_cf(self.cf(CF_DAG_BLOCKS)?, hash)? {
            Some(bytes) => Ok(Some(DagBlock::from_storage_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn is_dag_block_finalized(&self, hash: &Hash) -> Result<bool> {
        match self.db.get_cf(self.cf(CF_DAG_BLOCK_STATE)?, hash)? {
            Some(bytes) => Ok(bytes.first().copied().unwrap_or(0) == 1),
            None => Ok(false),
        }
    }

    pub fn get_period_for_dag_block(&self, hash: &Hash) -> Result<Option<u64>> {
        match self.db.get_cf(self.cf(CF_DAG_BLOCK_TO_PERIOD)?, hash)? {
            Some(bytes) => Ok(Some(decode_u64(&bytes)?)),
            None => Ok(None),
        }
    }

    // -- pbft blocks / head ----------------------------------------------

    pub fn put_pbft_block(&self, pbft_block_hash: &Hash, pbft_block_bytes: &[u8]) -> Result<()> {
        self.db.put_cf(self.cf(CF_PBFT_BLOCKS)?, pbft_block_hash, pbft_block_bytes)?;
        Ok(())
    }

    pub fn get_pbft_block(&self, pbft_block_hash: &Hash) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get_cf(self.cf(CF_PBFT_BLOCKS)?, pbft_block_hash)?)
    }

    pub fn get_pbft_block_hash_for_period(&self, period: u64) -> Result<Option<Hash>> {
        match self.db.get_cf(self.cf(CF_PERIOD_TO_PBFT_HASH)?, period.to_be_bytes())? {
            Some(bytes) => {
                let hash: Hash =
                    bytes.as_slice().try_into().map_err(|_| StorageError::DatabaseError("bad hash length".into()))?;
                Ok(Some(hash))
            }
            None => Ok(None),
        }
    }

    pub fn get_pbft_head(&self) -> Result<Option<PbftChainHead>> {
        match self.db.get_cf(self.cf(CF_PBFT_HEAD)?, HEAD_KEY)? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    // -- votes -------------------------------------------------------------

    pub fn get_cert_votes(&self, pbft_block_hash: &Hash) -> Result<Vec<Vote>> {
        self.get_vote_bundle(CF_CERT_VOTES, pbft_block_hash)
    }

    pub fn put_soft_votes(&self, round: u64, votes: &[Vote]) -> Result<()> {
        self.put_vote_bundle(CF_SOFT_VOTES_FOR_ROUND, &round.to_be_bytes(), votes)
    }

    pub fn get_soft_votes(&self, round: u64) -> Result<Vec<Vote>> {
        self.get_vote_bundle(CF_SOFT_VOTES_FOR_ROUND, &round.to_be_bytes())
    }

    pub fn put_next_votes(&self, round: u64, votes: &[Vote]) -> Result<()> {
        self.put_vote_bundle(CF_NEXT_VOTES_FOR_ROUND, &round.to_be_bytes(), votes)
    }

    pub fn get_next_votes(&self, round: u64) -> Result<Vec<Vote>> {
        self.get_vote_bundle(CF_NEXT_VOTES_FOR_ROUND, &round.to_be_bytes())
    }

    fn put_vote_bundle(&self, cf_name: &str, key: &[u8], votes: &[Vote]) -> Result<()> {
        let encoded: Vec<Vec<u8>> = votes.iter().map(Vote::to_storage_bytes).collect();
        let bytes = bincode::serialize(&encoded)?;
        self.db.put_cf(self.cf(cf_name)?, key, bytes)?;
        Ok(())
    }

    fn get_vote_bundle(&self, cf_name: &str, key: &[u8]) -> Result<Vec<Vote>> {
        match self.db.get_cf(self.cf(cf_name)?, key)? {
            Some(bytes) => {
                let encoded: Vec<Vec<u8>> = bincode::deserialize(&bytes)?;
                encoded.iter().map(|v| Vote::from_storage_bytes(v).map_err(|e| StorageError::SerializationError(e.to_string()))).collect()
            }
            None => Ok(Vec::new()),
        }
    }

    // -- round caches -------------------------------------------------------

    pub fn put_two_t_plus_one(&self, round: u64, value: u64) -> Result<()> {
        self.db.put_cf(self.cf(CF_TWO_T_PLUS_ONE_FOR_ROUND)?, round.to_be_bytes(), value.to_be_bytes())?;
        Ok(())
    }

    pub fn get_two_t_plus_one(&self, round: u64) -> Result<Option<u64>> {
        match self.db.get_cf(self.cf(CF_TWO_T_PLUS_ONE_FOR_ROUND)?, round.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode_u64(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_proposal_period_dag_levels(&self, period: u64, min_level: u64, max_level: u64) -> Result<()> {
        let bytes = bincode::serialize(&(min_level, max_level))?;
        self.db.put_cf(self.cf(CF_PROPOSAL_PERIOD_DAG_LEVELS)?, period.to_be_bytes(), bytes)?;
        Ok(())
    }

    pub fn get_proposal_period_dag_levels(&self, period: u64) -> Result<Option<(u64, u64)>> {
        match self.db.get_cf(self.cf(CF_PROPOSAL_PERIOD_DAG_LEVELS)?, period.to_be_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_status_counter(&self, key: &str, value: u64) -> Result<()> {
        self.db.put_cf(self.cf(CF_STATUS_FIELDS)?, key.as_bytes(), value.to_be_bytes())?;
        Ok(())
    }

    pub fn get_status_counter(&self, key: &str) -> Result<Option<u64>> {
        match self.db.get_cf(self.cf(CF_STATUS_FIELDS)?, key.as_bytes())? {
            Some(bytes) => Ok(Some(decode_u64(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The atomic finalization commit described in spec §4.G/§5: cert
    /// votes, period map, PBFT block, DAG block -> period for every block
    /// in `order`, the dag block state flips to finalized, and the chain
    /// head advances — all in one `WriteBatch`.
    pub fn finalize_round(
        &self,
        pbft_block_hash: &Hash,
        pbft_block_bytes: &[u8],
        period: u64,
        cert_votes: &[Vote],
        dag_block_order: &[Hash],
        new_head: &PbftChainHead,
    ) -> Result<()> {
        let mut batch = WriteBatch::default();

        batch.put_cf(self.cf(CF_PBFT_BLOCKS)?, pbft_block_hash, pbft_block_bytes);
        batch.put_cf(self.cf(CF_PERIOD_TO_PBFT_HASH)?, period.to_be_bytes(), pbft_block_hash);

        let cert_vote_bytes: Vec<Vec<u8>> = cert_votes.iter().map(Vote::to_storage_bytes).collect();
        batch.put_cf(self.cf(CF_CERT_VOTES)?, pbft_block_hash, bincode::serialize(&cert_vote_bytes)?);

        for dag_hash in dag_block_order {
            batch.put_cf(self.cf(CF_DAG_BLOCK_TO_PERIOD)?, dag_hash, period.to_be_bytes());
            batch.put_cf(self.cf(CF_DAG_BLOCK_STATE)?, dag_hash, [1u8]);
        }

        batch.put_cf(self.cf(CF_PBFT_HEAD)?, HEAD_KEY, bincode::serialize(new_head)?);

        self.db.write(batch)?;
        Ok(())
    }
}

fn decode_u64(bytes: &[u8]) -> Result<u64> {
    let arr: [u8; 8] = bytes.try_into().map_err(|_| StorageError::DatabaseError("bad u64 length".into()))?;
    Ok(u64::from_be_bytes(arr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use taraxa_crypto::KeyPair;
    use taraxa_vdf::{VdfConfig, VdfSortition};
    use taraxa_vote::{PbftVoteType, VrfPbftMsg, VrfPbftSortition};
    use tempfile::TempDir;

    fn sample_block() -> DagBlock {
        let keypair = KeyPair::generate();
        let config = VdfConfig { threshold_vdf_omit: u16::MAX, ..VdfConfig::default() };
        let vdf = VdfSortition::compute(&config, &[7u8; 32], b"genesis").unwrap();
        DagBlock::build([0u8; 32], 0, vec![], vec![[9u8; 32]], 1_700_000_000, vdf, &keypair).unwrap()
    }

    fn sample_vote(round: u64) -> Vote {
        let msg = VrfPbftMsg { vote_type: PbftVoteType::CertVote, round, step: 3, weighted_index: 0 };
        let sortition = VrfPbftSortition::compute(&[1u8; 32], msg).unwrap();
        Vote::new(&[1u8; 32], sortition, [5u8; 32]).unwrap()
    }

    #[test]
    fn dag_block_round_trips_through_rocksdb() {
        let dir = TempDir::new().unwrap();
        let db = ConsensusDb::open(dir.path()).unwrap();
        let block = sample_block();
        db.put_dag_block(&block, false).unwrap();

        let restored = db.get_dag_block(block.hash()).unwrap().unwrap();
        assert_eq!(restored.hash(), block.hash());
        assert!(!db.is_dag_block_finalized(block.hash()).unwrap());
    }

    #[test]
    fn finalize_round_is_atomic_and_queryable() {
        let dir = TempDir::new().unwrap();
        let db = ConsensusDb::open(dir.path()).unwrap();
        let block = sample_block();
        db.put_dag_block(&block, false).unwrap();

        let vote = sample_vote(1);
        let pbft_hash = [3u8; 32];
        let head = PbftChainHead { head_hash: pbft_hash, size: 1, last_pbft_block_hash: pbft_hash };
        db.finalize_round(&pbft_hash, b"pbft-block-bytes", 1, &[vote.clone()], &[*block.hash()], &head).unwrap();

        assert!(db.is_dag_block_finalized(block.hash()).unwrap());
        assert_eq!(db.get_period_for_dag_block(block.hash()).unwrap(), Some(1));
        assert_eq!(db.get_pbft_block_hash_for_period(1).unwrap(), Some(pbft_hash));
        assert_eq!(db.get_pbft_head().unwrap(), Some(head));
        let stored_votes = db.get_cert_votes(&pbft_hash).unwrap();
        assert_eq!(stored_votes.len(), 1);
        assert_eq!(stored_votes[0].hash(), vote.hash());
    }

    #[test]
    fn round_caches_round_trip() {
        let dir = TempDir::new().unwrap();
        let db = ConsensusDb::open(dir.path()).unwrap();
        db.put_two_t_plus_one(4, 5).unwrap();
        assert_eq!(db.get_two_t_plus_one(4).unwrap(), Some(5));

        db.put_proposal_period_dag_levels(2, 10, 20).unwrap();
        assert_eq!(db.get_proposal_period_dag_levels(2).unwrap(), Some((10, 20)));

        db.put_status_counter("dpos_period", 7).unwrap();
        assert_eq!(db.get_status_counter("dpos_period").unwrap(), Some(7));
    }
}
