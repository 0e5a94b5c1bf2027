//! PBFT block type and the in-memory chain-head/unverified-block
//! bookkeeping `PbftManager` consults each round. Durable persistence
//! of the head and finalized blocks lives in `taraxa_storage::ConsensusDb`;
//! this module only tracks blocks that have not yet been finalized.

use std::collections::{HashMap, HashSet, VecDeque};

use alloy_rlp::{BufMut, Encodable, Header};
use parking_lot::RwLock;
use taraxa_core::rlp::encode_hash32;
use taraxa_core::{Address, Hash};
use taraxa_crypto::{keccak256, recover_address, KeyPair};
use taraxa_vote::Vote;

use crate::error::{ConsensusError, Result};

pub const NULL_BLOCK_HASH: Hash = [0u8; 32];

/// A PBFT block: an anchor DAG block plus the period it finalizes.
#[derive(Debug, Clone)]
pub struct PbftBlock {
    prev_hash: Hash,
    anchor_hash: Hash,
    period: u64,
    timestamp: u64,
    sig: Vec<u8>,
    hash: Hash,
    producer: Address,
}

impl PbftBlock {
    pub fn build(
        prev_hash: Hash,
        anchor_hash: Hash,
        period: u64,
        timestamp: u64,
        keypair: &KeyPair,
    ) -> Result<Self> {
        let mut block = Self {
            prev_hash,
            anchor_hash,
            period,
            timestamp,
            sig: Vec::new(),
            hash: [0u8; 32],
            producer: keypair.address().into_bytes().into(),
        };
        let unsigned_hash = keccak256(&block.rlp_bytes(false));
        let sig = keypair.sign(&unsigned_hash)?;
        block.sig = sig.to_vec();
        block.hash = keccak256(&block.rlp_bytes(true));
        Ok(block)
    }

    pub fn prev_hash(&self) -> &Hash {
        &self.prev_hash
    }
    pub fn anchor_hash(&self) -> &Hash {
        &self.anchor_hash
    }
    pub fn period(&self) -> u64 {
        self.period
    }
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
    pub fn hash(&self) -> &Hash {
        &self.hash
    }
    pub fn producer(&self) -> &Address {
        &self.producer
    }

    pub fn verify_sig(&self) -> Result<()> {
        let unsigned_hash = keccak256(&self.rlp_bytes(false));
        let recovered = recover_address(&unsigned_hash, &self.sig)
            .map_err(|_| ConsensusError::InvalidBlock(self.hash, "bad signature".to_string()))?;
        if recovered.as_bytes() != self.producer.as_bytes() {
            return Err(ConsensusError::InvalidBlock(self.hash, "signature does not match producer".to_string()));
        }
        Ok(())
    }

    fn rlp_bytes(&self, include_sig: bool) -> Vec<u8> {
        let mut out = Vec::new();
        let mut payload_len = 32 + 32 + self.period.length() + self.timestamp.length();
        if include_sig {
            payload_len += self.sig.as_slice().length();
        }
        Header { list: true, payload_length: payload_len }.encode(&mut out);
        encode_hash32(&self.prev_hash, &mut out);
        encode_hash32(&self.anchor_hash, &mut out);
        self.period.encode(&mut out);
        self.timestamp.encode(&mut out);
        if include_sig {
            self.sig.as_slice().encode(&mut out);
        }
        out
    }

    pub fn to_storage_bytes(&self) -> Vec<u8> {
        bincode::serialize(&(
            self.prev_hash,
            self.anchor_hash,
            self.period,
            self.timestamp,
            self.sig.clone(),
            self.hash,
            self.producer.as_bytes().to_vec(),
        ))
        .expect("pbft block fields are always serializable")
    }

    pub fn from_storage_bytes(bytes: &[u8]) -> Result<Self> {
        let (prev_hash, anchor_hash, period, timestamp, sig, hash, producer): (Hash, Hash, u64, u64, Vec<u8>, Hash, Vec<u8>) =
            bincode::deserialize(bytes).map_err(|e| ConsensusError::InvariantViolation(e.to_string()))?;
        Ok(Self { prev_hash, anchor_hash, period, timestamp, sig, hash, producer: Address::from_slice(&producer) })
    }
}

/// A PBFT block certificate received from a peer: the block itself plus
/// the cert-votes the peer observed reaching 2t+1 for it.
#[derive(Debug, Clone)]
pub struct PbftBlockCert {
    pub pbft_block: PbftBlock,
    pub cert_votes: Vec<Vote>,
}

impl PbftBlockCert {
    pub fn block_hash(&self) -> &Hash {
        self.pbft_block.hash()
    }
}

struct ChainState {
    head_hash: Hash,
    size: u64,
    last_pbft_block_hash: Hash,
}

/// In-memory chain bookkeeping: unverified blocks proposed this round,
/// and the queue of synced-from-peers blocks awaiting execution.
pub struct PbftChain {
    dag_genesis_hash: Hash,
    state: RwLock<ChainState>,
    unverified_blocks: RwLock<HashMap<Hash, PbftBlock>>,
    unverified_children: RwLock<HashMap<Hash, Vec<Hash>>>,
    synced_queue: RwLock<VecDeque<PbftBlockCert>>,
    synced_set: RwLock<HashSet<Hash>>,
}

impl PbftChain {
    pub fn new(dag_genesis_hash: Hash) -> Self {
        Self {
            dag_genesis_hash,
            state: RwLock::new(ChainState { head_hash: NULL_BLOCK_HASH, size: 0, last_pbft_block_hash: NULL_BLOCK_HASH }),
            unverified_blocks: RwLock::new(HashMap::new()),
            unverified_children: RwLock::new(HashMap::new()),
            synced_queue: RwLock::new(VecDeque::new()),
            synced_set: RwLock::new(HashSet::new()),
        }
    }

    pub fn dag_genesis_hash(&self) -> &Hash {
        &self.dag_genesis_hash
    }

    pub fn head_hash(&self) -> Hash {
        self.state.read().head_hash
    }

    pub fn size(&self) -> u64 {
        self.state.read().size
    }

    pub fn last_pbft_block_hash(&self) -> Hash {
        self.state.read().last_pbft_block_hash
    }

    pub fn restore_head(&self, head_hash: Hash, size: u64, last_pbft_block_hash: Hash) {
        let mut s = self.state.write();
        s.head_hash = head_hash;
        s.size = size;
        s.last_pbft_block_hash = last_pbft_block_hash;
    }

    /// Advance the chain head after a successful finalization.
    pub fn advance(&self, block_hash: Hash) {
        let mut s = self.state.write();
        s.head_hash = block_hash;
        s.last_pbft_block_hash = block_hash;
        s.size += 1;
    }

    pub fn push_unverified_block(&self, block: PbftBlock) {
        let prev = *block.prev_hash();
        let hash = *block.hash();
        self.unverified_blocks.write().insert(hash, block);
        self.unverified_children.write().entry(prev).or_default().push(hash);
    }

    pub fn find_unverified_block(&self, hash: &Hash) -> Option<PbftBlock> {
        self.unverified_blocks.read().get(hash).cloned()
    }

    pub fn cleanup_unverified(&self, finalized: &PbftBlock) {
        let mut blocks = self.unverified_blocks.write();
        let mut children = self.unverified_children.write();
        if let Some(siblings) = children.remove(finalized.prev_hash()) {
            for sibling in siblings {
                blocks.remove(&sibling);
            }
        }
        blocks.remove(finalized.hash());
    }

    pub fn push_synced_block(&self, block_cert: PbftBlockCert) {
        if self.synced_set.write().insert(*block_cert.block_hash()) {
            self.synced_queue.write().push_back(block_cert);
        }
    }

    pub fn synced_queue_is_empty(&self) -> bool {
        self.synced_queue.read().is_empty()
    }

    pub fn synced_queue_len(&self) -> usize {
        self.synced_queue.read().len()
    }

    pub fn pop_synced_front(&self) -> Option<PbftBlockCert> {
        let popped = self.synced_queue.write().pop_front();
        if let Some(ref p) = popped {
            self.synced_set.write().remove(p.block_hash());
        }
        popped
    }

    pub fn clear_synced_queue(&self) {
        self.synced_queue.write().clear();
        self.synced_set.write().clear();
    }

    pub fn is_known_for_syncing(&self, hash: &Hash) -> bool {
        self.synced_set.read().contains(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_signature_verifies() {
        let keypair = KeyPair::generate();
        let block = PbftBlock::build([0u8; 32], [1u8; 32], 1, 1_700_000_000, &keypair).unwrap();
        block.verify_sig().unwrap();
    }

    #[test]
    fn storage_round_trip_preserves_hash() {
        let keypair = KeyPair::generate();
        let block = PbftBlock::build([0u8; 32], [1u8; 32], 1, 1_700_000_000, &keypair).unwrap();
        let bytes = block.to_storage_bytes();
        let restored = PbftBlock::from_storage_bytes(&bytes).unwrap();
        assert_eq!(restored.hash(), block.hash());
    }

    #[test]
    fn advance_updates_head_and_size() {
        let chain = PbftChain::new([9u8; 32]);
        assert_eq!(chain.size(), 0);
        chain.advance([1u8; 32]);
        assert_eq!(chain.size(), 1);
        assert_eq!(chain.head_hash(), [1u8; 32]);
    }

    #[test]
    fn synced_queue_dedupes_by_block_hash() {
        let chain = PbftChain::new([0u8; 32]);
        let keypair = KeyPair::generate();
        let block = PbftBlock::build([0u8; 32], [2u8; 32], 1, 1_700_000_000, &keypair).unwrap();
        chain.push_synced_block(PbftBlockCert { pbft_block: block.clone(), cert_votes: vec![] });
        chain.push_synced_block(PbftBlockCert { pbft_block: block, cert_votes: vec![] });
        assert_eq!(chain.synced_queue_len(), 1);
    }
}
