//! DAG block: pivot + tips edges, transactions, VDF sortition proof and
//! a producer signature. Hash and sender are computed lazily and cached.

use alloy_rlp::{BufMut, Encodable, Header};
use taraxa_core::rlp::{encode_hash32, encode_hash32_list};
use taraxa_core::{Address, Hash};
use taraxa_crypto::vrf::{VrfOutput, VrfProofBytes, VrfPublicKey};
use taraxa_crypto::{keccak256, recover_address, KeyPair};
use taraxa_vdf::VdfSortition;

use crate::error::{DagError, Result};

pub const MAX_TIPS: usize = taraxa_core::constants::dag::MAX_TIPS;
pub const MAX_TRXS_PER_BLOCK: usize = taraxa_core::constants::dag::MAX_TRXS_PER_BLOCK;

#[derive(Debug, Clone)]
pub struct DagBlock {
    pivot: Hash,
    level: u64,
    tips: Vec<Hash>,
    trxs: Vec<Hash>,
    timestamp: u64,
    vdf: VdfSortition,
    sig: Vec<u8>,
    hash: Hash,
    sender: Address,
}

impl DagBlock {
    /// Build and sign a new block. `pivot_level` is the pivot block's level;
    /// the new block's level must exceed it (spec §3 level-monotonicity).
    pub fn build(
        pivot: Hash,
        pivot_level: u64,
        tips: Vec<Hash>,
        trxs: Vec<Hash>,
        timestamp: u64,
        vdf: VdfSortition,
        keypair: &KeyPair,
    ) -> Result<Self> {
        if tips.len() > MAX_TIPS {
            return Err(DagError::TooManyTips(hex::encode(pivot), tips.len(), MAX_TIPS));
        }
        if trxs.len() > MAX_TRXS_PER_BLOCK {
            return Err(DagError::TooManyTransactions(hex::encode(pivot), trxs.len(), MAX_TRXS_PER_BLOCK));
        }
        let level = pivot_level + 1;

        let mut block = Self {
            pivot,
            level,
            tips,
            trxs,
            timestamp,
            vdf,
            sig: Vec::new(),
            hash: [0u8; 32],
            sender: keypair.address().into_bytes().into(),
        };

        let unsigned_hash = keccak256(&block.rlp_bytes(false));
        let sig = keypair.sign(&unsigned_hash)?;
        block.sig = sig.to_vec();
        block.hash = keccak256(&block.rlp_bytes(true));
        Ok(block)
    }

    pub fn pivot(&self) -> &Hash {
        &self.pivot
    }
    pub fn level(&self) -> u64 {
        self.level
    }
    pub fn tips(&self) -> &[Hash] {
        &self.tips
    }
    pub fn trxs(&self) -> &[Hash] {
        &self.trxs
    }
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }
    pub fn vdf(&self) -> &VdfSortition {
        &self.vdf
    }
    pub fn sig(&self) -> &[u8] {
        &self.sig
    }
    pub fn hash(&self) -> &Hash {
        &self.hash
    }
    pub fn sender(&self) -> &Address {
        &self.sender
    }

    /// Total tips count plus the pivot itself — used by callers validating
    /// against `MAX_TIPS`.
    pub fn edge_count(&self) -> usize {
        self.tips.len() + 1
    }

    /// Verify the producer signature recovers to the block's cached sender.
    pub fn verify_sig(&self) -> Result<()> {
        let unsigned_hash = keccak256(&self.rlp_bytes(false));
        if self.sig.len() != 64 && self.sig.len() != 65 {
            return Err(DagError::InvalidSignature(hex::encode(self.hash)));
        }
        let recovered =
            recover_address(&unsigned_hash, &self.sig).map_err(|_| DagError::InvalidSignature(hex::encode(self.hash)))?;
        if recovered.as_bytes() != self.sender.as_bytes() {
            return Err(DagError::InvalidSignature(hex::encode(self.hash)));
        }
        Ok(())
    }

    fn rlp_bytes(&self, include_sig: bool) -> Vec<u8> {
        let mut out = Vec::new();
        self.stream_rlp(&mut out, include_sig);
        out
    }

    fn stream_rlp(&self, out: &mut dyn BufMut, include_sig: bool) {
        let tips_len: usize = self.tips.iter().map(|h| h.as_slice().length()).sum();
        let trxs_len: usize = self.trxs.iter().map(|h| h.as_slice().length()).sum();
        let vdf_bytes = self.vdf_bytes();

        let mut payload_len = 32 + self.level.length() + (tips_len + list_header_len(tips_len))
            + (trxs_len + list_header_len(trxs_len))
            + self.timestamp.length()
            + vdf_bytes.as_slice().length();
        if include_sig {
            payload_len += self.sig.as_slice().length();
        }

        Header { list: true, payload_length: payload_len }.encode(out);
        encode_hash32(&self.pivot, out);
        self.level.encode(out);
        encode_hash32_list(&self.tips, out);
        encode_hash32_list(&self.trxs, out);
        self.timestamp.encode(out);
        vdf_bytes.as_slice().encode(out);
        if include_sig {
            self.sig.as_slice().encode(out);
        }
    }

    fn vdf_bytes(&self) -> Vec<u8> {
        bincode::serialize(&(
            self.vdf.pk.0.clone(),
            self.vdf.proof.0.clone(),
            self.vdf.output.0.to_vec(),
            self.vdf.vdf_sol.clone(),
            self.vdf.difficulty,
        ))
        .expect("vdf sortition fields are always serializable")
    }

    /// Persisted form used by the `dag_blocks` column: all fields flattened
    /// into a bincode tuple, including the already-computed hash and signer
    /// so a restart never has to re-verify signatures it already accepted.
    pub fn to_storage_bytes(&self) -> Vec<u8> {
        bincode::serialize(&(
            self.pivot,
            self.level,
            self.tips.clone(),
            self.trxs.clone(),
            self.timestamp,
            self.vdf.pk.0.clone(),
            self.vdf.proof.0.clone(),
            self.vdf.output.0.to_vec(),
            self.vdf.vdf_sol.clone(),
            self.vdf.difficulty,
            self.vdf.computation_time_ms,
            self.sig.clone(),
            self.hash,
            self.sender.as_bytes().to_vec(),
        ))
        .expect("dag block fields are always serializable")
    }

    pub fn from_storage_bytes(bytes: &[u8]) -> Result<Self> {
        #[allow(clippy::type_complexity)]
        let (pivot, level, tips, trxs, timestamp, pk, proof, output, vdf_sol, difficulty, computation_time_ms, sig, hash, sender): (
            Hash,
            u64,
            Vec<Hash>,
            Vec<Hash>,
            u64,
            Vec<u8>,
            Vec<u8>,
            Vec<u8>,
            (Vec<u8>, Vec<u8>),
            u16,
            u64,
            Vec<u8>,
            Hash,
            Vec<u8>,
        ) = bincode::deserialize(bytes).map_err(|e| DagError::Codec(e.to_string()))?;

        let mut output_bytes = [0u8; 64];
        if output.len() != output_bytes.len() {
            return Err(DagError::Codec("vrf output has wrong length".to_string()));
        }
        output_bytes.copy_from_slice(&output);

        Ok(Self {
            pivot,
            level,
            tips,
            trxs,
            timestamp,
            vdf: VdfSortition {
                pk: VrfPublicKey(pk),
                proof: VrfProofBytes(proof),
                output: VrfOutput(output_bytes),
                vdf_sol,
                difficulty,
                computation_time_ms,
            },
            sig,
            hash,
            sender: Address::from_slice(&sender),
        })
    }
}

/// The message a VDF sortition is computed and verified over: pivot
/// followed by each tip, in order. Shared by the proposer (before a
/// block exists) and the verifier (from an already-built block).
pub fn vdf_sortition_message(pivot: &Hash, tips: &[Hash]) -> Vec<u8> {
    let mut msg = Vec::with_capacity(32 + tips.len() * 32);
    msg.extend_from_slice(pivot);
    for t in tips {
        msg.extend_from_slice(t);
    }
    msg
}

fn list_header_len(payload_length: usize) -> usize {
    let mut buf = Vec::new();
    Header { list: true, payload_length }.encode(&mut buf);
    buf.len()
}

#[derive(Debug, Clone, Default)]
pub struct DagFrontier {
    pub pivot: Hash,
    pub tips: Vec<Hash>,
}

impl DagFrontier {
    pub fn new(pivot: Hash, tips: Vec<Hash>) -> Self {
        Self { pivot, tips }
    }

    pub fn clear(&mut self) {
        self.pivot = [0u8; 32];
        self.tips.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taraxa_vdf::VdfConfig;

    fn sample_block() -> DagBlock {
        let keypair = KeyPair::generate();
        let config = VdfConfig { threshold_vdf_omit: u16::MAX, ..VdfConfig::default() };
        let sk = [4u8; 32];
        let vdf = VdfSortition::compute(&config, &sk, b"level-1").unwrap();
        DagBlock::build([1u8; 32], 0, vec![[2u8; 32]], vec![[3u8; 32]], 1_700_000_000, vdf, &keypair).unwrap()
    }

    #[test]
    fn level_is_one_past_pivot() {
        let block = sample_block();
        assert_eq!(block.level(), 1);
    }

    #[test]
    fn signature_verifies() {
        let block = sample_block();
        block.verify_sig().unwrap();
    }

    #[test]
    fn storage_round_trip_preserves_hash_and_sender() {
        let block = sample_block();
        let bytes = block.to_storage_bytes();
        let restored = DagBlock::from_storage_bytes(&bytes).unwrap();
        assert_eq!(restored.hash(), block.hash());
        assert_eq!(restored.sender(), block.sender());
        restored.verify_sig().unwrap();
    }

    #[test]
    fn too_many_tips_rejected() {
        let keypair = KeyPair::generate();
        let config = VdfConfig { threshold_vdf_omit: u16::MAX, ..VdfConfig::default() };
        let vdf = VdfSortition::compute(&config, &[4u8; 32], b"x").unwrap();
        let tips: Vec<Hash> = (0..MAX_TIPS + 1).map(|i| [i as u8; 32]).collect();
        let result = DagBlock::build([1u8; 32], 0, tips, vec![], 1, vdf, &keypair);
        assert!(result.is_err());
    }
}
