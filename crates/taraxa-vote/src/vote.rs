//! Votes: a VRF-weighted sortition proof tying a voter to a PBFT
//! round/step/value, plus the producer signature over that proof.

use alloy_rlp::{BufMut, Encodable, Header};
use taraxa_core::rlp::encode_hash32;
use taraxa_core::{Address, Hash};
use taraxa_crypto::vrf::{vrf_prove, vrf_verify, VrfOutput, VrfProofBytes, VrfPublicKey};
use taraxa_crypto::{keccak256, recover_address, KeyPair};

use crate::error::{Result, VoteError};
use crate::sortition_threshold::can_speak;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PbftVoteType {
    Propose,
    SoftVote,
    CertVote,
    NextVote,
}

impl TryFrom<u8> for PbftVoteType {
    type Error = VoteError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Propose),
            1 => Ok(Self::SoftVote),
            2 => Ok(Self::CertVote),
            3 => Ok(Self::NextVote),
            other => Err(VoteError::Codec(format!("unknown vote type tag {other}"))),
        }
    }
}

/// The message a vote's VRF sortition is computed over: binds the proof
/// to a specific round/step/voter-index so it can't be replayed elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VrfPbftMsg {
    pub vote_type: PbftVoteType,
    pub round: u64,
    pub step: u64,
    pub weighted_index: u64,
}

impl VrfPbftMsg {
    pub fn to_alpha(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 8 + 8 + 8);
        out.push(self.vote_type as u8);
        out.extend_from_slice(&self.round.to_be_bytes());
        out.extend_from_slice(&self.step.to_be_bytes());
        out.extend_from_slice(&self.weighted_index.to_be_bytes());
        out
    }
}

#[derive(Debug, Clone)]
pub struct VrfPbftSortition {
    pub pk: VrfPublicKey,
    pub proof: VrfProofBytes,
    pub output: VrfOutput,
    pub pbft_msg: VrfPbftMsg,
}

impl VrfPbftSortition {
    pub fn compute(sk: &[u8; 32], pbft_msg: VrfPbftMsg) -> Result<Self> {
        use taraxa_crypto::vrf::VrfKeypair;
        let keypair = VrfKeypair::from_secret_bytes(sk)?;
        let (proof, output) = vrf_prove(sk, &pbft_msg.to_alpha())?;
        Ok(Self { pk: keypair.public, proof, output, pbft_msg })
    }

    pub fn verify(&self) -> Result<()> {
        vrf_verify(&self.pk, &self.proof, &self.pbft_msg.to_alpha(), &self.output)
            .map_err(VoteError::Crypto)
    }

    pub fn can_speak(&self, threshold: u64, valid_players: u64) -> bool {
        can_speak(&self.output, threshold, valid_players)
    }
}

#[derive(Debug, Clone)]
pub struct Vote {
    vote_hash: Hash,
    blockhash: Hash,
    vote_signature: Vec<u8>,
    vrf_sortition: VrfPbftSortition,
    voter: Address,
}

impl Vote {
    pub fn new(node_sk: &[u8; 32], vrf_sortition: VrfPbftSortition, blockhash: Hash) -> Result<Self> {
        let keypair = KeyPair::from_secret(node_sk).map_err(VoteError::Crypto)?;
        let unsigned_hash = Self::sha3(&vrf_sortition, &blockhash, None);
        let sig = keypair.sign(&unsigned_hash).map_err(VoteError::Crypto)?;
        let vote_hash = Self::sha3(&vrf_sortition, &blockhash, Some(&sig));
        Ok(Self { vote_hash, blockhash, vote_signature: sig.to_vec(), vrf_sortition, voter: keypair.address().into_bytes().into() })
    }

    pub fn hash(&self) -> &Hash {
        &self.vote_hash
    }
    pub fn block_hash(&self) -> &Hash {
        &self.blockhash
    }
    pub fn voter(&self) -> &Address {
        &self.voter
    }
    pub fn vrf_sortition(&self) -> &VrfPbftSortition {
        &self.vrf_sortition
    }
    pub fn round(&self) -> u64 {
        self.vrf_sortition.pbft_msg.round
    }
    pub fn step(&self) -> u64 {
        self.vrf_sortition.pbft_msg.step
    }
    pub fn vote_type(&self) -> PbftVoteType {
        self.vrf_sortition.pbft_msg.vote_type
    }
    pub fn weighted_index(&self) -> u64 {
        self.vrf_sortition.pbft_msg.weighted_index
    }

    /// Recovers the signer and checks it matches the cached voter address.
    pub fn verify_vote(&self) -> Result<()> {
        let unsigned_hash = Self::sha3(&self.vrf_sortition, &self.blockhash, None);
        let recovered = recover_address(&unsigned_hash, &self.vote_signature)
            .map_err(|_| VoteError::InvalidSignature(hex::encode(self.vote_hash)))?;
        if recovered.as_bytes() != self.voter.as_bytes() {
            return Err(VoteError::InvalidSignature(hex::encode(self.vote_hash)));
        }
        Ok(())
    }

    pub fn verify_vrf_sortition(&self) -> Result<()> {
        self.vrf_sortition.verify()
    }

    pub fn verify_can_speak(&self, threshold: u64, dpos_total_votes_count: u64) -> bool {
        self.vrf_sortition.can_speak(threshold, dpos_total_votes_count)
    }

    /// Wire encoding: [blockhash, vrf_sortition_bytes, sig?]. Hashing and
    /// signing both go through this so the signed payload and the wire
    /// bytes never drift apart.
    fn rlp_bytes(vrf_sortition: &VrfPbftSortition, blockhash: &Hash, sig: Option<&[u8; 64]>) -> Vec<u8> {
        let sortition_bytes = vrf_sortition_bytes(vrf_sortition);
        let mut payload_len = 32 + sortition_bytes.as_slice().length();
        if let Some(sig) = sig {
            payload_len += sig.as_slice().length();
        }

        let mut out = Vec::new();
        Header { list: true, payload_length: payload_len }.encode(&mut out);
        encode_hash32(blockhash, &mut out);
        sortition_bytes.as_slice().encode(&mut out);
        if let Some(sig) = sig {
            sig.as_slice().encode(&mut out);
        }
        out
    }

    fn sha3(vrf_sortition: &VrfPbftSortition, blockhash: &Hash, sig: Option<&[u8; 64]>) -> Hash {
        keccak256(&Self::rlp_bytes(vrf_sortition, blockhash, sig))
    }

    /// Persisted form used by the `cert_votes`/`soft_votes_for_round`/
    /// `next_votes_for_round` columns.
    pub fn to_storage_bytes(&self) -> Vec<u8> {
        bincode::serialize(&(
            self.vote_hash,
            self.blockhash,
            self.vote_signature.clone(),
            self.vrf_sortition.pk.0.clone(),
            self.vrf_sortition.proof.0.clone(),
            self.vrf_sortition.output.0.to_vec(),
            self.vrf_sortition.pbft_msg.vote_type as u8,
            self.vrf_sortition.pbft_msg.round,
            self.vrf_sortition.pbft_msg.step,
            self.vrf_sortition.pbft_msg.weighted_index,
            self.voter.as_bytes().to_vec(),
        ))
        .expect("vote fields are always serializable")
    }

    pub fn from_storage_bytes(bytes: &[u8]) -> Result<Self> {
        #[allow(clippy::type_complexity)]
        let (vote_hash, blockhash, vote_signature, pk, proof, output, vote_type, round, step, weighted_index, voter): (
            Hash,
            Hash,
            Vec<u8>,
            Vec<u8>,
            Vec<u8>,
            Vec<u8>,
            u8,
            u64,
            u64,
            u64,
            Vec<u8>,
        ) = bincode::deserialize(bytes).map_err(|e| VoteError::Codec(e.to_string()))?;

        let mut output_bytes = [0u8; 64];
        if output.len() != output_bytes.len() {
            return Err(VoteError::Codec("vrf output has wrong length".to_string()));
        }
        output_bytes.copy_from_slice(&output);

        let pbft_msg = VrfPbftMsg {
            vote_type: PbftVoteType::try_from(vote_type)?,
            round,
            step,
            weighted_index,
        };
        let vrf_sortition =
            VrfPbftSortition { pk: VrfPublicKey(pk), proof: VrfProofBytes(proof), output: VrfOutput(output_bytes), pbft_msg };

        Ok(Self { vote_hash, blockhash, vote_signature, vrf_sortition, voter: Address::from_slice(&voter) })
    }
}

fn vrf_sortition_bytes(vrf_sortition: &VrfPbftSortition) -> Vec<u8> {
    bincode::serialize(&(
        vrf_sortition.pk.0.clone(),
        vrf_sortition.proof.0.clone(),
        vrf_sortition.output.0.to_vec(),
        vrf_sortition.pbft_msg.to_alpha(),
    ))
    .expect("vrf sortition fields are always serializable")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_vote(sk: [u8; 32], round: u64) -> Vote {
        let msg = VrfPbftMsg { vote_type: PbftVoteType::CertVote, round, step: 3, weighted_index: 0 };
        let sortition = VrfPbftSortition::compute(&sk, msg).unwrap();
        Vote::new(&sk, sortition, [9u8; 32]).unwrap()
    }

    #[test]
    fn vote_signature_verifies() {
        let vote = sample_vote([1u8; 32], 1);
        vote.verify_vote().unwrap();
        vote.verify_vrf_sortition().unwrap();
    }

    #[test]
    fn different_rounds_give_different_hashes() {
        let v1 = sample_vote([1u8; 32], 1);
        let v2 = sample_vote([1u8; 32], 2);
        assert_ne!(v1.hash(), v2.hash());
    }

    #[test]
    fn storage_round_trip_preserves_hash() {
        let vote = sample_vote([2u8; 32], 5);
        let bytes = vote.to_storage_bytes();
        let restored = Vote::from_storage_bytes(&bytes).unwrap();
        assert_eq!(restored.hash(), vote.hash());
        restored.verify_vote().unwrap();
    }

    #[test]
    fn full_threshold_always_speaks() {
        let vote = sample_vote([1u8; 32], 1);
        assert!(vote.verify_can_speak(u64::MAX, 1));
    }
}
