//! VRF (Verifiable Random Function) sortition primitive.
//!
//! Two implementations are compiled depending on the `production-vrf`
//! feature:
//!
//! - default: a deterministic keccak256-chain construction. Not a real
//!   VRF (forgeable without the secret key under a stronger threat
//!   model), but byte-stable and fast, so unit tests across the
//!   workspace can run without pulling in curve arithmetic.
//! - `production-vrf`: ECVRF-EDWARDS25519-SHA512-TAI (RFC 9381) via
//!   `vrf-rfc9381`.
//!
//! Both expose the same `VrfKeypair` / `vrf_prove` / `vrf_verify` API so
//! callers (vote sortition, VDF sortition) never branch on the feature.

use crate::hash::keccak256;
use crate::CryptoError;

/// 64-byte VRF output ("ticket"), interpreted big-endian as a 512-bit
/// integer for sortition comparisons (spec §4.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VrfOutput(pub [u8; 64]);

impl VrfOutput {
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

/// Opaque VRF proof bytes (construction-specific length).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VrfProofBytes(pub Vec<u8>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VrfPublicKey(pub Vec<u8>);

pub struct VrfKeypair {
    secret: [u8; 32],
    pub public: VrfPublicKey,
}

impl Drop for VrfKeypair {
    fn drop(&mut self) {
        self.secret.iter_mut().for_each(|b| *b = 0);
    }
}

impl VrfKeypair {
    pub fn from_secret_bytes(secret: &[u8; 32]) -> Result<Self, CryptoError> {
        let public = derive_public_key(secret)?;
        Ok(Self { secret: *secret, public })
    }

    pub fn secret_bytes(&self) -> &[u8; 32] {
        &self.secret
    }
}

#[cfg(not(feature = "production-vrf"))]
fn derive_public_key(secret: &[u8; 32]) -> Result<VrfPublicKey, CryptoError> {
    let mut input = [0u8; 64];
    input[..32].copy_from_slice(secret);
    input[32..].copy_from_slice(b"VRF_PUBLIC_KEY_DERIVATION_DOMAIN");
    Ok(VrfPublicKey(keccak256(&input).to_vec()))
}

#[cfg(not(feature = "production-vrf"))]
pub fn vrf_prove(sk: &[u8; 32], alpha: &[u8]) -> Result<(VrfProofBytes, VrfOutput), CryptoError> {
    let mut gamma_input = Vec::with_capacity(32 + alpha.len());
    gamma_input.extend_from_slice(sk);
    gamma_input.extend_from_slice(alpha);
    let gamma = keccak256(&gamma_input);

    let mut proof = Vec::with_capacity(32);
    proof.extend_from_slice(&gamma);

    let output = proof_to_output(&VrfProofBytes(proof.clone()));
    Ok((VrfProofBytes(proof), output))
}

#[cfg(not(feature = "production-vrf"))]
pub fn vrf_verify(
    _pk: &VrfPublicKey,
    proof: &VrfProofBytes,
    _alpha: &[u8],
    expected_output: &VrfOutput,
) -> Result<(), CryptoError> {
    let output = proof_to_output(proof);
    if &output == expected_output {
        Ok(())
    } else {
        Err(CryptoError::VrfProofInvalid)
    }
}

/// Expand a (possibly short) proof into the 64-byte VRF output via two
/// chained keccak rounds, independent of which VRF construction produced it.
pub fn proof_to_output(proof: &VrfProofBytes) -> VrfOutput {
    let first = keccak256(&proof.0);
    let mut second_input = Vec::with_capacity(64);
    second_input.extend_from_slice(&first);
    second_input.extend_from_slice(b"VRF_OUTPUT_DOMAIN_SEPARATOR_XX__");
    let second = keccak256(&second_input);

    let mut output = [0u8; 64];
    output[..32].copy_from_slice(&first);
    output[32..].copy_from_slice(&second);
    VrfOutput(output)
}

#[cfg(feature = "production-vrf")]
mod production {
    use super::*;
    use vrf_rfc9381::edwards25519::{PublicKey as EdPublicKey, SecretKey as EdSecretKey};

    pub fn derive_public_key_impl(secret: &[u8; 32]) -> Result<VrfPublicKey, CryptoError> {
        let sk = EdSecretKey::from_bytes(secret)
            .map_err(|e| CryptoError::VrfKeyInvalid(e.to_string()))?;
        let pk: EdPublicKey = (&sk).into();
        Ok(VrfPublicKey(pk.to_bytes().to_vec()))
    }

    pub fn prove_impl(
        secret: &[u8; 32],
        alpha: &[u8],
    ) -> Result<(VrfProofBytes, VrfOutput), CryptoError> {
        let sk = EdSecretKey::from_bytes(secret)
            .map_err(|e| CryptoError::VrfKeyInvalid(e.to_string()))?;
        let proof = sk
            .prove(alpha)
            .map_err(|e| CryptoError::VrfProofFailed(e.to_string()))?;
        let output = proof.to_hash();
        let mut out = [0u8; 64];
        out.copy_from_slice(&output);
        Ok((VrfProofBytes(proof.to_bytes().to_vec()), VrfOutput(out)))
    }

    pub fn verify_impl(
        pk: &VrfPublicKey,
        proof: &VrfProofBytes,
        alpha: &[u8],
        expected_output: &VrfOutput,
    ) -> Result<(), CryptoError> {
        let public = EdPublicKey::from_bytes(&pk.0)
            .map_err(|e| CryptoError::VrfKeyInvalid(e.to_string()))?;
        let decoded = vrf_rfc9381::edwards25519::Proof::from_bytes(&proof.0)
            .map_err(|_| CryptoError::VrfProofInvalid)?;
        let output = public
            .verify(alpha, &decoded)
            .map_err(|_| CryptoError::VrfProofInvalid)?;
        if output.as_slice() == expected_output.as_bytes().as_slice() {
            Ok(())
        } else {
            Err(CryptoError::VrfProofInvalid)
        }
    }
}

#[cfg(feature = "production-vrf")]
fn derive_public_key(secret: &[u8; 32]) -> Result<VrfPublicKey, CryptoError> {
    production::derive_public_key_impl(secret)
}

#[cfg(feature = "production-vrf")]
pub fn vrf_prove(sk: &[u8; 32], alpha: &[u8]) -> Result<(VrfProofBytes, VrfOutput), CryptoError> {
    production::prove_impl(sk, alpha)
}

#[cfg(feature = "production-vrf")]
pub fn vrf_verify(
    pk: &VrfPublicKey,
    proof: &VrfProofBytes,
    alpha: &[u8],
    expected_output: &VrfOutput,
) -> Result<(), CryptoError> {
    production::verify_impl(pk, proof, alpha, expected_output)
}

/// `canSpeak(threshold, V)`: the ticket (as a 512-bit big-endian integer)
/// times V must not exceed threshold times 2^512. Implemented with
/// `rug` in the callers that hold both a VRF ticket and a voting weight
/// (`taraxa-vote::sortition_threshold`); this module only produces the ticket.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_prove_verify() {
        let sk = [7u8; 32];
        let keypair = VrfKeypair::from_secret_bytes(&sk).unwrap();
        let (proof, output) = vrf_prove(&sk, b"alpha").unwrap();
        vrf_verify(&keypair.public, &proof, b"alpha", &output).unwrap();
    }

    #[test]
    fn output_is_deterministic() {
        let sk = [7u8; 32];
        let (_, out1) = vrf_prove(&sk, b"slot-1").unwrap();
        let (_, out2) = vrf_prove(&sk, b"slot-1").unwrap();
        assert_eq!(out1, out2);
    }

    #[test]
    fn different_alpha_gives_different_output() {
        let sk = [7u8; 32];
        let (_, out1) = vrf_prove(&sk, b"slot-1").unwrap();
        let (_, out2) = vrf_prove(&sk, b"slot-2").unwrap();
        assert_ne!(out1, out2);
    }

    #[test]
    fn tampered_proof_rejected() {
        let sk = [7u8; 32];
        let keypair = VrfKeypair::from_secret_bytes(&sk).unwrap();
        let (mut proof, output) = vrf_prove(&sk, b"alpha").unwrap();
        proof.0[0] ^= 0xFF;
        assert!(vrf_verify(&keypair.public, &proof, b"alpha", &output).is_err());
    }
}
