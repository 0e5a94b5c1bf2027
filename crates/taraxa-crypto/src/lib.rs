//! Cryptographic primitives shared by the Taraxa consensus core:
//! keccak256/blake3/sha256 hashing, secp256k1 signing and address
//! recovery, and VRF sortition.

pub mod error;
pub mod hash;
pub mod signature;
pub mod vrf;

pub use error::CryptoError;
pub use hash::{blake3_hash, keccak256, sha256, Hash};
pub use signature::{address_from_public_key, recover_address, verify_signature, CryptoAddress, KeyPair};
pub use vrf::{vrf_prove, vrf_verify, VrfKeypair, VrfOutput, VrfProofBytes, VrfPublicKey};

pub type Result<T> = std::result::Result<T, CryptoError>;
