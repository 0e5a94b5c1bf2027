use thiserror::Error;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid signature")]
    InvalidSignature,
    
    #[error("Invalid public key")]
    InvalidPublicKey,
    
    #[error("Invalid private key")]
    InvalidPrivateKey,
    
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(String),

    // ── VRF errors (active when `production-vrf` feature is enabled) ──
    /// VRF proof generation failed (e.g. bad key material).
    #[error("VRF proof generation failed: {0}")]
    VrfProofFailed(String),

    /// A received or locally-generated VRF proof is cryptographically invalid.
    #[error("VRF proof is invalid")]
    VrfProofInvalid,

    /// The supplied key bytes are not a valid VRF secret key.
    #[error("invalid VRF key bytes: {0}")]
    VrfKeyInvalid(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
