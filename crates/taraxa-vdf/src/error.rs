use thiserror::Error;

#[derive(Error, Debug)]
pub enum VdfError {
    #[error("invalid VDF sortition: {reason}")]
    InvalidVdfSortition { reason: String },

    #[error("VRF step failed: {0}")]
    Vrf(#[from] taraxa_crypto::CryptoError),
}

pub type Result<T> = std::result::Result<T, VdfError>;
