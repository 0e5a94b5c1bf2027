use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("invalid address bytes: expected 20, got {0}")]
    InvalidAddress(usize),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("rlp decode error: {0}")]
    RlpDecode(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
