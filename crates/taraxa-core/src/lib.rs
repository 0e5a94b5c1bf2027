pub mod constants;
pub mod error;
pub mod rlp;
pub mod types;

pub use error::{CoreError, Result};
pub use types::{Address, Hash};
