//! VDF (Verifiable Delay Function) sortition: difficulty derivation from
//! a VRF ticket and Wesolowski proof-of-elapsed-time over a fixed
//! 1024-bit RSA modulus.

pub mod config;
pub mod error;
pub mod sortition;

pub use config::VdfConfig;
pub use error::{Result, VdfError};
pub use sortition::VdfSortition;
