//! Packet dispatch for the consensus core (spec §4.H, §6): packet identity
//! and priority, plus the tiered thread pool that schedules them onto
//! workers under the hard/peer-order/DAG-level blocking masks. Peer
//! discovery, transport and gossip are out of scope here.

pub mod error;
pub mod packet;
pub mod threadpool;

pub use error::{NetworkError, Result};
pub use packet::{PacketData, PacketPriority, PacketType, PeerId};
pub use threadpool::PacketThreadPool;
