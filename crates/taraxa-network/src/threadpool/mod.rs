//! Tiered packet dispatch (spec §4.H): three priority lanes, a trio of
//! blocking masks, and the worker-facing pool built on top of them.

mod blocking_mask;
mod packets_queue;
mod pool;
mod priority_queue;

pub use pool::PacketThreadPool;
pub use priority_queue::PriorityQueue;
