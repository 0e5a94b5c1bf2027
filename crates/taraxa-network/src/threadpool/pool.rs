//! The tiered packet thread pool (spec §4.H): `N` workers pull from three
//! priority lanes, gated by the blocking masks, blocking on a condvar when
//! nothing is eligible. Grounded on the worker-loop shape `priority_queue.hpp`
//! assumes its callers drive (`pop`/`updateDependenciesStart/Finish` under a
//! shared mutex + condvar).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::packet::PacketData;
use crate::threadpool::priority_queue::PriorityQueue;

pub struct PacketThreadPool {
    state: Mutex<PriorityQueue>,
    condvar: Condvar,
    stopping: AtomicBool,
    next_packet_id: AtomicU64,
}

impl PacketThreadPool {
    pub fn new(worker_count: usize) -> Self {
        Self {
            state: Mutex::new(PriorityQueue::new(worker_count)),
            condvar: Condvar::new(),
            stopping: AtomicBool::new(false),
            next_packet_id: AtomicU64::new(0),
        }
    }

    /// Enqueue a packet, assigning it the next arrival-ordered id, and wake
    /// one blocked worker.
    pub fn push(&self, mut packet: PacketData) -> u64 {
        let id = self.next_packet_id.fetch_add(1, Ordering::Relaxed);
        packet.id = id;
        let mut state = self.state.lock();
        state.push_back(packet);
        self.condvar.notify_all();
        trace!(packet_id = id, "packet enqueued");
        id
    }

    /// Block until a packet is eligible for this worker, or the pool is
    /// stopping and has nothing left to drain.
    pub fn take(&self) -> Option<PacketData> {
        let mut state = self.state.lock();
        loop {
            if let Some(packet) = state.pop_next() {
                return Some(packet);
            }
            if self.stopping.load(Ordering::Acquire) {
                return None;
            }
            self.condvar.wait(&mut state);
        }
    }

    /// Release whatever masks and worker-count reservations `packet` held,
    /// then wake workers that may now be eligible.
    pub fn finish(&self, packet: &PacketData) {
        let mut state = self.state.lock();
        state.mark_finished(packet);
        drop(state);
        self.condvar.notify_all();
    }

    /// Stop accepting new dispatch: `take` returns `None` once the queue is
    /// drained. Does not discard already-queued packets.
    pub fn stop(&self) {
        self.stopping.store(true, Ordering::Release);
        self.condvar.notify_all();
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{PacketData, PacketType};

    #[test]
    fn push_then_take_round_trips_a_packet() {
        let pool = PacketThreadPool::new(4);
        pool.push(PacketData::new(PacketType::Vote, [1u8; 32], vec![1, 2, 3]));
        let packet = pool.take().unwrap();
        assert_eq!(packet.packet_type, PacketType::Vote);
        assert_eq!(packet.payload, vec![1, 2, 3]);
    }

    #[test]
    fn stop_unblocks_idle_workers_with_none() {
        let pool = PacketThreadPool::new(2);
        pool.stop();
        assert!(pool.take().is_none());
    }

    #[test]
    fn finish_releases_hard_block_for_next_sync_packet() {
        let pool = PacketThreadPool::new(4);
        pool.push(PacketData::new(PacketType::PbftSync, [2u8; 32], vec![]));
        let first = pool.take().unwrap();
        assert_eq!(first.packet_type, PacketType::PbftSync);

        // A second sync packet, of a different hard-blocking type, queues
        // behind the first: the hard mask serializes all sync traffic.
        pool.push(PacketData::new(PacketType::DagSync, [2u8; 32], vec![]));
        {
            let mut state = pool.state.lock();
            assert!(state.pop_next().is_none());
        }

        pool.finish(&first);
        let second = pool.take().unwrap();
        assert_eq!(second.packet_type, PacketType::DagSync);
    }
}
