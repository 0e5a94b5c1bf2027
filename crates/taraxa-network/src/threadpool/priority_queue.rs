//! The High/Mid/Low lane aggregate, grounded on `priority_queue.hpp`'s
//! `PriorityQueue`: each lane has a reserved minimum of one worker and a
//! soft maximum, and may borrow beyond its soft maximum while the pool has
//! free capacity overall.

use crate::packet::{PacketData, PacketPriority};
use crate::threadpool::blocking_mask::PacketsBlockingMask;
use crate::threadpool::packets_queue::PacketsQueue;

/// Soft-max share of total workers reserved for each lane before borrowing
/// kicks in. High-priority consensus traffic gets the largest reservation;
/// transaction/sync traffic the smallest.
const HIGH_SHARE: f64 = 0.5;
const MID_SHARE: f64 = 0.3;
const LOW_SHARE: f64 = 0.2;

pub struct PriorityQueue {
    lanes: [PacketsQueue; 3],
    mask: PacketsBlockingMask,
    total_workers: usize,
    active_total: usize,
}

impl PriorityQueue {
    pub fn new(total_workers: usize) -> Self {
        let total_workers = total_workers.max(1);
        let mut lanes = [PacketsQueue::new(), PacketsQueue::new(), PacketsQueue::new()];
        lanes[PacketPriority::High.index()].set_max_workers(soft_max(total_workers, HIGH_SHARE));
        lanes[PacketPriority::Mid.index()].set_max_workers(soft_max(total_workers, MID_SHARE));
        lanes[PacketPriority::Low.index()].set_max_workers(soft_max(total_workers, LOW_SHARE));
        Self { lanes, mask: PacketsBlockingMask::new(), total_workers, active_total: 0 }
    }

    pub fn push_back(&mut self, packet: PacketData) {
        self.lanes[packet.priority().index()].push_back(packet);
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.iter().all(|l| l.is_empty())
    }

    /// Walk High, then Mid, then Low; take the first eligible packet.
    /// Lanes below their own soft max always get to pop; lanes at their
    /// soft max may still borrow a slot while the pool isn't saturated.
    pub fn pop_next(&mut self) -> Option<PacketData> {
        for priority in PacketPriority::ALL {
            let lane = &mut self.lanes[priority.index()];
            let can_run = !lane.max_workers_reached() || self.active_total < self.total_workers;
            if !can_run {
                continue;
            }
            if let Some(packet) = lane.pop(&self.mask) {
                lane.increment_active_workers();
                self.active_total += 1;
                self.mask.mark_start(&packet);
                return Some(packet);
            }
        }
        None
    }

    pub fn mark_finished(&mut self, packet: &PacketData) {
        self.mask.mark_finish(packet);
        self.lanes[packet.priority().index()].decrement_active_workers();
        self.active_total = self.active_total.saturating_sub(1);
    }

    pub fn lane_len(&self, priority: PacketPriority) -> usize {
        self.lanes[priority.index()].len()
    }
}

fn soft_max(total_workers: usize, share: f64) -> usize {
    ((total_workers as f64) * share).floor().max(1.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PacketType;

    fn pkt(id: u64, t: PacketType) -> PacketData {
        let mut p = PacketData::new(t, [0u8; 32], vec![]);
        p.id = id;
        p
    }

    #[test]
    fn high_priority_lane_drains_before_lower_lanes() {
        let mut pq = PriorityQueue::new(4);
        pq.push_back(pkt(1, PacketType::Transaction));
        pq.push_back(pkt(2, PacketType::Vote));
        let first = pq.pop_next().unwrap();
        assert_eq!(first.packet_type, PacketType::Vote);
    }

    #[test]
    fn every_lane_keeps_at_least_one_reserved_worker() {
        // With only 3 total workers every lane's soft max floors to 1, so a
        // packet in any lane can always get a worker even if the others are
        // simultaneously busy.
        let mut pq = PriorityQueue::new(3);
        pq.push_back(pkt(1, PacketType::Vote));
        pq.push_back(pkt(2, PacketType::DagBlock));
        pq.push_back(pkt(3, PacketType::Transaction));
        assert!(pq.pop_next().is_some());
        assert!(pq.pop_next().is_some());
        assert!(pq.pop_next().is_some());
    }

    #[test]
    fn low_lane_can_borrow_spare_capacity() {
        let mut pq = PriorityQueue::new(4);
        pq.push_back(pkt(1, PacketType::Transaction));
        pq.push_back(pkt(2, PacketType::Transaction));
        let first = pq.pop_next().unwrap();
        assert_eq!(first.id, 1);
        let second = pq.pop_next();
        assert!(second.is_some());
    }
}
