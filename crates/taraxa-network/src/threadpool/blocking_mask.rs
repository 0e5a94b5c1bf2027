//! Four independent blocking rules gating which queued packet a worker may
//! pick up next, grounded on `packets_blocking_mask.hpp`'s `PacketsBlockingMask`.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use crate::packet::{PacketData, PacketType, PeerId};

/// Which packet type must fully drain before `Transaction` packets that
/// arrived earlier are let through to later `DagBlock` packets from the same
/// peer. Taraxa's only peer-order dependency (spec §4.H): a DAG-block
/// packet from peer `p` must not be processed ahead of transaction packets
/// `p` sent first.
fn peer_order_blocking_type(t: PacketType) -> Option<PacketType> {
    match t {
        PacketType::DagBlock => Some(PacketType::Transaction),
        _ => None,
    }
}

#[derive(Default)]
pub struct PacketsBlockingMask {
    /// hard-blocking packet type -> ids currently in flight.
    hard_in_flight: HashMap<PacketType, HashSet<u64>>,
    /// blocking type -> peer -> ids of that type in flight from that peer.
    peer_order_in_flight: HashMap<PacketType, HashMap<PeerId, BTreeSet<u64>>>,
    /// DAG level -> ids of `DagBlock` packets at that level in flight.
    processing_dag_levels: BTreeMap<u64, HashSet<u64>>,
}

impl PacketsBlockingMask {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_blocked(&self, packet: &PacketData) -> bool {
        self.is_hard_blocked(packet)
            || self.is_peer_order_blocked(packet)
            || self.is_dag_level_blocked(packet)
            || self.is_blocked_by_sync(packet)
    }

    /// Register a packet as having started processing: update whichever
    /// masks apply so later `is_blocked` checks see it as in flight.
    pub fn mark_start(&mut self, packet: &PacketData) {
        if packet.packet_type.is_hard_blocking() {
            self.hard_in_flight.entry(packet.packet_type).or_default().insert(packet.id);
        }
        if packet_is_peer_order_blocker(packet.packet_type) {
            self.peer_order_in_flight
                .entry(packet.packet_type)
                .or_default()
                .entry(packet.from_peer)
                .or_default()
                .insert(packet.id);
        }
        if packet.packet_type == PacketType::DagBlock {
            if let Some(level) = packet.dag_level {
                self.processing_dag_levels.entry(level).or_default().insert(packet.id);
            }
        }
    }

    pub fn mark_finish(&mut self, packet: &PacketData) {
        if let Some(ids) = self.hard_in_flight.get_mut(&packet.packet_type) {
            ids.remove(&packet.id);
        }
        if packet_is_peer_order_blocker(packet.packet_type) {
            if let Some(by_peer) = self.peer_order_in_flight.get_mut(&packet.packet_type) {
                if let Some(ids) = by_peer.get_mut(&packet.from_peer) {
                    ids.remove(&packet.id);
                }
            }
        }
        if packet.packet_type == PacketType::DagBlock {
            if let Some(level) = packet.dag_level {
                if let Some(ids) = self.processing_dag_levels.get_mut(&level) {
                    ids.remove(&packet.id);
                    if ids.is_empty() {
                        self.processing_dag_levels.remove(&level);
                    }
                }
            }
        }
    }

    /// Blocked while any hard-blocking type (including this one) has a
    /// packet already in flight: sync packets are globally serialized.
    fn is_hard_blocked(&self, packet: &PacketData) -> bool {
        if !packet.packet_type.is_hard_blocking() {
            return false;
        }
        self.hard_in_flight.values().any(|ids| !ids.is_empty())
    }

    /// Blocked while an earlier-arrived packet of the blocking type from the
    /// same peer is still in flight.
    fn is_peer_order_blocked(&self, packet: &PacketData) -> bool {
        let Some(blocking_type) = peer_order_blocking_type(packet.packet_type) else { return false };
        let Some(by_peer) = self.peer_order_in_flight.get(&blocking_type) else { return false };
        let Some(ids) = by_peer.get(&packet.from_peer) else { return false };
        ids.iter().any(|id| *id < packet.id)
    }

    /// `DagBlock` packets wait out any in-flight sync packet (spec §8
    /// scenario 5: a dag block must not start before an in-flight dag sync
    /// finishes) — a new block may reorder the chain a sync is still
    /// catching up on.
    fn is_blocked_by_sync(&self, packet: &PacketData) -> bool {
        if packet.packet_type != PacketType::DagBlock {
            return false;
        }
        self.hard_in_flight.values().any(|ids| !ids.is_empty())
    }

    /// A DAG-block packet is only eligible once the lowest level currently
    /// being processed catches up to (or passes) its own level: burst-drain
    /// the oldest level, then advance.
    fn is_dag_level_blocked(&self, packet: &PacketData) -> bool {
        if packet.packet_type != PacketType::DagBlock {
            return false;
        }
        let Some(level) = packet.dag_level else { return false };
        match self.processing_dag_levels.keys().next() {
            Some(&min_level) => level > min_level,
            None => false,
        }
    }
}

fn packet_is_peer_order_blocker(t: PacketType) -> bool {
    t == PacketType::Transaction
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkt(id: u64, t: PacketType, peer: PeerId) -> PacketData {
        let mut p = PacketData::new(t, peer, vec![]);
        p.id = id;
        p
    }

    #[test]
    fn hard_blocking_types_are_mutually_exclusive() {
        let mut mask = PacketsBlockingMask::new();
        let sync = pkt(1, PacketType::DagSync, [0u8; 32]);
        mask.mark_start(&sync);
        let other_sync = pkt(2, PacketType::PbftSync, [0u8; 32]);
        assert!(mask.is_blocked(&other_sync));
        mask.mark_finish(&sync);
        assert!(!mask.is_blocked(&other_sync));
    }

    #[test]
    fn dag_block_waits_for_earlier_transaction_from_same_peer() {
        let mut mask = PacketsBlockingMask::new();
        let peer = [7u8; 32];
        let tx = pkt(1, PacketType::Transaction, peer);
        mask.mark_start(&tx);
        let dag = pkt(2, PacketType::DagBlock, peer).with_dag_level(0);
        assert!(mask.is_blocked(&dag));
        mask.mark_finish(&tx);
        assert!(!mask.is_blocked(&dag));
    }

    #[test]
    fn dag_block_waits_for_in_flight_dag_sync_from_any_peer() {
        let mut mask = PacketsBlockingMask::new();
        let sync = pkt(1, PacketType::DagSync, [9u8; 32]);
        mask.mark_start(&sync);
        let dag = pkt(2, PacketType::DagBlock, [7u8; 32]).with_dag_level(0);
        assert!(mask.is_blocked(&dag));
        mask.mark_finish(&sync);
        assert!(!mask.is_blocked(&dag));
    }

    #[test]
    fn dag_block_blocked_until_lower_level_drains() {
        let mut mask = PacketsBlockingMask::new();
        let low = pkt(1, PacketType::DagBlock, [1u8; 32]).with_dag_level(1);
        mask.mark_start(&low);
        let high = pkt(2, PacketType::DagBlock, [2u8; 32]).with_dag_level(2);
        assert!(mask.is_dag_level_blocked(&high));
        mask.mark_finish(&low);
        assert!(!mask.is_dag_level_blocked(&high));
    }
}
