//! Packet identity and priority (spec §6 subprotocol packets), grounded on
//! `network/tarcap/threadpool/packet_data.hpp`'s `PacketData`/`PacketPriority`.

/// A node-level identifier for the peer a packet arrived from or is destined
/// to. The transport that assigns these (libp2p or otherwise) is out of
/// scope here; the thread pool only needs it to order packets per peer.
pub type PeerId = [u8; 32];

/// Every subprotocol packet type this node exchanges with peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PacketType {
    Status,
    Transaction,
    DagBlock,
    PbftBlock,
    Vote,
    VotesSync,
    GetVotesSync,
    DagSync,
    GetDagSync,
    PbftSync,
    GetPbftSync,
    Test,
}

impl PacketType {
    /// The priority lane a packet of this type is dispatched on.
    pub fn priority(self) -> PacketPriority {
        match self {
            PacketType::PbftBlock | PacketType::Vote | PacketType::VotesSync | PacketType::GetVotesSync => {
                PacketPriority::High
            }
            PacketType::DagBlock | PacketType::Status | PacketType::PbftSync | PacketType::GetPbftSync => {
                PacketPriority::Mid
            }
            PacketType::Transaction
            | PacketType::DagSync
            | PacketType::GetDagSync
            | PacketType::Test => PacketPriority::Low,
        }
    }

    /// Sync packet types are mutually exclusive across the whole pool: only
    /// one sync packet, of any of these types, is processed at a time.
    pub fn is_hard_blocking(self) -> bool {
        matches!(self, PacketType::DagSync | PacketType::GetDagSync | PacketType::PbftSync | PacketType::GetPbftSync)
    }
}

/// The three dispatch lanes, in processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketPriority {
    High = 0,
    Mid = 1,
    Low = 2,
}

impl PacketPriority {
    pub const ALL: [PacketPriority; 3] = [PacketPriority::High, PacketPriority::Mid, PacketPriority::Low];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// One inbound or outbound packet as it travels through the thread pool.
/// `id` is assigned by the pool at enqueue time and doubles as the arrival
/// order used by the peer-order and DAG-level blocking masks.
#[derive(Debug, Clone)]
pub struct PacketData {
    pub id: u64,
    pub packet_type: PacketType,
    pub from_peer: PeerId,
    pub payload: Vec<u8>,
    /// DAG level this packet's block is at. Only meaningful for
    /// `PacketType::DagBlock`; `None` for every other type.
    pub dag_level: Option<u64>,
}

impl PacketData {
    pub fn new(packet_type: PacketType, from_peer: PeerId, payload: Vec<u8>) -> Self {
        Self { id: 0, packet_type, from_peer, payload, dag_level: None }
    }

    pub fn with_dag_level(mut self, level: u64) -> Self {
        self.dag_level = Some(level);
        self
    }

    pub fn priority(&self) -> PacketPriority {
        self.packet_type.priority()
    }
}
