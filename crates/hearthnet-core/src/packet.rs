//! Packet types for tick-stepped delivery across the mesh

use std::collections::BTreeSet;
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::device::DeviceId;

/// Default hop budget for a new packet
pub const DEFAULT_TTL: u32 = 16;

/// Unique identifier for one in-flight packet instance.
///
/// Every hop produces a fresh instance with a fresh id; the logical
/// message is tracked by [`IdempotencyKey`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PacketId(pub Uuid);

impl PacketId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for PacketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.0.simple().to_string();
        write!(f, "{}", &s[..8])
    }
}

/// Identity of a logical message, shared by all hop instances of it
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(pub Uuid);

impl IdempotencyKey {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for IdempotencyKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.0.simple().to_string();
        write!(f, "{}", &s[..8])
    }
}

/// What a packet carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PacketKind {
    Ping,
    /// Delivery confirmation travelling back toward the original sender
    Ack,
    Data,
    /// Link-establishment packet; travels on raw visibility and bypasses routing
    NetworkBuild,
    /// Actuator command, e.g. lamp on/off
    Command,
    SensorReading,
}

impl Display for PacketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PacketKind::Ping => "ping",
            PacketKind::Ack => "ack",
            PacketKind::Data => "data",
            PacketKind::NetworkBuild => "network-build",
            PacketKind::Command => "command",
            PacketKind::SensorReading => "sensor-reading",
        };
        write!(f, "{s}")
    }
}

/// A packet instance at a single hop.
///
/// Forwarding never mutates an existing instance in place: each hop calls
/// [`Packet::derive_next_hop`], which produces a sibling-safe clone with its
/// own id and its own copy of the visited trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Packet {
    pub id: PacketId,
    pub idempotency: IdempotencyKey,
    pub kind: PacketKind,
    /// Original sender
    pub sender: DeviceId,
    /// Final destination; `None` means "accept anywhere it lands"
    pub receiver: Option<DeviceId>,
    pub payload: Vec<u8>,
    /// Remaining hop budget, decremented once per completed hop
    pub ttl: u32,
    pub hop_count: u32,
    /// Device currently holding or sending this instance
    pub current_holder: DeviceId,
    /// Where this instance is inbound to, once routing has picked a hop
    pub next_hop: Option<DeviceId>,
    /// Tick at which this instance was created
    pub created_tick: u64,
    /// Tick at which the logical message was first sent
    pub origin_tick: u64,
    /// Whether the receiver should answer with an [`PacketKind::Ack`]
    pub confirm_delivery: bool,
    /// False for acks travelling back toward the sender
    pub forward_direction: bool,
    /// Devices that have held some instance of this message on this path
    pub visited: BTreeSet<DeviceId>,
}

impl Packet {
    pub fn new(
        kind: PacketKind,
        sender: DeviceId,
        receiver: Option<DeviceId>,
        payload: Vec<u8>,
        tick: u64,
    ) -> Self {
        let mut visited = BTreeSet::new();
        visited.insert(sender);

        Self {
            id: PacketId::random(),
            idempotency: IdempotencyKey::random(),
            kind,
            sender,
            receiver,
            payload,
            ttl: DEFAULT_TTL,
            hop_count: 0,
            current_holder: sender,
            next_hop: None,
            created_tick: tick,
            origin_tick: tick,
            confirm_delivery: false,
            forward_direction: true,
            visited,
        }
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_confirm_delivery(mut self, confirm: bool) -> Self {
        self.confirm_delivery = confirm;
        self
    }

    /// Derive the instance that will travel from `via` to `hop`.
    ///
    /// The clone gets a fresh [`PacketId`] and an owned copy of the visited
    /// trace including `via`, so sibling clones fanned out by a flood never
    /// share trace state. TTL is untouched here; the scheduler charges it
    /// on arrival.
    pub fn derive_next_hop(&self, via: DeviceId, hop: DeviceId, tick: u64) -> Self {
        let mut visited = self.visited.clone();
        visited.insert(via);

        Self {
            id: PacketId::random(),
            idempotency: self.idempotency,
            kind: self.kind,
            sender: self.sender,
            receiver: self.receiver,
            payload: self.payload.clone(),
            ttl: self.ttl,
            hop_count: self.hop_count + 1,
            current_holder: via,
            next_hop: Some(hop),
            created_tick: tick,
            origin_tick: self.origin_tick,
            confirm_delivery: self.confirm_delivery,
            forward_direction: self.forward_direction,
            visited,
        }
    }

    /// Build the confirmation answering this packet, addressed back to its
    /// sender from `at`. The ack gets a fresh `ttl` so it can retrace a
    /// forward path that consumed most of the original budget.
    pub fn make_ack(&self, at: DeviceId, ttl: u32, tick: u64) -> Self {
        let mut ack = Packet::new(PacketKind::Ack, at, Some(self.sender), Vec::new(), tick);
        ack.forward_direction = false;
        ack.ttl = ttl.max(self.ttl);
        ack
    }

    pub fn was_visited(&self, device: DeviceId) -> bool {
        self.visited.contains(&device)
    }

    /// Whether `device` is where this packet should be accepted
    pub fn is_addressed_to(&self, device: DeviceId) -> bool {
        self.receiver == Some(device)
    }

    pub fn is_broadcast(&self) -> bool {
        self.receiver.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<DeviceId> {
        (0..n).map(|_| DeviceId::random()).collect()
    }

    #[test]
    fn test_packet_creation() {
        let d = ids(2);
        let packet = Packet::new(PacketKind::Data, d[0], Some(d[1]), b"hi".to_vec(), 3);

        assert_eq!(packet.ttl, DEFAULT_TTL);
        assert_eq!(packet.hop_count, 0);
        assert_eq!(packet.current_holder, d[0]);
        assert!(packet.was_visited(d[0]));
        assert!(!packet.was_visited(d[1]));
        assert!(packet.forward_direction);
    }

    #[test]
    fn test_derive_next_hop_is_a_fresh_instance() {
        let d = ids(3);
        let packet = Packet::new(PacketKind::Data, d[0], Some(d[2]), vec![], 0);
        let hop = packet.derive_next_hop(d[0], d[1], 1);

        assert_ne!(hop.id, packet.id);
        assert_eq!(hop.idempotency, packet.idempotency);
        assert_eq!(hop.hop_count, 1);
        assert_eq!(hop.next_hop, Some(d[1]));
        assert_eq!(hop.origin_tick, 0);
        assert_eq!(hop.created_tick, 1);
    }

    #[test]
    fn test_sibling_clones_do_not_share_trace() {
        let d = ids(4);
        let packet = Packet::new(PacketKind::Data, d[0], None, vec![], 0);

        let mut left = packet.derive_next_hop(d[0], d[1], 1);
        let right = packet.derive_next_hop(d[0], d[2], 1);

        left.visited.insert(d[3]);
        assert!(!right.was_visited(d[3]));
    }

    #[test]
    fn test_ack_reverses_direction() {
        let d = ids(2);
        let packet = Packet::new(PacketKind::Command, d[0], Some(d[1]), vec![1], 5)
            .with_confirm_delivery(true);
        let ack = packet.make_ack(d[1], DEFAULT_TTL, 7);

        assert_eq!(ack.kind, PacketKind::Ack);
        assert_eq!(ack.sender, d[1]);
        assert_eq!(ack.receiver, Some(d[0]));
        assert!(!ack.forward_direction);
        assert!(!ack.confirm_delivery);
    }

    #[test]
    fn test_ack_carries_the_requested_hop_budget() {
        let d = ids(2);
        let mut packet = Packet::new(PacketKind::Data, d[0], Some(d[1]), vec![], 0)
            .with_ttl(40)
            .with_confirm_delivery(true);
        packet.ttl = 3;

        let ack = packet.make_ack(d[1], 40, 9);
        assert_eq!(ack.ttl, 40);
    }
}
