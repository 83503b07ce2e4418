//! The routing strategy contract

use hearthnet_core::{Device, DeviceId, DeviceRegistry, DropReason, Packet};

/// What a strategy decided to do with an arrived packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Accept the packet at the current device
    Deliver,
    /// Hand the packet on to these devices, one derived instance each
    Forward(Vec<DeviceId>),
    /// Accept locally and keep the packet moving (unaddressed floods)
    DeliverAndForward(Vec<DeviceId>),
    /// Discard the instance
    Drop(DropReason),
}

impl Verdict {
    pub fn forward(hops: Vec<DeviceId>) -> Self {
        Verdict::Forward(hops)
    }

    pub fn is_delivery(&self) -> bool {
        matches!(self, Verdict::Deliver | Verdict::DeliverAndForward(_))
    }

    /// The hops this verdict sends the packet to, if any
    pub fn next_hops(&self) -> &[DeviceId] {
        match self {
            Verdict::Forward(hops) | Verdict::DeliverAndForward(hops) => hops,
            _ => &[],
        }
    }
}

/// A routing policy applied when a packet arrives at a device.
///
/// Strategies are pure: they read the packet and the registry and return a
/// [`Verdict`]. The engine owns all side effects (deriving hop instances,
/// idempotency checks, event emission), so the same strategy object can be
/// shared across simulations.
pub trait RoutingStrategy: Send + Sync {
    /// Stable name used for registry lookup
    fn name(&self) -> &'static str;

    fn handle(&self, packet: &Packet, current: &Device, registry: &DeviceRegistry) -> Verdict;
}

/// Connected neighbors not yet on the packet's path, in id order
pub(crate) fn unvisited_connections(packet: &Packet, current: &Device) -> Vec<DeviceId> {
    current
        .connections
        .iter()
        .copied()
        .filter(|&id| !packet.was_visited(id))
        .collect()
}
