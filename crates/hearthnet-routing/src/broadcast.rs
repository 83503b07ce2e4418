//! Flooding over links, with a raw-visibility fallback

use tracing::{debug, trace};

use hearthnet_core::{Device, DeviceId, DeviceRegistry, DropReason, Packet};

use crate::strategy::{unvisited_connections, RoutingStrategy, Verdict};

/// Floods the packet to every unvisited neighbor. An unaddressed packet is
/// accepted at each device it reaches and keeps flooding, which makes it a
/// mesh-wide announcement. A device with no links at all falls back to
/// flooding over raw visibility, so broadcast still works before any
/// network build has run.
#[derive(Debug, Default)]
pub struct BroadcastStrategy;

impl BroadcastStrategy {
    pub fn new() -> Self {
        Self
    }

    fn flood_set(packet: &Packet, current: &Device, registry: &DeviceRegistry) -> Vec<DeviceId> {
        let mut hops = unvisited_connections(packet, current);
        if hops.is_empty() && current.connections.is_empty() {
            hops = registry
                .visible_neighbors(current.id)
                .into_iter()
                .filter(|&id| !packet.was_visited(id))
                .collect();
            if !hops.is_empty() {
                trace!(at = %current.id, "no links, flooding over visibility");
            }
        }
        hops
    }
}

impl RoutingStrategy for BroadcastStrategy {
    fn name(&self) -> &'static str {
        "broadcast"
    }

    fn handle(&self, packet: &Packet, current: &Device, registry: &DeviceRegistry) -> Verdict {
        if packet.is_addressed_to(current.id) {
            return Verdict::Deliver;
        }

        let hops = Self::flood_set(packet, current, registry);

        if packet.is_broadcast() {
            // Accept here and keep the announcement moving
            return Verdict::DeliverAndForward(hops);
        }

        if hops.is_empty() {
            debug!(packet = %packet.id, at = %current.id, "flood exhausted before receiver");
            return Verdict::Drop(DropReason::NoRoute);
        }
        Verdict::Forward(hops)
    }
}
