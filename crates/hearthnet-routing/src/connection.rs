//! Flooding restricted to established links

use tracing::debug;

use hearthnet_core::{Device, DeviceRegistry, DropReason, Packet};

use crate::strategy::{unvisited_connections, RoutingStrategy, Verdict};

/// Floods to every unvisited connected neighbor and nothing else. Unlike
/// [`crate::BroadcastStrategy`] there is no visibility fallback: a device
/// outside the built network is unreachable, which makes this strategy a
/// probe of what the build actually established.
#[derive(Debug, Default)]
pub struct ConnectionBasedStrategy;

impl ConnectionBasedStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl RoutingStrategy for ConnectionBasedStrategy {
    fn name(&self) -> &'static str {
        "connection-based"
    }

    fn handle(&self, packet: &Packet, current: &Device, _registry: &DeviceRegistry) -> Verdict {
        if packet.is_addressed_to(current.id) {
            return Verdict::Deliver;
        }

        let hops = unvisited_connections(packet, current);

        if packet.is_broadcast() {
            return Verdict::DeliverAndForward(hops);
        }

        if hops.is_empty() {
            debug!(packet = %packet.id, at = %current.id, "no unvisited links left");
            return Verdict::Drop(if current.connections.is_empty() {
                DropReason::NoConnections
            } else {
                DropReason::NoRoute
            });
        }
        Verdict::Forward(hops)
    }
}
