//! Direct forwarding: use the link to the receiver when it exists

use tracing::{debug, trace};

use hearthnet_core::{Device, DeviceId, DeviceRegistry, DropReason, Packet};

use crate::strategy::{RoutingStrategy, Verdict};

/// Sends straight to the receiver over an existing link, otherwise to the
/// connected neighbor closest to the receiver. Deliberately ignores the
/// visited trace; with a reasonable TTL this keeps the packet pushing
/// toward the receiver even across briefly-looping paths.
#[derive(Debug, Default)]
pub struct DirectStrategy;

impl DirectStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl RoutingStrategy for DirectStrategy {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn handle(&self, packet: &Packet, current: &Device, registry: &DeviceRegistry) -> Verdict {
        if packet.is_addressed_to(current.id) {
            return Verdict::Deliver;
        }

        let Some(receiver_id) = packet.receiver else {
            debug!(packet = %packet.id, "direct packet without receiver");
            return Verdict::Drop(DropReason::NoRoute);
        };

        if current.is_connected_to(receiver_id) {
            trace!(packet = %packet.id, hop = %receiver_id, "direct link to receiver");
            return Verdict::Forward(vec![receiver_id]);
        }

        let Some(receiver) = registry.get(receiver_id) else {
            return Verdict::Drop(DropReason::NoRoute);
        };
        let target = receiver.pos;

        let mut closest: Option<(DeviceId, f32)> = None;
        for &id in &current.connections {
            let Some(neighbor) = registry.get(id) else {
                continue;
            };
            let distance = neighbor.pos.distance(&target);
            if closest.is_none_or(|(_, d)| distance < d) {
                closest = Some((id, distance));
            }
        }

        match closest {
            Some((hop, distance)) => {
                trace!(packet = %packet.id, hop = %hop, distance, "closest neighbor chosen");
                Verdict::Forward(vec![hop])
            }
            None => {
                debug!(packet = %packet.id, at = %current.id, "no connected neighbors");
                Verdict::Drop(DropReason::NoRoute)
            }
        }
    }
}
