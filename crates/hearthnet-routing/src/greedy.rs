//! Greedy forwarding: always move toward the receiver

use tracing::{debug, trace};

use hearthnet_core::{Device, DeviceId, DeviceRegistry, DropReason, Packet};

use crate::strategy::{unvisited_connections, RoutingStrategy, Verdict};

/// Forwards over links to the neighbor geometrically closest to the
/// receiver. Prefers neighbors strictly closer than the current device;
/// when stuck in a local minimum it falls back to the closest unvisited
/// neighbor, which lets the packet climb out of dead ends.
#[derive(Debug, Default)]
pub struct GreedyStrategy;

impl GreedyStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl RoutingStrategy for GreedyStrategy {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn handle(&self, packet: &Packet, current: &Device, registry: &DeviceRegistry) -> Verdict {
        if packet.is_addressed_to(current.id) {
            return Verdict::Deliver;
        }

        // Greedy needs a target position to make progress toward
        let Some(receiver) = packet.receiver.and_then(|id| registry.get(id)) else {
            debug!(packet = %packet.id, "greedy packet without reachable receiver");
            return Verdict::Drop(DropReason::NoRoute);
        };

        let target = receiver.pos;
        let current_distance = current.pos.distance(&target);

        let mut best: Option<(DeviceId, f32)> = None;
        let mut fallback: Option<(DeviceId, f32)> = None;

        for id in unvisited_connections(packet, current) {
            let Some(neighbor) = registry.get(id) else {
                continue;
            };
            let distance = neighbor.pos.distance(&target);
            // Strict comparisons keep ties deterministic: the first
            // neighbor in id order wins
            if distance < current_distance && best.is_none_or(|(_, d)| distance < d) {
                best = Some((id, distance));
            }
            if fallback.is_none_or(|(_, d)| distance < d) {
                fallback = Some((id, distance));
            }
        }

        match best.or(fallback) {
            Some((hop, distance)) => {
                trace!(packet = %packet.id, hop = %hop, distance, "greedy hop chosen");
                Verdict::Forward(vec![hop])
            }
            None => {
                debug!(packet = %packet.id, at = %current.id, "greedy has no unvisited neighbor");
                Verdict::Drop(DropReason::NoRoute)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearthnet_core::{PacketKind, Point};

    fn line_registry() -> (DeviceRegistry, Vec<DeviceId>) {
        let mut registry = DeviceRegistry::new();
        let ids = vec![
            registry.add(Device::hub("a", Point::new(0.0, 0.0)).with_radius(60.0)),
            registry.add(Device::lamp("b", Point::new(50.0, 0.0)).with_radius(60.0)),
            registry.add(Device::lamp("c", Point::new(100.0, 0.0)).with_radius(60.0)),
        ];
        registry.connect(ids[0], ids[1]);
        registry.connect(ids[1], ids[2]);
        (registry, ids)
    }

    #[test]
    fn test_delivers_at_receiver() {
        let (registry, ids) = line_registry();
        let packet = Packet::new(PacketKind::Data, ids[0], Some(ids[2]), vec![], 0);
        let verdict =
            GreedyStrategy.handle(&packet, registry.get(ids[2]).unwrap(), &registry);
        assert_eq!(verdict, Verdict::Deliver);
    }

    #[test]
    fn test_picks_strictly_closer_neighbor() {
        let (registry, ids) = line_registry();
        let packet = Packet::new(PacketKind::Data, ids[0], Some(ids[2]), vec![], 0);
        let verdict =
            GreedyStrategy.handle(&packet, registry.get(ids[0]).unwrap(), &registry);
        assert_eq!(verdict, Verdict::Forward(vec![ids[1]]));
    }

    #[test]
    fn test_falls_back_to_unvisited_when_stuck() {
        // b's only unvisited link points away from the receiver
        let mut registry = DeviceRegistry::new();
        let a = registry.add(Device::hub("a", Point::new(100.0, 0.0)));
        let b = registry.add(Device::lamp("b", Point::new(50.0, 0.0)));
        let c = registry.add(Device::lamp("c", Point::new(0.0, 0.0)));
        let target = registry.add(Device::sensor("t", Point::new(60.0, 0.0)));
        registry.connect(b, c);
        registry.connect(b, a);

        let mut packet = Packet::new(PacketKind::Data, a, Some(target), vec![], 0);
        packet.visited.insert(a);
        // From b, both connections are farther from t than b itself, and a
        // was already visited, so c is the only way out
        let verdict = GreedyStrategy.handle(&packet, registry.get(b).unwrap(), &registry);
        assert_eq!(verdict, Verdict::Forward(vec![c]));
    }

    #[test]
    fn test_drops_when_every_neighbor_was_visited() {
        let (mut registry, ids) = line_registry();
        registry.disconnect(ids[1], ids[2]);
        let mut packet = Packet::new(PacketKind::Data, ids[1], Some(ids[2]), vec![], 0);
        packet.visited.insert(ids[0]);

        let verdict =
            GreedyStrategy.handle(&packet, registry.get(ids[1]).unwrap(), &registry);
        assert_eq!(verdict, Verdict::Drop(DropReason::NoRoute));
    }

    #[test]
    fn test_drops_unaddressed_packets() {
        let (registry, ids) = line_registry();
        let packet = Packet::new(PacketKind::Data, ids[0], None, vec![], 0);
        let verdict =
            GreedyStrategy.handle(&packet, registry.get(ids[0]).unwrap(), &registry);
        assert_eq!(verdict, Verdict::Drop(DropReason::NoRoute));
    }
}
