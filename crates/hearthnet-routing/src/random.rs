//! Random walk forwarding

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use hearthnet_core::{Device, DeviceRegistry, DropReason, Packet};

use crate::strategy::{unvisited_connections, RoutingStrategy, Verdict};

/// Hands the packet to a uniformly random connected neighbor, preferring
/// unvisited ones. When every neighbor has been visited it picks among all
/// of them and lets the TTL bound the walk.
#[derive(Debug)]
pub struct RandomStrategy {
    rng: Mutex<StdRng>,
}

impl RandomStrategy {
    pub fn new() -> Self {
        Self::seeded(rand::rng().random())
    }

    /// Fixed-seed walk for reproducible tests
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl RoutingStrategy for RandomStrategy {
    fn name(&self) -> &'static str {
        "random"
    }

    fn handle(&self, packet: &Packet, current: &Device, _registry: &DeviceRegistry) -> Verdict {
        if packet.is_addressed_to(current.id) {
            return Verdict::Deliver;
        }

        let mut candidates = unvisited_connections(packet, current);
        if candidates.is_empty() {
            candidates = current.connections.iter().copied().collect();
        }
        if candidates.is_empty() {
            debug!(packet = %packet.id, at = %current.id, "random walk has nowhere to go");
            return Verdict::Drop(DropReason::NoConnections);
        }

        let index = self
            .rng
            .lock()
            .expect("rng mutex poisoned")
            .random_range(0..candidates.len());
        let hop = candidates[index];
        trace!(packet = %packet.id, hop = %hop, "random hop chosen");
        Verdict::Forward(vec![hop])
    }
}
