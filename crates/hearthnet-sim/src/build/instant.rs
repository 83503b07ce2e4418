//! Single-shot build: one packet per visible pair

use async_trait::async_trait;
use tracing::debug;

use hearthnet_core::{DeviceId, PacketKind, SimEvent};

use crate::engine::Simulation;

use super::{settle, BuildReport, BuildStrategy, CancelFlag};

/// Sends one `NetworkBuild` packet for every mutually visible pair, then
/// waits for the packets to land. The resulting topology mirrors the
/// visibility graph exactly, including links between devices the hub can
/// never reach.
#[derive(Debug, Default)]
pub struct InstantBuild;

impl InstantBuild {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BuildStrategy for InstantBuild {
    fn name(&self) -> &'static str {
        "instant"
    }

    async fn build(
        &self,
        sim: &mut Simulation,
        hub: DeviceId,
        cancel: &CancelFlag,
    ) -> BuildReport {
        let total = sim.registry().len();
        let pairs = sim.registry().visibility_pairs();
        debug!(pairs = pairs.len(), "instant build sending pair packets");

        for (a, b) in pairs {
            // Pairs come back canonically ordered, so each link is
            // requested exactly once
            let _ = sim.create_packet(a, Some(b), PacketKind::NetworkBuild, Vec::new());
        }

        settle(sim, cancel).await;

        let connected = sim.registry().connected_component(hub).len();
        let complete = !cancel.is_cancelled();
        sim.emit(SimEvent::BuildProgress {
            strategy: self.name().to_string(),
            connected,
            total,
            wave: 0,
            complete,
            tick: sim.current_tick(),
        });

        BuildReport {
            connected,
            total,
            waves: 0,
            complete,
        }
    }
}
