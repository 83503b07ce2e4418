//! Wave build: the network grows outward from the hub

use async_trait::async_trait;
use tracing::debug;

use hearthnet_core::{DeviceId, PacketKind, SimEvent};

use crate::engine::Simulation;

use super::{settle, BuildReport, BuildStrategy, CancelFlag};

/// Grows the network in waves. Each wave, every device already reachable
/// from the hub sends a `NetworkBuild` packet to each visible device that
/// is not reachable yet, then the wave settles before the next one starts.
/// The build stops when the mesh is fully connected, when a wave makes no
/// progress, or when the wave budget runs out; devices out of visibility
/// range of the grown network simply stay unconnected.
#[derive(Debug, Default)]
pub struct SproutBuild;

impl SproutBuild {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BuildStrategy for SproutBuild {
    fn name(&self) -> &'static str {
        "sprout"
    }

    async fn build(
        &self,
        sim: &mut Simulation,
        hub: DeviceId,
        cancel: &CancelFlag,
    ) -> BuildReport {
        let total = sim.registry().len();
        let max_waves = sim.config().max_build_waves;
        let mut wave = 0;
        let mut prev_connected = 0;

        while wave < max_waves && !cancel.is_cancelled() {
            wave += 1;

            let connected_set = sim.registry().connected_component(hub);
            let mut sends: Vec<(DeviceId, DeviceId)> = Vec::new();
            for &device in &connected_set {
                for neighbor in sim.registry().visible_neighbors(device) {
                    if !connected_set.contains(&neighbor) {
                        sends.push((device, neighbor));
                    }
                }
            }

            if sends.is_empty() {
                debug!(wave, "no unreached visible neighbors, build settled");
                break;
            }

            debug!(wave, packets = sends.len(), "build wave sending");
            for (from, to) in sends {
                let _ = sim.create_packet(from, Some(to), PacketKind::NetworkBuild, Vec::new());
            }

            settle(sim, cancel).await;

            let connected = sim.registry().connected_component(hub).len();
            // Interim wave report; only the terminal event carries `complete`
            sim.emit(SimEvent::BuildProgress {
                strategy: self.name().to_string(),
                connected,
                total,
                wave,
                complete: false,
                tick: sim.current_tick(),
            });

            // A wave that connected nobody will never make progress later
            if connected == prev_connected || connected >= total {
                break;
            }
            prev_connected = connected;
        }

        let connected = sim.registry().connected_component(hub).len();
        let complete = !cancel.is_cancelled();
        sim.emit(SimEvent::BuildProgress {
            strategy: self.name().to_string(),
            connected,
            total,
            wave,
            complete,
            tick: sim.current_tick(),
        });

        BuildReport {
            connected,
            total,
            waves: wave,
            complete,
        }
    }
}
