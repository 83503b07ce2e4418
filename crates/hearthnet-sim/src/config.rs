//! Simulation tuning knobs

use std::time::Duration;

use serde::{Deserialize, Serialize};

use hearthnet_core::DEFAULT_TTL;

/// Configuration for a [`crate::Simulation`].
///
/// The defaults give a fully deterministic run: loss rates are zero, the
/// RNG is seeded, and builds run without pacing delays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Distance covered per tick; travel time is `ceil(distance / speed)`
    pub packet_speed: f32,
    /// Hop budget for new packets
    pub default_ttl: u32,
    /// Whether addressed deliveries answer with an ack by default
    pub confirm_delivery: bool,
    /// Capacity of each device's idempotency cache
    pub idempotency_capacity: usize,
    /// Battery removed per tick from battery-powered devices, before the
    /// per-device drain rate multiplier
    pub battery_drain_per_tick: f64,
    /// Flat chance in `[0, 1]` that any hop loses the packet
    pub base_loss_rate: f64,
    /// Additional loss chance per 100 units of hop distance
    pub distance_loss_rate: f64,
    /// Seed for the engine RNG (loss rolls)
    pub rng_seed: u64,
    /// Upper bound on the number of waves a wave build may run
    pub max_build_waves: u32,
    /// Ticks a build waits for in-flight packets to settle
    pub build_settle_ticks: u32,
    /// Optional real-time delay between build settle ticks, for hosts that
    /// want to animate the build
    pub build_pacing: Option<Duration>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            packet_speed: 50.0,
            default_ttl: DEFAULT_TTL,
            confirm_delivery: false,
            idempotency_capacity: 256,
            battery_drain_per_tick: 0.0,
            base_loss_rate: 0.0,
            distance_loss_rate: 0.0,
            rng_seed: 0,
            max_build_waves: 20,
            build_settle_ticks: 50,
            build_pacing: None,
        }
    }
}

impl SimConfig {
    /// Loss chance for one hop of the given distance
    pub fn loss_chance(&self, distance: f32) -> f64 {
        self.base_loss_rate + self.distance_loss_rate * f64::from(distance) / 100.0
    }
}
