//! Network-build protocol: establishing links by exchanging packets.
//!
//! Build strategies drive the same packet substrate as normal traffic.
//! A `NetworkBuild` packet flies directly between two mutually visible
//! devices and its receipt creates the symmetric link, so the built network
//! can never contain a link the radio ranges would not support.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use hearthnet_core::{DeviceId, SimError};

use crate::engine::Simulation;

mod instant;
mod sprout;

pub use instant::InstantBuild;
pub use sprout::SproutBuild;

/// Cooperative cancellation handle shared between a running build and its
/// caller
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Outcome of a build run. A build that could not reach every device is
/// still a successful run; `connected < total` tells the caller how far it
/// got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildReport {
    /// Devices reachable from the hub over links, hub included
    pub connected: usize,
    pub total: usize,
    /// Waves run; zero for single-shot strategies
    pub waves: u32,
    /// False only when the build was cancelled mid-run
    pub complete: bool,
}

/// A protocol for growing the link topology from a hub
#[async_trait]
pub trait BuildStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn build(
        &self,
        sim: &mut Simulation,
        hub: DeviceId,
        cancel: &CancelFlag,
    ) -> BuildReport;
}

/// Runs build strategies one at a time.
///
/// Only one build may be in flight per builder; a second call fails with
/// [`SimError::BuildInProgress`] instead of silently interleaving two
/// protocols over the same topology.
pub struct NetworkBuilder {
    strategies: BTreeMap<&'static str, Arc<dyn BuildStrategy>>,
    active: &'static str,
    building: Arc<AtomicBool>,
    cancel: CancelFlag,
}

struct BuildingGuard(Arc<AtomicBool>);

impl Drop for BuildingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl NetworkBuilder {
    /// Builder with the two built-in strategies, `sprout` active
    pub fn with_defaults() -> Self {
        let mut builder = Self {
            strategies: BTreeMap::new(),
            active: "sprout",
            building: Arc::new(AtomicBool::new(false)),
            cancel: CancelFlag::new(),
        };
        builder.register(Arc::new(InstantBuild::new()));
        builder.register(Arc::new(SproutBuild::new()));
        builder
    }

    pub fn register(&mut self, strategy: Arc<dyn BuildStrategy>) {
        if self.strategies.is_empty() {
            self.active = strategy.name();
        }
        self.strategies.insert(strategy.name(), strategy);
    }

    pub fn strategy_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.strategies.keys().copied()
    }

    pub fn active_name(&self) -> &'static str {
        self.active
    }

    pub fn set_active(&mut self, name: &str) -> Result<(), SimError> {
        let (&key, _) = self
            .strategies
            .get_key_value(name)
            .ok_or_else(|| SimError::UnknownStrategy(name.to_string()))?;
        self.active = key;
        Ok(())
    }

    pub fn is_building(&self) -> bool {
        self.building.load(Ordering::SeqCst)
    }

    /// Ask a running build to stop after its current wave
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run the active strategy from the registry's hub
    pub async fn build(&self, sim: &mut Simulation) -> Result<BuildReport, SimError> {
        let hub = sim.registry().hub().ok_or(SimError::NoHub)?.id;
        let strategy = self
            .strategies
            .get(self.active)
            .cloned()
            .ok_or_else(|| SimError::UnknownStrategy(self.active.to_string()))?;

        if self
            .building
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SimError::BuildInProgress);
        }
        let _guard = BuildingGuard(self.building.clone());
        self.cancel.reset();

        info!(strategy = strategy.name(), hub = %hub, "network build started");
        let report = strategy.build(sim, hub, &self.cancel).await;
        info!(
            connected = report.connected,
            total = report.total,
            waves = report.waves,
            complete = report.complete,
            "network build finished"
        );
        Ok(report)
    }

    /// Cancel any running build and tear down every link
    pub fn clear_connections(&self, sim: &mut Simulation) {
        self.cancel.cancel();
        sim.registry_mut().clear_connections();
    }
}

impl Default for NetworkBuilder {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Tick the simulation until no build packets remain in flight, bounded by
/// the configured settle budget
pub(crate) async fn settle(sim: &mut Simulation, cancel: &CancelFlag) {
    let budget = sim.config().build_settle_ticks;
    let pacing = sim.config().build_pacing;
    for _ in 0..budget {
        if sim.active_packets() == 0 || cancel.is_cancelled() {
            break;
        }
        sim.tick();
        if let Some(delay) = pacing {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use hearthnet_core::{Device, Point};

    #[test]
    fn test_builder_defaults() {
        let builder = NetworkBuilder::with_defaults();
        let names: Vec<_> = builder.strategy_names().collect();
        assert_eq!(names, vec!["instant", "sprout"]);
        assert_eq!(builder.active_name(), "sprout");
        assert!(!builder.is_building());
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let mut builder = NetworkBuilder::with_defaults();
        assert!(matches!(
            builder.set_active("telepathy"),
            Err(SimError::UnknownStrategy(_))
        ));
    }

    #[tokio::test]
    async fn test_build_without_hub_fails() {
        let builder = NetworkBuilder::with_defaults();
        let mut sim = Simulation::new(SimConfig::default());
        sim.add_device(Device::lamp("lonely", Point::new(0.0, 0.0)));

        assert!(matches!(builder.build(&mut sim).await, Err(SimError::NoHub)));
    }

    #[test]
    fn test_reentrancy_guard_blocks_second_entry() {
        let builder = NetworkBuilder::with_defaults();
        // Simulate a build holding the guard
        assert!(builder
            .building
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok());
        assert!(builder.is_building());
        assert!(builder
            .building
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err());

        // Guard release reopens the builder
        drop(BuildingGuard(builder.building.clone()));
        assert!(!builder.is_building());
    }

    #[tokio::test]
    async fn test_second_build_call_is_rejected_while_running() {
        let builder = NetworkBuilder::with_defaults();
        let mut sim = Simulation::new(SimConfig::default());
        sim.add_device(Device::hub("h", Point::new(0.0, 0.0)));

        builder.building.store(true, Ordering::SeqCst);
        assert!(matches!(
            builder.build(&mut sim).await,
            Err(SimError::BuildInProgress)
        ));
        builder.building.store(false, Ordering::SeqCst);
    }

    #[test]
    fn test_cancel_flag() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
        flag.cancel();
        assert!(flag.is_cancelled());
        flag.reset();
        assert!(!flag.is_cancelled());
    }
}
