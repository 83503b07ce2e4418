//! # HearthNet Sim
//!
//! The tick-stepped simulation engine: packet scheduling, network builds,
//! and statistics. Sits on top of `hearthnet-core` (devices, packets,
//! events) and `hearthnet-routing` (the routing strategies).
//!
//! ## Key Types
//!
//! - [`Simulation`]: devices, links, in-flight packets, tick counter
//! - [`SimConfig`]: speeds, budgets, loss model, determinism knobs
//! - [`NetworkBuilder`] / [`BuildStrategy`]: the link-establishment protocols
//! - [`StatsCollector`]: event-stream aggregation
//!
//! ## A minimal run
//!
//! ```
//! use hearthnet_core::{Device, PacketKind, Point};
//! use hearthnet_sim::{SimConfig, Simulation};
//!
//! let mut sim = Simulation::new(SimConfig::default());
//! let a = sim.add_device(Device::hub("hub", Point::new(0.0, 0.0)).with_radius(60.0));
//! let b = sim.add_device(Device::lamp("lamp", Point::new(50.0, 0.0)).with_radius(60.0));
//! sim.registry_mut().connect(a, b);
//!
//! sim.create_packet(a, Some(b), PacketKind::Ping, b"PING".to_vec()).unwrap();
//! let summary = sim.tick();
//! assert_eq!(summary.tick, 1);
//! ```

pub mod build;
pub mod config;
pub mod engine;
pub mod logging;
pub mod scheduler;
pub mod stats;

pub use build::{BuildReport, BuildStrategy, CancelFlag, InstantBuild, NetworkBuilder, SproutBuild};
pub use config::SimConfig;
pub use engine::{EventSink, Simulation, TickSummary};
pub use scheduler::FlightQueue;
pub use stats::{DeviceStats, StatsCollector, StatsReport};
