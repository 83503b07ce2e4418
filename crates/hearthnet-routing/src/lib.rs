//! # HearthNet Routing
//!
//! Routing strategies applied when a packet arrives at a device. Each
//! strategy is a pure policy over the packet and the device registry; the
//! simulation engine executes the returned [`Verdict`].
//!
//! ## Strategies
//!
//! - [`BroadcastStrategy`]: flood over links, raw-visibility fallback
//! - [`ConnectionBasedStrategy`]: flood strictly over links
//! - [`DirectStrategy`]: direct link or closest connected neighbor
//! - [`GreedyStrategy`]: geometric progress toward the receiver
//! - [`RandomStrategy`]: random walk, seedable

pub mod broadcast;
pub mod connection;
pub mod direct;
pub mod greedy;
pub mod random;
pub mod registry;
pub mod strategy;

pub use broadcast::BroadcastStrategy;
pub use connection::ConnectionBasedStrategy;
pub use direct::DirectStrategy;
pub use greedy::GreedyStrategy;
pub use random::RandomStrategy;
pub use registry::StrategyRegistry;
pub use strategy::{RoutingStrategy, Verdict};
