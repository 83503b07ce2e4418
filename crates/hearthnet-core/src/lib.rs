//! # HearthNet Core
//!
//! Foundational types for the HearthNet mesh simulator: devices on a plane,
//! derived visibility, symmetric link topology, per-hop packet instances,
//! lifecycle events, and the JSON snapshot format.
//!
//! ## Key Types
//!
//! - [`Device`] / [`DeviceKind`]: a hub, lamp, or sensor with position,
//!   range, and battery state
//! - [`DeviceRegistry`]: owner of all devices and their links; visibility
//!   queries are computed, never cached
//! - [`Packet`]: one hop instance of a message; forwarding derives fresh
//!   instances instead of mutating in place
//! - [`SimEvent`] / [`DropReason`]: everything observable about a run
//! - [`NetworkSnapshot`]: persisted device state and topology

pub mod device;
pub mod error;
pub mod events;
pub mod geometry;
pub mod packet;
pub mod presets;
pub mod registry;
pub mod snapshot;

pub use device::{Device, DeviceId, DeviceKind, IdempotencyCache, PowerSource};
pub use error::{SimError, SnapshotError};
pub use events::{DropReason, SimEvent};
pub use geometry::Point;
pub use packet::{IdempotencyKey, Packet, PacketId, PacketKind, DEFAULT_TTL};
pub use registry::DeviceRegistry;
pub use snapshot::{DeviceSnapshot, NetworkSnapshot};
