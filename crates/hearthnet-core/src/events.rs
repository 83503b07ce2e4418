//! Lifecycle events emitted by the simulation

use serde::{Deserialize, Serialize};

use crate::device::DeviceId;
use crate::packet::{IdempotencyKey, PacketId, PacketKind};

/// Why a packet was discarded without reaching its receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DropReason {
    /// Hop budget ran out in flight. The engine reports expiry through
    /// [`SimEvent::PacketExpired`] rather than a `PacketDropped` carrying
    /// this reason.
    TtlExpired,
    /// The strategy found no candidate hop that makes progress
    NoRoute,
    /// The holding device has no links at all
    NoConnections,
    /// The receiver had already accepted this idempotency key
    Duplicate,
}

impl std::fmt::Display for DropReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DropReason::TtlExpired => "ttl expired",
            DropReason::NoRoute => "no route available",
            DropReason::NoConnections => "no connected neighbors",
            DropReason::Duplicate => "duplicate delivery",
        };
        write!(f, "{s}")
    }
}

/// Everything observable about a running simulation.
///
/// Events fire synchronously during tick processing; subscribers must not
/// block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SimEvent {
    /// A logical message entered the mesh
    PacketCreated {
        packet: PacketId,
        idempotency: IdempotencyKey,
        kind: PacketKind,
        sender: DeviceId,
        receiver: Option<DeviceId>,
        tick: u64,
    },
    /// A hop instance completed a link crossing and arrived at a device
    PacketForwarded {
        packet: PacketId,
        idempotency: IdempotencyKey,
        from: DeviceId,
        to: DeviceId,
        tick: u64,
    },
    /// First acceptance of a message at a device
    PacketDelivered {
        packet: PacketId,
        idempotency: IdempotencyKey,
        kind: PacketKind,
        device: DeviceId,
        hop_count: u32,
        /// Ticks elapsed since the message was first sent
        latency_ticks: u64,
        tick: u64,
    },
    /// TTL reached zero; the instance was discarded before any handler ran
    PacketExpired {
        packet: PacketId,
        idempotency: IdempotencyKey,
        at: DeviceId,
        tick: u64,
    },
    /// A strategy or the engine discarded the instance
    PacketDropped {
        packet: PacketId,
        idempotency: IdempotencyKey,
        at: DeviceId,
        reason: DropReason,
        tick: u64,
    },
    /// The instance was lost in flight: the link broke or random loss hit
    PacketLost {
        packet: PacketId,
        idempotency: IdempotencyKey,
        from: DeviceId,
        to: DeviceId,
        distance: f32,
        tick: u64,
    },
    /// A network build finished a wave or settled. `complete` is false on
    /// interim wave reports; each build emits exactly one terminal event,
    /// where `complete` means the build ran to its end without being
    /// cancelled (partial connectivity still counts as complete).
    BuildProgress {
        strategy: String,
        connected: usize,
        total: usize,
        wave: u32,
        complete: bool,
        tick: u64,
    },
}

impl SimEvent {
    /// Tick the event fired on
    pub fn tick(&self) -> u64 {
        match self {
            SimEvent::PacketCreated { tick, .. }
            | SimEvent::PacketForwarded { tick, .. }
            | SimEvent::PacketDelivered { tick, .. }
            | SimEvent::PacketExpired { tick, .. }
            | SimEvent::PacketDropped { tick, .. }
            | SimEvent::PacketLost { tick, .. }
            | SimEvent::BuildProgress { tick, .. } => *tick,
        }
    }
}
