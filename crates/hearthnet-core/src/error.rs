//! Error types for the mesh simulator.
//!
//! Per-packet failures (expiry, no route, duplicates) are events, not
//! errors; see [`crate::events::DropReason`]. The types here cover contract
//! violations by the caller and snapshot I/O.

use thiserror::Error;

use crate::device::DeviceId;

/// Hard errors returned by the simulation API
#[derive(Debug, Error)]
pub enum SimError {
    #[error("unknown device: {0}")]
    UnknownDevice(DeviceId),

    #[error("unknown routing strategy: {0}")]
    UnknownStrategy(String),

    #[error("no hub device in the registry")]
    NoHub,

    #[error("a network build is already in progress")]
    BuildInProgress,

    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Failures while saving or restoring a network snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("deserialization failed: {0}")]
    Deserialize(#[source] serde_json::Error),

    #[error("snapshot references unknown device: {0}")]
    UnknownDevice(DeviceId),
}
