//! JSON snapshot of device state and topology.
//!
//! A snapshot captures positions, device state, and the established links,
//! so a saved network can be rehydrated without re-running the build
//! protocol. In-flight packets are deliberately not part of the format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::device::{Device, DeviceId, DeviceKind, PowerSource};
use crate::error::SnapshotError;
use crate::geometry::Point;
use crate::registry::DeviceRegistry;

/// Persisted form of a single device
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSnapshot {
    pub id: DeviceId,
    pub name: String,
    #[serde(flatten)]
    pub kind: DeviceKind,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    pub power: PowerSource,
    pub battery_level: f64,
    pub battery_drain_rate: f64,
}

impl DeviceSnapshot {
    pub fn of(device: &Device) -> Self {
        Self {
            id: device.id,
            name: device.name.clone(),
            kind: device.kind.clone(),
            x: device.pos.x,
            y: device.pos.y,
            radius: device.radius,
            power: device.power,
            battery_level: device.battery_level,
            battery_drain_rate: device.battery_drain_rate,
        }
    }

    fn into_device(self) -> Device {
        let mut device = Device::new(self.name, Point::new(self.x, self.y), self.kind);
        device.id = self.id;
        device.radius = self.radius;
        device.power = self.power;
        device.battery_level = self.battery_level;
        device.battery_drain_rate = self.battery_drain_rate;
        device
    }
}

/// Persisted form of the whole network
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSnapshot {
    pub devices: Vec<DeviceSnapshot>,
    /// Established links, one entry per pair
    pub connections: Vec<(DeviceId, DeviceId)>,
    pub saved_at: DateTime<Utc>,
}

impl NetworkSnapshot {
    /// Capture the current registry state
    pub fn capture(registry: &DeviceRegistry) -> Self {
        let devices = registry.iter().map(DeviceSnapshot::of).collect();
        let mut connections = Vec::new();
        for device in registry.iter() {
            for &peer in &device.connections {
                if device.id < peer {
                    connections.push((device.id, peer));
                }
            }
        }
        Self {
            devices,
            connections,
            saved_at: Utc::now(),
        }
    }

    /// Rebuild a registry, restoring links without running a build
    pub fn restore(self) -> Result<DeviceRegistry, SnapshotError> {
        let mut registry = DeviceRegistry::new();
        for snapshot in self.devices {
            registry.add(snapshot.into_device());
        }
        for (a, b) in self.connections {
            if !registry.contains(a) {
                return Err(SnapshotError::UnknownDevice(a));
            }
            if !registry.contains(b) {
                return Err(SnapshotError::UnknownDevice(b));
            }
            registry.connect(a, b);
        }
        Ok(registry)
    }

    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self).map_err(SnapshotError::Serialize)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(json).map_err(SnapshotError::Deserialize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_registry() -> DeviceRegistry {
        let mut registry = DeviceRegistry::new();
        let hub = registry.add(Device::hub("hub", Point::new(0.0, 0.0)).with_radius(80.0));
        let mut lamp = Device::lamp("porch", Point::new(40.0, 0.0));
        lamp.kind = DeviceKind::Lamp { on: true };
        let lamp = registry.add(lamp);
        registry.add(Device::sensor("hall", Point::new(0.0, 40.0)));
        registry.connect(hub, lamp);
        registry
    }

    #[test]
    fn test_snapshot_round_trip() {
        let registry = sample_registry();
        let snapshot = NetworkSnapshot::capture(&registry);
        let json = snapshot.to_json().unwrap();

        let restored = NetworkSnapshot::from_json(&json).unwrap().restore().unwrap();
        assert_eq!(restored.len(), 3);

        let hub = restored.hub().unwrap();
        let lamp = restored
            .iter()
            .find(|d| matches!(d.kind, DeviceKind::Lamp { .. }))
            .unwrap();
        assert!(restored.are_connected(hub.id, lamp.id));
        assert_eq!(lamp.kind, DeviceKind::Lamp { on: true });
        assert_eq!(hub.radius, 80.0);
    }

    #[test]
    fn test_restore_rejects_dangling_connection() {
        let registry = sample_registry();
        let mut snapshot = NetworkSnapshot::capture(&registry);
        snapshot
            .connections
            .push((DeviceId::random(), DeviceId::random()));

        assert!(matches!(
            snapshot.restore(),
            Err(SnapshotError::UnknownDevice(_))
        ));
    }

    #[test]
    fn test_snapshot_connections_are_deduplicated() {
        let registry = sample_registry();
        let snapshot = NetworkSnapshot::capture(&registry);
        assert_eq!(snapshot.connections.len(), 1);
    }
}
