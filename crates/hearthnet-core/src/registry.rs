//! Device registry: the single owner of device state and link topology

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::debug;

use crate::device::{Device, DeviceId};

/// Owns every device in the simulation.
///
/// Links (`connect`/`disconnect`) are kept symmetric on both endpoints.
/// Visibility is always computed from positions and radii, never stored, so
/// moving a device can never leave stale range information behind. Iteration
/// order is the id order of the backing `BTreeMap`, which keeps fan-out and
/// pair enumeration deterministic.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<DeviceId, Device>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a device, returning its id
    pub fn add(&mut self, device: Device) -> DeviceId {
        let id = device.id;
        debug!(device = %id, name = %device.name, kind = device.kind.label(), "device added");
        self.devices.insert(id, device);
        id
    }

    /// Remove a device and prune it from every remaining connection list
    pub fn remove(&mut self, id: DeviceId) -> Option<Device> {
        let removed = self.devices.remove(&id)?;
        for device in self.devices.values_mut() {
            device.connections.remove(&id);
        }
        debug!(device = %id, "device removed");
        Some(removed)
    }

    pub fn get(&self, id: DeviceId) -> Option<&Device> {
        self.devices.get(&id)
    }

    pub fn get_mut(&mut self, id: DeviceId) -> Option<&mut Device> {
        self.devices.get_mut(&id)
    }

    pub fn contains(&self, id: DeviceId) -> bool {
        self.devices.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.devices.keys().copied()
    }

    /// First hub in id order, if any
    pub fn hub(&self) -> Option<&Device> {
        self.devices.values().find(|d| d.kind.is_hub())
    }

    /// Whether two devices are mutually in range
    pub fn are_visible(&self, a: DeviceId, b: DeviceId) -> bool {
        match (self.devices.get(&a), self.devices.get(&b)) {
            (Some(da), Some(db)) => da.can_see(db),
            _ => false,
        }
    }

    /// Every device currently in range of `id`, in id order
    pub fn visible_neighbors(&self, id: DeviceId) -> Vec<DeviceId> {
        let Some(device) = self.devices.get(&id) else {
            return Vec::new();
        };
        self.devices
            .values()
            .filter(|other| device.can_see(other))
            .map(|other| other.id)
            .collect()
    }

    /// All mutually visible pairs, each reported once with `a < b`
    pub fn visibility_pairs(&self) -> Vec<(DeviceId, DeviceId)> {
        let devices: Vec<&Device> = self.devices.values().collect();
        let mut pairs = Vec::new();
        for i in 0..devices.len() {
            for j in (i + 1)..devices.len() {
                if devices[i].can_see(devices[j]) {
                    pairs.push((devices[i].id, devices[j].id));
                }
            }
        }
        pairs
    }

    /// Establish a symmetric link. Idempotent; self-links are ignored.
    pub fn connect(&mut self, a: DeviceId, b: DeviceId) {
        if a == b || !self.devices.contains_key(&a) || !self.devices.contains_key(&b) {
            return;
        }
        if let Some(da) = self.devices.get_mut(&a) {
            da.connections.insert(b);
        }
        if let Some(db) = self.devices.get_mut(&b) {
            db.connections.insert(a);
        }
    }

    /// Tear down a link on both endpoints
    pub fn disconnect(&mut self, a: DeviceId, b: DeviceId) {
        if let Some(da) = self.devices.get_mut(&a) {
            da.connections.remove(&b);
        }
        if let Some(db) = self.devices.get_mut(&b) {
            db.connections.remove(&a);
        }
    }

    pub fn are_connected(&self, a: DeviceId, b: DeviceId) -> bool {
        self.devices
            .get(&a)
            .is_some_and(|d| d.connections.contains(&b))
    }

    pub fn connections_of(&self, id: DeviceId) -> Vec<DeviceId> {
        self.devices
            .get(&id)
            .map(|d| d.connections.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Drop every link in the mesh
    pub fn clear_connections(&mut self) {
        for device in self.devices.values_mut() {
            device.connections.clear();
        }
    }

    /// Devices reachable from `seed` over links, including `seed` itself
    pub fn connected_component(&self, seed: DeviceId) -> BTreeSet<DeviceId> {
        let mut component = BTreeSet::new();
        if !self.devices.contains_key(&seed) {
            return component;
        }
        let mut frontier = VecDeque::from([seed]);
        component.insert(seed);
        while let Some(current) = frontier.pop_front() {
            if let Some(device) = self.devices.get(&current) {
                for &next in &device.connections {
                    if component.insert(next) {
                        frontier.push_back(next);
                    }
                }
            }
        }
        component
    }
}
