//! Device model: hubs, lamps, and sensors on the simulation plane

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::fmt::Display;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::Point;
use crate::packet::IdempotencyKey;

/// Default radio range for a new device
pub const DEFAULT_RADIUS: f32 = 50.0;

/// Default capacity of the per-device idempotency cache
pub const DEFAULT_IDEMPOTENCY_CAPACITY: usize = 256;

/// Unique identifier for a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub Uuid);

impl DeviceId {
    /// Generate a fresh random id
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short form for logs; full uuid is available via Debug
        let s = self.0.simple().to_string();
        write!(f, "{}", &s[..8])
    }
}

/// How a device is powered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PowerSource {
    /// Drains battery each tick
    #[default]
    Battery,
    /// Mains powered, battery level stays full
    Mains,
}

/// The role-specific part of a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DeviceKind {
    /// Coordinator that drives network builds
    Hub,
    /// Actuator that can be switched on and off
    Lamp { on: bool },
    /// Produces periodic readings
    Sensor { last_reading: Option<f64> },
}

impl DeviceKind {
    pub fn is_hub(&self) -> bool {
        matches!(self, DeviceKind::Hub)
    }

    /// Short label for logs and snapshots
    pub fn label(&self) -> &'static str {
        match self {
            DeviceKind::Hub => "hub",
            DeviceKind::Lamp { .. } => "lamp",
            DeviceKind::Sensor { .. } => "sensor",
        }
    }
}

/// Bounded set of idempotency keys a device has already accepted.
///
/// Oldest keys are evicted first once the capacity is reached, so a
/// long-running device keeps a fixed memory footprint.
#[derive(Debug, Clone)]
pub struct IdempotencyCache {
    seen: HashSet<IdempotencyKey>,
    order: VecDeque<IdempotencyKey>,
    capacity: usize,
}

impl IdempotencyCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Record a key. Returns `true` if the key was not seen before.
    pub fn insert(&mut self, key: IdempotencyKey) -> bool {
        if self.seen.contains(&key) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(key);
        self.order.push_back(key);
        true
    }

    pub fn contains(&self, key: &IdempotencyKey) -> bool {
        self.seen.contains(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
        self.order.clear();
    }
}

impl Default for IdempotencyCache {
    fn default() -> Self {
        Self::new(DEFAULT_IDEMPOTENCY_CAPACITY)
    }
}

/// A device in the mesh
#[derive(Debug, Clone)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub pos: Point,
    /// Radio range; a pair is mutually visible within the smaller of the two radii
    pub radius: f32,
    pub power: PowerSource,
    /// Charge level in `[0, 1]`
    pub battery_level: f64,
    /// Multiplier applied to the per-tick drain for battery devices
    pub battery_drain_rate: f64,
    pub kind: DeviceKind,
    /// Symmetric links established by a network build. Managed by the registry.
    pub connections: BTreeSet<DeviceId>,
    /// Keys of packets this device has already accepted
    pub idempotency: IdempotencyCache,
}

impl Device {
    pub fn new(name: impl Into<String>, pos: Point, kind: DeviceKind) -> Self {
        Self {
            id: DeviceId::random(),
            name: name.into(),
            pos,
            radius: DEFAULT_RADIUS,
            power: PowerSource::Battery,
            battery_level: 1.0,
            battery_drain_rate: 1.0,
            kind,
            connections: BTreeSet::new(),
            idempotency: IdempotencyCache::default(),
        }
    }

    pub fn hub(name: impl Into<String>, pos: Point) -> Self {
        let mut device = Self::new(name, pos, DeviceKind::Hub);
        device.power = PowerSource::Mains;
        device
    }

    pub fn lamp(name: impl Into<String>, pos: Point) -> Self {
        Self::new(name, pos, DeviceKind::Lamp { on: false })
    }

    pub fn sensor(name: impl Into<String>, pos: Point) -> Self {
        Self::new(name, pos, DeviceKind::Sensor { last_reading: None })
    }

    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_power(mut self, power: PowerSource) -> Self {
        self.power = power;
        self
    }

    pub fn distance_to(&self, other: &Device) -> f32 {
        self.pos.distance(&other.pos)
    }

    /// Mutual visibility: within range of the smaller radius of the pair
    pub fn can_see(&self, other: &Device) -> bool {
        if self.id == other.id {
            return false;
        }
        self.distance_to(other) <= self.radius.min(other.radius)
    }

    pub fn is_connected_to(&self, other: DeviceId) -> bool {
        self.connections.contains(&other)
    }

    /// Apply one tick of battery drain. Mains devices are unaffected.
    pub fn drain_battery(&mut self, drain_per_tick: f64) {
        if self.power == PowerSource::Battery {
            self.battery_level =
                (self.battery_level - drain_per_tick * self.battery_drain_rate).max(0.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_uses_smaller_radius() {
        let a = Device::lamp("a", Point::new(0.0, 0.0)).with_radius(100.0);
        let b = Device::lamp("b", Point::new(60.0, 0.0)).with_radius(50.0);
        // 60 > min(100, 50), so neither side sees the other
        assert!(!a.can_see(&b));
        assert!(!b.can_see(&a));

        let c = Device::lamp("c", Point::new(40.0, 0.0)).with_radius(50.0);
        assert!(a.can_see(&c));
        assert!(c.can_see(&a));
    }

    #[test]
    fn test_device_never_sees_itself() {
        let a = Device::hub("hub", Point::new(0.0, 0.0));
        assert!(!a.can_see(&a));
    }

    #[test]
    fn test_idempotency_cache_accepts_once() {
        let mut cache = IdempotencyCache::new(4);
        let key = IdempotencyKey::random();
        assert!(cache.insert(key));
        assert!(!cache.insert(key));
        assert!(cache.contains(&key));
    }

    #[test]
    fn test_idempotency_cache_evicts_oldest() {
        let mut cache = IdempotencyCache::new(2);
        let first = IdempotencyKey::random();
        let second = IdempotencyKey::random();
        let third = IdempotencyKey::random();

        assert!(cache.insert(first));
        assert!(cache.insert(second));
        assert!(cache.insert(third));

        assert!(!cache.contains(&first));
        assert!(cache.contains(&second));
        assert!(cache.contains(&third));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_battery_drain_clamps_at_zero() {
        let mut lamp = Device::lamp("l", Point::new(0.0, 0.0));
        lamp.battery_level = 0.001;
        lamp.drain_battery(0.01);
        assert_eq!(lamp.battery_level, 0.0);

        let mut hub = Device::hub("h", Point::new(0.0, 0.0));
        hub.drain_battery(0.5);
        assert_eq!(hub.battery_level, 1.0);
    }
}
