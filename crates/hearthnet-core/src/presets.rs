//! Ready-made device layouts for demos and tests

use crate::device::Device;
use crate::geometry::Point;
use crate::registry::DeviceRegistry;

/// Hub and four devices in a straight line, each hop within range of the next
pub fn line() -> DeviceRegistry {
    let mut registry = DeviceRegistry::new();
    registry.add(Device::hub("H", Point::new(100.0, 300.0)).with_radius(150.0));
    registry.add(Device::lamp("L1", Point::new(250.0, 300.0)).with_radius(150.0));
    registry.add(Device::sensor("S1", Point::new(400.0, 300.0)).with_radius(150.0));
    registry.add(Device::lamp("L2", Point::new(550.0, 300.0)).with_radius(150.0));
    registry.add(Device::sensor("S2", Point::new(700.0, 300.0)).with_radius(150.0));
    registry
}

/// Central hub with six devices on a ring around it
pub fn star() -> DeviceRegistry {
    let mut registry = DeviceRegistry::new();
    registry.add(Device::hub("H", Point::new(400.0, 300.0)).with_radius(250.0));
    for i in 0..6u32 {
        let angle = i as f32 * std::f32::consts::TAU / 6.0;
        let pos = Point::new(400.0 + angle.cos() * 200.0, 300.0 + angle.sin() * 200.0);
        let name_idx = i / 2 + 1;
        let device = if i % 2 == 0 {
            Device::lamp(format!("L{name_idx}"), pos)
        } else {
            Device::sensor(format!("S{name_idx}"), pos)
        };
        registry.add(device.with_radius(200.0));
    }
    registry
}

/// 3x4 grid with the hub in one corner
pub fn grid() -> DeviceRegistry {
    let mut registry = DeviceRegistry::new();
    registry.add(Device::hub("H", Point::new(100.0, 100.0)).with_radius(200.0));
    let mut idx = 1;
    for row in 0..3u32 {
        for col in 0..4u32 {
            if row == 0 && col == 0 {
                continue;
            }
            let pos = Point::new(100.0 + col as f32 * 150.0, 100.0 + row as f32 * 150.0);
            let device = if (row + col) % 2 == 0 {
                Device::lamp(format!("L{idx}"), pos)
            } else {
                Device::sensor(format!("S{idx}"), pos)
            };
            registry.add(device.with_radius(180.0));
            idx += 1;
        }
    }
    registry
}

/// Loosely scattered devices; some pairs are out of range of each other
pub fn sparse() -> DeviceRegistry {
    let mut registry = DeviceRegistry::new();
    let placements: [(&str, f32, f32); 8] = [
        ("H", 100.0, 100.0),
        ("L1", 250.0, 150.0),
        ("S1", 450.0, 100.0),
        ("L2", 650.0, 200.0),
        ("S2", 200.0, 350.0),
        ("L3", 400.0, 400.0),
        ("S3", 600.0, 450.0),
        ("L4", 800.0, 350.0),
    ];
    for (name, x, y) in placements {
        let pos = Point::new(x, y);
        let device = match name.as_bytes()[0] {
            b'H' => Device::hub(name, pos),
            b'L' => Device::lamp(name, pos),
            _ => Device::sensor(name, pos),
        };
        registry.add(device.with_radius(200.0));
    }
    registry
}
