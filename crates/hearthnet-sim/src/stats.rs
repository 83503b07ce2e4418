//! Delivery statistics gathered from the event stream

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use hearthnet_core::{DeviceId, DropReason, SimEvent};

use crate::engine::EventSink;

/// Per-device traffic counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub sent: u64,
    pub received: u64,
    pub forwarded: u64,
}

#[derive(Debug, Default)]
struct Counters {
    created: AtomicU64,
    delivered: AtomicU64,
    forwarded: AtomicU64,
    expired: AtomicU64,
    lost: AtomicU64,
    duplicates: AtomicU64,
    hop_total: AtomicU64,
    latency_total: AtomicU64,
}

/// Aggregates [`SimEvent`]s into counters.
///
/// Shared behind an `Arc`: hand [`StatsCollector::sink`] to the simulation
/// and read [`StatsCollector::report`] from anywhere, concurrently.
#[derive(Debug)]
pub struct StatsCollector {
    counters: Counters,
    drops: DashMap<DropReason, u64>,
    per_device: DashMap<DeviceId, DeviceStats>,
    started_at: DateTime<Utc>,
}

/// Point-in-time summary of a collector
#[derive(Debug, Clone, PartialEq)]
pub struct StatsReport {
    pub created: u64,
    pub delivered: u64,
    pub forwarded: u64,
    pub expired: u64,
    pub lost: u64,
    pub duplicates: u64,
    pub dropped: u64,
    /// Mean hops per delivered message
    pub avg_hops: f64,
    /// Mean ticks from send to first acceptance
    pub avg_latency_ticks: f64,
    pub started_at: DateTime<Utc>,
}

impl StatsCollector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            counters: Counters::default(),
            drops: DashMap::new(),
            per_device: DashMap::new(),
            started_at: Utc::now(),
        })
    }

    /// Sink to pass to [`crate::Simulation::subscribe`]
    pub fn sink(self: &Arc<Self>) -> EventSink {
        let collector = Arc::clone(self);
        Box::new(move |event| collector.record(event))
    }

    pub fn record(&self, event: &SimEvent) {
        match event {
            SimEvent::PacketCreated { sender, .. } => {
                self.counters.created.fetch_add(1, Ordering::Relaxed);
                self.per_device.entry(*sender).or_default().sent += 1;
            }
            SimEvent::PacketForwarded { to, .. } => {
                self.counters.forwarded.fetch_add(1, Ordering::Relaxed);
                self.per_device.entry(*to).or_default().forwarded += 1;
            }
            SimEvent::PacketDelivered {
                device,
                hop_count,
                latency_ticks,
                ..
            } => {
                self.counters.delivered.fetch_add(1, Ordering::Relaxed);
                self.counters
                    .hop_total
                    .fetch_add(u64::from(*hop_count), Ordering::Relaxed);
                self.counters
                    .latency_total
                    .fetch_add(*latency_ticks, Ordering::Relaxed);
                self.per_device.entry(*device).or_default().received += 1;
            }
            SimEvent::PacketExpired { .. } => {
                self.counters.expired.fetch_add(1, Ordering::Relaxed);
            }
            SimEvent::PacketDropped { reason, .. } => {
                if *reason == DropReason::Duplicate {
                    self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
                }
                *self.drops.entry(*reason).or_insert(0) += 1;
            }
            SimEvent::PacketLost { .. } => {
                self.counters.lost.fetch_add(1, Ordering::Relaxed);
            }
            SimEvent::BuildProgress { .. } => {}
        }
    }

    pub fn device_stats(&self, device: DeviceId) -> DeviceStats {
        self.per_device
            .get(&device)
            .map(|entry| *entry)
            .unwrap_or_default()
    }

    /// Discards grouped by reason. TTL exhaustion arrives as
    /// [`SimEvent::PacketExpired`] rather than a drop event, so
    /// [`DropReason::TtlExpired`] is answered from the expiry counter.
    pub fn drops_by_reason(&self, reason: DropReason) -> u64 {
        if reason == DropReason::TtlExpired {
            return self.counters.expired.load(Ordering::Relaxed);
        }
        self.drops.get(&reason).map(|entry| *entry).unwrap_or(0)
    }

    pub fn report(&self) -> StatsReport {
        let delivered = self.counters.delivered.load(Ordering::Relaxed);
        let hop_total = self.counters.hop_total.load(Ordering::Relaxed);
        let latency_total = self.counters.latency_total.load(Ordering::Relaxed);
        let dropped = self.drops.iter().map(|entry| *entry.value()).sum();

        let (avg_hops, avg_latency_ticks) = if delivered > 0 {
            (
                hop_total as f64 / delivered as f64,
                latency_total as f64 / delivered as f64,
            )
        } else {
            (0.0, 0.0)
        };

        StatsReport {
            created: self.counters.created.load(Ordering::Relaxed),
            delivered,
            forwarded: self.counters.forwarded.load(Ordering::Relaxed),
            expired: self.counters.expired.load(Ordering::Relaxed),
            lost: self.counters.lost.load(Ordering::Relaxed),
            duplicates: self.counters.duplicates.load(Ordering::Relaxed),
            dropped,
            avg_hops,
            avg_latency_ticks,
            started_at: self.started_at,
        }
    }
}
