//! Arrival scheduling for in-flight packets

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use hearthnet_core::Packet;

/// One scheduled arrival
#[derive(Debug)]
struct InFlight {
    arrival: u64,
    /// Monotonic enqueue counter; same-tick arrivals dispatch in the order
    /// they were scheduled
    seq: u64,
    packet: Packet,
}

impl PartialEq for InFlight {
    fn eq(&self, other: &Self) -> bool {
        self.arrival == other.arrival && self.seq == other.seq
    }
}

impl Eq for InFlight {}

impl PartialOrd for InFlight {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InFlight {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so the BinaryHeap pops the earliest (arrival, seq) first
        (other.arrival, other.seq).cmp(&(self.arrival, self.seq))
    }
}

/// Min-queue of in-flight packets keyed by arrival tick.
///
/// Dispatch order is fully deterministic: earliest arrival first, FIFO by
/// scheduling order within a tick.
#[derive(Debug, Default)]
pub struct FlightQueue {
    heap: BinaryHeap<InFlight>,
    next_seq: u64,
}

impl FlightQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, packet: Packet, arrival: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(InFlight {
            arrival,
            seq,
            packet,
        });
    }

    /// Pop the next packet due at or before `now`
    pub fn pop_due(&mut self, now: u64) -> Option<Packet> {
        if self.heap.peek().is_some_and(|head| head.arrival <= now) {
            self.heap.pop().map(|entry| entry.packet)
        } else {
            None
        }
    }

    /// Earliest scheduled arrival tick, if any packets are in flight
    pub fn next_arrival(&self) -> Option<u64> {
        self.heap.peek().map(|head| head.arrival)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearthnet_core::{DeviceId, PacketKind};

    fn packet(tag: u8) -> Packet {
        Packet::new(
            PacketKind::Data,
            DeviceId::random(),
            None,
            vec![tag],
            0,
        )
    }

    #[test]
    fn test_pops_earliest_arrival_first() {
        let mut queue = FlightQueue::new();
        queue.schedule(packet(1), 5);
        queue.schedule(packet(2), 3);
        queue.schedule(packet(3), 4);

        assert_eq!(queue.pop_due(10).unwrap().payload, vec![2]);
        assert_eq!(queue.pop_due(10).unwrap().payload, vec![3]);
        assert_eq!(queue.pop_due(10).unwrap().payload, vec![1]);
        assert!(queue.pop_due(10).is_none());
    }

    #[test]
    fn test_same_tick_is_fifo() {
        let mut queue = FlightQueue::new();
        for tag in 0..5u8 {
            queue.schedule(packet(tag), 7);
        }
        for tag in 0..5u8 {
            assert_eq!(queue.pop_due(7).unwrap().payload, vec![tag]);
        }
    }

    #[test]
    fn test_future_arrivals_stay_queued() {
        let mut queue = FlightQueue::new();
        queue.schedule(packet(1), 4);
        assert!(queue.pop_due(3).is_none());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.next_arrival(), Some(4));
        assert!(queue.pop_due(4).is_some());
    }
}
