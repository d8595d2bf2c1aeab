//! Event Log
//!
//! Append-only store of captured [`EventRecord`]s with a fixed capacity of
//! `N` slots reserved up front. Records are published whole and are never
//! mutated or removed for the rest of the session.
//!
//! The log knows nothing about gating or ordering: the recorder checks the
//! control plane before claiming, and the sequencer decides *when* a
//! sequenced record may claim its slot.

use alloc::vec::Vec;

use krr_primitives::{SlotArena, SlotWriter};

use crate::types::{EventKind, EventRecord};

/// A claimed, not yet written log slot.
pub type EventSlot<'a> = SlotWriter<'a, EventRecord>;

/// Fixed-capacity, append-only event log.
pub struct EventLog<const N: usize> {
    slots: SlotArena<EventRecord, N>,
}

impl<const N: usize> EventLog<N> {
    /// Number of slots reserved.
    pub const CAPACITY: usize = N;

    /// Create an empty log.
    pub const fn new() -> Self {
        Self {
            slots: SlotArena::new(),
        }
    }

    /// Claim the next slot, or `None` if the log is full.
    ///
    /// O(1) and lock-free; safe with interrupts disabled.
    pub fn allocate_slot(&self) -> Option<EventSlot<'_>> {
        self.slots.claim()
    }

    /// Get the record in `slot`, if it was published.
    pub fn get(&self, slot: usize) -> Option<&EventRecord> {
        self.slots.get(slot)
    }

    /// Published records in slot order as `(slot, record)`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &EventRecord)> + '_ {
        self.slots.iter()
    }

    /// Published records of one kind, in slot order.
    pub fn iter_kind(&self, kind: EventKind) -> impl Iterator<Item = (usize, &EventRecord)> + '_ {
        self.iter().filter(move |(_, record)| record.kind() == kind)
    }

    /// Number of slots claimed (published or not).
    pub fn len(&self) -> usize {
        self.slots.claimed()
    }

    /// Check if no slot was ever claimed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of published records.
    pub fn published(&self) -> usize {
        self.slots.published()
    }

    /// Number of slots still free.
    pub fn remaining(&self) -> usize {
        self.slots.remaining()
    }

    /// Copy out every published record for the replay consumer.
    pub fn snapshot(&self) -> Vec<(usize, EventRecord)> {
        self.iter().map(|(slot, record)| (slot, *record)).collect()
    }
}

impl<const N: usize> Default for EventLog<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Event;

    fn seed(value: u64) -> EventRecord {
        EventRecord {
            origin: 0,
            event: Event::SeedRead { value },
        }
    }

    #[test]
    fn test_log_creation() {
        let log: EventLog<4> = EventLog::new();
        assert!(log.is_empty());
        assert_eq!(log.len(), 0);
        assert_eq!(log.remaining(), 4);
        assert_eq!(EventLog::<4>::CAPACITY, 4);
    }

    #[test]
    fn test_append_and_read_back() {
        let log: EventLog<4> = EventLog::new();

        for i in 0..3 {
            let slot = log.allocate_slot().unwrap();
            assert_eq!(slot.index(), i);
            slot.publish(seed(i as u64));
        }

        assert_eq!(log.len(), 3);
        assert_eq!(log.published(), 3);
        assert_eq!(log.get(1), Some(&seed(1)));

        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[2], (2, seed(2)));
    }

    #[test]
    fn test_full_log_keeps_existing_records() {
        let log: EventLog<2> = EventLog::new();
        log.allocate_slot().unwrap().publish(seed(10));
        log.allocate_slot().unwrap().publish(seed(11));

        assert!(log.allocate_slot().is_none());
        assert_eq!(log.len(), 2);
        assert_eq!(log.get(0), Some(&seed(10)));
        assert_eq!(log.get(1), Some(&seed(11)));
    }

    #[test]
    fn test_iter_kind() {
        let log: EventLog<4> = EventLog::new();
        log.allocate_slot().unwrap().publish(seed(1));
        log.allocate_slot().unwrap().publish(EventRecord {
            origin: 1,
            event: Event::Release,
        });
        log.allocate_slot().unwrap().publish(seed(2));

        let seeds: Vec<usize> = log.iter_kind(EventKind::SeedRead).map(|(slot, _)| slot).collect();
        assert_eq!(seeds, [0, 2]);
        assert_eq!(log.iter_kind(EventKind::Release).count(), 1);
    }
}
