//! Per-server load table.
//!
//! Maps each active server to the number of tasks currently in flight
//! toward it (queued at its dispatch queue or executing). Dispatch
//! increments, completion decrements, migration transfers one unit.
//!
//! The table is owned by the orchestrator's control task and only ever
//! mutated through `&mut self`; workers report completions over a channel
//! instead of touching it.

use std::collections::BTreeMap;

use bsb_core::{Server, ServerId};
use tracing::warn;

use crate::error::{SchedulerError, SchedulerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    load: u32,
    capacity: u32,
}

/// In-flight task counts for every active server.
#[derive(Debug, Clone, Default)]
pub struct LoadTable {
    /// server_id → slot. Ordered so ties break toward the lowest id.
    slots: BTreeMap<ServerId, Slot>,
    /// Decrements that would have gone below zero.
    underflows: u64,
}

impl LoadTable {
    /// Build a table for the active servers in `servers`. Inactive servers
    /// are not tracked.
    pub fn new<'a>(servers: impl IntoIterator<Item = &'a Server>) -> Self {
        let slots = servers
            .into_iter()
            .filter(|s| s.is_active())
            .map(|s| {
                (
                    s.id,
                    Slot {
                        load: 0,
                        capacity: s.capacity,
                    },
                )
            })
            .collect();
        Self {
            slots,
            underflows: 0,
        }
    }

    pub fn contains(&self, server_id: ServerId) -> bool {
        self.slots.contains_key(&server_id)
    }

    pub fn load(&self, server_id: ServerId) -> Option<u32> {
        self.slots.get(&server_id).map(|s| s.load)
    }

    pub fn capacity(&self, server_id: ServerId) -> Option<u32> {
        self.slots.get(&server_id).map(|s| s.capacity)
    }

    /// True when the server can accept one more dispatch.
    pub fn has_room(&self, server_id: ServerId) -> bool {
        self.slots
            .get(&server_id)
            .is_some_and(|s| s.load < s.capacity)
    }

    /// `load / capacity`, or `None` for unknown or zero-capacity servers.
    pub fn relative(&self, server_id: ServerId) -> Option<f64> {
        let slot = self.slots.get(&server_id)?;
        if slot.capacity == 0 {
            return None;
        }
        Some(f64::from(slot.load) / f64::from(slot.capacity))
    }

    /// Record a dispatch. Returns the new load.
    pub fn increment(&mut self, server_id: ServerId) -> SchedulerResult<u32> {
        let slot = self.slot_mut(server_id)?;
        slot.load += 1;
        Ok(slot.load)
    }

    /// Record a completion. Returns the new load.
    ///
    /// A decrement below zero (a duplicate or late completion) is clamped
    /// and counted as an underflow.
    pub fn decrement(&mut self, server_id: ServerId) -> SchedulerResult<u32> {
        let slot = self.slot_mut(server_id)?;
        if slot.load == 0 {
            self.underflows += 1;
            warn!(server_id, "load underflow clamped to zero");
            return Ok(0);
        }
        slot.load -= 1;
        Ok(slot.load)
    }

    /// Move one unit of load between servers. Fails without touching the
    /// table if `from` has nothing in flight.
    pub fn transfer(&mut self, from: ServerId, to: ServerId) -> SchedulerResult<()> {
        let from_load = self.load(from).ok_or(SchedulerError::UnknownServer(from))?;
        if !self.contains(to) {
            return Err(SchedulerError::UnknownServer(to));
        }
        if from_load == 0 {
            return Err(SchedulerError::NoLoad(from));
        }
        self.decrement(from)?;
        self.increment(to)?;
        Ok(())
    }

    /// True when no server has outstanding work.
    pub fn is_idle(&self) -> bool {
        self.slots.values().all(|s| s.load == 0)
    }

    pub fn total_load(&self) -> u32 {
        self.slots.values().map(|s| s.load).sum()
    }

    pub fn underflows(&self) -> u64 {
        self.underflows
    }

    /// Tracked server ids in ascending order.
    pub fn server_ids(&self) -> impl Iterator<Item = ServerId> + '_ {
        self.slots.keys().copied()
    }

    /// `(server_id, load, capacity)` for every tracked server.
    pub fn iter(&self) -> impl Iterator<Item = (ServerId, u32, u32)> + '_ {
        self.slots.iter().map(|(id, s)| (*id, s.load, s.capacity))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot_mut(&mut self, server_id: ServerId) -> SchedulerResult<&mut Slot> {
        self.slots
            .get_mut(&server_id)
            .ok_or(SchedulerError::UnknownServer(server_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bsb_core::ServerStatus;

    fn table() -> LoadTable {
        let mut inactive = Server::new(9, 4);
        inactive.status = ServerStatus::Inactive;
        LoadTable::new(&[Server::new(1, 2), Server::new(2, 4), inactive])
    }

    #[test]
    fn tracks_only_active_servers() {
        let t = table();
        assert_eq!(t.server_ids().collect::<Vec<_>>(), vec![1, 2]);
        assert!(!t.contains(9));
        assert!(t.is_idle());
    }

    #[test]
    fn increment_until_full() {
        let mut t = table();
        assert!(t.has_room(1));
        assert_eq!(t.increment(1), Ok(1));
        assert_eq!(t.increment(1), Ok(2));
        assert!(!t.has_room(1));
        assert_eq!(t.relative(1), Some(1.0));
        assert_eq!(t.total_load(), 2);
        assert!(!t.is_idle());
    }

    #[test]
    fn decrement_clamps_and_counts_underflow() {
        let mut t = table();
        t.increment(2).unwrap();
        assert_eq!(t.decrement(2), Ok(0));
        assert_eq!(t.underflows(), 0);

        assert_eq!(t.decrement(2), Ok(0));
        assert_eq!(t.load(2), Some(0));
        assert_eq!(t.underflows(), 1);
    }

    #[test]
    fn unknown_server_is_an_error() {
        let mut t = table();
        assert_eq!(t.increment(42), Err(SchedulerError::UnknownServer(42)));
        assert_eq!(t.decrement(9), Err(SchedulerError::UnknownServer(9)));
        assert!(!t.has_room(42));
        assert_eq!(t.relative(42), None);
    }

    #[test]
    fn transfer_moves_one_unit() {
        let mut t = table();
        t.increment(1).unwrap();
        t.increment(1).unwrap();
        t.transfer(1, 2).unwrap();
        assert_eq!(t.load(1), Some(1));
        assert_eq!(t.load(2), Some(1));
        assert_eq!(t.total_load(), 2);
    }

    #[test]
    fn transfer_to_unknown_server_leaves_table_untouched() {
        let mut t = table();
        t.increment(1).unwrap();
        assert!(t.transfer(1, 42).is_err());
        assert_eq!(t.load(1), Some(1));
    }

    #[test]
    fn transfer_from_idle_server_is_rejected() {
        let mut t = table();
        assert_eq!(t.transfer(1, 2), Err(SchedulerError::NoLoad(1)));
        assert_eq!(t.load(1), Some(0));
        assert_eq!(t.load(2), Some(0));
        assert_eq!(t.underflows(), 0);
        assert_eq!(t.transfer(42, 2), Err(SchedulerError::UnknownServer(42)));
    }

    #[test]
    fn zero_capacity_has_no_relative_load() {
        let t = LoadTable::new(&[Server::new(1, 0)]);
        assert_eq!(t.relative(1), None);
        assert!(!t.has_room(1));
    }
}
