//! The current-value table.
//!
//! One slot per descriptor, created up front and never added to or removed.
//! Each slot sits behind its own lock, so a writer updates one entry at a time
//! and readers always observe a whole entry. Only the telemetry source writes;
//! everybody else gets read access through `Arc<CurrentValueTable>`.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use gs_core::{Measurement, MeasurementProvider, SharedClock};

use crate::descriptor::MeasurementDescriptor;
use crate::snapshot::{Snapshot, SnapshotRow};

/// Where a measurement is in its read lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// No successful read yet.
    NeverRead,
    /// Last attempt succeeded.
    Valid,
    /// Holds a value, but the last attempt failed.
    Stale,
}

/// Stored state of one measurement.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EntryState {
    /// Last successfully decoded value. Failures never touch this.
    pub value: Option<f64>,
    /// Time of the last successful read.
    pub last_success: Option<f64>,
    /// Time of the last read attempt, successful or not.
    pub last_attempt: Option<f64>,
    /// Failures of any kind since the last success.
    pub consecutive_failures: u32,
    /// Transport failures since the last success. Decode failures leave it alone.
    pub transport_failures: u32,
    /// Failures over the lifetime of the table.
    pub total_failures: u64,
}

impl EntryState {
    pub fn freshness(&self) -> Freshness {
        match (self.value, self.consecutive_failures) {
            (None, _) => Freshness::NeverRead,
            (Some(_), 0) => Freshness::Valid,
            (Some(_), _) => Freshness::Stale,
        }
    }

    /// Seconds since the last successful read.
    pub fn age(&self, now: f64) -> Option<f64> {
        self.last_success.map(|t| (now - t).max(0.0))
    }
}

fn mark_failed(s: &mut EntryState, now: f64) {
    s.last_attempt = Some(now);
    s.consecutive_failures = s.consecutive_failures.saturating_add(1);
    s.total_failures = s.total_failures.saturating_add(1);
}

#[derive(Debug)]
struct Slot {
    name: String,
    units: String,
    address: u16,
    state: RwLock<EntryState>,
}

impl Slot {
    fn read(&self) -> EntryState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut EntryState)) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}

/// Latest decoded value per measurement, keyed by name and by address.
pub struct CurrentValueTable {
    slots: Vec<Slot>,
    by_name: HashMap<String, usize>,
    by_address: HashMap<u16, usize>,
    clock: SharedClock,
}

impl std::fmt::Debug for CurrentValueTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrentValueTable")
            .field("slots", &self.slots)
            .finish_non_exhaustive()
    }
}

impl CurrentValueTable {
    /// Build an empty table with one slot per descriptor, in descriptor order.
    pub(crate) fn new(descriptors: &[MeasurementDescriptor], clock: SharedClock) -> Self {
        let slots: Vec<Slot> = descriptors
            .iter()
            .map(|d| Slot {
                name: d.name.clone(),
                units: d.units.clone(),
                address: d.address,
                state: RwLock::new(EntryState::default()),
            })
            .collect();
        let by_name = slots
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();
        let mut by_address = HashMap::new();
        for (i, s) in slots.iter().enumerate() {
            // First descriptor wins when two share an address.
            by_address.entry(s.address).or_insert(i);
        }
        Self {
            slots,
            by_name,
            by_address,
            clock,
        }
    }

    pub(crate) fn record_success(&self, index: usize, value: f64, now: f64) {
        if let Some(slot) = self.slots.get(index) {
            slot.update(|s| {
                s.value = Some(value);
                s.last_success = Some(now);
                s.last_attempt = Some(now);
                s.consecutive_failures = 0;
                s.transport_failures = 0;
            });
        }
    }

    /// Mark an attempt the bus did not answer. Returns the consecutive
    /// transport failure count.
    pub(crate) fn record_transport_failure(&self, index: usize, now: f64) -> u32 {
        let mut count = 0;
        if let Some(slot) = self.slots.get(index) {
            slot.update(|s| {
                mark_failed(s, now);
                s.transport_failures = s.transport_failures.saturating_add(1);
                count = s.transport_failures;
            });
        }
        count
    }

    /// Mark an attempt whose reply could not be decoded.
    pub(crate) fn record_decode_failure(&self, index: usize, now: f64) {
        if let Some(slot) = self.slots.get(index) {
            slot.update(|s| mark_failed(s, now));
        }
    }

    pub(crate) fn last_attempt(&self, index: usize) -> Option<f64> {
        self.slots.get(index).and_then(|s| s.read().last_attempt)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Measurement names in descriptor order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.name.as_str())
    }

    /// Latest value and its age, if `name` was ever read successfully.
    pub fn get(&self, name: &str) -> Option<Measurement> {
        let index = *self.by_name.get(name)?;
        self.measurement_at(index)
    }

    /// Same as [`get`](Self::get), keyed by register address.
    pub fn get_by_address(&self, address: u16) -> Option<Measurement> {
        let index = *self.by_address.get(&address)?;
        self.measurement_at(index)
    }

    /// Full stored state of `name`, including failure counters.
    pub fn state(&self, name: &str) -> Option<EntryState> {
        let index = *self.by_name.get(name)?;
        Some(self.slots[index].read())
    }

    fn measurement_at(&self, index: usize) -> Option<Measurement> {
        let state = self.slots.get(index)?.read();
        let value = state.value?;
        let age = state.age(self.clock.now())?;
        Some(Measurement { value, age })
    }

    /// Copy every entry. Each row is internally consistent; rows may come
    /// from different write generations.
    pub fn snapshot(&self) -> Snapshot {
        let now = self.clock.now();
        let rows = self
            .slots
            .iter()
            .map(|slot| {
                let state = slot.read();
                SnapshotRow {
                    name: slot.name.clone(),
                    units: slot.units.clone(),
                    address: slot.address,
                    value: state.value,
                    age: state.age(now),
                    stale: state.freshness() == Freshness::Stale,
                }
            })
            .collect();
        Snapshot { taken_at: now, rows }
    }
}

impl MeasurementProvider for CurrentValueTable {
    fn measurement(&self, name: &str) -> Option<Measurement> {
        self.get(name)
    }
}
