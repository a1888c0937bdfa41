//! Per-measurement poll timing.
//!
//! Each descriptor is polled on its own period, measured from the last read
//! attempt. A scheduler that is checked late fires once, immediately; it does
//! not replay the missed periods.

use crate::descriptor::MeasurementDescriptor;

/// Due-time rule shared by every telemetry worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollScheduler;

impl PollScheduler {
    /// Returns `true` if `descriptor` should be read at `now`.
    ///
    /// A measurement that was never attempted is always due. Otherwise it is
    /// due once `now - last_read_time >= period_seconds`; the boundary counts.
    pub fn is_due(descriptor: &MeasurementDescriptor, now: f64, last_read_time: Option<f64>) -> bool {
        match last_read_time {
            None => true,
            Some(last) => now - last >= descriptor.period_seconds,
        }
    }

    /// Seconds until `descriptor` is next due, zero if already due.
    pub fn time_until_due(descriptor: &MeasurementDescriptor, now: f64, last_read_time: Option<f64>) -> f64 {
        match last_read_time {
            None => 0.0,
            Some(last) => (last + descriptor.period_seconds - now).max(0.0),
        }
    }
}
