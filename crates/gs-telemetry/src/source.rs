//! The polling worker.
//!
//! [`TelemetrySource`] walks the descriptor list, reads whatever is due, and
//! writes decoded values into the shared [`CurrentValueTable`]. It runs as a
//! [`PeriodicWorker`] so the supervisor can spawn and stop it like any other
//! loop.

use std::sync::Arc;
use std::time::Duration;

use gs_core::{PeriodicWorker, SharedClock};
use tracing::{debug, error, info, warn};

use crate::decoder::decode_response;
use crate::descriptor::MeasurementDescriptor;
use crate::error::{DecodeFailure, TelemetryError, TelemetryResult, TransportError};
use crate::scheduler::PollScheduler;
use crate::table::CurrentValueTable;
use crate::transport::BusTransport;

const MIN_SLEEP: Duration = Duration::from_millis(1);

/// Polling policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceConfig {
    /// Consecutive transport failures of one measurement before the link is
    /// reopened. Decode failures do not count.
    pub reconnect_after: u32,
    /// Upper bound on the sleep between scheduler checks.
    pub scan_interval: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            reconnect_after: 5,
            scan_interval: Duration::from_millis(10),
        }
    }
}

/// Outcome counts for one pass over the descriptors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Reads due measurements from a bus into the current-value table.
pub struct TelemetrySource<T: BusTransport> {
    descriptors: Vec<MeasurementDescriptor>,
    transport: T,
    table: Arc<CurrentValueTable>,
    config: SourceConfig,
    next_sleep: Duration,
}

impl<T: BusTransport> TelemetrySource<T> {
    pub fn new(
        descriptors: Vec<MeasurementDescriptor>,
        transport: T,
        clock: SharedClock,
        config: SourceConfig,
    ) -> TelemetryResult<Self> {
        if config.reconnect_after == 0 {
            return Err(TelemetryError::InvalidConfig {
                what: "reconnect_after must be at least 1",
            });
        }
        if config.scan_interval.is_zero() {
            return Err(TelemetryError::InvalidConfig {
                what: "scan_interval must be positive",
            });
        }
        let table = Arc::new(CurrentValueTable::new(&descriptors, clock));
        Ok(Self {
            descriptors,
            transport,
            table,
            next_sleep: config.scan_interval,
            config,
        })
    }

    /// Shared handle to the table this source writes.
    pub fn table(&self) -> Arc<CurrentValueTable> {
        Arc::clone(&self.table)
    }

    pub fn descriptors(&self) -> &[MeasurementDescriptor] {
        &self.descriptors
    }

    /// Read every measurement that is due at `now`.
    pub fn poll_due(&mut self, now: f64) -> PollSummary {
        self.poll(now, false)
    }

    /// Read every measurement regardless of its schedule.
    pub fn poll_all(&mut self, now: f64) -> PollSummary {
        self.poll(now, true)
    }

    fn poll(&mut self, now: f64, force: bool) -> PollSummary {
        let mut summary = PollSummary::default();
        for index in 0..self.descriptors.len() {
            let last = self.table.last_attempt(index);
            if !force && !PollScheduler::is_due(&self.descriptors[index], now, last) {
                continue;
            }
            summary.attempted += 1;
            if self.read_one(index, now) {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
        }
        summary
    }

    fn read_one(&mut self, index: usize, now: f64) -> bool {
        let descriptor = &self.descriptors[index];
        let response = self
            .transport
            .read_registers(descriptor.address, descriptor.word_count());
        let block = match response {
            Ok(block) => Some(block),
            Err(err) => {
                let failures = self.table.record_transport_failure(index, now);
                warn!(
                    measurement = %descriptor.name,
                    address = descriptor.address,
                    failures,
                    error = %err,
                    "bus read failed"
                );
                if failures % self.config.reconnect_after == 0 {
                    let name = descriptor.name.clone();
                    self.reconnect(&name, failures);
                }
                None
            }
        };
        let descriptor = &self.descriptors[index];
        match decode_response(descriptor, block.as_deref()) {
            Ok(value) => {
                self.table.record_success(index, value, now);
                true
            }
            // Already counted as a transport failure.
            Err(DecodeFailure::NoResponse) => false,
            Err(err) => {
                self.table.record_decode_failure(index, now);
                log_decode_failure(descriptor, &err);
                false
            }
        }
    }

    fn reconnect(&mut self, measurement: &str, failures: u32) {
        info!(
            link = %self.transport.describe(),
            measurement,
            failures,
            "reconnecting transport"
        );
        if let Err(err) = self.transport.reconnect() {
            log_reconnect_failure(&err);
        }
    }

    /// Time until the soonest measurement is due, bounded by the scan interval.
    fn sleep_hint(&self, now: f64) -> Duration {
        let soonest = self
            .descriptors
            .iter()
            .enumerate()
            .map(|(i, d)| PollScheduler::time_until_due(d, now, self.table.last_attempt(i)))
            .fold(f64::INFINITY, f64::min);
        let bound = self.config.scan_interval.max(MIN_SLEEP);
        if !soonest.is_finite() {
            return bound;
        }
        // Clamp before converting; a long period would overflow `Duration`.
        let seconds = soonest.clamp(MIN_SLEEP.as_secs_f64(), bound.as_secs_f64());
        Duration::from_secs_f64(seconds)
    }
}

fn log_decode_failure(descriptor: &MeasurementDescriptor, err: &DecodeFailure) {
    error!(
        measurement = %descriptor.name,
        address = descriptor.address,
        error = %err,
        "decode failed"
    );
}

fn log_reconnect_failure(err: &TransportError) {
    warn!(error = %err, "reconnect failed");
}

impl<T: BusTransport> PeriodicWorker for TelemetrySource<T> {
    fn name(&self) -> &str {
        "telemetry"
    }

    fn tick(&mut self, now: f64) {
        let summary = self.poll_due(now);
        if summary.attempted > 0 {
            debug!(
                attempted = summary.attempted,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "poll pass"
            );
        }
        self.next_sleep = self.sleep_hint(now);
    }

    fn interval(&self) -> Duration {
        self.next_sleep
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InjectedFault, MemoryBus};
    use crate::table::Freshness;
    use gs_core::{Clock, ManualClock};

    fn descriptors() -> Vec<MeasurementDescriptor> {
        vec![
            MeasurementDescriptor::new("Oil pressure", "kPa", 1024, 1, 1.0, 0.0, Some(0.5)).unwrap(),
            MeasurementDescriptor::new("Coolant temperature", "C", 1025, 1, 1.0, 0.0, Some(1.0)).unwrap(),
            MeasurementDescriptor::new("Engine speed", "rpm", 1030, 1, 1.0, 0.0, Some(0.1)).unwrap(),
        ]
    }

    fn setup(config: SourceConfig) -> (MemoryBus, Arc<ManualClock>, TelemetrySource<MemoryBus>) {
        let bus = MemoryBus::new();
        bus.set_register(1024, 250);
        bus.set_register(1025, 0xFFF6);
        bus.set_register(1030, 1500);
        let clock = Arc::new(ManualClock::new(0.0));
        let source = TelemetrySource::new(descriptors(), bus.clone(), clock.clone(), config).unwrap();
        (bus, clock, source)
    }

    #[test]
    fn first_pass_reads_everything() {
        let (_bus, clock, mut source) = setup(SourceConfig::default());
        clock.set(1.0);
        let summary = source.poll_due(clock.now());
        assert_eq!(summary, PollSummary { attempted: 3, succeeded: 3, failed: 0 });
        let table = source.table();
        assert_eq!(table.get("Coolant temperature").unwrap().value, -10.0);
        assert_eq!(table.get("Engine speed").unwrap().value, 1500.0);
    }

    #[test]
    fn respects_individual_periods() {
        let (bus, _clock, mut source) = setup(SourceConfig::default());
        source.poll_due(1.0);
        assert_eq!(bus.read_count(), 3);

        // Only engine speed (0.1 s) is due.
        assert_eq!(source.poll_due(1.2).attempted, 1);
        // Oil pressure (0.5 s) joins at the boundary.
        assert_eq!(source.poll_due(1.5).attempted, 2);
        assert_eq!(source.poll_due(2.0).attempted, 3);
    }

    #[test]
    fn failure_keeps_previous_value() {
        let (bus, clock, mut source) = setup(SourceConfig::default());
        source.poll_due(0.0);
        bus.set_register(1024, 300);
        bus.inject(1024, InjectedFault::Timeout, 1);
        clock.set(1.0);
        source.poll_all(1.0);

        let table = source.table();
        let state = table.state("Oil pressure").unwrap();
        assert_eq!(state.value, Some(250.0));
        assert_eq!(state.consecutive_failures, 1);
        assert_eq!(state.freshness(), Freshness::Stale);
        assert_eq!(table.get("Oil pressure").unwrap().age, 1.0);

        source.poll_all(2.0);
        assert_eq!(table.get("Oil pressure").unwrap().value, 300.0);
        assert_eq!(table.state("Oil pressure").unwrap().consecutive_failures, 0);
    }

    #[test]
    fn short_block_is_decode_failure_without_reconnect() {
        let (bus, _clock, mut source) = setup(SourceConfig {
            reconnect_after: 1,
            ..SourceConfig::default()
        });
        bus.inject(1030, InjectedFault::ShortReply, 1);
        let summary = source.poll_all(0.0);
        assert_eq!(summary.failed, 1);
        assert_eq!(bus.reconnect_count(), 0);
        assert_eq!(source.table().state("Engine speed").unwrap().freshness(), Freshness::NeverRead);
    }

    #[test]
    fn reconnects_after_consecutive_failures() {
        let (bus, _clock, mut source) = setup(SourceConfig {
            reconnect_after: 3,
            ..SourceConfig::default()
        });
        bus.inject(1024, InjectedFault::NoResponse, 7);
        for step in 0..7 {
            source.poll_all(step as f64);
        }
        assert_eq!(bus.reconnect_count(), 2);
        // Other measurements were unaffected.
        assert_eq!(source.table().get("Engine speed").unwrap().value, 1500.0);
    }

    #[test]
    fn decode_failures_do_not_trigger_reconnect() {
        let (bus, _clock, mut source) = setup(SourceConfig {
            reconnect_after: 5,
            ..SourceConfig::default()
        });
        bus.inject(1024, InjectedFault::ShortReply, 4);
        bus.inject(1024, InjectedFault::Timeout, 1);
        for step in 0..5 {
            source.poll_all(step as f64);
        }
        assert_eq!(bus.reconnect_count(), 0);
        let state = source.table().state("Oil pressure").unwrap();
        assert_eq!(state.consecutive_failures, 5);
        assert_eq!(state.transport_failures, 1);

        // Four more timeouts complete the run of five.
        bus.inject(1024, InjectedFault::Timeout, 4);
        for step in 5..9 {
            source.poll_all(step as f64);
        }
        assert_eq!(bus.reconnect_count(), 1);
    }

    #[test]
    fn very_long_period_does_not_overflow_sleep() {
        let clock = Arc::new(ManualClock::new(0.0));
        let descriptors = vec![
            MeasurementDescriptor::new("Hours run", "h", 1798, 2, 1.0, 0.0, Some(1e20)).unwrap(),
        ];
        let bus = MemoryBus::new();
        bus.set_u32(1798, 1200);
        let mut source = TelemetrySource::new(descriptors, bus, clock, SourceConfig::default()).unwrap();
        source.tick(0.0);
        assert_eq!(source.table().get("Hours run").unwrap().value, 1200.0);
        assert_eq!(source.interval(), SourceConfig::default().scan_interval);
    }

    #[test]
    fn sleep_hint_is_bounded() {
        let (_bus, _clock, mut source) = setup(SourceConfig {
            scan_interval: Duration::from_millis(50),
            ..SourceConfig::default()
        });
        source.tick(0.0);
        // Engine speed due in 100 ms, capped by the 50 ms scan interval.
        assert_eq!(source.interval(), Duration::from_millis(50));
        source.tick(0.0999);
        assert!(source.interval() >= MIN_SLEEP);
        assert!(source.interval() <= Duration::from_millis(50));
    }

    #[test]
    fn rejects_zero_reconnect_threshold() {
        let clock = Arc::new(ManualClock::new(0.0));
        let result = TelemetrySource::new(
            descriptors(),
            MemoryBus::new(),
            clock,
            SourceConfig {
                reconnect_after: 0,
                ..SourceConfig::default()
            },
        );
        assert!(matches!(result, Err(TelemetryError::InvalidConfig { .. })));
    }
}
