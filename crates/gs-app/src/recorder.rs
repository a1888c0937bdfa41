//! Periodic data recorder.
//!
//! Every interval the recorder snapshots the value table and hands a CSV line
//! (and optionally a rendered table) to a channel. Writing the lines out is the
//! receiver's business, so a slow disk never stalls polling or control.

use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::time::Duration;

use chrono::{DateTime, Utc};
use gs_controls::OutputHandle;
use gs_core::PeriodicWorker;
use gs_telemetry::{CurrentValueTable, Snapshot};
use tracing::warn;

/// Timestamp format of the first CSV column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// One unit of recorder output.
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    /// Column names, sent once before the first row.
    Header(String),
    /// One CSV record.
    Row(String),
    /// Human-readable table for the console.
    Display(String),
}

pub struct Recorder {
    table: Arc<CurrentValueTable>,
    output: Option<OutputHandle>,
    interval: Duration,
    display: bool,
    tx: Sender<RecorderEvent>,
    header_sent: bool,
    closed: bool,
}

impl Recorder {
    pub fn new(
        table: Arc<CurrentValueTable>,
        output: Option<OutputHandle>,
        interval: Duration,
        display: bool,
        tx: Sender<RecorderEvent>,
    ) -> Self {
        Self {
            table,
            output,
            interval,
            display,
            tx,
            header_sent: false,
            closed: false,
        }
    }

    pub fn header(&self, snapshot: &Snapshot) -> String {
        let mut header = format!("timestamp,{}", snapshot.csv_header());
        if self.output.is_some() {
            header.push_str(",output");
        }
        header
    }

    /// CSV record for `snapshot` stamped with `at`.
    pub fn compose_line(&self, snapshot: &Snapshot, at: DateTime<Utc>) -> String {
        let mut fields = vec![at.format(TIMESTAMP_FORMAT).to_string()];
        fields.extend(snapshot.csv_fields());
        if let Some(output) = &self.output {
            fields.push(format!("{:.2}", output.get()));
        }
        fields.join(",")
    }

    fn compose_display(&self, snapshot: &Snapshot) -> String {
        let mut text = snapshot.render_table();
        if let Some(output) = &self.output {
            text.push_str(&format!("{:>20} {:>10.2} {:>10}\n", "Governor output", output.get(), "%"));
        }
        text
    }

    /// Take a snapshot and emit its events.
    pub fn record(&mut self, at: DateTime<Utc>) {
        if self.closed {
            return;
        }
        let snapshot = self.table.snapshot();
        let mut events = Vec::with_capacity(3);
        if !self.header_sent {
            events.push(RecorderEvent::Header(self.header(&snapshot)));
        }
        events.push(RecorderEvent::Row(self.compose_line(&snapshot, at)));
        if self.display {
            events.push(RecorderEvent::Display(self.compose_display(&snapshot)));
        }
        for event in events {
            if self.tx.send(event).is_err() {
                warn!("recorder output channel closed; recording stopped");
                self.closed = true;
                return;
            }
        }
        self.header_sent = true;
    }
}

impl PeriodicWorker for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn tick(&mut self, _now: f64) {
        self.record(Utc::now());
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use gs_core::ManualClock;
    use gs_telemetry::{MeasurementDescriptor, MemoryBus, SourceConfig, TelemetrySource};
    use std::sync::mpsc;

    fn table() -> Arc<CurrentValueTable> {
        let bus = MemoryBus::new();
        bus.set_register(1024, 250);
        let descriptors = vec![
            MeasurementDescriptor::new("Oil pressure", "kPa", 1024, 1, 1.0, 0.0, None).unwrap(),
            MeasurementDescriptor::new("Fuel level", "%", 1027, 1, 1.0, 0.0, None).unwrap(),
        ];
        let clock = Arc::new(ManualClock::new(0.0));
        let mut source = TelemetrySource::new(descriptors, bus, clock, SourceConfig::default()).unwrap();
        source.poll_all(0.0);
        source.table()
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn header_then_rows() {
        let (tx, rx) = mpsc::channel();
        let output = OutputHandle::new();
        output.publish(12.5);
        let mut recorder = Recorder::new(table(), Some(output), Duration::from_secs(1), false, tx);

        recorder.record(at());
        recorder.record(at());
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                RecorderEvent::Header("timestamp,Oil pressure,Fuel level,output".to_string()),
                RecorderEvent::Row("2024-05-01 12:00:00.000,250,,12.50".to_string()),
                RecorderEvent::Row("2024-05-01 12:00:00.000,250,,12.50".to_string()),
            ]
        );
    }

    #[test]
    fn display_marks_missing_values() {
        let (tx, rx) = mpsc::channel();
        let mut recorder = Recorder::new(table(), None, Duration::from_secs(1), true, tx);
        recorder.record(at());
        let display = rx
            .try_iter()
            .find_map(|e| match e {
                RecorderEvent::Display(text) => Some(text),
                _ => None,
            })
            .unwrap();
        assert!(display.contains("Fuel level"));
        assert!(display.contains(gs_telemetry::NO_DATA));
    }

    #[test]
    fn stops_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let mut recorder = Recorder::new(table(), None, Duration::from_secs(1), false, tx);
        recorder.record(at());
        assert!(recorder.closed);
    }
}
