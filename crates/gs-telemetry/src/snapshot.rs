//! Point-in-time copies of the value table and their text renderings.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Marker shown instead of a number when a measurement has no usable value.
pub const NO_DATA: &str = "no data";

/// One measurement in a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotRow {
    pub name: String,
    pub units: String,
    pub address: u16,
    /// Last good value, `None` if never read.
    pub value: Option<f64>,
    /// Seconds since the last good read.
    pub age: Option<f64>,
    /// The last attempt failed; `value` is the previous good reading.
    pub stale: bool,
}

impl SnapshotRow {
    /// Value fit for display: absent when never read or when the last read failed.
    pub fn current(&self) -> Option<f64> {
        if self.stale { None } else { self.value }
    }
}

/// Copy of every table entry, in descriptor order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Clock time at which the copy was taken.
    pub taken_at: f64,
    pub rows: Vec<SnapshotRow>,
}

impl Snapshot {
    pub fn row(&self, name: &str) -> Option<&SnapshotRow> {
        self.rows.iter().find(|r| r.name == name)
    }

    /// Comma separated measurement names.
    pub fn csv_header(&self) -> String {
        self.rows
            .iter()
            .map(|r| r.name.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// One field per measurement; missing values are empty fields.
    pub fn csv_fields(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|r| r.current().map(|v| v.to_string()).unwrap_or_default())
            .collect()
    }

    /// Human readable table, one measurement per line. Same as `Display`.
    pub fn render_table(&self) -> String {
        self.to_string()
    }
}

/// Values in `sec` units are absolute times and are shown as UTC dates.
impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            match row.current() {
                None => writeln!(f, "{:>20} {:>10} {:>10}", row.name, NO_DATA, row.units)?,
                Some(v) if row.units == "sec" => {
                    writeln!(f, "{:>20} {:>21}", row.name, format_epoch(v))?
                }
                Some(v) => writeln!(f, "{:>20} {:>10.2} {:>10}", row.name, v, row.units)?,
            }
        }
        Ok(())
    }
}

fn format_epoch(seconds: f64) -> String {
    DateTime::<Utc>::from_timestamp(seconds as i64, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| NO_DATA.to_string())
}
