//! Read-only measurement lookup.
//!
//! The telemetry value table implements [`MeasurementProvider`]; the control
//! loop and the recorder only ever see it through this trait.

/// A successfully decoded value together with how long ago it was read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Engineering-unit value.
    pub value: f64,
    /// Seconds since the last successful read.
    pub age: f64,
}

impl Measurement {
    /// True when the last successful read is older than `max_age` seconds.
    pub fn is_older_than(&self, max_age: f64) -> bool {
        self.age > max_age
    }
}

/// Trait for types that can provide the latest value of a named measurement.
pub trait MeasurementProvider: Send + Sync {
    /// Latest value of `name`.
    ///
    /// Returns `None` if the name is unknown or has never been read successfully.
    fn measurement(&self, name: &str) -> Option<Measurement>;
}
