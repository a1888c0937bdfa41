//! Actuator collaborators.
//!
//! The control loop never touches hardware registers. It hands a percentage
//! to an [`Actuator`], which might drive a PWM duty cycle, write a register, or
//! just record the value.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use crate::error::{ControlError, ControlResult};

/// Sink for controller output.
pub trait Actuator: Send {
    /// Apply `percent` (already clamped to the controller's output range).
    fn set_output(&mut self, percent: f64) -> ControlResult<()>;
}

impl<A: Actuator + ?Sized> Actuator for Box<A> {
    fn set_output(&mut self, percent: f64) -> ControlResult<()> {
        (**self).set_output(percent)
    }
}

/// Actuator that only logs. Used for dry runs.
#[derive(Debug, Default)]
pub struct LoggingActuator {
    last: Option<f64>,
}

impl LoggingActuator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Actuator for LoggingActuator {
    fn set_output(&mut self, percent: f64) -> ControlResult<()> {
        if self.last != Some(percent) {
            debug!(percent, "actuator output");
            self.last = Some(percent);
        }
        Ok(())
    }
}

/// Wraps another actuator and enforces a hardware range.
#[derive(Debug)]
pub struct BoundedActuator<A> {
    inner: A,
    min: f64,
    max: f64,
}

impl<A: Actuator> BoundedActuator<A> {
    pub fn new(inner: A, min: f64, max: f64) -> ControlResult<Self> {
        if !min.is_finite() || !max.is_finite() || max < min {
            return Err(ControlError::invalid(format!(
                "actuator range [{min}, {max}] is invalid"
            )));
        }
        Ok(Self { inner, min, max })
    }

    pub fn into_inner(self) -> A {
        self.inner
    }
}

impl<A: Actuator> Actuator for BoundedActuator<A> {
    fn set_output(&mut self, percent: f64) -> ControlResult<()> {
        if !percent.is_finite() {
            return Err(ControlError::Actuator {
                message: format!("refusing non-finite output {percent}"),
            });
        }
        self.inner.set_output(percent.clamp(self.min, self.max))
    }
}

/// Actuator that keeps every value it receives. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingActuator {
    values: Arc<Mutex<Vec<f64>>>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn values(&self) -> Vec<f64> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<f64> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .copied()
    }
}

impl Actuator for RecordingActuator {
    fn set_output(&mut self, percent: f64) -> ControlResult<()> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(percent);
        Ok(())
    }
}

/// Latest controller output, readable from other threads.
///
/// This is the only piece of controller state shared outside the loop.
#[derive(Debug, Clone)]
pub struct OutputHandle(Arc<AtomicU64>);

impl Default for OutputHandle {
    fn default() -> Self {
        Self(Arc::new(AtomicU64::new(0.0_f64.to_bits())))
    }
}

impl OutputHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_clamps_and_rejects_nan() {
        let record = RecordingActuator::new();
        let mut act = BoundedActuator::new(record.clone(), 0.0, 100.0).unwrap();
        act.set_output(120.0).unwrap();
        act.set_output(-3.0).unwrap();
        assert!(act.set_output(f64::NAN).is_err());
        assert_eq!(record.values(), vec![100.0, 0.0]);
    }

    #[test]
    fn invalid_range() {
        assert!(BoundedActuator::new(LoggingActuator::new(), 10.0, 0.0).is_err());
    }

    #[test]
    fn boxed_actuator_forwards() {
        let record = RecordingActuator::new();
        let mut boxed: Box<dyn Actuator> = Box::new(record.clone());
        boxed.set_output(12.5).unwrap();
        assert_eq!(record.last(), Some(12.5));
    }

    #[test]
    fn output_handle_shares_value() {
        let handle = OutputHandle::new();
        let reader = handle.clone();
        assert_eq!(reader.get(), 0.0);
        handle.publish(37.5);
        assert_eq!(reader.get(), 37.5);
    }
}
