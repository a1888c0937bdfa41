//! Open-loop step test drive.

use serde::{Deserialize, Serialize};

use crate::error::{ControlError, ControlResult};

/// Square wave between `low` and `high`, switching every `half_period` seconds.
///
/// Used to measure the plant response before tuning: the loop drives this
/// instead of the PID output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepProfile {
    pub low: f64,
    pub high: f64,
    #[serde(rename = "half_period_s")]
    pub half_period: f64,
}

impl StepProfile {
    pub fn new(low: f64, high: f64, half_period: f64) -> ControlResult<Self> {
        let profile = Self {
            low,
            high,
            half_period,
        };
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> ControlResult<()> {
        if !self.low.is_finite() || !self.high.is_finite() {
            return Err(ControlError::invalid("step levels must be finite"));
        }
        if !self.half_period.is_finite() || self.half_period <= 0.0 {
            return Err(ControlError::invalid(format!(
                "step half period must be positive, got {}",
                self.half_period
            )));
        }
        Ok(())
    }

    /// Level at `now` for a wave started at `start`. Starts low.
    pub fn value_at(&self, now: f64, start: f64) -> f64 {
        let elapsed = (now - start).max(0.0);
        let phase = (elapsed / self.half_period).floor() as u64;
        if phase % 2 == 0 { self.low } else { self.high }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alternates_every_half_period() {
        let step = StepProfile::new(20.0, 60.0, 5.0).unwrap();
        assert_eq!(step.value_at(100.0, 100.0), 20.0);
        assert_eq!(step.value_at(104.9, 100.0), 20.0);
        assert_eq!(step.value_at(105.0, 100.0), 60.0);
        assert_eq!(step.value_at(110.0, 100.0), 20.0);
        // Before the start the wave holds low.
        assert_eq!(step.value_at(90.0, 100.0), 20.0);
    }

    #[test]
    fn rejects_zero_period() {
        assert!(StepProfile::new(0.0, 1.0, 0.0).is_err());
    }
}
