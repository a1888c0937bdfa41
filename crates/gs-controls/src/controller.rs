//! PID governor controller.
//!
//! Discrete PID with:
//! - Derivative on measurement (setpoint changes cause no derivative kick)
//! - Integral clamping to the output range (anti-windup)
//! - Manual/auto mode with bumpless manual to auto transfer
//! - Direct/reverse action
//!
//! Integral and derivative gains are stored pre-scaled by the sample time, so
//! each due tick adds `ki * sample_time * error` directly. Always change gains
//! through [`PidController::set_tunings`].

use crate::error::{ControlError, ControlResult};
use gs_core::{ensure_finite, ensure_non_negative, ensure_positive};
use serde::{Deserialize, Serialize};

/// Sign convention of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Output up drives the process variable up.
    #[default]
    Direct,
    /// Output up drives the process variable down; all gains are negated.
    Reverse,
}

/// Raw, unscaled gains as configured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tunings {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Tunings {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }

    fn validate(&self) -> ControlResult<()> {
        for (name, gain) in [("kp", self.kp), ("ki", self.ki), ("kd", self.kd)] {
            ensure_non_negative(gain, name).map_err(|e| ControlError::invalid(e.to_string()))?;
        }
        Ok(())
    }
}

/// Construction parameters for a [`PidController`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PidConfig {
    pub tunings: Tunings,
    /// Seconds between due computations.
    pub sample_time: f64,
    pub output_min: f64,
    pub output_max: f64,
    pub setpoint: f64,
    #[serde(default)]
    pub direction: Direction,
}

impl PidConfig {
    pub fn validate(&self) -> ControlResult<()> {
        self.tunings.validate()?;
        validate_sample_time(self.sample_time)?;
        validate_limits(self.output_min, self.output_max)?;
        ensure_finite(self.setpoint, "setpoint").map_err(|e| ControlError::invalid(e.to_string()))?;
        Ok(())
    }
}

fn validate_sample_time(sample_time: f64) -> ControlResult<()> {
    ensure_positive(sample_time, "sample_time")
        .map(|_| ())
        .map_err(|e| ControlError::invalid(format!("{e} ({sample_time})")))
}

fn validate_limits(min: f64, max: f64) -> ControlResult<()> {
    if !min.is_finite() || !max.is_finite() {
        return Err(ControlError::invalid("output limits must be finite"));
    }
    if max < min {
        return Err(ControlError::invalid(format!(
            "output_max ({max}) must not be below output_min ({min})"
        )));
    }
    Ok(())
}

/// PID controller state and tuning.
///
/// Not thread-safe by intent: exactly one control loop owns it, and only the
/// computed output is shared.
#[derive(Debug, Clone, PartialEq)]
pub struct PidController {
    raw: Tunings,
    kp: f64,
    ki: f64,
    kd: f64,
    sample_time: f64,
    setpoint: f64,
    process_variable: f64,
    last_process_variable: f64,
    integral: f64,
    last_time: f64,
    output: f64,
    output_min: f64,
    output_max: f64,
    in_auto: bool,
    direction: Direction,
}

impl PidController {
    /// Create a controller in manual mode with zero output (clamped to the limits).
    pub fn new(config: &PidConfig) -> ControlResult<Self> {
        config.validate()?;
        let output = 0.0_f64.clamp(config.output_min, config.output_max);
        let mut pid = Self {
            raw: config.tunings,
            kp: 0.0,
            ki: 0.0,
            kd: 0.0,
            sample_time: config.sample_time,
            setpoint: config.setpoint,
            process_variable: 0.0,
            last_process_variable: 0.0,
            integral: output,
            last_time: 0.0,
            output,
            output_min: config.output_min,
            output_max: config.output_max,
            in_auto: false,
            direction: config.direction,
        };
        pid.rescale();
        Ok(pid)
    }

    fn rescale(&mut self) {
        let sign = match self.direction {
            Direction::Direct => 1.0,
            Direction::Reverse => -1.0,
        };
        self.kp = sign * self.raw.kp;
        self.ki = sign * self.raw.ki * self.sample_time;
        self.kd = sign * self.raw.kd / self.sample_time;
    }

    /// Replace the gains. Negative or non-finite gains are rejected and nothing changes.
    pub fn set_tunings(&mut self, tunings: Tunings) -> ControlResult<()> {
        tunings.validate()?;
        self.raw = tunings;
        self.rescale();
        Ok(())
    }

    /// Change the sample period, rescaling the integral and derivative gains.
    pub fn set_sample_time(&mut self, sample_time: f64) -> ControlResult<()> {
        validate_sample_time(sample_time)?;
        self.sample_time = sample_time;
        self.rescale();
        Ok(())
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
        self.rescale();
    }

    /// Change the output range; output and integral are clamped into it at once.
    pub fn set_output_limits(&mut self, min: f64, max: f64) -> ControlResult<()> {
        validate_limits(min, max)?;
        self.output_min = min;
        self.output_max = max;
        self.output = self.output.clamp(min, max);
        self.integral = self.integral.clamp(min, max);
        Ok(())
    }

    pub fn set_setpoint(&mut self, setpoint: f64) -> ControlResult<()> {
        if !setpoint.is_finite() {
            return Err(ControlError::invalid("setpoint must be finite"));
        }
        self.setpoint = setpoint;
        Ok(())
    }

    /// Switch between automatic and manual mode.
    ///
    /// Manual to auto seeds the integral with the current output and the
    /// derivative history with the current process variable, so the first
    /// computed output continues from where manual mode left it.
    pub fn set_auto(&mut self, enable: bool) {
        if enable && !self.in_auto {
            self.integral = self.output.clamp(self.output_min, self.output_max);
            self.last_process_variable = self.process_variable;
        }
        self.in_auto = enable;
    }

    /// Drive the output directly. Only allowed in manual mode.
    pub fn set_manual_output(&mut self, output: f64) -> ControlResult<()> {
        if self.in_auto {
            return Err(ControlError::StateError {
                what: "manual output requires manual mode".to_string(),
            });
        }
        if !output.is_finite() {
            return Err(ControlError::invalid("manual output must be finite"));
        }
        self.output = output.clamp(self.output_min, self.output_max);
        Ok(())
    }

    /// Record a process variable reading without computing.
    pub fn observe(&mut self, process_variable: f64) {
        if process_variable.is_finite() {
            self.process_variable = process_variable;
        }
    }

    /// Run one controller step at time `now`.
    ///
    /// Returns the previous output unchanged when in manual mode, when less
    /// than one sample period has passed since the last computation, or when
    /// `process_variable` is not finite.
    pub fn compute(&mut self, now: f64, process_variable: f64) -> f64 {
        if !process_variable.is_finite() {
            return self.output;
        }
        self.process_variable = process_variable;
        if !self.in_auto || now - self.last_time < self.sample_time {
            return self.output;
        }

        let error = self.setpoint - process_variable;
        self.integral = (self.integral + error * self.ki).clamp(self.output_min, self.output_max);
        let d_term = self.kd * (process_variable - self.last_process_variable);
        self.output = (self.kp * error + self.integral - d_term).clamp(self.output_min, self.output_max);

        self.last_time = now;
        self.last_process_variable = process_variable;
        self.output
    }

    pub fn output(&self) -> f64 {
        self.output
    }

    pub fn setpoint(&self) -> f64 {
        self.setpoint
    }

    pub fn process_variable(&self) -> f64 {
        self.process_variable
    }

    /// Gains as configured, before scaling and direction.
    pub fn tunings(&self) -> Tunings {
        self.raw
    }

    /// Working gains `(kp, ki * T, kd / T)` with the direction sign applied.
    pub fn scaled_gains(&self) -> (f64, f64, f64) {
        (self.kp, self.ki, self.kd)
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn sample_time(&self) -> f64 {
        self.sample_time
    }

    pub fn output_limits(&self) -> (f64, f64) {
        (self.output_min, self.output_max)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_auto(&self) -> bool {
        self.in_auto
    }

    pub fn last_time(&self) -> f64 {
        self.last_time
    }
}
