//! The governor control loop.
//!
//! [`ControlLoopRunner`] owns the [`PidController`] exclusively. Each tick it
//! reads the process variable from a [`MeasurementProvider`], decides whether
//! the input can be trusted, and forwards an output to the [`Actuator`].
//! Tuning changes arrive as [`ControlCommand`]s over a channel and are applied
//! at the start of the next tick.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::time::Duration;

use gs_core::{MeasurementProvider, PeriodicWorker};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::actuator::{Actuator, OutputHandle};
use crate::controller::{Direction, PidConfig, PidController, Tunings};
use crate::error::{ControlError, ControlResult};
use crate::step::StepProfile;

/// Status bit that must be set for the loop to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnableGate {
    /// Measurement holding the status word.
    pub measurement: String,
    /// Bits that must be set (any of them).
    pub mask: u32,
}

/// What produces the output while the input is healthy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriveMode {
    Pid,
    Step(StepProfile),
}

/// Loop policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerConfig {
    /// Name of the process-variable measurement.
    pub process_variable: String,
    /// Sleep between ticks; usually shorter than the PID sample time.
    pub cadence: Duration,
    /// Readings older than this many seconds are not used.
    pub stale_after: f64,
    /// Output forced while the input is missing, stale, or disabled.
    pub safe_output: f64,
    pub enable: Option<EnableGate>,
    pub drive: DriveMode,
}

impl RunnerConfig {
    pub fn validate(&self) -> ControlResult<()> {
        if self.process_variable.trim().is_empty() {
            return Err(ControlError::invalid("process_variable must be named"));
        }
        if self.cadence.is_zero() {
            return Err(ControlError::invalid("cadence must be positive"));
        }
        if !self.stale_after.is_finite() || self.stale_after <= 0.0 {
            return Err(ControlError::invalid(format!(
                "stale_after must be positive, got {}",
                self.stale_after
            )));
        }
        if !self.safe_output.is_finite() {
            return Err(ControlError::invalid("safe_output must be finite"));
        }
        if let DriveMode::Step(profile) = &self.drive {
            profile.validate()?;
        }
        Ok(())
    }
}

/// Runtime change requested from outside the loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    SetTunings(Tunings),
    SetSetpoint(f64),
    SetOutputLimits { min: f64, max: f64 },
    SetSampleTime(f64),
    SetDirection(Direction),
}

/// Why the loop is holding the safe output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    /// Process variable never read or unknown.
    Missing,
    /// Process variable older than the stale threshold.
    Stale,
    /// Enable gate not satisfied.
    Disabled,
}

/// Periodic governor loop.
pub struct ControlLoopRunner<A: Actuator> {
    pid: PidController,
    config: RunnerConfig,
    provider: Arc<dyn MeasurementProvider>,
    actuator: A,
    commands: Receiver<ControlCommand>,
    command_tx: Sender<ControlCommand>,
    output: OutputHandle,
    held: Option<HoldReason>,
    step_start: Option<f64>,
}

impl<A: Actuator> ControlLoopRunner<A> {
    pub fn new(
        pid_config: &PidConfig,
        config: RunnerConfig,
        provider: Arc<dyn MeasurementProvider>,
        actuator: A,
    ) -> ControlResult<Self> {
        config.validate()?;
        let pid = PidController::new(pid_config)?;
        let (command_tx, commands) = mpsc::channel();
        let output = OutputHandle::new();
        output.publish(pid.output());
        Ok(Self {
            pid,
            config,
            provider,
            actuator,
            commands,
            command_tx,
            output,
            held: None,
            step_start: None,
        })
    }

    /// Sender for runtime tuning commands.
    pub fn command_sender(&self) -> Sender<ControlCommand> {
        self.command_tx.clone()
    }

    /// Handle to the most recent output.
    pub fn output_handle(&self) -> OutputHandle {
        self.output.clone()
    }

    pub fn pid(&self) -> &PidController {
        &self.pid
    }

    /// Current hold reason, `None` while the loop is driving normally.
    pub fn held(&self) -> Option<HoldReason> {
        self.held
    }

    /// Run one iteration at `now` and return the output sent to the actuator.
    pub fn tick_at(&mut self, now: f64) -> f64 {
        self.drain_commands();

        let output = match self.evaluate_input() {
            Ok(pv) => self.drive(now, pv),
            Err(reason) => self.hold(reason),
        };

        if let Err(err) = self.actuator.set_output(output) {
            warn!(output, error = %err, "actuator rejected output");
        }
        self.output.publish(output);
        output
    }

    fn drain_commands(&mut self) {
        loop {
            match self.commands.try_recv() {
                Ok(command) => self.apply(command),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
    }

    fn apply(&mut self, command: ControlCommand) {
        let result = match &command {
            ControlCommand::SetTunings(t) => self.pid.set_tunings(*t),
            ControlCommand::SetSetpoint(sp) => self.pid.set_setpoint(*sp),
            ControlCommand::SetOutputLimits { min, max } => self.pid.set_output_limits(*min, *max),
            ControlCommand::SetSampleTime(t) => self.pid.set_sample_time(*t),
            ControlCommand::SetDirection(d) => {
                self.pid.set_direction(*d);
                Ok(())
            }
        };
        match result {
            Ok(()) => info!(?command, "controller retuned"),
            Err(err) => warn!(?command, error = %err, "controller change rejected"),
        }
    }

    fn evaluate_input(&self) -> Result<f64, HoldReason> {
        let pv = self
            .provider
            .measurement(&self.config.process_variable)
            .ok_or(HoldReason::Missing)?;
        if pv.is_older_than(self.config.stale_after) || !pv.value.is_finite() {
            return Err(HoldReason::Stale);
        }
        if let Some(gate) = &self.config.enable {
            let enabled = self
                .provider
                .measurement(&gate.measurement)
                .filter(|m| !m.is_older_than(self.config.stale_after) && m.value >= 0.0)
                .is_some_and(|m| (m.value as u64) & u64::from(gate.mask) != 0);
            if !enabled {
                return Err(HoldReason::Disabled);
            }
        }
        Ok(pv.value)
    }

    fn hold(&mut self, reason: HoldReason) -> f64 {
        if self.held != Some(reason) {
            warn!(
                measurement = %self.config.process_variable,
                ?reason,
                safe_output = self.config.safe_output,
                "forcing manual mode"
            );
        }
        self.held = Some(reason);
        self.step_start = None;
        self.pid.set_auto(false);
        if let Err(err) = self.pid.set_manual_output(self.config.safe_output) {
            warn!(error = %err, "could not apply safe output");
        }
        self.pid.output()
    }

    fn drive(&mut self, now: f64, pv: f64) -> f64 {
        if let Some(reason) = self.held.take() {
            info!(?reason, measurement = %self.config.process_variable, "input restored");
        }
        self.pid.observe(pv);
        match self.config.drive {
            DriveMode::Pid => {
                self.pid.set_auto(true);
                self.pid.compute(now, pv)
            }
            DriveMode::Step(profile) => {
                self.pid.set_auto(false);
                let start = *self.step_start.get_or_insert(now);
                if let Err(err) = self.pid.set_manual_output(profile.value_at(now, start)) {
                    warn!(error = %err, "step output rejected");
                }
                self.pid.output()
            }
        }
    }
}

impl<A: Actuator> PeriodicWorker for ControlLoopRunner<A> {
    fn name(&self) -> &str {
        "control"
    }

    fn tick(&mut self, now: f64) {
        self.tick_at(now);
    }

    fn interval(&self) -> Duration {
        self.config.cadence
    }

    fn on_stop(&mut self) {
        let safe = self.config.safe_output;
        self.pid.set_auto(false);
        if self.pid.set_manual_output(safe).is_ok() {
            let output = self.pid.output();
            if let Err(err) = self.actuator.set_output(output) {
                warn!(error = %err, "actuator rejected shutdown output");
            }
            self.output.publish(output);
        }
    }
}
