//! Governor control for the generator controller.
//!
//! A PID controller ([`controller`]) owned by a periodic loop ([`runner`])
//! that reads its process variable from the telemetry table and writes its
//! output to an [`actuator::Actuator`].
//!
//! # Safety behavior
//!
//! The loop never computes on data it cannot trust. A process variable that is
//! missing, older than the stale threshold, or gated off by a status bit puts
//! the controller in manual mode at a configured safe output. Recovery back to
//! automatic is bumpless.

pub mod actuator;
pub mod controller;
pub mod error;
pub mod runner;
pub mod step;

pub use actuator::{Actuator, BoundedActuator, LoggingActuator, OutputHandle, RecordingActuator};
pub use controller::{Direction, PidConfig, PidController, Tunings};
pub use error::{ControlError, ControlResult};
pub use runner::{ControlCommand, ControlLoopRunner, DriveMode, EnableGate, HoldReason, RunnerConfig};
pub use step::StepProfile;
