//! YAML run configuration.
//!
//! One file describes the bus, the optional governor loop, and the recorder.
//! It is parsed into explicit structs and validated once, before any worker
//! starts; nothing is re-checked mid-run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gs_controls::{Direction, DriveMode, EnableGate, PidConfig, RunnerConfig, StepProfile, Tunings};
use gs_telemetry::{MeasurementDescriptor, SourceConfig};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing reference: {name} in {context}")]
    MissingReference { name: String, context: String },
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn positive(field: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, value, "must be positive"))
    }
}

/// Positive and small enough to become a [`Duration`].
fn period(field: &str, value: f64) -> Result<(), ValidationError> {
    positive(field, value)?;
    Duration::try_from_secs_f64(value)
        .map(|_| ())
        .map_err(|_| invalid(field, value, "is too long"))
}

/// Seconds to [`Duration`], saturating where `period` would have refused.
fn saturating_secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

fn finite(field: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, value, "must be finite"))
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub control: Option<ControlConfig>,
    #[serde(default)]
    pub recorder: RecorderConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Descriptor file; relative paths are taken from the config file's directory.
    pub descriptors: PathBuf,
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,
    pub transport: TransportConfig,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_reconnect_after")]
    pub reconnect_after: u32,
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,
}

/// How registers are reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum TransportConfig {
    Tcp {
        host: String,
        #[serde(default = "default_tcp_port")]
        port: u16,
    },
    Rtu {
        dev: String,
        #[serde(default = "default_baudrate")]
        baudrate: u32,
    },
    /// Fixed register contents, for dry runs without hardware.
    Memory {
        #[serde(default)]
        registers: BTreeMap<u16, u16>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlConfig {
    pub process_variable: String,
    pub setpoint: f64,
    pub kp: f64,
    #[serde(default)]
    pub ki: f64,
    #[serde(default)]
    pub kd: f64,
    #[serde(default = "default_sample_time_s")]
    pub sample_time_s: f64,
    #[serde(default)]
    pub output_min: f64,
    #[serde(default = "default_output_max")]
    pub output_max: f64,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default = "default_cadence_ms")]
    pub cadence_ms: u64,
    #[serde(default = "default_stale_after_s")]
    pub stale_after_s: f64,
    #[serde(default)]
    pub safe_output: f64,
    #[serde(default)]
    pub enable: Option<EnableGate>,
    #[serde(default)]
    pub drive: DriveConfig,
    /// Re-read this file for tuning changes every so many seconds.
    #[serde(default)]
    pub reload_interval_s: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum DriveConfig {
    #[default]
    Pid,
    Step {
        low: f64,
        high: f64,
        half_period_s: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecorderConfig {
    #[serde(default = "default_record_interval_s")]
    pub interval_s: f64,
    /// Also render the human-readable table each interval.
    #[serde(default)]
    pub display: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            interval_s: default_record_interval_s(),
            display: false,
        }
    }
}

fn default_unit_id() -> u8 {
    1
}
fn default_timeout_ms() -> u64 {
    500
}
fn default_reconnect_after() -> u32 {
    5
}
fn default_scan_interval_ms() -> u64 {
    10
}
fn default_tcp_port() -> u16 {
    502
}
fn default_baudrate() -> u32 {
    19200
}
fn default_sample_time_s() -> f64 {
    1.0
}
fn default_output_max() -> f64 {
    100.0
}
fn default_cadence_ms() -> u64 {
    100
}
fn default_stale_after_s() -> f64 {
    5.0
}
fn default_record_interval_s() -> f64 {
    1.0
}

impl AppConfig {
    /// Parse and validate configuration text. Paths are left as written.
    pub fn from_yaml_str(text: &str) -> AppResult<Self> {
        let config: AppConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> AppResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.telemetry.validate()?;
        if let Some(control) = &self.control {
            control.validate()?;
        }
        self.recorder.validate()
    }

    /// Check that every measurement the controller names is described.
    pub fn validate_against(&self, descriptors: &[MeasurementDescriptor]) -> Result<(), ValidationError> {
        let Some(control) = &self.control else {
            return Ok(());
        };
        let known = |name: &str| descriptors.iter().any(|d| d.name == name);
        if !known(&control.process_variable) {
            return Err(ValidationError::MissingReference {
                name: control.process_variable.clone(),
                context: "control.process_variable".to_string(),
            });
        }
        if let Some(gate) = &control.enable {
            if !known(&gate.measurement) {
                return Err(ValidationError::MissingReference {
                    name: gate.measurement.clone(),
                    context: "control.enable.measurement".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Make the descriptor path absolute relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.telemetry.descriptors.is_relative() {
            self.telemetry.descriptors = base.join(&self.telemetry.descriptors);
        }
    }
}

impl TelemetryConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.descriptors.as_os_str().is_empty() {
            return Err(invalid("telemetry.descriptors", "", "must name a file"));
        }
        if self.timeout_ms == 0 {
            return Err(invalid("telemetry.timeout_ms", 0, "must be positive"));
        }
        if self.reconnect_after == 0 {
            return Err(invalid("telemetry.reconnect_after", 0, "must be at least 1"));
        }
        if self.scan_interval_ms == 0 {
            return Err(invalid("telemetry.scan_interval_ms", 0, "must be positive"));
        }
        match &self.transport {
            TransportConfig::Tcp { host, port } => {
                if host.trim().is_empty() {
                    return Err(invalid("telemetry.transport.host", host, "must not be empty"));
                }
                if *port == 0 {
                    return Err(invalid("telemetry.transport.port", port, "must be non-zero"));
                }
            }
            TransportConfig::Rtu { dev, baudrate } => {
                if dev.trim().is_empty() {
                    return Err(invalid("telemetry.transport.dev", dev, "must not be empty"));
                }
                if *baudrate == 0 {
                    return Err(invalid("telemetry.transport.baudrate", baudrate, "must be positive"));
                }
            }
            TransportConfig::Memory { .. } => {}
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            reconnect_after: self.reconnect_after,
            scan_interval: Duration::from_millis(self.scan_interval_ms),
        }
    }
}

impl ControlConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.process_variable.trim().is_empty() {
            return Err(invalid("control.process_variable", "", "must name a measurement"));
        }
        finite("control.setpoint", self.setpoint)?;
        for (field, gain) in [("control.kp", self.kp), ("control.ki", self.ki), ("control.kd", self.kd)] {
            if !gain.is_finite() || gain < 0.0 {
                return Err(invalid(field, gain, "must be finite and non-negative"));
            }
        }
        positive("control.sample_time_s", self.sample_time_s)?;
        finite("control.output_min", self.output_min)?;
        finite("control.output_max", self.output_max)?;
        if self.output_max < self.output_min {
            return Err(invalid(
                "control.output_max",
                self.output_max,
                "must not be below output_min",
            ));
        }
        if self.cadence_ms == 0 {
            return Err(invalid("control.cadence_ms", 0, "must be positive"));
        }
        positive("control.stale_after_s", self.stale_after_s)?;
        finite("control.safe_output", self.safe_output)?;
        if let Some(gate) = &self.enable {
            if gate.mask == 0 {
                return Err(invalid("control.enable.mask", 0, "must select at least one bit"));
            }
        }
        if let DriveConfig::Step {
            low,
            high,
            half_period_s,
        } = self.drive
        {
            finite("control.drive.low", low)?;
            finite("control.drive.high", high)?;
            positive("control.drive.half_period_s", half_period_s)?;
        }
        if let Some(interval) = self.reload_interval_s {
            period("control.reload_interval_s", interval)?;
        }
        Ok(())
    }

    /// How often the config file is re-read, if live retuning is on.
    pub fn reload_interval(&self) -> Option<Duration> {
        self.reload_interval_s.map(saturating_secs)
    }

    pub fn tunings(&self) -> Tunings {
        Tunings::new(self.kp, self.ki, self.kd)
    }

    pub fn pid_config(&self) -> PidConfig {
        PidConfig {
            tunings: self.tunings(),
            sample_time: self.sample_time_s,
            output_min: self.output_min,
            output_max: self.output_max,
            setpoint: self.setpoint,
            direction: self.direction,
        }
    }

    pub fn runner_config(&self) -> RunnerConfig {
        let drive = match self.drive {
            DriveConfig::Pid => DriveMode::Pid,
            DriveConfig::Step {
                low,
                high,
                half_period_s,
            } => DriveMode::Step(StepProfile {
                low,
                high,
                half_period: half_period_s,
            }),
        };
        RunnerConfig {
            process_variable: self.process_variable.clone(),
            cadence: Duration::from_millis(self.cadence_ms),
            stale_after: self.stale_after_s,
            safe_output: self.safe_output,
            enable: self.enable.clone(),
            drive,
        }
    }
}

impl RecorderConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        period("recorder.interval_s", self.interval_s)
    }

    pub fn interval(&self) -> Duration {
        saturating_secs(self.interval_s)
    }
}

/// Load, validate, and resolve a configuration file.
pub fn load_config(path: &Path) -> AppResult<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| AppError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config = AppConfig::from_yaml_str(&content)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    config.resolve_paths(base);
    Ok(config)
}
