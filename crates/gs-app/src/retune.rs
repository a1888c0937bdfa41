//! Live retuning from the configuration file.
//!
//! The watcher re-reads the config file on its own schedule and turns any
//! change in the control section into [`ControlCommand`]s. The control loop
//! applies them on its next tick, so the PID is never touched from here.

use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::time::Duration;

use gs_controls::{ControlCommand, Direction, Tunings};
use gs_core::PeriodicWorker;
use tracing::{debug, info, warn};

use crate::config::{ControlConfig, load_config};

/// The retunable subset of a control section.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TuningState {
    tunings: Tunings,
    setpoint: f64,
    sample_time: f64,
    limits: (f64, f64),
    direction: Direction,
}

impl From<&ControlConfig> for TuningState {
    fn from(control: &ControlConfig) -> Self {
        Self {
            tunings: control.tunings(),
            setpoint: control.setpoint,
            sample_time: control.sample_time_s,
            limits: (control.output_min, control.output_max),
            direction: control.direction,
        }
    }
}

fn diff(old: &TuningState, new: &TuningState) -> Vec<ControlCommand> {
    let mut commands = Vec::new();
    if old.direction != new.direction {
        commands.push(ControlCommand::SetDirection(new.direction));
    }
    if old.sample_time != new.sample_time {
        commands.push(ControlCommand::SetSampleTime(new.sample_time));
    }
    if old.tunings != new.tunings {
        commands.push(ControlCommand::SetTunings(new.tunings));
    }
    if old.limits != new.limits {
        commands.push(ControlCommand::SetOutputLimits {
            min: new.limits.0,
            max: new.limits.1,
        });
    }
    if old.setpoint != new.setpoint {
        commands.push(ControlCommand::SetSetpoint(new.setpoint));
    }
    commands
}

/// Watches one config file for tuning changes.
pub struct TuningWatcher {
    path: PathBuf,
    interval: Duration,
    tx: Sender<ControlCommand>,
    current: TuningState,
    closed: bool,
}

impl TuningWatcher {
    /// `control` is the section the loop was started with.
    pub fn new(
        path: impl Into<PathBuf>,
        control: &ControlConfig,
        interval: Duration,
        tx: Sender<ControlCommand>,
    ) -> Self {
        Self {
            path: path.into(),
            interval,
            tx,
            current: TuningState::from(control),
            closed: false,
        }
    }

    /// Re-read the file and send commands for whatever changed.
    ///
    /// Returns the number of commands sent. An unreadable or invalid file is
    /// logged and skipped; the running tuning stays as it was.
    pub fn check(&mut self) -> usize {
        if self.closed {
            return 0;
        }
        let config = match load_config(&self.path) {
            Ok(config) => config,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "config reload failed");
                return 0;
            }
        };
        let Some(control) = config.control.as_ref() else {
            warn!(path = %self.path.display(), "control section removed; keeping current tuning");
            return 0;
        };

        let next = TuningState::from(control);
        let commands = diff(&self.current, &next);
        if commands.is_empty() {
            debug!(path = %self.path.display(), "tuning unchanged");
            return 0;
        }

        let count = commands.len();
        for command in commands {
            info!(?command, "tuning change from config");
            if self.tx.send(command).is_err() {
                warn!("control loop gone; retuning stopped");
                self.closed = true;
                return 0;
            }
        }
        self.current = next;
        count
    }
}

impl PeriodicWorker for TuningWatcher {
    fn name(&self) -> &str {
        "retune"
    }

    fn tick(&mut self, _now: f64) {
        self.check();
    }

    fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use std::fs;
    use std::path::Path;
    use std::sync::mpsc;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        dir.push(format!("{}_{}", prefix, nanos));
        dir
    }

    fn config_text(kp: f64, setpoint: f64) -> String {
        format!(
            "telemetry:\n  descriptors: m.csv\n  transport:\n    mode: memory\n\
             control:\n  process_variable: Speed\n  setpoint: {setpoint}\n  kp: {kp}\n  ki: 0.5\n"
        )
    }

    fn write(path: &Path, text: &str) {
        fs::write(path, text).expect("failed to write config");
    }

    #[test]
    fn sends_only_changed_fields() {
        let dir = unique_temp_dir("gs_retune_changes");
        fs::create_dir_all(&dir).expect("failed to create temp dir");
        let path = dir.join("genset.yaml");
        let text = config_text(1.0, 25.0);
        write(&path, &text);

        let config = AppConfig::from_yaml_str(&text).unwrap();
        let (tx, rx) = mpsc::channel();
        let mut watcher =
            TuningWatcher::new(&path, config.control.as_ref().unwrap(), Duration::from_secs(1), tx);

        assert_eq!(watcher.check(), 0);

        write(&path, &config_text(2.0, 30.0));
        assert_eq!(watcher.check(), 2);
        let commands: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            commands,
            vec![
                ControlCommand::SetTunings(Tunings::new(2.0, 0.5, 0.0)),
                ControlCommand::SetSetpoint(30.0),
            ]
        );

        // Same content again: nothing new.
        assert_eq!(watcher.check(), 0);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn invalid_file_keeps_tuning() {
        let dir = unique_temp_dir("gs_retune_invalid");
        fs::create_dir_all(&dir).expect("failed to create temp dir");
        let path = dir.join("genset.yaml");
        let text = config_text(1.0, 25.0);
        write(&path, &text);

        let config = AppConfig::from_yaml_str(&text).unwrap();
        let (tx, rx) = mpsc::channel();
        let mut watcher =
            TuningWatcher::new(&path, config.control.as_ref().unwrap(), Duration::from_secs(1), tx);

        write(&path, &config_text(-1.0, 25.0));
        assert_eq!(watcher.check(), 0);
        assert!(rx.try_recv().is_err());

        write(&path, &config_text(1.0, 40.0));
        assert_eq!(watcher.check(), 1);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn detects_direction_and_limits() {
        let control: ControlConfig = serde_yaml::from_str("process_variable: Speed\nsetpoint: 1.0\nkp: 1.0\n").unwrap();
        let mut next = control.clone();
        next.direction = Direction::Reverse;
        next.output_max = 50.0;
        let commands = diff(&TuningState::from(&control), &TuningState::from(&next));
        assert_eq!(
            commands,
            vec![
                ControlCommand::SetDirection(Direction::Reverse),
                ControlCommand::SetOutputLimits { min: 0.0, max: 50.0 },
            ]
        );
    }
}
