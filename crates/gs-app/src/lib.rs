//! Application layer for the generator controller.
//!
//! Shared by every front end: configuration loading and validation, the
//! recorder, live retuning, and the supervisor that runs all workers.

pub mod config;
pub mod error;
pub mod recorder;
pub mod retune;
pub mod supervisor;

pub use config::{
    AppConfig, ControlConfig, DriveConfig, RecorderConfig, TelemetryConfig, TransportConfig,
    ValidationError, load_config,
};
pub use error::{AppError, AppResult};
pub use recorder::{Recorder, RecorderEvent, TIMESTAMP_FORMAT};
pub use retune::TuningWatcher;
pub use supervisor::{Supervisor, build_transport, load_checked, read_once};
