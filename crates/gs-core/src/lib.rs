//! gs-core: shared foundation for the genset workspace.
//!
//! Contains:
//! - numeric (float validation helpers)
//! - clock (monotonic and manually driven time sources, in seconds)
//! - measured (read-only measurement lookup shared between workers)
//! - worker (periodic worker trait, cooperative stop signal, thread driver)
//! - error (shared error types)

pub mod clock;
pub mod error;
pub mod measured;
pub mod numeric;
pub mod worker;

pub use clock::{Clock, ManualClock, MonotonicClock, SharedClock};
pub use error::{CoreError, CoreResult};
pub use measured::{Measurement, MeasurementProvider};
pub use numeric::{ensure_finite, ensure_non_negative, ensure_positive};
pub use worker::{PeriodicWorker, StopSignal, WorkerHandle, spawn_periodic};
