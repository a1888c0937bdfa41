//! Periodic workers and cooperative shutdown.
//!
//! Every long-running activity (bus polling, the control loop, the recorder)
//! is a [`PeriodicWorker`]: a `tick` driven on its own thread at a fixed sleep
//! interval. Long sleeps are sliced so a stop request is seen within
//! 50 ms even for workers with multi-second intervals.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info};

use crate::clock::SharedClock;
use crate::error::{CoreError, CoreResult};

/// A unit of periodic work.
pub trait PeriodicWorker: Send {
    /// Name used for the thread and in log records.
    fn name(&self) -> &str;

    /// Perform one iteration at time `now` (seconds).
    fn tick(&mut self, now: f64);

    /// Sleep between iterations.
    fn interval(&self) -> Duration;

    /// Called once after the stop signal is observed.
    fn on_stop(&mut self) {}
}

/// Cooperative stop flag shared by every worker of a run.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Join handle for a spawned worker.
pub struct WorkerHandle {
    name: String,
    handle: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the worker thread to exit. Returns `false` if it panicked.
    pub fn join(self) -> bool {
        let ok = self.handle.join().is_ok();
        debug!(worker = %self.name, ok, "worker joined");
        ok
    }
}

/// Longest uninterrupted sleep; bounds how late a stop request is seen.
const STOP_POLL: Duration = Duration::from_millis(50);

fn sleep_unless_stopped(total: Duration, stop: &StopSignal) {
    let mut remaining = total;
    while !remaining.is_zero() && !stop.is_stopped() {
        let slice = remaining.min(STOP_POLL);
        thread::sleep(slice);
        remaining -= slice;
    }
}

/// Drive `worker` on a dedicated thread until `stop` is raised.
pub fn spawn_periodic<W>(mut worker: W, clock: SharedClock, stop: StopSignal) -> CoreResult<WorkerHandle>
where
    W: PeriodicWorker + 'static,
{
    let name = worker.name().to_string();
    let handle = thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            info!(worker = %worker.name(), "worker started");
            while !stop.is_stopped() {
                worker.tick(clock.now());
                sleep_unless_stopped(worker.interval(), &stop);
            }
            worker.on_stop();
            info!(worker = %worker.name(), "worker stopped");
        })
        .map_err(|e| CoreError::Spawn {
            name: name.clone(),
            message: e.to_string(),
        })?;
    Ok(WorkerHandle { name, handle })
}
