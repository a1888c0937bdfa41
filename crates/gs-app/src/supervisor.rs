//! Wiring of all workers for one run.
//!
//! The supervisor owns the run's lifecycle: it builds the transport from the
//! configuration, creates the value table through the telemetry source, and
//! spawns every worker with a shared stop signal. Stopping joins them all.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use gs_controls::{Actuator, ControlCommand, ControlLoopRunner, LoggingActuator, OutputHandle};
use gs_core::{MonotonicClock, SharedClock, StopSignal, WorkerHandle, spawn_periodic};
use gs_telemetry::{
    BusTransport, CurrentValueTable, MeasurementDescriptor, MemoryBus, ModbusTransport, RtuConnector,
    Snapshot, TcpConnector, TelemetrySource, load_descriptors,
};
use tracing::{info, warn};

use crate::config::{AppConfig, TelemetryConfig, TransportConfig, load_config};
use crate::error::AppResult;
use crate::recorder::{Recorder, RecorderEvent};
use crate::retune::TuningWatcher;

/// Build the bus transport named by the configuration.
pub fn build_transport(config: &TelemetryConfig) -> Box<dyn BusTransport> {
    match &config.transport {
        TransportConfig::Tcp { host, port } => Box::new(ModbusTransport::new(
            TcpConnector::new(host.clone(), *port, config.timeout()),
            config.unit_id,
        )),
        TransportConfig::Rtu { dev, baudrate } => Box::new(ModbusTransport::new(
            RtuConnector::new(dev.clone(), *baudrate, config.timeout()),
            config.unit_id,
        )),
        TransportConfig::Memory { registers } => {
            let bus = MemoryBus::new();
            for (&address, &word) in registers {
                bus.set_register(address, word);
            }
            Box::new(bus)
        }
    }
}

/// Load a config file and its descriptors, and cross-check them.
pub fn load_checked(path: &Path) -> AppResult<(AppConfig, Vec<MeasurementDescriptor>)> {
    let config = load_config(path)?;
    let descriptors = load_descriptors(&config.telemetry.descriptors)?;
    config.validate_against(&descriptors)?;
    Ok((config, descriptors))
}

/// Read every descriptor once and return the result.
pub fn read_once(
    config: &AppConfig,
    descriptors: Vec<MeasurementDescriptor>,
    transport: Box<dyn BusTransport>,
) -> AppResult<Snapshot> {
    let clock = MonotonicClock::shared();
    let mut source = TelemetrySource::new(
        descriptors,
        transport,
        Arc::clone(&clock),
        config.telemetry.source_config(),
    )?;
    let summary = source.poll_all(clock.now());
    info!(
        attempted = summary.attempted,
        succeeded = summary.succeeded,
        failed = summary.failed,
        "single poll complete"
    );
    Ok(source.table().snapshot())
}

/// A running set of workers.
pub struct Supervisor {
    stop: StopSignal,
    workers: Vec<WorkerHandle>,
    table: Arc<CurrentValueTable>,
    output: Option<OutputHandle>,
    commands: Option<Sender<ControlCommand>>,
    records: Receiver<RecorderEvent>,
}

impl Supervisor {
    /// Start a run from a config file on real hardware.
    pub fn start(path: &Path) -> AppResult<Self> {
        let (config, descriptors) = load_checked(path)?;
        let transport = build_transport(&config.telemetry);
        Self::start_with(
            &config,
            descriptors,
            transport,
            Box::new(LoggingActuator::new()),
            MonotonicClock::shared(),
            Some(path.to_path_buf()),
        )
    }

    /// Start a run with explicit collaborators.
    ///
    /// `config_path` enables live retuning when the control section asks for it.
    pub fn start_with(
        config: &AppConfig,
        descriptors: Vec<MeasurementDescriptor>,
        transport: Box<dyn BusTransport>,
        actuator: Box<dyn Actuator>,
        clock: SharedClock,
        config_path: Option<PathBuf>,
    ) -> AppResult<Self> {
        config.validate()?;
        config.validate_against(&descriptors)?;

        let stop = StopSignal::new();
        let source = TelemetrySource::new(
            descriptors,
            transport,
            Arc::clone(&clock),
            config.telemetry.source_config(),
        )?;
        let table = source.table();

        // Build everything before spawning so a bad section starts nothing.
        let mut runner = None;
        let mut watcher = None;
        let mut output = None;
        let mut commands = None;
        if let Some(control) = &config.control {
            let r = ControlLoopRunner::new(
                &control.pid_config(),
                control.runner_config(),
                table.clone(),
                actuator,
            )?;
            output = Some(r.output_handle());
            commands = Some(r.command_sender());
            if let (Some(interval), Some(path)) = (control.reload_interval(), config_path.as_ref()) {
                watcher = Some(TuningWatcher::new(
                    path,
                    control,
                    interval,
                    r.command_sender(),
                ));
            }
            runner = Some(r);
        }
        let (record_tx, records) = mpsc::channel();
        let recorder = Recorder::new(
            table.clone(),
            output.clone(),
            config.recorder.interval(),
            config.recorder.display,
            record_tx,
        );

        let mut supervisor = Self {
            stop: stop.clone(),
            workers: Vec::new(),
            table,
            output,
            commands,
            records,
        };
        supervisor.spawn(source, &clock)?;
        if let Some(runner) = runner {
            supervisor.spawn(runner, &clock)?;
        }
        if let Some(watcher) = watcher {
            supervisor.spawn(watcher, &clock)?;
        }
        supervisor.spawn(recorder, &clock)?;
        info!(workers = supervisor.workers.len(), "run started");
        Ok(supervisor)
    }

    fn spawn<W>(&mut self, worker: W, clock: &SharedClock) -> AppResult<()>
    where
        W: gs_core::PeriodicWorker + 'static,
    {
        match spawn_periodic(worker, Arc::clone(clock), self.stop.clone()) {
            Ok(handle) => {
                self.workers.push(handle);
                Ok(())
            }
            Err(err) => {
                // Do not leave the already running workers behind.
                self.stop.request_stop();
                for handle in self.workers.drain(..) {
                    handle.join();
                }
                Err(err.into())
            }
        }
    }

    pub fn table(&self) -> Arc<CurrentValueTable> {
        Arc::clone(&self.table)
    }

    /// Latest governor output, if a control section is configured.
    pub fn output(&self) -> Option<OutputHandle> {
        self.output.clone()
    }

    /// Sender for manual tuning commands, if a control section is configured.
    pub fn command_sender(&self) -> Option<Sender<ControlCommand>> {
        self.commands.clone()
    }

    /// Recorder output queue.
    pub fn records(&self) -> &Receiver<RecorderEvent> {
        &self.records
    }

    /// Signal shared by all workers; raising it stops the run.
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Stop every worker and wait for them. Returns `false` if any panicked.
    pub fn stop(mut self) -> bool {
        self.stop.request_stop();
        let mut clean = true;
        for handle in self.workers.drain(..) {
            let name = handle.name().to_string();
            if !handle.join() {
                warn!(worker = %name, "worker panicked");
                clean = false;
            }
        }
        info!("run stopped");
        clean
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.stop.request_stop();
            for handle in self.workers.drain(..) {
                handle.join();
            }
        }
    }
}
