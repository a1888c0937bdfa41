//! Integration tests for gs-app: full runs against an in-memory bus.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use gs_app::{AppConfig, AppError, RecorderEvent, Supervisor, build_transport, load_checked, read_once};
use gs_controls::{ControlCommand, RecordingActuator};
use gs_core::MonotonicClock;
use gs_telemetry::{MemoryBus, parse_descriptors};

const DESCRIPTORS: &str = "\
Test map
name,units,address,words,gain,offset,period
Speed,rpm,1030,1,1,0,0.02
Oil pressure,kPa,1024,1,1,0,0.02
";

const CONFIG: &str = r#"
telemetry:
  descriptors: mdf.csv
  transport:
    mode: memory
  scan_interval_ms: 5
control:
  process_variable: Speed
  setpoint: 25.0
  kp: 1.0
  sample_time_s: 0.05
  cadence_ms: 10
  stale_after_s: 0.2
  safe_output: 0.0
recorder:
  interval_s: 0.05
"#;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    dir.push(format!("{}_{}", prefix, nanos));
    dir
}

fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

#[test]
fn governor_follows_telemetry_and_falls_back_when_stale() {
    let config = AppConfig::from_yaml_str(CONFIG).unwrap();
    let descriptors = parse_descriptors(DESCRIPTORS).unwrap();
    let bus = MemoryBus::new();
    bus.set_register(1030, 20);
    bus.set_register(1024, 300);
    let actuator = RecordingActuator::new();

    let supervisor = Supervisor::start_with(
        &config,
        descriptors,
        Box::new(bus.clone()),
        Box::new(actuator.clone()),
        MonotonicClock::shared(),
        None,
    )
    .unwrap();

    assert!(wait_for(Duration::from_secs(3), || actuator.last() == Some(5.0)));
    let output = supervisor.output().unwrap();
    assert!(wait_for(Duration::from_secs(1), || output.get() == 5.0));

    let commands = supervisor.command_sender().unwrap();
    commands.send(ControlCommand::SetSetpoint(30.0)).unwrap();
    assert!(wait_for(Duration::from_secs(3), || actuator.last() == Some(10.0)));

    bus.set_offline(true);
    assert!(wait_for(Duration::from_secs(3), || actuator.last() == Some(0.0)));

    let table = supervisor.table();
    assert_eq!(table.get("Oil pressure").map(|m| m.value), Some(300.0));

    let first = supervisor
        .records()
        .recv_timeout(Duration::from_secs(2))
        .unwrap();
    assert_eq!(
        first,
        RecorderEvent::Header("timestamp,Speed,Oil pressure,output".to_string())
    );
    let row = supervisor
        .records()
        .recv_timeout(Duration::from_secs(2))
        .unwrap();
    assert!(matches!(row, RecorderEvent::Row(ref line) if line.split(',').count() == 4));

    assert!(supervisor.stop());
}

#[test]
fn telemetry_only_run_has_no_controller() {
    let text = "telemetry:\n  descriptors: mdf.csv\n  transport:\n    mode: memory\nrecorder:\n  interval_s: 0.02\n";
    let config = AppConfig::from_yaml_str(text).unwrap();
    let descriptors = parse_descriptors(DESCRIPTORS).unwrap();
    let bus = MemoryBus::new();
    bus.set_register(1030, 1500);

    let supervisor = Supervisor::start_with(
        &config,
        descriptors,
        Box::new(bus),
        Box::new(RecordingActuator::new()),
        MonotonicClock::shared(),
        None,
    )
    .unwrap();
    assert!(supervisor.output().is_none());
    assert!(supervisor.command_sender().is_none());

    let header = supervisor.records().recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(header, RecorderEvent::Header("timestamp,Speed,Oil pressure".to_string()));
    assert!(supervisor.stop());
}

#[test]
fn unknown_process_variable_starts_nothing() {
    let text = CONFIG.replace("process_variable: Speed", "process_variable: Frequency");
    let config = AppConfig::from_yaml_str(&text).unwrap();
    let result = Supervisor::start_with(
        &config,
        parse_descriptors(DESCRIPTORS).unwrap(),
        Box::new(MemoryBus::new()),
        Box::new(RecordingActuator::new()),
        MonotonicClock::shared(),
        None,
    );
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[test]
fn files_on_disk_load_and_read_once() {
    let dir = unique_temp_dir("gs_app_read_once");
    fs::create_dir_all(&dir).expect("failed to create temp dir");
    fs::write(dir.join("mdf.csv"), DESCRIPTORS).expect("failed to write descriptors");
    let config_text = CONFIG.replace(
        "    mode: memory",
        "    mode: memory\n    registers:\n      1030: 1480\n      1024: 290",
    );
    let config_path = dir.join("genset.yaml");
    fs::write(&config_path, config_text).expect("failed to write config");

    let (config, descriptors) = load_checked(&config_path).unwrap();
    assert_eq!(config.telemetry.descriptors, dir.join("mdf.csv"));
    assert_eq!(descriptors.len(), 2);

    let transport = build_transport(&config.telemetry);
    let snapshot = read_once(&config, descriptors, transport).unwrap();
    assert_eq!(snapshot.row("Speed").and_then(|r| r.current()), Some(1480.0));
    assert_eq!(snapshot.row("Oil pressure").and_then(|r| r.current()), Some(290.0));

    let _ = fs::remove_dir_all(&dir);
}
