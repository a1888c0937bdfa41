use std::path::Path;

use gs_app::{TransportConfig, build_transport, load_checked, read_once};

#[test]
fn shipped_configs_load_and_validate() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../configs");
    for name in ["genset.yaml", "dry-run.yaml"] {
        let path = root.join(name);
        let (config, descriptors) =
            load_checked(&path).unwrap_or_else(|e| panic!("Failed to load {}: {}", name, e));
        assert_eq!(descriptors.len(), 10, "{name}");
        assert!(config.control.is_some(), "{name}");
    }
}

#[test]
fn dry_run_config_reads_every_register() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../configs/dry-run.yaml");
    let (config, descriptors) = load_checked(&path).unwrap();
    assert!(matches!(config.telemetry.transport, TransportConfig::Memory { .. }));

    let transport = build_transport(&config.telemetry);
    let snapshot = read_once(&config, descriptors, transport).unwrap();
    assert!(snapshot.rows.iter().all(|r| r.current().is_some()));
    let current = snapshot.row("Generator L1 current").and_then(|r| r.current()).unwrap();
    assert!((current - 21.2).abs() < 1e-9);
}
