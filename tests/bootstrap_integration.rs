//! ---
//! rch_section: "06-testing"
//! rch_subsection: "integration-tests"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Integration and validation tests for the RCH stack."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
//! End-to-end bootstrap: a host manager driving the shipped device
//! table from a real bundle store on disk.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use rch_common::ErrorKind;
use rch_contracts::{ComponentRegistry, Lifecycle, LifecycleStage, ScopeKey};
use rch_core::{HostConfig, HostManager};
use rch_devices::{standard_table, DifferentialDrive, RangeScanner};

fn bundle_store(bundles: &[(&str, serde_json::Value)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, sections) in bundles {
        let path = dir.path().join(format!("{name}.rch"));
        std::fs::write(&path, serde_json::to_vec_pretty(sections).unwrap()).unwrap();
    }
    dir
}

fn configured_host(
    dir: &Path,
    scope: &str,
    args: &[&str],
) -> (HostManager, Arc<ComponentRegistry>, Arc<Mutex<Vec<String>>>) {
    let registry = Arc::new(ComponentRegistry::new());
    let host = HostManager::new(Arc::clone(&registry), standard_table());
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lines);
    host.output()
        .set_capture(move |line| sink.lock().push(line.to_owned()));
    host.configure(Box::new(HostConfig {
        args: args.iter().map(|arg| (*arg).to_owned()).collect(),
        config_dir: dir.to_path_buf(),
        scope: ScopeKey::new(scope).unwrap(),
    }))
    .unwrap();
    (host, registry, lines)
}

fn scout_bundle() -> serde_json::Value {
    serde_json::json!({
        "output": { "method": "console" },
        "log": { "targets": ["none"] },
        "robot": {
            "type": "scout_rover",
            "name": "itest-rover",
            "poll_interval": 50,
            "patrol_speed_mps": 1.0,
            "scanner": { "noise_sigma": 0.0 }
        }
    })
}

fn sentry_bundle() -> serde_json::Value {
    serde_json::json!({
        "output": { "method": "console" },
        "log": { "targets": ["none"] },
        "robot": {
            "type": "dock_sentry",
            "name": "itest-sentry",
            "scanner": { "noise_sigma": 0.0 }
        }
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn scout_rover_bootstraps_to_active_and_shuts_down_cleanly() {
    let store = bundle_store(&[("default", scout_bundle())]);
    let (host, registry, _lines) = configured_host(store.path(), "patrol-e2e", &[]);

    host.initialise().unwrap();
    assert_eq!(host.stage(), LifecycleStage::Active);
    assert_eq!(host.active_bundle().as_deref(), Some("default"));
    let robot = host.robot().unwrap();
    assert_eq!(robot.stage(), LifecycleStage::Active);

    // The rover wired its devices out of the shared scope catalog.
    let catalog = registry.get(&ScopeKey::new("patrol-e2e").unwrap()).unwrap();
    let scanner = catalog.sensors().one_of::<RangeScanner>().unwrap();
    let drive = catalog.effectors().one_of::<DifferentialDrive>().unwrap();
    assert_eq!(scanner.stage(), LifecycleStage::Active);
    assert_eq!(drive.stage(), LifecycleStage::Active);

    host.deactivate().unwrap();
    assert_eq!(host.stage(), LifecycleStage::Deactivated);
    assert_eq!(robot.stage(), LifecycleStage::Deactivated);
    assert_eq!(scanner.stage(), LifecycleStage::Deactivated);
    assert_eq!(drive.stage(), LifecycleStage::Deactivated);
    assert_eq!(host.output().send("after shutdown").unwrap(), false);
}

#[test]
fn missing_bundle_names_fall_back_to_the_default_bundle() {
    let store = bundle_store(&[("default", sentry_bundle())]);
    let (host, _registry, _lines) = configured_host(store.path(), "fallback-e2e", &["night-watch"]);

    assert_eq!(host.active_bundle().as_deref(), Some("default"));
    host.initialise().unwrap();
    assert_eq!(host.stage(), LifecycleStage::Active);

    host.deactivate().unwrap();
}

#[test]
fn unknown_robot_type_aborts_bootstrap_with_code_102() {
    let store = bundle_store(&[(
        "default",
        serde_json::json!({
            "output": { "method": "console" },
            "log": { "targets": ["none"] },
            "robot": { "type": "ghost_robot" }
        }),
    )]);
    let (host, _registry, lines) = configured_host(store.path(), "ghost-e2e", &[]);

    let err = host.initialise().unwrap_err();
    assert_eq!(err.code(), 102);
    assert_eq!(err.kind(), ErrorKind::Startup);
    assert_eq!(host.stage(), LifecycleStage::Configured);
    assert!(host.robot().is_none());

    // Summary and user texts were rendered through the output channel.
    let lines = lines.lock();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("ghost_robot"));
}
