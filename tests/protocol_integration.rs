//! ---
//! rch_section: "06-testing"
//! rch_subsection: "integration-tests"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Integration and validation tests for the RCH stack."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
//! Command/event protocol across the catalog seam: observer fan-out and
//! effector completion announcements on shared device instances.

use std::sync::Arc;

use parking_lot::Mutex;

use rch_contracts::{
    ComponentRegistry, EffectorCommand, EffectorFamily, EffectorState, Lifecycle, ScopeKey, Sensor,
};
use rch_devices::{standard_table, DriveConfig, RangeScanner, ScannerConfig};
use rch_environment::Direction;

#[test]
fn three_observers_on_one_sensor_each_see_one_emission_in_order() {
    let scanner = RangeScanner::new();
    scanner
        .configure(Box::new(ScannerConfig {
            noise_sigma: 0.0,
            obstacle_at_m: Some(4.0),
            ..ScannerConfig::default()
        }))
        .unwrap();
    scanner.initialise().unwrap();

    let sightings = Arc::new(Mutex::new(Vec::new()));
    for tag in ["first", "second", "third"] {
        let log = Arc::clone(&sightings);
        scanner.data_received().subscribe(move |event| {
            let range_m = RangeScanner::decode(event.data()).unwrap();
            log.lock().push((tag, range_m));
        });
    }

    assert_eq!(RangeScanner::sample(&scanner), Some(4.0));
    assert_eq!(
        sightings.lock().as_slice(),
        &[("first", 4.0), ("second", 4.0), ("third", 4.0)]
    );
}

#[test]
fn effector_commands_round_trip_through_the_catalog() {
    let registry = ComponentRegistry::new();
    let catalog = registry
        .build(ScopeKey::new("protocol-e2e").unwrap(), standard_table())
        .unwrap();
    let drive = catalog
        .effectors()
        .one_by_family(EffectorFamily::NonHolonomicMotion)
        .unwrap();
    drive.configure(Box::new(DriveConfig::default())).unwrap();
    drive.initialise().unwrap();

    let completed = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&completed);
    drive
        .effect_complete()
        .subscribe(move |event| log.lock().push(event.command_id()));

    let command = EffectorCommand::movement(Direction::East, 1.0);
    let id = command.id;
    drive.handle_command(command).unwrap();

    assert_eq!(completed.lock().as_slice(), &[Some(id)]);
    assert_eq!(drive.state(), EffectorState::Idle);

    // The same shared instance answers later catalog lookups.
    let again = catalog
        .effectors()
        .one_by_family(EffectorFamily::NonHolonomicMotion)
        .unwrap();
    assert!(Arc::ptr_eq(&drive, &again));
}
