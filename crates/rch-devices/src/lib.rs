//! ---
//! rch_section: "05-devices"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Shipped robots, sensors, effectors, and processors for the RCH runtime."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
//! Device implementations shipped with the host.
//!
//! Everything here is registered through [`standard_table`] and reaches
//! the runtime the same way third-party devices would: type name plus
//! family in a registration table, construction deferred to first
//! resolution.

pub mod effectors;
pub mod processors;
pub mod robots;
pub mod sensors;

pub use effectors::{DifferentialDrive, DriveConfig};
pub use processors::{RelayConfig, SensorRelay};
pub use robots::{DockSentry, ScoutConfig, ScoutRover, SentryConfig};
pub use sensors::{HeadingVane, RangeScanner, ScannerConfig, VaneConfig};

use rch_common::error::codes;
use rch_common::{ErrorKind, HostError, Messages};
use rch_contracts::RegistrationTable;

/// Every shipped device under its published type name.
///
/// The table is scope-agnostic: hand it to `ComponentRegistry::build`
/// for each scope that should see the shipped devices.
pub fn standard_table() -> RegistrationTable {
    RegistrationTable::new()
        .merge(robots::table())
        .merge(sensors::table())
        .merge(effectors::table())
        .merge(processors::table())
}

/// Config-type mismatch raised from a device's `configure`.
pub(crate) fn config_mismatch(kind: ErrorKind, component: &str, label: &str) -> HostError {
    HostError::new(
        kind,
        codes::COMPONENT_CONFIG_TYPE,
        Messages::technical_and_user(
            format!("{component} cannot use configuration type `{label}`"),
            "a device received the wrong configuration",
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use rch_contracts::{ComponentRegistry, ScopeKey};

    #[test]
    fn the_standard_table_registers_every_shipped_device() {
        let registry = ComponentRegistry::new();
        let catalog = registry
            .build(ScopeKey::new("standard").unwrap(), standard_table())
            .unwrap();
        assert_eq!(catalog.robots().len(), 2);
        assert_eq!(catalog.sensors().len(), 2);
        assert_eq!(catalog.effectors().len(), 1);
        assert_eq!(catalog.processors().len(), 1);
        assert!(catalog
            .robots()
            .descriptors()
            .any(|descriptor| descriptor.type_name() == "scout_rover"));
    }
}
