//! ---
//! rch_section: "01-core-functionality"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Capability contracts, catalog discovery, and the command/event protocol."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
//! Contracts every pluggable component honours and the machinery resolving
//! them at runtime.
//!
//! The crate splits into three layers: the lifecycle contract
//! ([`lifecycle`], [`component`]), catalog discovery over an explicit
//! registration table ([`capability`], [`catalog`], [`factory`]), and the
//! synchronous command/event protocol ([`command`], [`event`],
//! [`observer`]).

pub mod capability;
pub mod catalog;
pub mod command;
pub mod component;
pub mod event;
pub mod factory;
pub mod lifecycle;
pub mod observer;

#[cfg(test)]
pub(crate) mod testkit;

pub use capability::{
    AsAny, CapabilityDescriptor, EffectorFamily, Family, ProcessorFamily, Registration,
    RegistrationTable, RobotFamily, SensorFamily, TypeToken,
};
pub use catalog::{CapabilityCatalog, ComponentRegistry, ScopeCatalog, ScopeKey};
pub use command::{Directive, EffectorCommand, EffectorState};
pub use component::{Effector, Processor, Robot, Sensor};
pub use event::{EffectorEvent, SensorData, SensorEvent};
pub use factory::{EffectorFactory, ProcessorFactory, RobotFactory, SensorFactory};
pub use lifecycle::{unpack_config, ComponentConfig, Lifecycle, LifecycleGate, LifecycleStage};
pub use observer::{ObserverHandle, Observers};
