//! ---
//! rch_section: "01-core-functionality"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Capability contracts, catalog discovery, and the command/event protocol."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
//! The four capability traits hosted components implement.

use std::fmt;
use std::sync::Arc;

use rch_common::HostResult;

use crate::capability::{
    AsAny, EffectorFamily, ProcessorFamily, RobotFamily, SensorFamily, TypeToken,
};
use crate::catalog::ScopeCatalog;
use crate::command::{EffectorCommand, EffectorState};
use crate::event::{EffectorEvent, SensorEvent};
use crate::lifecycle::{ComponentConfig, Lifecycle};
use crate::observer::Observers;

/// A data-producing device.
///
/// Acquisition mechanics are the implementation's business; the contract
/// is that every acquired batch is announced exactly once through
/// `data_received`, synchronously on the acquiring thread.
pub trait Sensor: Lifecycle + AsAny {
    /// Declared sensor family.
    fn family(&self) -> SensorFamily;
    /// Observers notified once per acquired data batch.
    fn data_received(&self) -> &Observers<SensorEvent>;
}

impl fmt::Debug for dyn Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sensor")
            .field("family", &self.family())
            .field("stage", &self.stage())
            .finish()
    }
}

/// An actuating device driven through [`EffectorCommand`]s.
pub trait Effector: Lifecycle + AsAny {
    /// Declared effector family.
    fn family(&self) -> EffectorFamily;
    /// Execute one command. Completion is announced through
    /// `effect_complete`, a refusal to move through `effector_stuck`;
    /// the two are mutually exclusive for one command.
    fn handle_command(&self, command: EffectorCommand) -> HostResult<()>;
    /// Observers notified when a command's effect has been produced.
    fn effect_complete(&self) -> &Observers<EffectorEvent>;
    /// Observers notified when the effector cannot produce the effect.
    fn effector_stuck(&self) -> &Observers<EffectorEvent>;
    /// Observers notified on every state transition.
    fn state_changed(&self) -> &Observers<EffectorState>;
    /// Current execution state.
    fn state(&self) -> EffectorState;
}

impl fmt::Debug for dyn Effector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effector")
            .field("family", &self.family())
            .field("stage", &self.stage())
            .finish()
    }
}

/// The top-level program: a robot composes sensors, effectors, and
/// processors resolved from its scope catalog.
pub trait Robot: Lifecycle + AsAny {
    /// Declared robot family.
    fn family(&self) -> RobotFamily;
    /// Token of the configuration type this robot expects.
    fn configuration_type(&self) -> TypeToken;
    /// Decode the robot bundle section into the configuration type named
    /// by [`Robot::configuration_type`]. The host feeds the result
    /// straight back into `configure`, so a robot is always configured
    /// with its declared type.
    fn decode_config(&self, section: &serde_json::Value) -> HostResult<Box<dyn ComponentConfig>>;
    /// Hand the robot the catalog it resolves sub-components from. Runs
    /// after `configure` and before `initialise`.
    fn attach_resolver(&self, catalog: Arc<ScopeCatalog>);
    /// Suspend activity without releasing resources.
    fn pause(&self) -> HostResult<()>;
    /// Resume after a pause.
    fn resume(&self) -> HostResult<()>;
}

impl fmt::Debug for dyn Robot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Robot")
            .field("family", &self.family())
            .field("stage", &self.stage())
            .finish()
    }
}

/// A stream transformer sitting between peers, e.g. republishing a
/// sensor's events under its own identity.
pub trait Processor: Lifecycle + AsAny {
    /// Declared processor family.
    fn family(&self) -> ProcessorFamily;
    /// Wire the processor to the peers it transforms. The `Arc` receiver
    /// lets the implementation subscribe closures that emit under its own
    /// identity while holding only a `Weak` back-reference.
    fn bind(self: Arc<Self>, catalog: &ScopeCatalog) -> HostResult<()>;
}

impl fmt::Debug for dyn Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("family", &self.family())
            .field("stage", &self.stage())
            .finish()
    }
}
