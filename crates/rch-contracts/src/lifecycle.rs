//! ---
//! rch_section: "01-core-functionality"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Capability contracts, catalog discovery, and the command/event protocol."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
//! The lifecycle contract: every hosted component walks
//! Uninitialised -> Configured -> Active -> Deactivated, and the
//! [`LifecycleGate`] turns out-of-order transitions into typed errors.

use std::any::Any;
use std::fmt;

use parking_lot::Mutex;

use rch_common::error::codes;
use rch_common::{HostError, HostResult, Messages};

/// Object-safe marker for typed configuration payloads.
///
/// Blanket-implemented for every `Any + Send + Sync + Debug` type, so
/// components define plain serde structs and hand them across the trait
/// boundary boxed. [`unpack_config`] recovers the concrete type on the
/// other side.
pub trait ComponentConfig: Send + Sync + fmt::Debug {
    /// Borrow as `Any` for inspection without consuming.
    fn as_any(&self) -> &(dyn Any + Send + Sync);
    /// Consume into `Any` for downcasting to the concrete config.
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;
    /// Type name used in mismatch diagnostics.
    fn type_label(&self) -> &'static str;
}

impl<T: Any + Send + Sync + fmt::Debug> ComponentConfig for T {
    fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }

    fn type_label(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Recover the concrete configuration type from a boxed payload.
///
/// On mismatch the label of the foreign type comes back so the component
/// can build its own config-type error with the right code.
pub fn unpack_config<T: Any>(config: Box<dyn ComponentConfig>) -> Result<T, &'static str> {
    let label = config.type_label();
    config
        .into_any()
        .downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| label)
}

/// Stages of the component lifecycle, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecycleStage {
    /// Fresh instance, no configuration applied.
    Uninitialised,
    /// Configuration accepted, not yet running.
    Configured,
    /// Initialised and operating.
    Active,
    /// Shut down; terminal.
    Deactivated,
}

impl LifecycleStage {
    fn label(self) -> &'static str {
        match self {
            LifecycleStage::Uninitialised => "uninitialised",
            LifecycleStage::Configured => "configured",
            LifecycleStage::Active => "active",
            LifecycleStage::Deactivated => "deactivated",
        }
    }
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The contract every hosted component implements.
///
/// `configure` may run repeatedly until the component goes active (later
/// configurations replace earlier ones wholesale); `initialise` is
/// single-shot and only legal from `Configured`; `deactivate` is terminal.
pub trait Lifecycle: Send + Sync {
    /// Accept a typed configuration payload.
    fn configure(&self, config: Box<dyn ComponentConfig>) -> HostResult<()>;
    /// Transition from `Configured` to `Active`.
    fn initialise(&self) -> HostResult<()>;
    /// Shut down; the component never runs again.
    fn deactivate(&self) -> HostResult<()>;
    /// Current lifecycle stage.
    fn stage(&self) -> LifecycleStage;
}

/// Stage tracker components embed to enforce the lifecycle contract.
///
/// The `ensure_*` methods validate a transition without committing it;
/// the `note_*` methods record the new stage once the component's own
/// work succeeded. The gate serialises stage decisions, not component
/// bodies.
#[derive(Debug)]
pub struct LifecycleGate {
    component: String,
    stage: Mutex<LifecycleStage>,
}

impl LifecycleGate {
    /// New gate in `Uninitialised`, labelled for error texts.
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            stage: Mutex::new(LifecycleStage::Uninitialised),
        }
    }

    /// Current stage.
    pub fn stage(&self) -> LifecycleStage {
        *self.stage.lock()
    }

    /// Check that `configure` is legal right now.
    pub fn ensure_can_configure(&self) -> HostResult<()> {
        match self.stage() {
            LifecycleStage::Uninitialised | LifecycleStage::Configured => Ok(()),
            LifecycleStage::Active => Err(self.violation(
                codes::CONFIGURE_WHILE_ACTIVE,
                "configure rejected while active",
            )),
            LifecycleStage::Deactivated => Err(self.violation(
                codes::USED_AFTER_DEACTIVATE,
                "configure rejected after deactivation",
            )),
        }
    }

    /// Check that `initialise` is legal right now.
    pub fn ensure_can_initialise(&self) -> HostResult<()> {
        match self.stage() {
            LifecycleStage::Configured => Ok(()),
            LifecycleStage::Uninitialised => Err(self.violation(
                codes::INITIALISE_BEFORE_CONFIGURE,
                "initialise requires a prior configure",
            )),
            LifecycleStage::Active => Err(self.violation(
                codes::INITIALISE_REPEATED,
                "initialise is single-shot and was already called",
            )),
            LifecycleStage::Deactivated => Err(self.violation(
                codes::USED_AFTER_DEACTIVATE,
                "initialise rejected after deactivation",
            )),
        }
    }

    /// Check that `deactivate` is legal right now.
    pub fn ensure_can_deactivate(&self) -> HostResult<()> {
        match self.stage() {
            LifecycleStage::Deactivated => Err(self.violation(
                codes::USED_AFTER_DEACTIVATE,
                "deactivate called twice",
            )),
            _ => Ok(()),
        }
    }

    /// Guard for operations that only make sense on a running component,
    /// e.g. command handling.
    pub fn ensure_active(&self) -> HostResult<()> {
        match self.stage() {
            LifecycleStage::Active => Ok(()),
            LifecycleStage::Deactivated => Err(self.violation(
                codes::USED_AFTER_DEACTIVATE,
                "operation rejected after deactivation",
            )),
            _ => Err(self.violation(
                codes::OPERATION_REQUIRES_ACTIVE,
                "operation requires an active component",
            )),
        }
    }

    /// Record a successful configure.
    pub fn note_configured(&self) {
        *self.stage.lock() = LifecycleStage::Configured;
    }

    /// Record a successful initialise.
    pub fn note_active(&self) {
        *self.stage.lock() = LifecycleStage::Active;
    }

    /// Record deactivation.
    pub fn note_deactivated(&self) {
        *self.stage.lock() = LifecycleStage::Deactivated;
    }

    fn violation(&self, code: u16, detail: &str) -> HostError {
        HostError::lifecycle(
            code,
            Messages::new(
                format!(
                    "{}: {detail} (stage is `{}`)",
                    self.component,
                    self.stage()
                ),
                format!("{}: lifecycle violation", self.component),
                format!(
                    "call order is configure, initialise, deactivate; `{}` is in `{}`",
                    self.component,
                    self.stage()
                ),
                "an internal component was driven out of order".to_owned(),
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_walks_the_full_lifecycle() {
        let gate = LifecycleGate::new("probe");
        assert_eq!(gate.stage(), LifecycleStage::Uninitialised);
        gate.ensure_can_configure().unwrap();
        gate.note_configured();
        // Reconfiguration before activation is allowed.
        gate.ensure_can_configure().unwrap();
        gate.note_configured();
        gate.ensure_can_initialise().unwrap();
        gate.note_active();
        assert_eq!(gate.stage(), LifecycleStage::Active);
        gate.ensure_can_deactivate().unwrap();
        gate.note_deactivated();
        assert_eq!(gate.stage(), LifecycleStage::Deactivated);
    }

    #[test]
    fn initialise_before_configure_is_code_160() {
        let gate = LifecycleGate::new("probe");
        let err = gate.ensure_can_initialise().unwrap_err();
        assert_eq!(err.code(), 160);
    }

    #[test]
    fn repeat_initialise_is_code_161() {
        let gate = LifecycleGate::new("probe");
        gate.note_configured();
        gate.note_active();
        let err = gate.ensure_can_initialise().unwrap_err();
        assert_eq!(err.code(), 161);
    }

    #[test]
    fn anything_after_deactivate_is_code_162() {
        let gate = LifecycleGate::new("probe");
        gate.note_deactivated();
        assert_eq!(gate.ensure_can_configure().unwrap_err().code(), 162);
        assert_eq!(gate.ensure_can_initialise().unwrap_err().code(), 162);
        assert_eq!(gate.ensure_can_deactivate().unwrap_err().code(), 162);
    }

    #[test]
    fn configure_while_active_is_code_163() {
        let gate = LifecycleGate::new("probe");
        gate.note_configured();
        gate.note_active();
        let err = gate.ensure_can_configure().unwrap_err();
        assert_eq!(err.code(), 163);
    }

    #[test]
    fn running_only_operations_are_gated() {
        let gate = LifecycleGate::new("probe");
        assert_eq!(gate.ensure_active().unwrap_err().code(), 164);
        gate.note_configured();
        assert_eq!(gate.ensure_active().unwrap_err().code(), 164);
        gate.note_active();
        assert!(gate.ensure_active().is_ok());
        gate.note_deactivated();
        assert_eq!(gate.ensure_active().unwrap_err().code(), 162);
    }

    #[test]
    fn unpack_config_recovers_the_concrete_type() {
        #[derive(Debug, PartialEq)]
        struct ProbeConfig {
            gain: u8,
        }
        let boxed: Box<dyn ComponentConfig> = Box::new(ProbeConfig { gain: 7 });
        let config = unpack_config::<ProbeConfig>(boxed).unwrap();
        assert_eq!(config, ProbeConfig { gain: 7 });
    }

    #[test]
    fn unpack_config_reports_the_foreign_type() {
        #[derive(Debug)]
        struct ProbeConfig;
        let boxed: Box<dyn ComponentConfig> = Box::new(42u32);
        let actual = unpack_config::<ProbeConfig>(boxed).unwrap_err();
        assert!(actual.contains("u32"));
    }
}
