//! ---
//! rch_section: "01-core-functionality"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Capability contracts, catalog discovery, and the command/event protocol."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
//! Minimal probe components shared by the catalog and factory tests.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;

use rch_common::error::codes;
use rch_common::{HostError, HostResult, Messages};

use crate::capability::{
    EffectorFamily, ProcessorFamily, RobotFamily, SensorFamily, TypeToken,
};
use crate::catalog::ScopeCatalog;
use crate::command::{EffectorCommand, EffectorState};
use crate::component::{Effector, Processor, Robot, Sensor};
use crate::event::{EffectorEvent, SensorData, SensorEvent};
use crate::lifecycle::{unpack_config, ComponentConfig, Lifecycle, LifecycleGate, LifecycleStage};
use crate::observer::Observers;

pub(crate) struct ProbeSensor {
    gate: LifecycleGate,
    family: SensorFamily,
    data_received: Observers<SensorEvent>,
}

impl ProbeSensor {
    pub(crate) fn new(family: SensorFamily) -> Arc<Self> {
        Arc::new(Self {
            gate: LifecycleGate::new("probe-sensor"),
            family,
            data_received: Observers::new(),
        })
    }

    pub(crate) fn depth() -> Arc<Self> {
        Self::new(SensorFamily::Depth)
    }

    /// Announce one batch with `this` probe as the source.
    pub(crate) fn emit_sample(this: &Arc<Self>, raw: &'static [u8]) -> usize {
        let source = Arc::clone(this) as Arc<dyn Sensor>;
        let event = SensorEvent::new(source, SensorData::new(raw));
        this.data_received.emit(&event)
    }
}

impl Lifecycle for ProbeSensor {
    fn configure(&self, _config: Box<dyn ComponentConfig>) -> HostResult<()> {
        self.gate.ensure_can_configure()?;
        self.gate.note_configured();
        Ok(())
    }

    fn initialise(&self) -> HostResult<()> {
        self.gate.ensure_can_initialise()?;
        self.gate.note_active();
        Ok(())
    }

    fn deactivate(&self) -> HostResult<()> {
        self.gate.ensure_can_deactivate()?;
        self.gate.note_deactivated();
        Ok(())
    }

    fn stage(&self) -> LifecycleStage {
        self.gate.stage()
    }
}

impl Sensor for ProbeSensor {
    fn family(&self) -> SensorFamily {
        self.family
    }

    fn data_received(&self) -> &Observers<SensorEvent> {
        &self.data_received
    }
}

#[derive(Debug)]
pub(crate) struct ProbeEffector {
    gate: LifecycleGate,
    family: EffectorFamily,
    state: Mutex<EffectorState>,
    handled: Mutex<Vec<EffectorCommand>>,
    effect_complete: Observers<EffectorEvent>,
    effector_stuck: Observers<EffectorEvent>,
    state_changed: Observers<EffectorState>,
}

impl ProbeEffector {
    pub(crate) fn new(family: EffectorFamily) -> Arc<Self> {
        Arc::new(Self {
            gate: LifecycleGate::new("probe-effector"),
            family,
            state: Mutex::new(EffectorState::Idle),
            handled: Mutex::new(Vec::new()),
            effect_complete: Observers::new(),
            effector_stuck: Observers::new(),
            state_changed: Observers::new(),
        })
    }

    pub(crate) fn planar() -> Arc<Self> {
        Self::new(EffectorFamily::Planar)
    }

    pub(crate) fn handled(&self) -> Vec<EffectorCommand> {
        self.handled.lock().clone()
    }
}

impl Lifecycle for ProbeEffector {
    fn configure(&self, _config: Box<dyn ComponentConfig>) -> HostResult<()> {
        self.gate.ensure_can_configure()?;
        self.gate.note_configured();
        Ok(())
    }

    fn initialise(&self) -> HostResult<()> {
        self.gate.ensure_can_initialise()?;
        self.gate.note_active();
        Ok(())
    }

    fn deactivate(&self) -> HostResult<()> {
        self.gate.ensure_can_deactivate()?;
        self.gate.note_deactivated();
        Ok(())
    }

    fn stage(&self) -> LifecycleStage {
        self.gate.stage()
    }
}

impl Effector for ProbeEffector {
    fn family(&self) -> EffectorFamily {
        self.family
    }

    fn handle_command(&self, command: EffectorCommand) -> HostResult<()> {
        *self.state.lock() = EffectorState::Executing;
        self.state_changed.emit(&EffectorState::Executing);
        self.handled.lock().push(command);
        *self.state.lock() = EffectorState::Idle;
        self.state_changed.emit(&EffectorState::Idle);
        Ok(())
    }

    fn effect_complete(&self) -> &Observers<EffectorEvent> {
        &self.effect_complete
    }

    fn effector_stuck(&self) -> &Observers<EffectorEvent> {
        &self.effector_stuck
    }

    fn state_changed(&self) -> &Observers<EffectorState> {
        &self.state_changed
    }

    fn state(&self) -> EffectorState {
        *self.state.lock()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProbeRobotConfig {
    pub(crate) name: String,
}

pub(crate) struct ProbeRobot {
    gate: LifecycleGate,
    family: RobotFamily,
    name: Mutex<Option<String>>,
    catalog: Mutex<Option<Arc<ScopeCatalog>>>,
}

impl ProbeRobot {
    pub(crate) fn new(family: RobotFamily) -> Arc<Self> {
        Arc::new(Self {
            gate: LifecycleGate::new("probe-robot"),
            family,
            name: Mutex::new(None),
            catalog: Mutex::new(None),
        })
    }

    pub(crate) fn mobile() -> Arc<Self> {
        Self::new(RobotFamily::Mobile)
    }

    pub(crate) fn configured_name(&self) -> Option<String> {
        self.name.lock().clone()
    }

    pub(crate) fn resolver(&self) -> Option<Arc<ScopeCatalog>> {
        self.catalog.lock().clone()
    }
}

impl Lifecycle for ProbeRobot {
    fn configure(&self, config: Box<dyn ComponentConfig>) -> HostResult<()> {
        self.gate.ensure_can_configure()?;
        let config = unpack_config::<ProbeRobotConfig>(config).map_err(|label| {
            HostError::new(
                rch_common::ErrorKind::Robot,
                codes::COMPONENT_CONFIG_TYPE,
                Messages::uniform(format!("probe robot cannot accept `{label}`")),
            )
        })?;
        *self.name.lock() = Some(config.name);
        self.gate.note_configured();
        Ok(())
    }

    fn initialise(&self) -> HostResult<()> {
        self.gate.ensure_can_initialise()?;
        self.gate.note_active();
        Ok(())
    }

    fn deactivate(&self) -> HostResult<()> {
        self.gate.ensure_can_deactivate()?;
        self.gate.note_deactivated();
        Ok(())
    }

    fn stage(&self) -> LifecycleStage {
        self.gate.stage()
    }
}

impl Robot for ProbeRobot {
    fn family(&self) -> RobotFamily {
        self.family
    }

    fn configuration_type(&self) -> TypeToken {
        TypeToken::of::<ProbeRobotConfig>()
    }

    fn decode_config(&self, section: &serde_json::Value) -> HostResult<Box<dyn ComponentConfig>> {
        let config: ProbeRobotConfig =
            serde_json::from_value(section.clone()).map_err(|err| {
                HostError::with_source(
                    rch_common::ErrorKind::Robot,
                    codes::SECTION_MALFORMED,
                    Messages::uniform("probe robot section malformed"),
                    err.into(),
                )
            })?;
        Ok(Box::new(config))
    }

    fn attach_resolver(&self, catalog: Arc<ScopeCatalog>) {
        *self.catalog.lock() = Some(catalog);
    }

    fn pause(&self) -> HostResult<()> {
        Ok(())
    }

    fn resume(&self) -> HostResult<()> {
        Ok(())
    }
}

pub(crate) struct ProbeProcessor {
    gate: LifecycleGate,
    family: ProcessorFamily,
    bound: Mutex<bool>,
}

impl ProbeProcessor {
    pub(crate) fn new(family: ProcessorFamily) -> Arc<Self> {
        Arc::new(Self {
            gate: LifecycleGate::new("probe-processor"),
            family,
            bound: Mutex::new(false),
        })
    }

    pub(crate) fn sensor_stream() -> Arc<Self> {
        Self::new(ProcessorFamily::Sensor)
    }

    pub(crate) fn is_bound(&self) -> bool {
        *self.bound.lock()
    }
}

impl Lifecycle for ProbeProcessor {
    fn configure(&self, _config: Box<dyn ComponentConfig>) -> HostResult<()> {
        self.gate.ensure_can_configure()?;
        self.gate.note_configured();
        Ok(())
    }

    fn initialise(&self) -> HostResult<()> {
        self.gate.ensure_can_initialise()?;
        self.gate.note_active();
        Ok(())
    }

    fn deactivate(&self) -> HostResult<()> {
        self.gate.ensure_can_deactivate()?;
        self.gate.note_deactivated();
        Ok(())
    }

    fn stage(&self) -> LifecycleStage {
        self.gate.stage()
    }
}

impl Processor for ProbeProcessor {
    fn family(&self) -> ProcessorFamily {
        self.family
    }

    fn bind(self: Arc<Self>, _catalog: &ScopeCatalog) -> HostResult<()> {
        *self.bound.lock() = true;
        Ok(())
    }
}
