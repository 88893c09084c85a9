//! ---
//! rch_section: "05-devices"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Shipped robots, sensors, effectors, and processors for the RCH runtime."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
//! Shipped processors: a relay that republishes one sensor's stream.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use rch_common::{ErrorKind, HostResult};
use rch_contracts::{
    unpack_config, ComponentConfig, Lifecycle, LifecycleGate, LifecycleStage, Observers,
    Processor, ProcessorFamily, RegistrationTable, ScopeCatalog, Sensor, SensorEvent,
    SensorFamily,
};

use crate::config_mismatch;

/// Registrations for the processors this module ships.
pub fn table() -> RegistrationTable {
    RegistrationTable::new().processor("sensor_relay", ProcessorFamily::Sensor, || {
        Ok(SensorRelay::new())
    })
}

/// Behaviour of a [`SensorRelay`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Family of the sensor whose stream the relay republishes.
    #[serde(default = "default_source_family")]
    pub source_family: SensorFamily,
}

fn default_source_family() -> SensorFamily {
    SensorFamily::Depth
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            source_family: default_source_family(),
        }
    }
}

/// Republishes one sensor's stream under the relay's own identity.
///
/// The relay is both a [`Processor`] (it is wired to its source through
/// `bind`) and a [`Sensor`] (downstream consumers subscribe to it like
/// any other sensor of the mirrored family). The source holds only a
/// weak reference back, and the relay forwards nothing unless it is
/// active.
pub struct SensorRelay {
    gate: LifecycleGate,
    config: Mutex<RelayConfig>,
    data_received: Observers<SensorEvent>,
}

impl SensorRelay {
    /// A relay mirroring the depth family, awaiting configuration.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: LifecycleGate::new("sensor_relay"),
            config: Mutex::new(RelayConfig::default()),
            data_received: Observers::new(),
        })
    }
}

impl Lifecycle for SensorRelay {
    fn configure(&self, config: Box<dyn ComponentConfig>) -> HostResult<()> {
        self.gate.ensure_can_configure()?;
        let config = unpack_config::<RelayConfig>(config)
            .map_err(|label| config_mismatch(ErrorKind::Sensor, "sensor relay", label))?;
        *self.config.lock() = config;
        self.gate.note_configured();
        Ok(())
    }

    fn initialise(&self) -> HostResult<()> {
        self.gate.ensure_can_initialise()?;
        self.gate.note_active();
        debug!("sensor relay active");
        Ok(())
    }

    fn deactivate(&self) -> HostResult<()> {
        self.gate.ensure_can_deactivate()?;
        self.gate.note_deactivated();
        debug!("sensor relay deactivated");
        Ok(())
    }

    fn stage(&self) -> LifecycleStage {
        self.gate.stage()
    }
}

impl Sensor for SensorRelay {
    /// The relay presents downstream as the family it mirrors.
    fn family(&self) -> SensorFamily {
        self.config.lock().source_family
    }

    fn data_received(&self) -> &Observers<SensorEvent> {
        &self.data_received
    }
}

impl Processor for SensorRelay {
    fn family(&self) -> ProcessorFamily {
        ProcessorFamily::Sensor
    }

    fn bind(self: Arc<Self>, catalog: &ScopeCatalog) -> HostResult<()> {
        let family = self.config.lock().source_family;
        let source = catalog.sensors().one_by_family(family)?;
        let relay = Arc::downgrade(&self);
        source.data_received().subscribe(move |event| {
            if let Some(relay) = relay.upgrade() {
                if relay.gate.stage() == LifecycleStage::Active {
                    let rebound =
                        event.clone().with_source(Arc::clone(&relay) as Arc<dyn Sensor>);
                    relay.data_received.emit(&rebound);
                }
            }
        });
        debug!(family = %family, "sensor relay bound");
        Ok(())
    }
}
