//! ---
//! rch_section: "01-core-functionality"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Host orchestration: bundle-driven bootstrap and the operator output channel."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
//! The host orchestrator.
//!
//! Bootstrap is a strict stage sequence: select the bundle, bring up the
//! output channel, install logging, then resolve, configure, wire, and
//! initialise the configured robot. No stage runs after a failure, and a
//! failed bootstrap leaves the host non-active for good.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use rch_common::error::codes;
use rch_common::{HostError, HostResult, Messages};
use rch_config::BundleStore;
use rch_contracts::{
    unpack_config, ComponentConfig, ComponentRegistry, Lifecycle, LifecycleGate, LifecycleStage,
    RegistrationTable, Robot, ScopeKey,
};
use rch_logging::{init_logging, LogSettings};

use crate::output::{Output, OutputConfig};

/// Runtime parameters the binary hands to [`HostManager::configure`].
///
/// Not a bundle section: the binary builds it from the CLI before any
/// bundle is loaded.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Positional arguments; the first one names the bundle to load.
    pub args: Vec<String>,
    /// Directory holding the bundle store.
    pub config_dir: PathBuf,
    /// Scope the host builds its capability catalog under.
    pub scope: ScopeKey,
}

/// Orchestrates one robot's lifetime on this host.
///
/// The manager is itself a [`Lifecycle`] component: `configure` selects
/// the bundle, `initialise` runs the remaining bootstrap stages in
/// order, and `deactivate` is the ordered shutdown. `initialise` is
/// single-shot even though the gate would permit a retry from
/// `Configured`; a fresh manager is required after a failed bootstrap.
pub struct HostManager {
    gate: LifecycleGate,
    registry: Arc<ComponentRegistry>,
    table: Mutex<Option<RegistrationTable>>,
    store: Mutex<Option<Arc<BundleStore>>>,
    config: Mutex<Option<HostConfig>>,
    output: Output,
    robot: Mutex<Option<Arc<dyn Robot>>>,
    attempted: AtomicBool,
}

impl HostManager {
    /// A manager over `registry`, registering `table` in its scope at
    /// bootstrap.
    pub fn new(registry: Arc<ComponentRegistry>, table: RegistrationTable) -> Self {
        Self {
            gate: LifecycleGate::new("host"),
            registry,
            table: Mutex::new(Some(table)),
            store: Mutex::new(None),
            config: Mutex::new(None),
            output: Output::new(),
            robot: Mutex::new(None),
            attempted: AtomicBool::new(false),
        }
    }

    /// Name of the bundle the host selected, once configured.
    pub fn active_bundle(&self) -> Option<String> {
        self.store.lock().as_ref().and_then(|store| store.active())
    }

    /// The hosted robot, once bootstrap succeeded.
    pub fn robot(&self) -> Option<Arc<dyn Robot>> {
        self.robot.lock().clone()
    }

    /// The operator output channel.
    pub fn output(&self) -> &Output {
        &self.output
    }

    fn start_output(&self, store: &BundleStore) -> HostResult<()> {
        let output_config: OutputConfig = store.section("output")?;
        self.output.configure(Box::new(output_config))?;
        self.output.initialise()
    }

    fn start_logging(&self, store: &BundleStore) -> HostResult<()> {
        let settings: LogSettings = store.section("log")?;
        init_logging(&settings)
    }

    fn start_robot(&self, store: &BundleStore, config: &HostConfig) -> HostResult<Arc<dyn Robot>> {
        let table = self.table.lock().take().unwrap_or_default();
        let catalog = self
            .registry
            .build(config.scope.clone(), table)
            .map_err(robot_start)?;

        let section = store.section_raw("robot").map_err(robot_start)?;
        let type_name = section
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| robot_start(missing_robot_type(store)))?
            .to_owned();
        let robot = catalog
            .robots()
            .one_by_type_name(&type_name)
            .map_err(|err| robot_unavailable(&type_name, err))?;
        debug!(
            robot = %type_name,
            configuration = robot.configuration_type().name(),
            "robot resolved"
        );

        let robot_config = robot.decode_config(&section).map_err(robot_start)?;
        robot.configure(robot_config).map_err(robot_start)?;
        robot.attach_resolver(Arc::clone(&catalog));
        robot.initialise().map_err(robot_start)?;
        info!(robot = %type_name, scope = %config.scope, "robot active");
        Ok(robot)
    }
}

impl Lifecycle for HostManager {
    fn configure(&self, config: Box<dyn ComponentConfig>) -> HostResult<()> {
        self.gate.ensure_can_configure()?;
        let config = unpack_config::<HostConfig>(config).map_err(|label| {
            HostError::configuration(
                codes::HOST_CONFIG_TYPE,
                Messages::technical_and_user(
                    format!("host cannot use configuration type `{label}`"),
                    "the host received the wrong configuration",
                ),
            )
        })?;
        let store = BundleStore::new(&config.config_dir);
        let bundle = store.select_or_default(config.args.first().map(String::as_str))?;
        info!(
            bundle = %bundle,
            directory = %store.directory().display(),
            "configuration bundle selected"
        );
        *self.store.lock() = Some(Arc::new(store));
        *self.config.lock() = Some(config);
        self.gate.note_configured();
        Ok(())
    }

    fn initialise(&self) -> HostResult<()> {
        self.gate.ensure_can_initialise()?;
        // The gate would allow a retry from Configured; bootstrap is
        // single-shot on top of it.
        if self.attempted.swap(true, Ordering::SeqCst) {
            return Err(HostError::lifecycle(
                codes::INITIALISE_REPEATED,
                Messages::technical_and_user(
                    "host initialise is single-shot; build a fresh host to retry",
                    "the host cannot be restarted in place",
                ),
            ));
        }
        let store = self
            .store
            .lock()
            .clone()
            .ok_or_else(|| not_configured("no bundle store"))?;
        let config = self
            .config
            .lock()
            .clone()
            .ok_or_else(|| not_configured("no configuration stored"))?;

        // Logging is not installed yet on these two stages; echo to
        // stderr so the failure is visible somewhere.
        if let Err(err) = self.start_output(&store) {
            eprintln!("rchd: output channel unavailable: {}", err.messages().full);
            return Err(err);
        }
        if let Err(err) = self.start_logging(&store) {
            eprintln!("rchd: logging unavailable: {}", err.messages().full);
            return Err(err);
        }

        match self.start_robot(&store, &config) {
            Ok(robot) => {
                *self.robot.lock() = Some(robot);
                self.gate.note_active();
                info!(
                    bundle = %store.active().unwrap_or_default(),
                    "host active"
                );
                Ok(())
            }
            Err(err) => {
                let _ = self.output.send(&err.messages().summary);
                let _ = self.output.send(&err.messages().user);
                Err(err)
            }
        }
    }

    fn deactivate(&self) -> HostResult<()> {
        self.gate.ensure_can_deactivate()?;
        if let Err(err) = self.output.deactivate() {
            warn!(error = %err, "output channel did not deactivate cleanly");
        }
        if let Some(robot) = self.robot.lock().take() {
            if let Err(err) = robot.deactivate() {
                warn!(error = %err, "robot did not deactivate cleanly");
            }
        }
        self.gate.note_deactivated();
        info!("host deactivated");
        Ok(())
    }

    fn stage(&self) -> LifecycleStage {
        self.gate.stage()
    }
}

fn not_configured(detail: &str) -> HostError {
    HostError::lifecycle(
        codes::INITIALISE_BEFORE_CONFIGURE,
        Messages::technical_and_user(
            format!("host: {detail}"),
            "the host was driven out of order",
        ),
    )
}

/// Wraps a stage-4..7 failure as the one critical robot-start error.
fn robot_start(err: HostError) -> HostError {
    let summary = err.messages().summary.clone();
    HostError::startup(
        codes::ROBOT_START_FAILED,
        Messages::new(
            format!("robot could not be started: {}", err.messages().full),
            format!("robot start failed: {summary}"),
            "check the robot section of the active bundle and the scope registrations".to_owned(),
            "the robot could not be started".to_owned(),
        ),
        Some(anyhow::Error::new(err)),
    )
}

fn robot_unavailable(type_name: &str, err: HostError) -> HostError {
    HostError::startup(
        codes::ROBOT_TYPE_UNAVAILABLE,
        Messages::new(
            format!(
                "robot type `{type_name}` is not available: {}",
                err.messages().full
            ),
            format!("robot type `{type_name}` unavailable"),
            format!("register `{type_name}` on this host or correct the bundle's robot section"),
            "the configured robot is not installed on this host".to_owned(),
        ),
        Some(anyhow::Error::new(err)),
    )
}

fn missing_robot_type(store: &BundleStore) -> HostError {
    HostError::configuration(
        codes::SECTION_MALFORMED,
        Messages::technical_and_user(
            format!(
                "robot section of bundle `{}` has no `type` field",
                store.active().unwrap_or_default()
            ),
            "the robot configuration does not name a robot type",
        ),
    )
}
