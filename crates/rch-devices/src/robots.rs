//! ---
//! rch_section: "05-devices"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Shipped robots, sensors, effectors, and processors for the RCH runtime."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
//! Shipped robots: a patrolling scout rover and a stationary dock
//! sentry. Both resolve their devices from the scope catalog handed
//! over through `attach_resolver`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use rch_common::error::codes;
use rch_common::{ErrorKind, HostError, HostResult, Messages};
use rch_contracts::{
    unpack_config, ComponentConfig, Effector, EffectorCommand, EffectorFamily, Lifecycle,
    LifecycleGate, LifecycleStage, RegistrationTable, Robot, RobotFamily, ScopeCatalog, Sensor,
    TypeToken,
};
use rch_environment::Direction;

use crate::config_mismatch;
use crate::effectors::DriveConfig;
use crate::sensors::{RangeScanner, ScannerConfig};

/// Registrations for the robots this module ships.
pub fn table() -> RegistrationTable {
    RegistrationTable::new()
        .robot("scout_rover", RobotFamily::Mobile, || Ok(ScoutRover::new()))
        .robot("dock_sentry", RobotFamily::Static, || Ok(DockSentry::new()))
}

/// Wraps a device failure in the robot's own start-up error.
fn wiring_failure(robot: &str, detail: &str, cause: Option<HostError>) -> HostError {
    let messages = Messages::new(
        format!("{robot}: {detail}"),
        format!("{robot}: device wiring failed"),
        format!("{detail}; check the scope registrations and the nested device sections"),
        "the robot could not start one of its devices".to_owned(),
    );
    match cause {
        Some(cause) => HostError::with_source(
            ErrorKind::Robot,
            codes::ROBOT_SUBCOMPONENT,
            messages,
            anyhow::Error::new(cause),
        ),
        None => HostError::new(ErrorKind::Robot, codes::ROBOT_SUBCOMPONENT, messages),
    }
}

fn section_malformed(robot: &str, err: serde_json::Error) -> HostError {
    HostError::configuration_with(
        codes::SECTION_MALFORMED,
        Messages::technical_and_user(
            format!("{robot} section does not match its configuration type: {err}"),
            "the robot section of the bundle is malformed",
        ),
        err.into(),
    )
}

/// Patrol behaviour of a [`ScoutRover`].
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoutConfig {
    /// Name the rover reports in its logs.
    pub name: String,
    /// Time between range polls, in milliseconds.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,
    /// Heading held while patrolling.
    #[serde(default = "default_patrol_heading")]
    pub patrol_heading: Direction,
    /// Patrol speed in metres per second.
    #[serde(default = "default_patrol_speed_mps")]
    pub patrol_speed_mps: f64,
    /// Range at or under which the rover halts its drive, in metres.
    #[serde(default = "default_obstacle_stop_m")]
    pub obstacle_stop_m: f64,
    /// Section forwarded to the drive.
    #[serde(default)]
    pub drive: DriveConfig,
    /// Section forwarded to the range scanner.
    #[serde(default)]
    pub scanner: ScannerConfig,
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(250)
}

fn default_patrol_heading() -> Direction {
    Direction::North
}

fn default_patrol_speed_mps() -> f64 {
    0.5
}

fn default_obstacle_stop_m() -> f64 {
    2.0
}

/// Poll-loop directives, latest one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollSignal {
    Run,
    Pause,
    Stop,
}

/// Mobile robot that patrols on a fixed heading and halts its drive
/// when the range scanner sights an obstacle inside the stop range.
///
/// `initialise` wires a drive and a scanner out of the attached
/// catalog, issues the initial patrol command, and spawns the poll
/// loop, so it must run on a Tokio runtime.
pub struct ScoutRover {
    gate: LifecycleGate,
    config: Mutex<Option<ScoutConfig>>,
    resolver: Mutex<Option<Arc<ScopeCatalog>>>,
    drive: Mutex<Option<Arc<dyn Effector>>>,
    scanner: Mutex<Option<Arc<RangeScanner>>>,
    signal: Mutex<Option<watch::Sender<PollSignal>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ScoutRover {
    /// An unconfigured rover.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: LifecycleGate::new("scout_rover"),
            config: Mutex::new(None),
            resolver: Mutex::new(None),
            drive: Mutex::new(None),
            scanner: Mutex::new(None),
            signal: Mutex::new(None),
            worker: Mutex::new(None),
        })
    }
}

impl Lifecycle for ScoutRover {
    fn configure(&self, config: Box<dyn ComponentConfig>) -> HostResult<()> {
        self.gate.ensure_can_configure()?;
        let config = unpack_config::<ScoutConfig>(config)
            .map_err(|label| config_mismatch(ErrorKind::Robot, "scout rover", label))?;
        debug!(robot = %config.name, "scout rover configured");
        *self.config.lock() = Some(config);
        self.gate.note_configured();
        Ok(())
    }

    fn initialise(&self) -> HostResult<()> {
        self.gate.ensure_can_initialise()?;
        let config = self
            .config
            .lock()
            .clone()
            .ok_or_else(|| wiring_failure("scout rover", "no configuration stored", None))?;
        let catalog = self
            .resolver
            .lock()
            .clone()
            .ok_or_else(|| wiring_failure("scout rover", "no catalog attached", None))?;

        let drive = catalog
            .effectors()
            .one_by_family(EffectorFamily::NonHolonomicMotion)
            .map_err(|err| wiring_failure("scout rover", "no motion effector in scope", Some(err)))?;
        drive
            .configure(Box::new(config.drive.clone()))
            .and_then(|()| drive.initialise())
            .map_err(|err| wiring_failure("scout rover", "drive refused to start", Some(err)))?;

        let scanner = catalog
            .sensors()
            .one_of::<RangeScanner>()
            .map_err(|err| wiring_failure("scout rover", "no range scanner in scope", Some(err)))?;
        scanner
            .configure(Box::new(config.scanner.clone()))
            .and_then(|()| scanner.initialise())
            .map_err(|err| wiring_failure("scout rover", "scanner refused to start", Some(err)))?;

        // Reflex wiring: any sighting inside the stop range halts the
        // drive, independent of the poll loop.
        let stop_m = config.obstacle_stop_m;
        let halting = Arc::clone(&drive);
        scanner.data_received().subscribe(move |event| {
            if let Some(range_m) = RangeScanner::decode(event.data()) {
                if range_m <= stop_m {
                    warn!(range_m, stop_m, "obstacle inside stop range, halting");
                    if let Err(err) = halting.handle_command(EffectorCommand::halt()) {
                        error!(error = %err, "halt on obstacle failed");
                    }
                }
            }
        });

        drive
            .handle_command(EffectorCommand::movement(
                config.patrol_heading,
                config.patrol_speed_mps,
            ))
            .map_err(|err| {
                wiring_failure("scout rover", "initial patrol command refused", Some(err))
            })?;

        let (signal, mut signal_rx) = watch::channel(PollSignal::Run);
        let poll_scanner = Arc::clone(&scanner);
        // tokio intervals reject a zero period.
        let poll_interval = config.poll_interval.max(Duration::from_millis(1));
        let worker = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                tokio::select! {
                    changed = signal_rx.changed() => {
                        if changed.is_err() || *signal_rx.borrow() == PollSignal::Stop {
                            break;
                        }
                    }
                    _ = ticker.tick() => {
                        if *signal_rx.borrow() == PollSignal::Run {
                            RangeScanner::sample(&poll_scanner);
                        }
                    }
                }
            }
            debug!("scout rover poll loop stopped");
        });

        *self.drive.lock() = Some(drive);
        *self.scanner.lock() = Some(scanner);
        *self.signal.lock() = Some(signal);
        *self.worker.lock() = Some(worker);
        self.gate.note_active();
        info!(
            robot = %config.name,
            interval_ms = config.poll_interval.as_millis() as u64,
            "scout rover on patrol"
        );
        Ok(())
    }

    fn deactivate(&self) -> HostResult<()> {
        self.gate.ensure_can_deactivate()?;
        if let Some(signal) = self.signal.lock().take() {
            let _ = signal.send(PollSignal::Stop);
        }
        // The loop exits on the stop signal; the handle can go.
        self.worker.lock().take();
        if let Some(scanner) = self.scanner.lock().take() {
            if let Err(err) = scanner.deactivate() {
                warn!(error = %err, "scanner did not deactivate cleanly");
            }
        }
        if let Some(drive) = self.drive.lock().take() {
            if let Err(err) = drive
                .handle_command(EffectorCommand::halt())
                .and_then(|()| drive.deactivate())
            {
                warn!(error = %err, "drive did not deactivate cleanly");
            }
        }
        self.gate.note_deactivated();
        info!("scout rover deactivated");
        Ok(())
    }

    fn stage(&self) -> LifecycleStage {
        self.gate.stage()
    }
}

impl Robot for ScoutRover {
    fn family(&self) -> RobotFamily {
        RobotFamily::Mobile
    }

    fn configuration_type(&self) -> TypeToken {
        TypeToken::of::<ScoutConfig>()
    }

    fn decode_config(&self, section: &serde_json::Value) -> HostResult<Box<dyn ComponentConfig>> {
        let config: ScoutConfig = serde_json::from_value(section.clone())
            .map_err(|err| section_malformed("scout rover", err))?;
        Ok(Box::new(config))
    }

    fn attach_resolver(&self, catalog: Arc<ScopeCatalog>) {
        *self.resolver.lock() = Some(catalog);
    }

    fn pause(&self) -> HostResult<()> {
        self.gate.ensure_active()?;
        if let Some(signal) = self.signal.lock().as_ref() {
            let _ = signal.send(PollSignal::Pause);
        }
        info!("scout rover paused");
        Ok(())
    }

    fn resume(&self) -> HostResult<()> {
        self.gate.ensure_active()?;
        if let Some(signal) = self.signal.lock().as_ref() {
            let _ = signal.send(PollSignal::Run);
        }
        info!("scout rover resumed");
        Ok(())
    }
}

/// Watch behaviour of a [`DockSentry`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentryConfig {
    /// Name the sentry reports in its logs.
    pub name: String,
    /// Range at or under which a sighting counts as a contact, in
    /// metres.
    #[serde(default = "default_alert_range_m")]
    pub alert_range_m: f64,
    /// Section forwarded to the range scanner.
    #[serde(default)]
    pub scanner: ScannerConfig,
}

fn default_alert_range_m() -> f64 {
    10.0
}

/// Stationary robot watching a dock approach.
///
/// The sentry has no autonomous loop: each [`DockSentry::survey`] call
/// takes one reading through the wired scanner, and sightings inside
/// the alert range are counted as contacts.
pub struct DockSentry {
    gate: LifecycleGate,
    config: Mutex<Option<SentryConfig>>,
    resolver: Mutex<Option<Arc<ScopeCatalog>>>,
    scanner: Mutex<Option<Arc<RangeScanner>>>,
    contacts: Arc<AtomicUsize>,
}

impl DockSentry {
    /// An unconfigured sentry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: LifecycleGate::new("dock_sentry"),
            config: Mutex::new(None),
            resolver: Mutex::new(None),
            scanner: Mutex::new(None),
            contacts: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Take one depth reading through the sentry's scanner. `None`
    /// until the sentry is active.
    pub fn survey(&self) -> Option<f64> {
        let scanner = self.scanner.lock().clone()?;
        RangeScanner::sample(&scanner)
    }

    /// Sightings counted inside the alert range so far.
    pub fn contacts(&self) -> usize {
        self.contacts.load(Ordering::Relaxed)
    }
}

impl Lifecycle for DockSentry {
    fn configure(&self, config: Box<dyn ComponentConfig>) -> HostResult<()> {
        self.gate.ensure_can_configure()?;
        let config = unpack_config::<SentryConfig>(config)
            .map_err(|label| config_mismatch(ErrorKind::Robot, "dock sentry", label))?;
        debug!(robot = %config.name, "dock sentry configured");
        *self.config.lock() = Some(config);
        self.gate.note_configured();
        Ok(())
    }

    fn initialise(&self) -> HostResult<()> {
        self.gate.ensure_can_initialise()?;
        let config = self
            .config
            .lock()
            .clone()
            .ok_or_else(|| wiring_failure("dock sentry", "no configuration stored", None))?;
        let catalog = self
            .resolver
            .lock()
            .clone()
            .ok_or_else(|| wiring_failure("dock sentry", "no catalog attached", None))?;

        let scanner = catalog
            .sensors()
            .one_of::<RangeScanner>()
            .map_err(|err| wiring_failure("dock sentry", "no range scanner in scope", Some(err)))?;
        scanner
            .configure(Box::new(config.scanner.clone()))
            .and_then(|()| scanner.initialise())
            .map_err(|err| wiring_failure("dock sentry", "scanner refused to start", Some(err)))?;

        let name = config.name.clone();
        let alert_m = config.alert_range_m;
        let contacts = Arc::clone(&self.contacts);
        scanner.data_received().subscribe(move |event| {
            match RangeScanner::decode(event.data()) {
                Some(range_m) if range_m <= alert_m => {
                    contacts.fetch_add(1, Ordering::Relaxed);
                    info!(sentry = %name, range_m, "contact inside alert range");
                }
                Some(range_m) => trace!(sentry = %name, range_m, "approach clear"),
                None => debug!(
                    sentry = %name,
                    bytes = event.data().len(),
                    "unrecognised depth frame"
                ),
            }
        });

        *self.scanner.lock() = Some(scanner);
        self.gate.note_active();
        info!(sentry = %config.name, "dock sentry watching");
        Ok(())
    }

    fn deactivate(&self) -> HostResult<()> {
        self.gate.ensure_can_deactivate()?;
        if let Some(scanner) = self.scanner.lock().take() {
            if let Err(err) = scanner.deactivate() {
                warn!(error = %err, "scanner did not deactivate cleanly");
            }
        }
        self.gate.note_deactivated();
        info!("dock sentry deactivated");
        Ok(())
    }

    fn stage(&self) -> LifecycleStage {
        self.gate.stage()
    }
}

impl Robot for DockSentry {
    fn family(&self) -> RobotFamily {
        RobotFamily::Static
    }

    fn configuration_type(&self) -> TypeToken {
        TypeToken::of::<SentryConfig>()
    }

    fn decode_config(&self, section: &serde_json::Value) -> HostResult<Box<dyn ComponentConfig>> {
        let config: SentryConfig = serde_json::from_value(section.clone())
            .map_err(|err| section_malformed("dock sentry", err))?;
        Ok(Box::new(config))
    }

    fn attach_resolver(&self, catalog: Arc<ScopeCatalog>) {
        *self.resolver.lock() = Some(catalog);
    }

    fn pause(&self) -> HostResult<()> {
        self.gate.ensure_active()?;
        debug!("dock sentry has nothing to pause");
        Ok(())
    }

    fn resume(&self) -> HostResult<()> {
        self.gate.ensure_active()?;
        Ok(())
    }
}
