//! ---
//! rch_section: "05-devices"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Shipped robots, sensors, effectors, and processors for the RCH runtime."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
//! Shipped sensors: a synthetic range scanner and a heading vane.
//!
//! Depth frames carry one reading as 8 little-endian bytes of an `f64`
//! in metres; orientation frames are JSON.

use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use rch_common::{ErrorKind, HostResult};
use rch_contracts::{
    unpack_config, ComponentConfig, Lifecycle, LifecycleGate, LifecycleStage, Observers,
    RegistrationTable, Sensor, SensorData, SensorEvent, SensorFamily,
};

use crate::config_mismatch;

/// Registrations for the sensors this module ships.
pub fn table() -> RegistrationTable {
    RegistrationTable::new()
        .sensor("range_scanner", SensorFamily::Depth, || {
            Ok(RangeScanner::new())
        })
        .sensor("heading_vane", SensorFamily::Orientation, || {
            Ok(HeadingVane::new())
        })
}

/// Behaviour of a [`RangeScanner`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Longest reportable range in metres; readings are clamped to it.
    #[serde(default = "default_range_limit_m")]
    pub range_limit_m: f64,
    /// Half-width of the uniform jitter applied to each reading, in
    /// metres. Zero disables jitter.
    #[serde(default = "default_noise_sigma")]
    pub noise_sigma: f64,
    /// When set, readings centre on this distance instead of the range
    /// limit. Bundles use it to stage an obstacle.
    #[serde(default)]
    pub obstacle_at_m: Option<f64>,
}

fn default_range_limit_m() -> f64 {
    30.0
}

fn default_noise_sigma() -> f64 {
    0.05
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            range_limit_m: default_range_limit_m(),
            noise_sigma: default_noise_sigma(),
            obstacle_at_m: None,
        }
    }
}

/// Synthetic ranging sensor in the `Depth` family.
///
/// Each [`RangeScanner::sample`] call produces one reading and announces
/// it through `data_received` on the calling thread. Without a staged
/// obstacle the scanner reads open space, i.e. the range limit plus
/// jitter.
pub struct RangeScanner {
    gate: LifecycleGate,
    config: Mutex<ScannerConfig>,
    data_received: Observers<SensorEvent>,
}

impl RangeScanner {
    /// A scanner with default behaviour, awaiting configuration.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: LifecycleGate::new("range_scanner"),
            config: Mutex::new(ScannerConfig::default()),
            data_received: Observers::new(),
        })
    }

    /// Acquire one reading and announce it. Returns the announced range,
    /// or `None` when the scanner is not active.
    pub fn sample(this: &Arc<Self>) -> Option<f64> {
        if this.gate.stage() != LifecycleStage::Active {
            return None;
        }
        let reading = {
            let config = this.config.lock();
            let limit = config.range_limit_m.max(0.0);
            let base = config.obstacle_at_m.unwrap_or(limit);
            let jitter = if config.noise_sigma > 0.0 {
                rand::thread_rng().gen_range(-config.noise_sigma..=config.noise_sigma)
            } else {
                0.0
            };
            (base + jitter).clamp(0.0, limit)
        };
        let data = SensorData::new(reading.to_le_bytes().to_vec());
        let event = SensorEvent::new(Arc::clone(this) as Arc<dyn Sensor>, data);
        let notified = this.data_received.emit(&event);
        trace!(range_m = reading, observers = notified, "range sample");
        Some(reading)
    }

    /// Read a depth frame back into metres. `None` when the payload is
    /// not exactly 8 bytes.
    pub fn decode(data: &SensorData) -> Option<f64> {
        let bytes: [u8; 8] = data.raw.as_ref().try_into().ok()?;
        Some(f64::from_le_bytes(bytes))
    }
}

impl Lifecycle for RangeScanner {
    fn configure(&self, config: Box<dyn ComponentConfig>) -> HostResult<()> {
        self.gate.ensure_can_configure()?;
        let config = unpack_config::<ScannerConfig>(config)
            .map_err(|label| config_mismatch(ErrorKind::Sensor, "range scanner", label))?;
        debug!(
            range_limit_m = config.range_limit_m,
            obstacle = ?config.obstacle_at_m,
            "range scanner configured"
        );
        *self.config.lock() = config;
        self.gate.note_configured();
        Ok(())
    }

    fn initialise(&self) -> HostResult<()> {
        self.gate.ensure_can_initialise()?;
        self.gate.note_active();
        debug!("range scanner active");
        Ok(())
    }

    fn deactivate(&self) -> HostResult<()> {
        self.gate.ensure_can_deactivate()?;
        self.gate.note_deactivated();
        debug!("range scanner deactivated");
        Ok(())
    }

    fn stage(&self) -> LifecycleStage {
        self.gate.stage()
    }
}

impl Sensor for RangeScanner {
    fn family(&self) -> SensorFamily {
        SensorFamily::Depth
    }

    fn data_received(&self) -> &Observers<SensorEvent> {
        &self.data_received
    }
}

/// Behaviour of a [`HeadingVane`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaneConfig {
    /// Heading reported first, in degrees clockwise from north.
    #[serde(default)]
    pub start_heading_deg: f64,
    /// Half-width of the uniform per-report drift, in degrees. Zero
    /// freezes the heading.
    #[serde(default = "default_drift_sigma_deg")]
    pub drift_sigma_deg: f64,
}

fn default_drift_sigma_deg() -> f64 {
    1.5
}

impl Default for VaneConfig {
    fn default() -> Self {
        Self {
            start_heading_deg: 0.0,
            drift_sigma_deg: default_drift_sigma_deg(),
        }
    }
}

/// Synthetic compass in the `Orientation` family.
///
/// The reported heading does a bounded random walk from the configured
/// start. Frames are JSON: `{"heading_deg": <f64>}`.
pub struct HeadingVane {
    gate: LifecycleGate,
    config: Mutex<VaneConfig>,
    heading_deg: Mutex<f64>,
    data_received: Observers<SensorEvent>,
}

impl HeadingVane {
    /// A vane pointing north, awaiting configuration.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: LifecycleGate::new("heading_vane"),
            config: Mutex::new(VaneConfig::default()),
            heading_deg: Mutex::new(0.0),
            data_received: Observers::new(),
        })
    }

    /// Drift the heading one step and announce it. Returns the announced
    /// heading, or `None` when the vane is not active.
    pub fn report(this: &Arc<Self>) -> Option<f64> {
        if this.gate.stage() != LifecycleStage::Active {
            return None;
        }
        let heading = {
            let sigma = this.config.lock().drift_sigma_deg;
            let drift = if sigma > 0.0 {
                rand::thread_rng().gen_range(-sigma..=sigma)
            } else {
                0.0
            };
            let mut heading = this.heading_deg.lock();
            *heading = (*heading + drift).rem_euclid(360.0);
            *heading
        };
        let payload = serde_json::json!({ "heading_deg": heading }).to_string();
        let event = SensorEvent::new(
            Arc::clone(this) as Arc<dyn Sensor>,
            SensorData::new(payload.into_bytes()),
        );
        let notified = this.data_received.emit(&event);
        trace!(heading_deg = heading, observers = notified, "heading report");
        Some(heading)
    }
}

impl Lifecycle for HeadingVane {
    fn configure(&self, config: Box<dyn ComponentConfig>) -> HostResult<()> {
        self.gate.ensure_can_configure()?;
        let config = unpack_config::<VaneConfig>(config)
            .map_err(|label| config_mismatch(ErrorKind::Sensor, "heading vane", label))?;
        *self.heading_deg.lock() = config.start_heading_deg.rem_euclid(360.0);
        *self.config.lock() = config;
        self.gate.note_configured();
        Ok(())
    }

    fn initialise(&self) -> HostResult<()> {
        self.gate.ensure_can_initialise()?;
        self.gate.note_active();
        debug!("heading vane active");
        Ok(())
    }

    fn deactivate(&self) -> HostResult<()> {
        self.gate.ensure_can_deactivate()?;
        self.gate.note_deactivated();
        debug!("heading vane deactivated");
        Ok(())
    }

    fn stage(&self) -> LifecycleStage {
        self.gate.stage()
    }
}

impl Sensor for HeadingVane {
    fn family(&self) -> SensorFamily {
        SensorFamily::Orientation
    }

    fn data_received(&self) -> &Observers<SensorEvent> {
        &self.data_received
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quiet_scanner(obstacle_at_m: Option<f64>, range_limit_m: f64) -> Arc<RangeScanner> {
        let scanner = RangeScanner::new();
        scanner
            .configure(Box::new(ScannerConfig {
                range_limit_m,
                noise_sigma: 0.0,
                obstacle_at_m,
            }))
            .unwrap();
        scanner.initialise().unwrap();
        scanner
    }

    #[test]
    fn staged_obstacle_round_trips_through_the_frame() {
        let scanner = quiet_scanner(Some(2.0), 30.0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        scanner.data_received().subscribe(move |event| {
            assert_eq!(event.data().len(), 8);
            sink.lock().push(RangeScanner::decode(event.data()).unwrap());
        });

        assert_eq!(RangeScanner::sample(&scanner), Some(2.0));
        assert_eq!(seen.lock().as_slice(), &[2.0]);
    }

    #[test]
    fn open_space_reads_the_range_limit() {
        let scanner = quiet_scanner(None, 30.0);
        assert_eq!(RangeScanner::sample(&scanner), Some(30.0));
    }

    #[test]
    fn readings_are_clamped_to_the_limit() {
        let scanner = quiet_scanner(Some(50.0), 30.0);
        assert_eq!(RangeScanner::sample(&scanner), Some(30.0));
    }

    #[test]
    fn sampling_outside_active_is_silent() {
        let scanner = RangeScanner::new();
        let count = Arc::new(Mutex::new(0usize));
        let tally = Arc::clone(&count);
        scanner.data_received().subscribe(move |_| *tally.lock() += 1);

        assert_eq!(RangeScanner::sample(&scanner), None);
        scanner.configure(Box::new(ScannerConfig::default())).unwrap();
        assert_eq!(RangeScanner::sample(&scanner), None);
        scanner.initialise().unwrap();
        assert!(RangeScanner::sample(&scanner).is_some());
        scanner.deactivate().unwrap();
        assert_eq!(RangeScanner::sample(&scanner), None);
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn foreign_config_is_rejected_with_the_type_code() {
        let scanner = RangeScanner::new();
        let err = scanner.configure(Box::new(VaneConfig::default())).unwrap_err();
        assert_eq!(err.code(), 103);
        assert_eq!(scanner.stage(), LifecycleStage::Uninitialised);
    }

    #[test]
    fn decode_rejects_short_frames() {
        assert_eq!(RangeScanner::decode(&SensorData::new(vec![1u8, 2, 3])), None);
    }

    #[test]
    fn frozen_vane_reports_the_start_heading_as_json() {
        let vane = HeadingVane::new();
        vane.configure(Box::new(VaneConfig {
            start_heading_deg: 90.0,
            drift_sigma_deg: 0.0,
        }))
        .unwrap();
        vane.initialise().unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        vane.data_received().subscribe(move |event| {
            let frame = event.data().as_json().unwrap();
            sink.lock().push(frame["heading_deg"].as_f64().unwrap());
        });

        assert_eq!(HeadingVane::report(&vane), Some(90.0));
        assert_eq!(HeadingVane::report(&vane), Some(90.0));
        assert_eq!(seen.lock().as_slice(), &[90.0, 90.0]);
    }

    #[test]
    fn start_heading_wraps_into_one_turn() {
        let vane = HeadingVane::new();
        vane.configure(Box::new(VaneConfig {
            start_heading_deg: 450.0,
            drift_sigma_deg: 0.0,
        }))
        .unwrap();
        vane.initialise().unwrap();
        assert_eq!(HeadingVane::report(&vane), Some(90.0));
    }

    #[test]
    fn drifting_vane_stays_inside_one_turn() {
        let vane = HeadingVane::new();
        vane.configure(Box::new(VaneConfig {
            start_heading_deg: 0.0,
            drift_sigma_deg: 5.0,
        }))
        .unwrap();
        vane.initialise().unwrap();
        for _ in 0..50 {
            let heading = HeadingVane::report(&vane).unwrap();
            assert!((0.0..360.0).contains(&heading));
        }
    }
}
