//! ---
//! rch_section: "01-core-functionality"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Capability contracts, catalog discovery, and the command/event protocol."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
//! Event payloads carried by the observer channels. Sensor and effector
//! events keep a shared back-reference to the originating component so a
//! listener can interrogate or drive it directly.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::component::{Effector, Sensor};

/// One acquired batch of sensor data.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorData {
    /// Raw acquisition payload; the producing sensor defines the layout.
    pub raw: Bytes,
    /// When the batch was captured.
    pub captured_at: DateTime<Utc>,
}

impl SensorData {
    /// Wrap a raw payload, stamping capture time.
    pub fn new(raw: impl Into<Bytes>) -> Self {
        Self {
            raw: raw.into(),
            captured_at: Utc::now(),
        }
    }

    /// Number of payload bytes.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// True when the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Decode the payload as JSON, for sensors that publish JSON frames.
    pub fn as_json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.raw).ok()
    }
}

/// Announcement of one acquired data batch.
#[derive(Clone)]
pub struct SensorEvent {
    source: Arc<dyn Sensor>,
    data: SensorData,
}

impl SensorEvent {
    /// Build an announcement for `data` produced by `source`.
    pub fn new(source: Arc<dyn Sensor>, data: SensorData) -> Self {
        Self { source, data }
    }

    /// The component listeners should treat as the origin.
    pub fn source(&self) -> &Arc<dyn Sensor> {
        &self.source
    }

    /// The acquired batch.
    pub fn data(&self) -> &SensorData {
        &self.data
    }

    /// Re-bind the visible origin, used by relay processors republishing
    /// an upstream event under their own identity.
    pub fn with_source(mut self, source: Arc<dyn Sensor>) -> Self {
        self.source = source;
        self
    }
}

impl fmt::Debug for SensorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorEvent")
            .field("family", &self.source.family())
            .field("data", &self.data)
            .finish()
    }
}

/// Announcement of an effector completing, or failing to produce, the
/// effect of one command.
#[derive(Clone)]
pub struct EffectorEvent {
    source: Arc<dyn Effector>,
    command_id: Option<Uuid>,
    at: DateTime<Utc>,
}

impl EffectorEvent {
    /// Build an announcement for the command identified by `command_id`.
    pub fn new(source: Arc<dyn Effector>, command_id: Option<Uuid>) -> Self {
        Self {
            source,
            command_id,
            at: Utc::now(),
        }
    }

    /// The effector the announcement is about.
    pub fn source(&self) -> &Arc<dyn Effector> {
        &self.source
    }

    /// Identity of the command this announcement answers, when known.
    pub fn command_id(&self) -> Option<Uuid> {
        self.command_id
    }

    /// When the announcement was made.
    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }
}

impl fmt::Debug for EffectorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectorEvent")
            .field("family", &self.source.family())
            .field("command_id", &self.command_id)
            .field("at", &self.at)
            .finish()
    }
}
