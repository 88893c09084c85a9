//! ---
//! rch_section: "01-core-functionality"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Host orchestration: bundle-driven bootstrap and the operator output channel."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
//! Operator-facing output channel.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use rch_common::error::codes;
use rch_common::{HostError, HostResult, Messages};
use rch_contracts::{unpack_config, ComponentConfig, Lifecycle, LifecycleGate, LifecycleStage};

/// Widest line the line-display method will pass through.
pub const LINE_DISPLAY_COLUMNS: usize = 80;

/// Where operator messages are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMethod {
    /// Accept and discard.
    None,
    /// Write whole lines to standard output.
    Console,
    /// Character line display. No hardware path is wired up; it renders
    /// through the console path with a line-width crop so bundles
    /// written for the display stay loadable.
    LineDisplay,
}

/// Decoded `output` bundle section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Delivery method; defaults to the console.
    #[serde(default = "default_method")]
    pub method: OutputMethod,
}

fn default_method() -> OutputMethod {
    OutputMethod::Console
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            method: default_method(),
        }
    }
}

/// The host's channel for operator-facing text.
///
/// `send` is deliberately forgiving: outside the active stage it
/// swallows the text and reports `Ok(false)`, so callers on failure
/// paths never trade their original error for an output error.
pub struct Output {
    gate: LifecycleGate,
    method: Mutex<OutputMethod>,
    capture: Mutex<Option<Box<dyn Fn(&str) + Send + Sync>>>,
}

impl Output {
    /// A console-method channel, awaiting configuration.
    pub fn new() -> Self {
        Self {
            gate: LifecycleGate::new("output"),
            method: Mutex::new(default_method()),
            capture: Mutex::new(None),
        }
    }

    /// Divert delivered lines to `capture` instead of standard output.
    pub fn set_capture(&self, capture: impl Fn(&str) + Send + Sync + 'static) {
        *self.capture.lock() = Some(Box::new(capture));
    }

    /// Deliver one line of text per the configured method.
    ///
    /// Returns `Ok(true)` when the channel is active and the text was
    /// routed, `Ok(false)` when the channel is not active and the text
    /// was dropped.
    pub fn send(&self, text: &str) -> HostResult<bool> {
        if self.gate.stage() != LifecycleStage::Active {
            return Ok(false);
        }
        let line = match *self.method.lock() {
            OutputMethod::None => None,
            OutputMethod::Console => Some(text.to_owned()),
            OutputMethod::LineDisplay => Some(crop_line(text)),
        };
        if let Some(line) = line {
            match self.capture.lock().as_ref() {
                Some(capture) => capture(&line),
                None => println!("{line}"),
            }
        }
        Ok(true)
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle for Output {
    fn configure(&self, config: Box<dyn ComponentConfig>) -> HostResult<()> {
        self.gate.ensure_can_configure()?;
        let config = unpack_config::<OutputConfig>(config).map_err(|label| {
            HostError::configuration(
                codes::OUTPUT_CONFIG_TYPE,
                Messages::technical_and_user(
                    format!("output channel cannot use configuration type `{label}`"),
                    "the output channel received the wrong configuration",
                ),
            )
        })?;
        *self.method.lock() = config.method;
        self.gate.note_configured();
        Ok(())
    }

    fn initialise(&self) -> HostResult<()> {
        self.gate.ensure_can_initialise()?;
        self.gate.note_active();
        debug!(method = ?*self.method.lock(), "output channel active");
        Ok(())
    }

    fn deactivate(&self) -> HostResult<()> {
        self.gate.ensure_can_deactivate()?;
        self.gate.note_deactivated();
        debug!("output channel deactivated");
        Ok(())
    }

    fn stage(&self) -> LifecycleStage {
        self.gate.stage()
    }
}

fn crop_line(text: &str) -> String {
    text.chars().take(LINE_DISPLAY_COLUMNS).collect()
}
