//! ---
//! rch_section: "03-persistence-logging"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Structured logging bring-up driven by the log bundle section."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Logging bring-up for the host.
//!
//! The orchestrator hands [`init_logging`] the decoded `log` bundle
//! section. Installation is process-global and idempotent: the first
//! caller's settings win, later calls are no-ops, mirroring the
//! first-caller-wins behaviour of the component registry.

use std::path::PathBuf;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tracing_appender::rolling::daily;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

use rch_common::error::codes;
use rch_common::{ErrorKind, HostError, HostResult, Messages, Severity};

/// Environment variable overriding the configured filter directive
/// (e.g. `info`, `debug,rch_contracts=trace`).
pub const LOG_ENV: &str = "RCH_LOG";

static FILE_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();
static STDOUT_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();
static INSTALLED: OnceCell<()> = OnceCell::new();

/// Where log events are delivered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// Write to standard output.
    Console,
    /// Write to a daily-rolling file in the configured directory.
    File,
    /// Discard events (the filter still runs, nothing is sinked).
    None,
}

/// Console rendering style.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    /// Human-oriented single-line output.
    #[default]
    Pretty,
    /// Machine-oriented JSON lines.
    StructuredJson,
}

fn default_targets() -> Vec<LogTarget> {
    vec![LogTarget::Console]
}

fn default_directory() -> PathBuf {
    PathBuf::from("logs")
}

fn default_file_prefix() -> String {
    "rchd".to_owned()
}

fn default_filter() -> String {
    "info".to_owned()
}

/// Decoded `log` bundle section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogSettings {
    /// Sinks to install; defaults to console only.
    #[serde(default = "default_targets")]
    pub targets: Vec<LogTarget>,
    /// Directory for rolling log files when the file target is active.
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// File name prefix for rolling log files.
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    /// Console rendering style.
    #[serde(default)]
    pub format: LogFormat,
    /// Filter directive used when [`LOG_ENV`] is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            targets: default_targets(),
            directory: default_directory(),
            file_prefix: default_file_prefix(),
            format: LogFormat::default(),
            filter: default_filter(),
        }
    }
}

impl LogSettings {
    fn wants(&self, target: LogTarget) -> bool {
        self.targets.contains(&target)
    }
}

fn install_failed(detail: String, source: Option<anyhow::Error>) -> HostError {
    HostError::detailed(
        ErrorKind::Logging,
        codes::LOG_INIT_FAILED,
        Messages::new(
            detail.clone(),
            "logging pipeline unavailable",
            detail,
            "diagnostic logging could not be started".to_owned(),
        ),
        Severity::Error,
        source,
    )
}

/// Install the global tracing pipeline described by `settings`.
///
/// The [`LOG_ENV`] directive overrides `settings.filter` when present.
/// Repeat calls return `Ok` without touching the installed pipeline.
pub fn init_logging(settings: &LogSettings) -> HostResult<()> {
    if INSTALLED.get().is_some() {
        debug!("logging already initialised, keeping existing pipeline");
        return Ok(());
    }

    let filter = match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(&directive).map_err(|err| {
            install_failed(
                format!("invalid {LOG_ENV} directive `{directive}`: {err}"),
                Some(anyhow::Error::new(err)),
            )
        })?,
        Err(_) => EnvFilter::try_new(&settings.filter).map_err(|err| {
            install_failed(
                format!("invalid log filter `{}`: {err}", settings.filter),
                Some(anyhow::Error::new(err)),
            )
        })?,
    };

    let console_layer = if settings.wants(LogTarget::Console) {
        let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
        let _ = STDOUT_GUARD.set(stdout_guard);
        let layer = match settings.format {
            LogFormat::StructuredJson => fmt::layer()
                .with_target(false)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .json()
                .with_writer(stdout_writer)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .with_target(true)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .with_writer(stdout_writer)
                .boxed(),
        };
        Some(layer)
    } else {
        None
    };

    let file_layer = if settings.wants(LogTarget::File) {
        std::fs::create_dir_all(&settings.directory).map_err(|err| {
            install_failed(
                format!(
                    "log directory {} could not be created: {err}",
                    settings.directory.display()
                ),
                Some(anyhow::Error::new(err)),
            )
        })?;
        let appender = daily(&settings.directory, format!("{}.log", settings.file_prefix));
        let (file_writer, file_guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(file_guard);
        Some(
            fmt::layer()
                .with_target(true)
                .with_timer(fmt::time::UtcTime::rfc_3339())
                .json()
                .with_writer(file_writer)
                .boxed(),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .ok();
    let _ = INSTALLED.set(());

    info!(
        targets = ?settings.targets,
        format = ?settings.format,
        "logging initialised"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_section_decodes_to_defaults() {
        let settings: LogSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, LogSettings::default());
        assert_eq!(settings.targets, vec![LogTarget::Console]);
        assert_eq!(settings.filter, "info");
    }

    #[test]
    fn targets_decode_lowercase() {
        let settings: LogSettings =
            serde_json::from_str(r#"{"targets": ["console", "file", "none"]}"#).unwrap();
        assert_eq!(
            settings.targets,
            vec![LogTarget::Console, LogTarget::File, LogTarget::None]
        );
    }

    #[test]
    fn init_is_idempotent_and_creates_the_log_directory() {
        let dir = tempfile::tempdir().unwrap();
        let settings = LogSettings {
            targets: vec![LogTarget::File],
            directory: dir.path().join("logs"),
            ..LogSettings::default()
        };
        init_logging(&settings).unwrap();
        assert!(settings.directory.is_dir());
        // Second call keeps the existing pipeline.
        init_logging(&LogSettings::default()).unwrap();
    }
}
