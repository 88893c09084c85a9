//! ---
//! rch_section: "01-core-functionality"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Shared primitives and utilities for the host runtime."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
use std::fmt;

use serde::{Deserialize, Serialize};

/// Diagnostic severity ladder, ordered from least to most severe.
///
/// The ladder is wider than the five tracing levels so bundle files and
/// error records can keep their historical granularity; `tracing_level`
/// collapses it for emission.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Periodic measurement or milestone marker.
    Metric,
    /// Raw data passed through for capture.
    DataEvent,
    /// Routine informational message.
    Message,
    /// Developer diagnostic detail.
    Debug,
    /// Operator-facing notice.
    Notification,
    /// Condition worth attention soon.
    Alert,
    /// Degraded but operating.
    Warning,
    /// Operation failed.
    #[default]
    Error,
    /// Failure requiring prompt operator action.
    Emergency,
    /// Failure endangering the whole host.
    Critical,
    /// Unrecoverable failure.
    Failure,
}

impl Severity {
    /// Collapse the ladder onto the tracing level used for emission.
    pub fn tracing_level(self) -> tracing::Level {
        match self {
            Severity::Metric | Severity::DataEvent => tracing::Level::TRACE,
            Severity::Message | Severity::Debug => tracing::Level::DEBUG,
            Severity::Notification => tracing::Level::INFO,
            Severity::Alert | Severity::Warning => tracing::Level::WARN,
            Severity::Error | Severity::Emergency | Severity::Critical | Severity::Failure => {
                tracing::Level::ERROR
            }
        }
    }

    fn label(self) -> &'static str {
        match self {
            Severity::Metric => "metric",
            Severity::DataEvent => "data_event",
            Severity::Message => "message",
            Severity::Debug => "debug",
            Severity::Notification => "notification",
            Severity::Alert => "alert",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Emergency => "emergency",
            Severity::Critical => "critical",
            Severity::Failure => "failure",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_orders_by_severity() {
        assert!(Severity::Metric < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Failure);
    }

    #[test]
    fn serde_round_trips_snake_case() {
        let json = serde_json::to_string(&Severity::DataEvent).unwrap();
        assert_eq!(json, "\"data_event\"");
        let back: Severity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Severity::DataEvent);
    }

    #[test]
    fn collapses_onto_tracing_levels() {
        assert_eq!(Severity::Metric.tracing_level(), tracing::Level::TRACE);
        assert_eq!(Severity::Notification.tracing_level(), tracing::Level::INFO);
        assert_eq!(Severity::Critical.tracing_level(), tracing::Level::ERROR);
    }
}
