//! ---
//! rch_section: "01-core-functionality"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Shared primitives and utilities for the host runtime."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};

/// Four coordinated renderings of one failure, aimed at different readers.
///
/// Every [`crate::HostError`] carries one of these. The `full` text is what
/// `Display` prints; the other three feed operator consoles, maintainer
/// diagnostics, and end-user surfaces respectively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Messages {
    /// Complete technical detail for logs and debugging.
    pub full: String,
    /// One-line operator summary.
    pub summary: String,
    /// Remediation hint for maintainers.
    pub developer: String,
    /// Plain-language text safe to show an end user.
    pub user: String,
}

impl Messages {
    /// Build with all four renderings spelled out.
    pub fn new(
        full: impl Into<String>,
        summary: impl Into<String>,
        developer: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            full: full.into(),
            summary: summary.into(),
            developer: developer.into(),
            user: user.into(),
        }
    }

    /// Fan a single text out to all four renderings.
    pub fn uniform(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            full: text.clone(),
            summary: text.clone(),
            developer: text.clone(),
            user: text,
        }
    }

    /// Technical text for logs plus a separate user-safe rendering; the
    /// summary and developer texts reuse the technical side.
    pub fn technical_and_user(technical: impl Into<String>, user: impl Into<String>) -> Self {
        let technical = technical.into();
        Self {
            full: technical.clone(),
            summary: technical.clone(),
            developer: technical,
            user: user.into(),
        }
    }
}
