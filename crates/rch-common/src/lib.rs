//! ---
//! rch_section: "01-core-functionality"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Shared primitives and utilities for the host runtime."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
//! Core shared primitives for the RCH workspace.
//! This crate exposes the unified host error model, the four-part message
//! rendering carried by every failure, and the severity ladder that maps
//! host diagnostics onto tracing levels.

pub mod error;
pub mod messages;
pub mod severity;

pub use error::{CapabilityKind, ErrorKind, HostError, HostResult};
pub use messages::Messages;
pub use severity::Severity;
