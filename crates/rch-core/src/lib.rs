//! ---
//! rch_section: "01-core-functionality"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Host orchestration: bundle-driven bootstrap and the operator output channel."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
//! Host orchestration.
//!
//! [`HostManager`] ties the workspace together: it selects a
//! configuration bundle, brings up the operator [`Output`] channel and
//! the logging pipeline, then resolves and starts the configured robot
//! out of its scope catalog. The binary owns the process loop; this
//! crate owns the ordered bootstrap and shutdown.

pub mod host;
pub mod output;

pub use host::{HostConfig, HostManager};
pub use output::{Output, OutputConfig, OutputMethod, LINE_DISPLAY_COLUMNS};
