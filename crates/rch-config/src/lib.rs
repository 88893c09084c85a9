//! ---
//! rch_section: "02-configuration"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "JSON bundle store backing host and component configuration."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Configuration bundle store.
//!
//! A bundle is one JSON object file in the store directory; its top-level
//! keys are section names and each section value is handed to a component
//! as its typed configuration. Selection replaces the active section map
//! wholesale, and keys are lowercased on load so lookups are
//! case-insensitive by construction.

pub mod store;

pub use store::{BundleStore, SectionMap, BUNDLE_EXTENSION, DEFAULT_BUNDLE, DEFAULT_DIRECTORY};
