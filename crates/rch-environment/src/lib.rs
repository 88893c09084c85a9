//! ---
//! rch_section: "04-environment"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Coordinate and measurement value types shared by devices."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Spatial value types shared by robots, sensors, and effectors.
//!
//! [`Coordinate`] is the dimension-checked store: it only accepts the
//! components it was built to permit and reports typed environment errors
//! for everything else. [`CartesianCoordinate`] is the infallible 3-axis
//! convenience wrapper used in command payloads.

pub mod coordinate;

pub use coordinate::{CartesianCoordinate, Coordinate, CoordinateComponent, Direction};
