//! ---
//! rch_section: "01-core-functionality"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Capability contracts, catalog discovery, and the command/event protocol."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
//! Effector command payloads and execution states.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rch_environment::{CartesianCoordinate, Direction};

/// What an effector is asked to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Directive {
    /// Sustain motion along a heading.
    Move {
        /// Travel heading.
        heading: Direction,
        /// Commanded speed in metres per second.
        speed_mps: f64,
    },
    /// Drive to a fixed waypoint.
    Travel {
        /// Target position.
        waypoint: CartesianCoordinate,
        /// Commanded speed in metres per second.
        speed_mps: f64,
    },
    /// Stop and return to idle.
    Halt,
}

impl Directive {
    /// Commanded speed, when the directive carries one.
    pub fn speed_mps(&self) -> Option<f64> {
        match self {
            Directive::Move { speed_mps, .. } | Directive::Travel { speed_mps, .. } => {
                Some(*speed_mps)
            }
            Directive::Halt => None,
        }
    }

    /// True for `Halt`.
    pub fn is_halt(&self) -> bool {
        matches!(self, Directive::Halt)
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::Move { heading, speed_mps } => {
                write!(f, "move {heading} at {speed_mps} m/s")
            }
            Directive::Travel { waypoint, speed_mps } => {
                write!(f, "travel to {waypoint} at {speed_mps} m/s")
            }
            Directive::Halt => f.write_str("halt"),
        }
    }
}

/// One command issued to an effector, stamped with identity and time at
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectorCommand {
    /// Unique command identity, echoed in completion events.
    pub id: Uuid,
    /// The requested effect.
    pub directive: Directive,
    /// When the command was created.
    pub issued_at: DateTime<Utc>,
}

impl EffectorCommand {
    /// Wrap a directive with a fresh id and timestamp.
    pub fn new(directive: Directive) -> Self {
        Self {
            id: Uuid::new_v4(),
            directive,
            issued_at: Utc::now(),
        }
    }

    /// Sustained motion along `heading`.
    pub fn movement(heading: Direction, speed_mps: f64) -> Self {
        Self::new(Directive::Move { heading, speed_mps })
    }

    /// Drive to `waypoint`.
    pub fn travel(waypoint: CartesianCoordinate, speed_mps: f64) -> Self {
        Self::new(Directive::Travel { waypoint, speed_mps })
    }

    /// Stop.
    pub fn halt() -> Self {
        Self::new(Directive::Halt)
    }
}

/// Execution state an effector reports through its state-change channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectorState {
    /// Powered and waiting.
    Idle,
    /// Producing an effect.
    Executing,
    /// Cannot produce the commanded effect.
    Stuck,
    /// Stopped by a halt directive.
    Halted,
}

impl fmt::Display for EffectorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EffectorState::Idle => "idle",
            EffectorState::Executing => "executing",
            EffectorState::Stuck => "stuck",
            EffectorState::Halted => "halted",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_uniquely_stamped() {
        let a = EffectorCommand::movement(Direction::North, 0.5);
        let b = EffectorCommand::movement(Direction::North, 0.5);
        assert_ne!(a.id, b.id);
        assert_eq!(a.directive, b.directive);
    }

    #[test]
    fn directive_serde_is_tagged() {
        let command = EffectorCommand::travel(CartesianCoordinate::new(1.0, 2.0, 0.0), 0.8);
        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(json["directive"]["kind"], "travel");
        let back: EffectorCommand = serde_json::from_value(json).unwrap();
        assert_eq!(back, command);
    }

    #[test]
    fn speed_accessor_covers_all_directives() {
        assert_eq!(
            EffectorCommand::movement(Direction::East, 1.5).directive.speed_mps(),
            Some(1.5)
        );
        assert_eq!(EffectorCommand::halt().directive.speed_mps(), None);
        assert!(EffectorCommand::halt().directive.is_halt());
    }
}
