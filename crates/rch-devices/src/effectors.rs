//! ---
//! rch_section: "05-devices"
//! rch_subsection: "module"
//! rch_type: "source"
//! rch_scope: "code"
//! rch_description: "Shipped robots, sensors, effectors, and processors for the RCH runtime."
//! rch_version: "v0.0.0-prealpha"
//! rch_owner: "tbd"
//! ---
//! Shipped effectors: a simulated differential drive.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use rch_common::error::codes;
use rch_common::{ErrorKind, HostError, HostResult, Messages};
use rch_contracts::{
    unpack_config, ComponentConfig, Effector, EffectorCommand, EffectorEvent, EffectorFamily,
    EffectorState, Lifecycle, LifecycleGate, LifecycleStage, Observers, RegistrationTable,
};

use crate::config_mismatch;

/// Registrations for the effectors this module ships.
pub fn table() -> RegistrationTable {
    RegistrationTable::new().effector(
        "differential_drive",
        EffectorFamily::NonHolonomicMotion,
        || Ok(DifferentialDrive::new()),
    )
}

/// Behaviour of a [`DifferentialDrive`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    /// Highest commanded speed the drive accepts, in metres per second.
    #[serde(default = "default_max_speed_mps")]
    pub max_speed_mps: f64,
    /// Motions executed before the drive simulates a stall; `None` never
    /// stalls. A halt restores the full budget. Bundles use it to
    /// exercise stall recovery.
    #[serde(default)]
    pub stall_after_commands: Option<u32>,
}

fn default_max_speed_mps() -> f64 {
    2.0
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            max_speed_mps: default_max_speed_mps(),
            stall_after_commands: None,
        }
    }
}

/// Simulated two-wheel drive in the `NonHolonomicMotion` family.
///
/// Commands run synchronously on the calling thread: accepted motions
/// pass through `Executing` back to `Idle` and announce completion, a
/// simulated stall parks the drive in `Stuck` until a halt clears it.
pub struct DifferentialDrive {
    gate: LifecycleGate,
    this: Weak<Self>,
    config: Mutex<DriveConfig>,
    state: Mutex<EffectorState>,
    motion_budget: Mutex<Option<u32>>,
    effect_complete: Observers<EffectorEvent>,
    effector_stuck: Observers<EffectorEvent>,
    state_changed: Observers<EffectorState>,
}

impl DifferentialDrive {
    /// An idle drive with default behaviour, awaiting configuration.
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            gate: LifecycleGate::new("differential_drive"),
            this: this.clone(),
            config: Mutex::new(DriveConfig::default()),
            state: Mutex::new(EffectorState::Idle),
            motion_budget: Mutex::new(None),
            effect_complete: Observers::new(),
            effector_stuck: Observers::new(),
            state_changed: Observers::new(),
        })
    }

    fn as_source(&self) -> Option<Arc<dyn Effector>> {
        self.this.upgrade().map(|this| this as Arc<dyn Effector>)
    }

    /// Commit a state change; announces only actual transitions, after
    /// the state lock is released.
    fn transition(&self, next: EffectorState) {
        let changed = {
            let mut state = self.state.lock();
            let changed = *state != next;
            *state = next;
            changed
        };
        if changed {
            self.state_changed.emit(&next);
        }
    }

    fn announce_complete(&self, command: &EffectorCommand) {
        if let Some(source) = self.as_source() {
            self.effect_complete
                .emit(&EffectorEvent::new(source, Some(command.id)));
        }
    }

    fn announce_stuck(&self, command: &EffectorCommand) {
        if let Some(source) = self.as_source() {
            self.effector_stuck
                .emit(&EffectorEvent::new(source, Some(command.id)));
        }
    }

    /// Burn one motion from the stall budget; true once it is spent.
    fn motion_exhausted(&self) -> bool {
        let mut budget = self.motion_budget.lock();
        match budget.as_mut() {
            Some(0) => true,
            Some(remaining) => {
                *remaining -= 1;
                false
            }
            None => false,
        }
    }

    fn limit_exceeded(speed_mps: f64, limit: f64) -> HostError {
        HostError::new(
            ErrorKind::Effector,
            codes::EFFECTOR_LIMIT_EXCEEDED,
            Messages::new(
                format!("commanded speed {speed_mps} m/s exceeds the {limit} m/s limit"),
                "commanded speed over limit".to_owned(),
                format!("slow the command or raise max_speed_mps past {speed_mps}"),
                "the drive refused a command over its speed limit".to_owned(),
            ),
        )
    }

    fn stalled() -> HostError {
        HostError::new(
            ErrorKind::Effector,
            codes::EFFECTOR_STALLED,
            Messages::technical_and_user(
                "drive is stuck; issue a halt to clear the stall",
                "the drive is stuck and needs a halt",
            ),
        )
    }
}

impl Lifecycle for DifferentialDrive {
    fn configure(&self, config: Box<dyn ComponentConfig>) -> HostResult<()> {
        self.gate.ensure_can_configure()?;
        let config = unpack_config::<DriveConfig>(config)
            .map_err(|label| config_mismatch(ErrorKind::Effector, "differential drive", label))?;
        debug!(
            max_speed_mps = config.max_speed_mps,
            stall_after = ?config.stall_after_commands,
            "differential drive configured"
        );
        *self.motion_budget.lock() = config.stall_after_commands;
        *self.config.lock() = config;
        self.gate.note_configured();
        Ok(())
    }

    fn initialise(&self) -> HostResult<()> {
        self.gate.ensure_can_initialise()?;
        self.gate.note_active();
        debug!("differential drive active");
        Ok(())
    }

    fn deactivate(&self) -> HostResult<()> {
        self.gate.ensure_can_deactivate()?;
        self.gate.note_deactivated();
        debug!("differential drive deactivated");
        Ok(())
    }

    fn stage(&self) -> LifecycleStage {
        self.gate.stage()
    }
}

impl Effector for DifferentialDrive {
    fn family(&self) -> EffectorFamily {
        EffectorFamily::NonHolonomicMotion
    }

    fn handle_command(&self, command: EffectorCommand) -> HostResult<()> {
        self.gate.ensure_active()?;

        // A halt is always accepted: it clears a stall and restores the
        // motion budget.
        if command.directive.is_halt() {
            *self.motion_budget.lock() = self.config.lock().stall_after_commands;
            self.transition(EffectorState::Halted);
            debug!(command_id = %command.id, "drive halted");
            self.announce_complete(&command);
            return Ok(());
        }

        if self.state() == EffectorState::Stuck {
            return Err(Self::stalled());
        }
        let limit = self.config.lock().max_speed_mps;
        let speed = command.directive.speed_mps().unwrap_or(0.0);
        if speed > limit {
            return Err(Self::limit_exceeded(speed, limit));
        }
        if self.motion_exhausted() {
            warn!(command = %command.directive, "drive stalled");
            self.transition(EffectorState::Stuck);
            self.announce_stuck(&command);
            return Ok(());
        }

        self.transition(EffectorState::Executing);
        trace!(command = %command.directive, "drive executing");
        self.announce_complete(&command);
        self.transition(EffectorState::Idle);
        Ok(())
    }

    fn effect_complete(&self) -> &Observers<EffectorEvent> {
        &self.effect_complete
    }

    fn effector_stuck(&self) -> &Observers<EffectorEvent> {
        &self.effector_stuck
    }

    fn state_changed(&self) -> &Observers<EffectorState> {
        &self.state_changed
    }

    fn state(&self) -> EffectorState {
        *self.state.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rch_environment::Direction;

    use crate::sensors::ScannerConfig;

    fn active_drive(config: DriveConfig) -> Arc<DifferentialDrive> {
        let drive = DifferentialDrive::new();
        drive.configure(Box::new(config)).unwrap();
        drive.initialise().unwrap();
        drive
    }

    fn watched(
        drive: &Arc<DifferentialDrive>,
    ) -> (Arc<Mutex<Vec<EffectorState>>>, Arc<Mutex<Vec<bool>>>) {
        let states = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&states);
        drive.state_changed().subscribe(move |state| sink.lock().push(*state));
        let completions = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&completions);
        drive
            .effect_complete()
            .subscribe(move |event| sink.lock().push(event.command_id().is_some()));
        (states, completions)
    }

    #[test]
    fn accepted_motion_walks_executing_then_idle() {
        let drive = active_drive(DriveConfig::default());
        let (states, completions) = watched(&drive);

        let command = EffectorCommand::movement(Direction::North, 1.0);
        let command_id = command.id;
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        drive
            .effect_complete()
            .subscribe(move |event| *sink.lock() = event.command_id());

        drive.handle_command(command).unwrap();
        assert_eq!(
            states.lock().as_slice(),
            &[EffectorState::Executing, EffectorState::Idle]
        );
        assert_eq!(completions.lock().len(), 1);
        assert_eq!(*seen.lock(), Some(command_id));
        assert_eq!(drive.state(), EffectorState::Idle);
    }

    #[test]
    fn over_limit_commands_are_refused_without_side_effects() {
        let drive = active_drive(DriveConfig {
            max_speed_mps: 2.0,
            stall_after_commands: None,
        });
        let (states, completions) = watched(&drive);

        let err = drive
            .handle_command(EffectorCommand::movement(Direction::East, 5.0))
            .unwrap_err();
        assert_eq!(err.code(), 700);
        assert_eq!(drive.state(), EffectorState::Idle);
        assert!(states.lock().is_empty());
        assert!(completions.lock().is_empty());
    }

    #[test]
    fn stall_recovery_needs_a_halt() {
        let drive = active_drive(DriveConfig {
            max_speed_mps: 2.0,
            stall_after_commands: Some(1),
        });
        let stucks = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&stucks);
        drive
            .effector_stuck()
            .subscribe(move |event| sink.lock().push(event.command_id()));
        let (_, completions) = watched(&drive);

        // First motion spends the budget.
        drive
            .handle_command(EffectorCommand::movement(Direction::North, 1.0))
            .unwrap();
        assert_eq!(completions.lock().len(), 1);

        // Second motion stalls: no error, but a stuck announcement
        // instead of a completion.
        let stalled = EffectorCommand::movement(Direction::North, 1.0);
        let stalled_id = stalled.id;
        drive.handle_command(stalled).unwrap();
        assert_eq!(drive.state(), EffectorState::Stuck);
        assert_eq!(stucks.lock().as_slice(), &[Some(stalled_id)]);
        assert_eq!(completions.lock().len(), 1);

        // Motions are refused while stuck.
        let err = drive
            .handle_command(EffectorCommand::movement(Direction::North, 1.0))
            .unwrap_err();
        assert_eq!(err.code(), 701);

        // A halt clears the stall and restores the budget.
        drive.handle_command(EffectorCommand::halt()).unwrap();
        assert_eq!(drive.state(), EffectorState::Halted);
        drive
            .handle_command(EffectorCommand::movement(Direction::West, 1.0))
            .unwrap();
        assert_eq!(drive.state(), EffectorState::Idle);
        assert_eq!(completions.lock().len(), 3);
    }

    #[test]
    fn commands_need_an_active_drive() {
        let drive = DifferentialDrive::new();
        let err = drive
            .handle_command(EffectorCommand::movement(Direction::North, 0.5))
            .unwrap_err();
        assert_eq!(err.code(), 164);

        drive.configure(Box::new(DriveConfig::default())).unwrap();
        drive.initialise().unwrap();
        drive.deactivate().unwrap();
        let err = drive.handle_command(EffectorCommand::halt()).unwrap_err();
        assert_eq!(err.code(), 162);
    }

    #[test]
    fn foreign_config_is_rejected_with_the_type_code() {
        let drive = DifferentialDrive::new();
        let err = drive
            .configure(Box::new(ScannerConfig::default()))
            .unwrap_err();
        assert_eq!(err.code(), 103);
    }
}
