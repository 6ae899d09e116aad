// Homing mechanism: one motor driven between named output positions
//
// A mechanism has no absolute position sensor. It establishes one by driving
// into a physical end stop (detected by a stall, or by a touch sensor if one
// is fitted) and declaring that point to be the `reset` target.

use std::collections::BTreeMap;

use tracing::{info, warn};

use super::tacho::Motor;
use crate::config::MechanismConfig;
use crate::device::DeviceBus;
use crate::error::{Error, Result};
use crate::sensor::Touch;
use crate::wait::{Wait, WaitOutcome};

/// Name of the mandatory target that marks the end stop
pub const RESET_TARGET: &str = "reset";

/// Which end stop homing drives into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomingDirection {
    /// `reset` is the highest target: drive forward
    TowardMax,
    /// `reset` is the lowest target: drive backward
    TowardMin,
}

impl HomingDirection {
    fn sign(self) -> f64 {
        match self {
            HomingDirection::TowardMax => 1.0,
            HomingDirection::TowardMin => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MechanismState {
    Unhomed,
    Homing,
    Homed,
}

/// Check the target map and infer the homing direction.
///
/// `reset` must exist and be the largest or smallest of all targets.
pub fn homing_direction(targets: &BTreeMap<String, f64>) -> Result<HomingDirection> {
    let reset = *targets.get(RESET_TARGET).ok_or(Error::MissingResetTarget)?;
    let max = targets.values().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = targets.values().copied().fold(f64::INFINITY, f64::min);

    if reset == max {
        Ok(HomingDirection::TowardMax)
    } else if reset == min {
        Ok(HomingDirection::TowardMin)
    } else {
        Err(Error::InvalidResetTarget { reset, min, max })
    }
}

pub struct Mechanism {
    motor: Motor,
    touch: Option<Touch>,
    targets: BTreeMap<String, f64>,
    reset_target: f64,
    direction: HomingDirection,
    default_speed: f64,
    state: MechanismState,
    last_target: Option<String>,
}

fn check_default_speed(speed: f64) -> Result<()> {
    if speed.is_finite() && speed != 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidParameter(format!(
            "mechanism speed must be finite and non-zero, got {}",
            speed
        )))
    }
}

impl Mechanism {
    /// Validate the targets, then open the motor and optional touch sensor
    pub fn new(bus: &dyn DeviceBus, config: &MechanismConfig) -> Result<Self> {
        // Fail before touching any hardware
        homing_direction(&config.targets)?;
        check_default_speed(config.default_speed)?;

        let motor = Motor::new(bus, &config.port, &config.motor)?;
        let touch = config
            .touch_port
            .as_deref()
            .map(|port| Touch::new(bus, port))
            .transpose()?;
        Self::from_parts(motor, touch, config.targets.clone(), config.default_speed)
    }

    pub fn from_parts(
        motor: Motor,
        touch: Option<Touch>,
        targets: BTreeMap<String, f64>,
        default_speed: f64,
    ) -> Result<Self> {
        let direction = homing_direction(&targets)?;
        check_default_speed(default_speed)?;
        let reset_target = targets[RESET_TARGET];
        info!(
            "Mechanism on {}: {} targets, homing {:?} to {} deg{}",
            motor.port(),
            targets.len(),
            direction,
            reset_target,
            if touch.is_some() { " (touch sensor)" } else { "" }
        );

        Ok(Self {
            motor,
            touch,
            targets,
            reset_target,
            direction,
            default_speed: default_speed.abs(),
            state: MechanismState::Unhomed,
            last_target: None,
        })
    }

    /// Drive into the end stop and define that position as the reset target
    pub fn reset(&mut self) -> Result<()> {
        self.reset_with(&Wait::forever()).map(|_| ())
    }

    /// Like [`reset`](Self::reset), bounded by `wait`.
    ///
    /// If the end stop is not reached the motor is stopped, its position is
    /// left untouched and the mechanism stays unhomed.
    pub fn reset_with(&mut self, wait: &Wait) -> Result<WaitOutcome> {
        self.state = MechanismState::Homing;
        self.last_target = None;
        match self.drive_to_end_stop(wait) {
            Ok(outcome) if outcome.is_met() => {
                self.motor.set_position(self.reset_target)?;
                self.state = MechanismState::Homed;
                self.last_target = Some(RESET_TARGET.to_string());
                info!("Mechanism on {} homed", self.motor.port());
                Ok(outcome)
            }
            Ok(outcome) => {
                self.state = MechanismState::Unhomed;
                warn!(
                    "Homing mechanism on {} ended without reaching the end stop: {:?}",
                    self.motor.port(),
                    outcome
                );
                Ok(outcome)
            }
            Err(e) => {
                self.state = MechanismState::Unhomed;
                Err(e)
            }
        }
    }

    fn drive_to_end_stop(&mut self, wait: &Wait) -> Result<WaitOutcome> {
        let speed = self.default_speed * self.direction.sign();
        info!(
            "Homing mechanism on {} at {} deg/s",
            self.motor.port(),
            speed
        );
        self.motor.run(speed)?;
        // Stop even if waiting failed, then report the first error
        let outcome = self.wait_for_stop(wait);
        let stopped = self.motor.stop();
        let outcome = outcome?;
        stopped?;
        Ok(outcome)
    }

    /// Wait for the end stop: a touch press if fitted, otherwise a stall
    pub fn wait_for_stop(&mut self, wait: &Wait) -> Result<WaitOutcome> {
        match self.touch.as_mut() {
            Some(touch) => touch.wait_for_press_with(wait),
            None => self.motor.wait_for_stalled_with(wait),
        }
    }

    /// Move to a named target at `speed` (or the default speed).
    /// Returns whether a move was started.
    pub fn go_to_target(&mut self, name: &str, speed: Option<f64>, wait: bool) -> Result<bool> {
        let target = self.target(name)?;
        if self.state != MechanismState::Homed {
            warn!(
                "Moving mechanism on {} to '{}' before homing",
                self.motor.port(),
                name
            );
        }

        let moved = self
            .motor
            .go_to(target, speed.unwrap_or(self.default_speed), wait)?;
        if moved {
            self.last_target = Some(name.to_string());
        }
        Ok(moved)
    }

    /// Output position of a named target
    pub fn target(&self, name: &str) -> Result<f64> {
        self.targets
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownTarget(name.to_string()))
    }

    pub fn targets(&self) -> &BTreeMap<String, f64> {
        &self.targets
    }

    pub fn homing_direction(&self) -> HomingDirection {
        self.direction
    }

    pub fn state(&self) -> MechanismState {
        self.state
    }

    /// Target of the most recent move, `reset` right after homing
    pub fn last_target(&self) -> Option<&str> {
        self.last_target.as_deref()
    }

    pub fn default_speed(&self) -> f64 {
        self.default_speed
    }

    pub fn motor(&mut self) -> &mut Motor {
        &mut self.motor
    }
}
