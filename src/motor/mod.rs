// Motor control module
//
// Provides:
// - Tacho motor with gear-ratio scaling, clamping and position seeking
// - Differential (skid-steer) inverse kinematics
// - Two-motor drive base
// - Homing mechanism with named targets

pub mod drive_base;
pub mod kinematics;
pub mod mechanism;
mod tacho;

pub use drive_base::DriveBase;
pub use kinematics::{DifferentialDrive, WheelSpeeds};
pub use mechanism::{HomingDirection, Mechanism, MechanismState, RESET_TARGET, homing_direction};
pub use tacho::{Command, Motor, MotorState, Polarity};
