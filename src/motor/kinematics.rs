// Differential (skid-steer) inverse kinematics
// Converts a forward speed (cm/s) and turn rate (deg/s) into left/right wheel speeds (deg/s).

use std::f64::consts::PI;

use crate::config::{DEFAULT_MAX_DRIVE_SPEED, DEFAULT_MAX_TURN_RATE};
use crate::error::{Error, Result};

const DEG_PER_RAD: f64 = 180.0 / PI;

/// Wheel speed setpoints in degrees per second at the wheel
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelSpeeds {
    pub left: f64,
    pub right: f64,
}

impl WheelSpeeds {
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}

/// Fixed geometry of a two-wheeled base
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifferentialDrive {
    // cm/s of forward travel for every 1 deg/s of wheel rotation
    wheel_factor: f64,
    // cm/s at each wheel for every 1 deg/s of base rotation
    base_factor: f64,
    max_speed: f64,
    max_turn_rate: f64,
    positive_turn_is_clockwise: bool,
}

impl DifferentialDrive {
    /// # Arguments
    /// * `wheel_diameter` - cm
    /// * `wheel_span` - distance between the two wheels, cm
    /// * `max_speed` - forward speed limit in cm/s (default 100)
    /// * `max_turn_rate` - turn rate limit in deg/s (default 360)
    pub fn new(
        wheel_diameter: f64,
        wheel_span: f64,
        positive_turn_is_clockwise: bool,
        max_speed: Option<f64>,
        max_turn_rate: Option<f64>,
    ) -> Result<Self> {
        if !(wheel_diameter > 0.0 && wheel_span > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "wheel diameter and span must be positive, got {} and {}",
                wheel_diameter, wheel_span
            )));
        }
        let max_speed = max_speed.unwrap_or(DEFAULT_MAX_DRIVE_SPEED);
        let max_turn_rate = max_turn_rate.unwrap_or(DEFAULT_MAX_TURN_RATE);
        if !(max_speed.is_finite() && max_speed > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "max drive speed must be positive, got {}",
                max_speed
            )));
        }
        if !(max_turn_rate.is_finite() && max_turn_rate > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "max turn rate must be positive, got {}",
                max_turn_rate
            )));
        }

        let wheel_radius = wheel_diameter / 2.0;
        let base_radius = wheel_span / 2.0;

        Ok(Self {
            wheel_factor: wheel_radius / DEG_PER_RAD,
            base_factor: base_radius / DEG_PER_RAD,
            max_speed,
            max_turn_rate,
            positive_turn_is_clockwise,
        })
    }

    /// Wheel speeds for a forward speed and turn rate, each clamped to its
    /// limit first. The result is not clamped to what the motors can do.
    pub fn wheel_speeds(&self, speed: f64, turn_rate: f64) -> WheelSpeeds {
        let speed = speed.clamp(-self.max_speed, self.max_speed);
        let turn_rate = turn_rate.clamp(-self.max_turn_rate, self.max_turn_rate);

        // Wheel speed for the forward component
        let nett = speed / self.wheel_factor;
        // Wheel speed difference for the turn component
        let difference = turn_rate * self.base_factor / self.wheel_factor;

        if self.positive_turn_is_clockwise {
            WheelSpeeds::new(nett + difference, nett - difference)
        } else {
            WheelSpeeds::new(nett - difference, nett + difference)
        }
    }

    pub fn wheel_factor(&self) -> f64 {
        self.wheel_factor
    }

    pub fn base_factor(&self) -> f64 {
        self.base_factor
    }

    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    pub fn max_turn_rate(&self) -> f64 {
        self.max_turn_rate
    }
}
