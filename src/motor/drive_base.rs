// Two-motor skid-steer drive base
//
// Combines the differential kinematics with two tacho motors to provide a
// simple forward speed / turn rate API.

use tracing::{debug, info, warn};

use super::kinematics::{DifferentialDrive, WheelSpeeds};
use super::tacho::Motor;
use crate::config::DriveBaseConfig;
use crate::device::DeviceBus;
use crate::error::Result;

pub struct DriveBase {
    kinematics: DifferentialDrive,
    left_motor: Motor,
    right_motor: Motor,
}

impl DriveBase {
    /// Open both motors and derive the geometry constants
    pub fn new(bus: &dyn DeviceBus, config: &DriveBaseConfig) -> Result<Self> {
        let kinematics = DifferentialDrive::new(
            config.wheel_diameter,
            config.wheel_span,
            config.positive_turn_is_clockwise,
            config.max_speed,
            config.max_turn_rate,
        )?;
        info!(
            "Drive base on {} / {}: wheel {} cm, span {} cm",
            config.left_port, config.right_port, config.wheel_diameter, config.wheel_span
        );

        let left_motor = Motor::new(bus, &config.left_port, &config.left)?;
        let right_motor = Motor::new(bus, &config.right_port, &config.right)?;
        Ok(Self::from_parts(kinematics, left_motor, right_motor))
    }

    pub fn from_parts(
        kinematics: DifferentialDrive,
        left_motor: Motor,
        right_motor: Motor,
    ) -> Self {
        Self {
            kinematics,
            left_motor,
            right_motor,
        }
    }

    /// Drive at `speed` cm/s while turning at `turn_rate` deg/s.
    ///
    /// The wheel speeds are not limited here; each motor clamps its own.
    pub fn drive_and_turn(&mut self, speed: f64, turn_rate: f64) -> Result<()> {
        let wheels = self.kinematics.wheel_speeds(speed, turn_rate);
        debug!(
            "Drive {} cm/s, turn {} deg/s -> left={:.1}, right={:.1}",
            speed, turn_rate, wheels.left, wheels.right
        );
        self.set_wheel_speeds(wheels)
    }

    /// Send raw wheel speeds (deg/s)
    pub fn set_wheel_speeds(&mut self, wheels: WheelSpeeds) -> Result<()> {
        self.left_motor.run(wheels.left)?;
        self.right_motor.run(wheels.right)
    }

    /// Stop both motors
    pub fn stop(&mut self) -> Result<()> {
        let left = self.left_motor.stop();
        let right = self.right_motor.stop();
        left.and(right)
    }

    pub fn kinematics(&self) -> &DifferentialDrive {
        &self.kinematics
    }

    pub fn left_motor(&mut self) -> &mut Motor {
        &mut self.left_motor
    }

    pub fn right_motor(&mut self) -> &mut Motor {
        &mut self.right_motor
    }
}

impl Drop for DriveBase {
    fn drop(&mut self) {
        // Do not leave the robot driving once nothing controls it
        if let Err(e) = self.stop() {
            warn!("Failed to stop drive base on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SimulatedBus;

    fn speed_sp(bus: &SimulatedBus, port: &str) -> i64 {
        bus.value(port, "speed_sp").unwrap().parse().unwrap()
    }

    fn base(bus: &SimulatedBus) -> DriveBase {
        DriveBase::new(bus, &DriveBaseConfig::new("outB", "outC", 5.0, 10.0)).unwrap()
    }

    #[test]
    fn test_turn_in_place() {
        let bus = SimulatedBus::ev3();
        let mut base = base(&bus);
        base.drive_and_turn(0.0, 90.0).unwrap();

        let left = speed_sp(&bus, "outB");
        let right = speed_sp(&bus, "outC");
        assert!(left > 0);
        assert_eq!(left, -right);
        assert_eq!(bus.value("outB", "command").unwrap(), "run-forever");
        assert_eq!(bus.value("outC", "command").unwrap(), "run-forever");
    }

    #[test]
    fn test_extreme_speed_clamped_by_motors() {
        let bus = SimulatedBus::ev3();
        let mut base = base(&bus);
        base.drive_and_turn(100000.0, 0.0).unwrap();

        let left = speed_sp(&bus, "outB");
        let right = speed_sp(&bus, "outC");
        assert_eq!(left, right);
        // 100 cm/s on a 5 cm wheel needs ~2292 deg/s; the rated limit wins
        assert_eq!(left, 1560);
    }

    #[test]
    fn test_motor_limit_respects_gear_ratio() {
        let bus = SimulatedBus::ev3();
        let mut config = DriveBaseConfig::new("outB", "outC", 5.0, 10.0);
        config.left.max_speed = Some(300.0);
        let mut base = DriveBase::new(&bus, &config).unwrap();
        base.drive_and_turn(50.0, 0.0).unwrap();
        assert_eq!(speed_sp(&bus, "outB"), 300);
        assert!(speed_sp(&bus, "outC") > 300);
    }

    #[test]
    fn test_stop_both() {
        let bus = SimulatedBus::ev3();
        let mut base = base(&bus);
        base.drive_and_turn(10.0, 10.0).unwrap();
        base.stop().unwrap();
        assert_eq!(bus.value("outB", "command").unwrap(), "stop");
        assert_eq!(bus.value("outC", "command").unwrap(), "stop");
    }

    #[test]
    fn test_drop_stops_motors() {
        let bus = SimulatedBus::ev3();
        {
            let mut base = base(&bus);
            base.drive_and_turn(10.0, 0.0).unwrap();
        }
        assert_eq!(bus.value("outB", "command").unwrap(), "stop");
        assert_eq!(bus.value("outC", "command").unwrap(), "stop");
    }

    #[test]
    fn test_missing_right_motor() {
        let bus = SimulatedBus::ev3();
        let config = DriveBaseConfig::new("outB", "outE", 5.0, 10.0);
        assert!(DriveBase::new(&bus, &config).is_err());
    }
}
