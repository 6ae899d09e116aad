// Timing constants, default limits and the JSON robot description
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// Sleep between reads in every wait_for_* loop
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

// Teleop loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Where the kernel exposes device classes
pub const SYSFS_CLASS_ROOT: &str = "/sys/class";

// Drive base limits when none are configured
pub const DEFAULT_MAX_DRIVE_SPEED: f64 = 100.0; // cm/s
pub const DEFAULT_MAX_TURN_RATE: f64 = 360.0; // deg/s

// Allowed mismatch (mechanism degrees) when going to a target
pub const DEFAULT_SETPOINT_TOLERANCE: f64 = 5.0;

// Homing speed for mechanisms (deg/s at the output)
pub const DEFAULT_MECHANISM_SPEED: f64 = 200.0;

/// Per-motor settings applied at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorConfig {
    pub inverse_polarity: bool,
    /// Output degrees per motor degree is `1 / gear_ratio`.
    pub gear_ratio: f64,
    pub setpoint_tolerance: f64,
    /// Caps the rated speed (deg/s at the output) when lower.
    pub max_speed: Option<f64>,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            inverse_polarity: false,
            gear_ratio: 1.0,
            setpoint_tolerance: DEFAULT_SETPOINT_TOLERANCE,
            max_speed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveBaseConfig {
    pub left_port: String,
    pub right_port: String,
    /// Wheel diameter in cm
    pub wheel_diameter: f64,
    /// Distance between the wheel contact points in cm
    pub wheel_span: f64,
    #[serde(default = "default_true")]
    pub positive_turn_is_clockwise: bool,
    #[serde(default)]
    pub max_speed: Option<f64>,
    #[serde(default)]
    pub max_turn_rate: Option<f64>,
    #[serde(default)]
    pub left: MotorConfig,
    #[serde(default)]
    pub right: MotorConfig,
}

impl DriveBaseConfig {
    pub fn new(left_port: &str, right_port: &str, wheel_diameter: f64, wheel_span: f64) -> Self {
        Self {
            left_port: left_port.to_string(),
            right_port: right_port.to_string(),
            wheel_diameter,
            wheel_span,
            positive_turn_is_clockwise: true,
            max_speed: None,
            max_turn_rate: None,
            left: MotorConfig::default(),
            right: MotorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MechanismConfig {
    pub port: String,
    #[serde(default)]
    pub motor: MotorConfig,
    /// Named output positions in degrees; must contain `reset`.
    pub targets: BTreeMap<String, f64>,
    #[serde(default = "default_mechanism_speed")]
    pub default_speed: f64,
    /// Touch sensor pressed at the end stop, if fitted.
    #[serde(default)]
    pub touch_port: Option<String>,
}

/// Everything attached to one robot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RobotConfig {
    #[serde(default)]
    pub drive_base: Option<DriveBaseConfig>,
    #[serde(default)]
    pub mechanisms: BTreeMap<String, MechanismConfig>,
}

impl RobotConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json(&contents)
    }

    pub fn mechanism(&self, name: &str) -> Result<&MechanismConfig> {
        self.mechanisms
            .get(name)
            .ok_or_else(|| Error::InvalidParameter(format!("no mechanism named '{}'", name)))
    }

    pub fn drive_base(&self) -> Result<&DriveBaseConfig> {
        self.drive_base
            .as_ref()
            .ok_or_else(|| Error::InvalidParameter("no drive_base configured".to_string()))
    }
}

fn default_true() -> bool {
    true
}

fn default_mechanism_speed() -> f64 {
    DEFAULT_MECHANISM_SPEED
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_robot_config() {
        let config = RobotConfig::from_json(
            r#"{
                "drive_base": {
                    "left_port": "outB",
                    "right_port": "outC",
                    "wheel_diameter": 4.3,
                    "wheel_span": 12.0
                },
                "mechanisms": {
                    "arm": {
                        "port": "outA",
                        "motor": { "gear_ratio": 3.0 },
                        "targets": { "down": 0, "up": 90, "reset": 90 }
                    }
                }
            }"#,
        )
        .unwrap();

        let base = config.drive_base().unwrap();
        assert!(base.positive_turn_is_clockwise);
        assert_eq!(base.max_speed, None);
        assert_eq!(base.left, MotorConfig::default());

        let arm = config.mechanism("arm").unwrap();
        assert_eq!(arm.motor.gear_ratio, 3.0);
        assert_eq!(arm.motor.setpoint_tolerance, DEFAULT_SETPOINT_TOLERANCE);
        assert_eq!(arm.default_speed, DEFAULT_MECHANISM_SPEED);
        assert_eq!(arm.targets["reset"], 90.0);
        assert!(arm.touch_port.is_none());
    }

    #[test]
    fn test_missing_sections() {
        let config = RobotConfig::from_json("{}").unwrap();
        assert!(config.drive_base().is_err());
        assert!(matches!(
            config.mechanism("claw"),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            RobotConfig::from_json("{ \"mechanisms\": 3 }"),
            Err(Error::Config(_))
        ));
    }
}
