// Synthetic device tree for running off the robot
//
// Writes four tacho motors (outA..outD) and four sensors (in1..in4) with inert
// default attribute values. The same tables seed `SimulatedBus`.

use std::fs;
use std::path::Path;

use tracing::info;

use super::DeviceClass;
use crate::error::{Error, Result};

pub const MOTOR_COUNT: usize = 4;
pub const SENSOR_COUNT: usize = 4;

const NA: &str = "n/a";

/// Motor attribute files and default contents (address excluded)
pub const MOTOR_ATTRIBUTES: &[(&str, &str)] = &[
    ("command", NA),
    (
        "commands",
        "run-forever run-to-abs-pos run-to-rel-pos run-timed run-direct stop reset",
    ),
    ("count_per_rot", "360"),
    ("driver_name", NA),
    ("duty_cycle", "0"),
    ("duty_cycle_sp", "0"),
    ("hold_pid/Kp", "0"),
    ("hold_pid/Ki", "0"),
    ("hold_pid/Kd", "0"),
    ("max_speed", "1560"),
    ("polarity", "normal"),
    ("position", "0"),
    ("position_sp", "0"),
    ("ramp_down_sp", "0"),
    ("ramp_up_sp", "0"),
    ("speed", "0"),
    ("speed_pid/Kp", "0"),
    ("speed_pid/Ki", "0"),
    ("speed_pid/Kd", "0"),
    ("speed_sp", "0"),
    ("state", NA),
    ("stop_action", "coast"),
    ("stop_actions", "coast brake hold"),
    ("time_sp", "0"),
];

/// Sensor attribute files and default contents (address excluded)
pub const SENSOR_ATTRIBUTES: &[(&str, &str)] = &[
    ("bin_data", NA),
    ("bin_data_format", "s8"),
    ("command", NA),
    ("commands", NA),
    ("decimals", "0"),
    ("driver_name", NA),
    ("fw_version", NA),
    ("mode", NA),
    ("modes", NA),
    ("num_values", "1"),
    ("poll_ms", NA),
    ("units", "pct"),
    ("value0", "12"),
    ("value1", "0"),
    ("value2", "0"),
    ("value3", "0"),
    ("value4", "0"),
    ("value5", "0"),
    ("value6", "0"),
    ("value7", "0"),
];

/// Directory name and address of motor slot `index` (0 = outA)
pub fn motor_slot(index: usize) -> (String, String) {
    let letter = (b'A' + index as u8) as char;
    (format!("motor{}", index), format!("ev3-ports:out{}", letter))
}

/// Directory name and address of sensor slot `index` (0 = in1)
pub fn sensor_slot(index: usize) -> (String, String) {
    (format!("sensor{}", index), format!("ev3-ports:in{}", index + 1))
}

/// Create the synthetic tree under `root`, overwriting existing values
pub fn populate(root: &Path) -> Result<()> {
    for index in 0..MOTOR_COUNT {
        let (name, address) = motor_slot(index);
        let dir = root.join(DeviceClass::TachoMotor.dir_name()).join(name);
        write_device(&dir, &address, MOTOR_ATTRIBUTES)?;
    }
    for index in 0..SENSOR_COUNT {
        let (name, address) = sensor_slot(index);
        let dir = root.join(DeviceClass::LegoSensor.dir_name()).join(name);
        write_device(&dir, &address, SENSOR_ATTRIBUTES)?;
    }
    info!(
        "Populated {} motors and {} sensors under {}",
        MOTOR_COUNT,
        SENSOR_COUNT,
        root.display()
    );
    Ok(())
}

fn write_device(dir: &Path, address: &str, attributes: &[(&str, &str)]) -> Result<()> {
    let files = std::iter::once(("address", address)).chain(attributes.iter().copied());
    for (name, contents) in files {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        fs::write(&path, contents).map_err(|e| Error::io(&path, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_addresses() {
        assert_eq!(
            motor_slot(0),
            ("motor0".to_string(), "ev3-ports:outA".to_string())
        );
        assert_eq!(motor_slot(3).1, "ev3-ports:outD");
        assert_eq!(
            sensor_slot(0),
            ("sensor0".to_string(), "ev3-ports:in1".to_string())
        );
        assert_eq!(sensor_slot(3).1, "ev3-ports:in4");
    }

    #[test]
    fn test_tables_hold_core_attributes() {
        let motor: Vec<&str> = MOTOR_ATTRIBUTES.iter().map(|(name, _)| *name).collect();
        for name in [
            "position",
            "speed",
            "speed_sp",
            "duty_cycle_sp",
            "position_sp",
            "polarity",
            "command",
            "state",
            "max_speed",
        ] {
            assert!(motor.contains(&name), "motor table lacks {}", name);
        }

        let sensor: Vec<&str> = SENSOR_ATTRIBUTES.iter().map(|(name, _)| *name).collect();
        assert!(sensor.contains(&"mode"));
        assert_eq!(sensor.iter().filter(|n| n.starts_with("value")).count(), 8);
    }
}
