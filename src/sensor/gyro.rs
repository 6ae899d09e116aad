use tracing::info;

use super::Sensor;
use crate::device::{AttributeChannel, DeviceBus};
use crate::error::{Error, Result};

const MODE_RATE: &str = "GYRO-RATE";
const MODE_ANGLE: &str = "GYRO-ANG";
const MODE_BOTH: &str = "GYRO-G&A";
const MODE_CALIBRATE: &str = "GYRO-CAL";

/// Which quantities to read, and whether to zero the sensor first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GyroOptions {
    pub read_rate: bool,
    pub read_angle: bool,
    pub calibrate: bool,
}

impl Default for GyroOptions {
    fn default() -> Self {
        Self {
            read_rate: true,
            read_angle: false,
            calibrate: true,
        }
    }
}

#[derive(Debug)]
pub struct Gyro {
    sensor: Sensor,
    angle: Option<AttributeChannel>,
    rate: Option<AttributeChannel>,
}

impl Gyro {
    pub fn new(bus: &dyn DeviceBus, port: &str, options: GyroOptions) -> Result<Self> {
        if !options.read_rate && !options.read_angle {
            return Err(Error::GyroModeUnsupported);
        }

        let mut sensor = Sensor::new(bus, port)?;
        if options.calibrate {
            calibrate(&mut sensor)?;
        }

        // In the combined mode value0 is the angle and value1 the rate
        let (mode, angle, rate) = match (options.read_angle, options.read_rate) {
            (true, true) => (
                MODE_BOTH,
                Some(sensor.open_value(bus, 0)?),
                Some(sensor.open_value(bus, 1)?),
            ),
            (true, false) => (MODE_ANGLE, Some(sensor.open_value(bus, 0)?), None),
            _ => (MODE_RATE, None, Some(sensor.open_value(bus, 0)?)),
        };
        sensor.set_mode(mode)?;
        info!("Gyro on {} in mode {}", port, mode);

        Ok(Self {
            sensor,
            angle,
            rate,
        })
    }

    /// Reset angle and rate bias to zero
    pub fn calibrate(&mut self) -> Result<()> {
        calibrate(&mut self.sensor)
    }

    /// Rotation rate in deg/s
    pub fn rate(&mut self) -> Result<i64> {
        self.rate
            .as_mut()
            .ok_or(Error::NotConfigured("rate"))?
            .read_int()
    }

    /// Accumulated angle in degrees
    pub fn angle(&mut self) -> Result<i64> {
        self.angle
            .as_mut()
            .ok_or(Error::NotConfigured("angle"))?
            .read_int()
    }

    pub fn sensor(&mut self) -> &mut Sensor {
        &mut self.sensor
    }
}

// Entering the calibration mode and leaving it again zeroes the sensor
fn calibrate(sensor: &mut Sensor) -> Result<()> {
    let previous = sensor.mode()?;
    sensor.set_mode(MODE_CALIBRATE)?;
    sensor.set_mode(&previous)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SimulatedBus;

    #[test]
    fn test_requires_rate_or_angle() {
        let bus = SimulatedBus::ev3();
        let options = GyroOptions {
            read_rate: false,
            read_angle: false,
            calibrate: false,
        };
        assert!(matches!(
            Gyro::new(&bus, "in2", options),
            Err(Error::GyroModeUnsupported)
        ));
        assert!(bus.writes("in2", "mode").is_empty());
    }

    #[test]
    fn test_rate_mode_with_calibration() {
        let bus = SimulatedBus::ev3();
        let mut gyro = Gyro::new(&bus, "in2", GyroOptions::default()).unwrap();
        assert_eq!(
            bus.writes("in2", "mode"),
            vec!["GYRO-CAL", "n/a", "GYRO-RATE"]
        );

        bus.set("in2", "value0", "-45");
        assert_eq!(gyro.rate().unwrap(), -45);
        assert!(matches!(gyro.angle(), Err(Error::NotConfigured("angle"))));
    }

    #[test]
    fn test_angle_mode() {
        let bus = SimulatedBus::ev3();
        let options = GyroOptions {
            read_rate: false,
            read_angle: true,
            calibrate: false,
        };
        let mut gyro = Gyro::new(&bus, "in2", options).unwrap();
        assert_eq!(bus.value("in2", "mode").unwrap(), "GYRO-ANG");
        bus.set("in2", "value0", "370");
        assert_eq!(gyro.angle().unwrap(), 370);
        assert!(gyro.rate().is_err());
    }

    #[test]
    fn test_combined_mode_channels() {
        let bus = SimulatedBus::ev3();
        let options = GyroOptions {
            read_rate: true,
            read_angle: true,
            calibrate: false,
        };
        let mut gyro = Gyro::new(&bus, "in2", options).unwrap();
        assert_eq!(bus.value("in2", "mode").unwrap(), "GYRO-G&A");
        bus.set("in2", "value0", "90");
        bus.set("in2", "value1", "15");
        assert_eq!(gyro.angle().unwrap(), 90);
        assert_eq!(gyro.rate().unwrap(), 15);
    }

    #[test]
    fn test_recalibrate_returns_to_mode() {
        let bus = SimulatedBus::ev3();
        let mut gyro = Gyro::new(
            &bus,
            "in2",
            GyroOptions {
                calibrate: false,
                ..Default::default()
            },
        )
        .unwrap();
        gyro.calibrate().unwrap();
        assert_eq!(
            bus.writes("in2", "mode"),
            vec!["GYRO-RATE", "GYRO-CAL", "GYRO-RATE"]
        );
    }
}
