use super::Sensor;
use crate::device::DeviceBus;
use crate::error::Result;
use crate::wait::{Wait, WaitOutcome};

pub const DEFAULT_PROXIMITY_THRESHOLD: i64 = 50;

/// Infrared sensor in proximity mode (0 = closest, 100 = farthest)
#[derive(Debug)]
pub struct Proximity {
    sensor: Sensor,
    threshold: i64,
}

impl Proximity {
    pub fn new(bus: &dyn DeviceBus, port: &str, threshold: i64) -> Result<Self> {
        let mut sensor = Sensor::new(bus, port)?;
        sensor.set_mode("IR-PROX")?;
        Ok(Self { sensor, threshold })
    }

    pub fn proximity(&mut self) -> Result<i64> {
        self.sensor.value0()
    }

    /// True when an object is at or closer than the threshold
    pub fn detected(&mut self) -> Result<bool> {
        Ok(self.proximity()? <= self.threshold)
    }

    pub fn wait_for_detection(&mut self) -> Result<()> {
        self.wait_for_detection_with(&Wait::forever()).map(|_| ())
    }

    pub fn wait_for_detection_with(&mut self, wait: &Wait) -> Result<WaitOutcome> {
        wait.poll_until(|| self.detected())
    }

    pub fn threshold(&self) -> i64 {
        self.threshold
    }

    pub fn sensor(&mut self) -> &mut Sensor {
        &mut self.sensor
    }
}
