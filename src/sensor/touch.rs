use super::Sensor;
use crate::device::DeviceBus;
use crate::error::Result;
use crate::wait::{Wait, WaitOutcome};

#[derive(Debug)]
pub struct Touch {
    sensor: Sensor,
}

impl Touch {
    pub fn new(bus: &dyn DeviceBus, port: &str) -> Result<Self> {
        Ok(Self {
            sensor: Sensor::new(bus, port)?,
        })
    }

    pub fn pressed(&mut self) -> Result<bool> {
        Ok(self.sensor.value0()? != 0)
    }

    pub fn released(&mut self) -> Result<bool> {
        Ok(!self.pressed()?)
    }

    pub fn wait_for_press(&mut self) -> Result<()> {
        self.wait_for_press_with(&Wait::forever()).map(|_| ())
    }

    pub fn wait_for_press_with(&mut self, wait: &Wait) -> Result<WaitOutcome> {
        wait.poll_until(|| self.pressed())
    }

    pub fn wait_for_release(&mut self) -> Result<()> {
        self.wait_for_release_with(&Wait::forever()).map(|_| ())
    }

    pub fn wait_for_release_with(&mut self, wait: &Wait) -> Result<WaitOutcome> {
        wait.poll_until(|| self.released())
    }

    /// Wait for a press followed by a release. If already pressed, only the
    /// release is awaited.
    pub fn wait_for_bump(&mut self) -> Result<()> {
        self.wait_for_bump_with(&Wait::forever()).map(|_| ())
    }

    /// Each phase gets the full timeout of `wait`.
    pub fn wait_for_bump_with(&mut self, wait: &Wait) -> Result<WaitOutcome> {
        let pressed = self.wait_for_press_with(wait)?;
        if !pressed.is_met() {
            return Ok(pressed);
        }
        self.wait_for_release_with(wait)
    }

    pub fn sensor(&mut self) -> &mut Sensor {
        &mut self.sensor
    }
}
