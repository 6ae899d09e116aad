use std::fmt;

use super::Sensor;
use crate::device::DeviceBus;
use crate::error::{Error, Result};
use crate::wait::{Wait, WaitOutcome};

/// Button combinations reported by the infrared remote, in code order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteButton {
    None,
    LeftUp,
    LeftDown,
    RightUp,
    RightDown,
    BothUp,
    LeftUpRightDown,
    LeftDownRightUp,
    BothDown,
    Beacon,
    BothLeft,
    BothRight,
}

const BUTTONS: [RemoteButton; 12] = [
    RemoteButton::None,
    RemoteButton::LeftUp,
    RemoteButton::LeftDown,
    RemoteButton::RightUp,
    RemoteButton::RightDown,
    RemoteButton::BothUp,
    RemoteButton::LeftUpRightDown,
    RemoteButton::LeftDownRightUp,
    RemoteButton::BothDown,
    RemoteButton::Beacon,
    RemoteButton::BothLeft,
    RemoteButton::BothRight,
];

impl RemoteButton {
    pub fn from_code(code: i64) -> Result<Self> {
        usize::try_from(code)
            .ok()
            .and_then(|index| BUTTONS.get(index).copied())
            .ok_or(Error::UnknownButton(code))
    }

    pub fn name(self) -> &'static str {
        match self {
            RemoteButton::None => "NONE",
            RemoteButton::LeftUp => "LEFT_UP",
            RemoteButton::LeftDown => "LEFT_DOWN",
            RemoteButton::RightUp => "RIGHT_UP",
            RemoteButton::RightDown => "RIGHT_DOWN",
            RemoteButton::BothUp => "BOTH_UP",
            RemoteButton::LeftUpRightDown => "LEFT_UP_RIGHT_DOWN",
            RemoteButton::LeftDownRightUp => "LEFT_DOWN_RIGHT_UP",
            RemoteButton::BothDown => "BOTH_DOWN",
            RemoteButton::Beacon => "BEACON",
            RemoteButton::BothLeft => "BOTH_LEFT",
            RemoteButton::BothRight => "BOTH_RIGHT",
        }
    }
}

impl fmt::Display for RemoteButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Infrared sensor reading the remote control buttons
#[derive(Debug)]
pub struct Remote {
    sensor: Sensor,
}

impl Remote {
    pub fn new(bus: &dyn DeviceBus, port: &str) -> Result<Self> {
        let mut sensor = Sensor::new(bus, port)?;
        sensor.set_mode("IR-REMOTE")?;
        Ok(Self { sensor })
    }

    /// Button combination currently held
    pub fn button(&mut self) -> Result<RemoteButton> {
        RemoteButton::from_code(self.sensor.value0()?)
    }

    pub fn pressed(&mut self, button: RemoteButton) -> Result<bool> {
        Ok(self.button()? == button)
    }

    pub fn wait_for_button(&mut self, button: RemoteButton) -> Result<()> {
        self.wait_for_button_with(button, &Wait::forever()).map(|_| ())
    }

    pub fn wait_for_button_with(
        &mut self,
        button: RemoteButton,
        wait: &Wait,
    ) -> Result<WaitOutcome> {
        wait.poll_until(|| self.pressed(button))
    }

    pub fn sensor(&mut self) -> &mut Sensor {
        &mut self.sensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::SimulatedBus;

    #[test]
    fn test_button_codes() {
        assert_eq!(RemoteButton::from_code(0).unwrap(), RemoteButton::None);
        assert_eq!(RemoteButton::from_code(9).unwrap(), RemoteButton::Beacon);
        assert_eq!(RemoteButton::from_code(11).unwrap(), RemoteButton::BothRight);
        assert!(matches!(
            RemoteButton::from_code(12),
            Err(Error::UnknownButton(12))
        ));
        assert!(RemoteButton::from_code(-1).is_err());
        assert_eq!(RemoteButton::LeftUpRightDown.to_string(), "LEFT_UP_RIGHT_DOWN");
    }

    #[test]
    fn test_remote_reads_button() {
        let bus = SimulatedBus::ev3();
        let mut remote = Remote::new(&bus, "in3").unwrap();
        assert_eq!(bus.value("in3", "mode").unwrap(), "IR-REMOTE");

        bus.set("in3", "value0", "3");
        assert_eq!(remote.button().unwrap(), RemoteButton::RightUp);
        assert!(remote.pressed(RemoteButton::RightUp).unwrap());
        assert!(!remote.pressed(RemoteButton::LeftUp).unwrap());
    }

    #[test]
    fn test_wait_for_button() {
        let bus = SimulatedBus::ev3();
        let mut remote = Remote::new(&bus, "in3").unwrap();
        bus.script("in3", "value0", &["0", "1", "0", "9"]);
        remote.wait_for_button(RemoteButton::Beacon).unwrap();
        assert_eq!(remote.button().unwrap(), RemoteButton::Beacon);
    }
}
