// Sensors
//
// Every sensor is a `lego-sensor` device with a `mode` attribute and value
// attributes value0..value7. The specialised sensors pick their mode once at
// construction and derive their readings from the value attributes.

mod gyro;
mod proximity;
mod remote;
mod touch;

pub use gyro::{Gyro, GyroOptions};
pub use proximity::{DEFAULT_PROXIMITY_THRESHOLD, Proximity};
pub use remote::{Remote, RemoteButton};
pub use touch::Touch;

use crate::device::{Access, AttributeChannel, Device, DeviceBus, DeviceClass, Mode};
use crate::error::Result;

/// Generic sensor: resolved device, its mode, and value0 kept open
#[derive(Debug)]
pub struct Sensor {
    device: Device,
    mode: Mode,
    value0: AttributeChannel,
}

impl Sensor {
    pub fn new(bus: &dyn DeviceBus, port: &str) -> Result<Self> {
        let device = Device::new(bus, DeviceClass::LegoSensor, port)?;
        let mode = device.open_mode(bus)?;
        let value0 = device.open(bus, "value0", Access::Read)?;
        Ok(Self {
            device,
            mode,
            value0,
        })
    }

    pub fn value0(&mut self) -> Result<i64> {
        self.value0.read_int()
    }

    /// Open `value<index>` for repeated reading
    pub fn open_value(&self, bus: &dyn DeviceBus, index: u8) -> Result<AttributeChannel> {
        self.device.open(bus, &format!("value{}", index), Access::Read)
    }

    pub fn mode(&mut self) -> Result<String> {
        self.mode.get()
    }

    /// Switch mode if different; returns whether a write happened
    pub fn set_mode(&mut self, mode: &str) -> Result<bool> {
        self.mode.set(mode)
    }

    pub fn port(&self) -> &str {
        self.device.port()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}
