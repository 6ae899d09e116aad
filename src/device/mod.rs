// Device layer
//
// Provides:
// - Attribute channels (open once, typed read/write many times)
// - The DeviceBus capability with sysfs and in-memory implementations
// - A generic Device bound to one port, with change-only mode writes

pub mod bus;
pub mod channel;
pub mod simulated;
pub mod virtual_hardware;

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::info;

pub use bus::{DeviceBus, SysfsBus};
pub use channel::{AttributeChannel, AttributeIo};
pub use simulated::SimulatedBus;

use crate::error::Result;

/// Kind of device, named after its sysfs class directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClass {
    TachoMotor,
    LegoSensor,
}

impl DeviceClass {
    pub fn dir_name(self) -> &'static str {
        match self {
            DeviceClass::TachoMotor => "tacho-motor",
            DeviceClass::LegoSensor => "lego-sensor",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A device directory found on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    pub class: DeviceClass,
    /// Directory name, e.g. `motor2`
    pub name: String,
    /// Contents of the `address` file, e.g. `ev3-ports:outC`
    pub address: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    pub fn readable(self) -> bool {
        matches!(self, Access::Read | Access::ReadWrite)
    }

    pub fn writable(self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

/// A device bound to one port for its whole lifetime
#[derive(Debug)]
pub struct Device {
    port: String,
    handle: DeviceHandle,
}

impl Device {
    /// Resolve `port` once; fails with `NotAttached` if nothing is plugged in
    pub fn new(bus: &dyn DeviceBus, class: DeviceClass, port: &str) -> Result<Self> {
        let handle = bus.resolve(class, port)?;
        info!("Found {} on {} at {}", class, port, handle.path.display());
        Ok(Self {
            port: port.to_string(),
            handle,
        })
    }

    /// Open one attribute of this device
    pub fn open(
        &self,
        bus: &dyn DeviceBus,
        attribute: &str,
        access: Access,
    ) -> Result<AttributeChannel> {
        bus.open(&self.handle, attribute, access)
    }

    pub fn open_mode(&self, bus: &dyn DeviceBus) -> Result<Mode> {
        let channel = self.open(bus, "mode", Access::ReadWrite)?;
        Ok(Mode { channel })
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn class(&self) -> DeviceClass {
        self.handle.class
    }

    pub fn path(&self) -> &Path {
        &self.handle.path
    }

    pub fn handle(&self) -> &DeviceHandle {
        &self.handle
    }
}

/// The `mode` attribute. Switching modes can be slow on the driver side,
/// so a write is only issued when the value actually changes.
#[derive(Debug)]
pub struct Mode {
    channel: AttributeChannel,
}

impl Mode {
    /// Current mode, always read fresh
    pub fn get(&mut self) -> Result<String> {
        self.channel.read_str()
    }

    /// Switch mode; returns whether anything was written
    pub fn set(&mut self, mode: &str) -> Result<bool> {
        if self.get()? == mode {
            return Ok(false);
        }
        info!("Switching {} to mode {}", self.channel.path().display(), mode);
        self.channel.write_str(mode)?;
        Ok(true)
    }
}
