// In-memory device bus for host-side testing
//
// Devices live in shared state so a test can keep a clone of the bus, poke
// attribute values the firmware would normally change, and inspect every
// value the library wrote.

use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::bus::DeviceBus;
use super::channel::{AttributeChannel, AttributeIo};
use super::virtual_hardware::{
    MOTOR_ATTRIBUTES, MOTOR_COUNT, SENSOR_ATTRIBUTES, SENSOR_COUNT, motor_slot, sensor_slot,
};
use super::{Access, DeviceClass, DeviceHandle};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct SimAttribute {
    value: String,
    // Served one per read; the last one served sticks
    scripted: VecDeque<String>,
    writes: Vec<String>,
}

#[derive(Debug)]
struct SimDevice {
    handle: DeviceHandle,
    attributes: BTreeMap<String, SimAttribute>,
}

#[derive(Debug, Default)]
struct SimState {
    devices: Vec<SimDevice>,
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedBus {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedBus {
    /// Bus with no devices attached
    pub fn new() -> Self {
        Self::default()
    }

    /// Four motors on outA..outD and four sensors on in1..in4
    pub fn ev3() -> Self {
        let bus = Self::new();
        for index in 0..MOTOR_COUNT {
            let (name, address) = motor_slot(index);
            bus.add_device(DeviceClass::TachoMotor, &name, &address, MOTOR_ATTRIBUTES);
        }
        for index in 0..SENSOR_COUNT {
            let (name, address) = sensor_slot(index);
            bus.add_device(DeviceClass::LegoSensor, &name, &address, SENSOR_ATTRIBUTES);
        }
        bus
    }

    pub fn add_device(
        &self,
        class: DeviceClass,
        name: &str,
        address: &str,
        attributes: &[(&str, &str)],
    ) -> DeviceHandle {
        let handle = DeviceHandle {
            class,
            name: name.to_string(),
            address: address.to_string(),
            path: PathBuf::from("sim").join(class.dir_name()).join(name),
        };
        let mut attributes: BTreeMap<String, SimAttribute> = attributes
            .iter()
            .map(|(attr, value)| {
                let attribute = SimAttribute {
                    value: value.to_string(),
                    ..Default::default()
                };
                (attr.to_string(), attribute)
            })
            .collect();
        attributes.insert(
            "address".to_string(),
            SimAttribute {
                value: address.to_string(),
                ..Default::default()
            },
        );

        let mut state = self.lock();
        state.devices.push(SimDevice {
            handle: handle.clone(),
            attributes,
        });
        state.devices.sort_by(|a, b| a.handle.name.cmp(&b.handle.name));
        handle
    }

    /// Set an attribute as the driver would. Ignored if no device is on `port`.
    pub fn set(&self, port: &str, attribute: &str, value: &str) {
        self.with_attribute(port, attribute, |attr| {
            attr.value = value.to_string();
            attr.scripted.clear();
        });
    }

    /// Queue values returned by successive reads of an attribute
    pub fn script(&self, port: &str, attribute: &str, values: &[&str]) {
        self.with_attribute(port, attribute, |attr| {
            attr.scripted = values.iter().map(|v| v.to_string()).collect();
        });
    }

    /// Current value, without consuming scripted reads
    pub fn value(&self, port: &str, attribute: &str) -> Option<String> {
        let state = self.lock();
        find_device(&state, port)
            .and_then(|device| device.attributes.get(attribute))
            .map(|attr| attr.value.clone())
    }

    /// Every value written to an attribute, oldest first
    pub fn writes(&self, port: &str, attribute: &str) -> Vec<String> {
        let state = self.lock();
        find_device(&state, port)
            .and_then(|device| device.attributes.get(attribute))
            .map(|attr| attr.writes.clone())
            .unwrap_or_default()
    }

    fn with_attribute<F: FnOnce(&mut SimAttribute)>(&self, port: &str, attribute: &str, f: F) {
        let mut state = self.lock();
        let device = state
            .devices
            .iter_mut()
            .find(|device| device.handle.address.contains(port));
        if let Some(device) = device {
            f(device.attributes.entry(attribute.to_string()).or_default());
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn find_device<'a>(state: &'a SimState, port: &str) -> Option<&'a SimDevice> {
    state
        .devices
        .iter()
        .find(|device| device.handle.address.contains(port))
}

impl DeviceBus for SimulatedBus {
    fn devices(&self, class: DeviceClass) -> Result<Vec<DeviceHandle>> {
        let state = self.lock();
        Ok(state
            .devices
            .iter()
            .filter(|device| device.handle.class == class)
            .map(|device| device.handle.clone())
            .collect())
    }

    fn open(
        &self,
        handle: &DeviceHandle,
        attribute: &str,
        access: Access,
    ) -> Result<AttributeChannel> {
        let path = handle.path.join(attribute);
        let exists = self
            .lock()
            .devices
            .iter()
            .find(|device| device.handle.path == handle.path)
            .is_some_and(|device| device.attributes.contains_key(attribute));
        if !exists {
            return Err(Error::io(path, io::Error::from(io::ErrorKind::NotFound)));
        }

        let io = SimAttributeIo {
            state: Arc::clone(&self.state),
            device_path: handle.path.clone(),
            attribute: attribute.to_string(),
            access,
        };
        Ok(AttributeChannel::new(attribute, path, Box::new(io)))
    }
}

struct SimAttributeIo {
    state: Arc<Mutex<SimState>>,
    device_path: PathBuf,
    attribute: String,
    access: Access,
}

impl SimAttributeIo {
    fn with_attribute<T>(&self, f: impl FnOnce(&mut SimAttribute) -> T) -> io::Result<T> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state
            .devices
            .iter_mut()
            .find(|device| device.handle.path == self.device_path)
            .and_then(|device| device.attributes.get_mut(&self.attribute))
            .map(f)
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }
}

impl AttributeIo for SimAttributeIo {
    fn read_from_start(&mut self) -> io::Result<String> {
        if !self.access.readable() {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        self.with_attribute(|attr| {
            if let Some(next) = attr.scripted.pop_front() {
                attr.value = next;
            }
            format!("{}\n", attr.value)
        })
    }

    fn write_flushed(&mut self, value: &str) -> io::Result<()> {
        if !self.access.writable() {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        self.with_attribute(|attr| {
            attr.value = value.to_string();
            attr.writes.push(value.to_string());
        })
    }
}
