//! Typed access to sysfs tacho motors and sensors for small mobile robots,
//! plus a skid-steer drive base and homing mechanisms built on top.

pub mod config;
pub mod device;
pub mod error;
pub mod messages;
pub mod motor;
pub mod runtime;
pub mod sensor;
pub mod wait;

pub use error::{Error, Result};
