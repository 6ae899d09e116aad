// Message types for the teleop runtime

use serde::{Deserialize, Serialize};

// Command from keyboard/scripts -> runtime
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DriveCommand {
    /// Forward speed in cm/s
    pub speed: f64,
    /// Turn rate in deg/s
    pub turn_rate: f64,
}

impl DriveCommand {
    pub fn new(speed: f64, turn_rate: f64) -> Self {
        Self { speed, turn_rate }
    }

    pub fn halt() -> Self {
        Self::default()
    }
}

/// Health status of the runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}
