// Error types shared by the device layer, motors, sensors and mechanisms

use std::path::PathBuf;

use crate::device::DeviceClass;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse {value:?} read from {}", .path.display())]
    Parse { path: PathBuf, value: String },

    #[error("No {class} attached to port {port}")]
    NotAttached { class: DeviceClass, port: String },

    #[error("Mechanism targets have no 'reset' entry")]
    MissingResetTarget,

    #[error("Reset target {reset} must equal the lowest ({min}) or highest ({max}) target")]
    InvalidResetTarget { reset: f64, min: f64, max: f64 },

    #[error("Gyro must be configured to read rate, angle, or both")]
    GyroModeUnsupported,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Unknown target '{0}'")]
    UnknownTarget(String),

    #[error("Unknown remote button code {0}")]
    UnknownButton(i64),

    #[error("Sensor was not configured to read {0}")]
    NotConfigured(&'static str),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
