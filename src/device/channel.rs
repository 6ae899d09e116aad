// Typed access to a single device attribute file
//
// A channel is opened once and then read/written many times. Every read starts
// at offset zero so it returns a fresh snapshot, and every write is flushed
// before returning so the driver sees it immediately.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use tracing::trace;

use crate::error::{Error, Result};

/// Duty cycle limits accepted by the motor driver
pub const DUTY_MIN: i64 = -100;
pub const DUTY_MAX: i64 = 100;

/// Preconverted duty cycle strings, index = duty + 100
static DUTY_STRINGS: LazyLock<Vec<String>> =
    LazyLock::new(|| (DUTY_MIN..=DUTY_MAX).map(|duty| duty.to_string()).collect());

/// Raw byte-level access to one attribute, provided by a [`DeviceBus`](super::DeviceBus).
pub trait AttributeIo: Send {
    /// Entire contents, read from the start.
    fn read_from_start(&mut self) -> io::Result<String>;

    /// Replace the contents and flush.
    fn write_flushed(&mut self, value: &str) -> io::Result<()>;
}

pub struct AttributeChannel {
    name: String,
    path: PathBuf,
    io: Box<dyn AttributeIo>,
}

impl AttributeChannel {
    pub fn new(name: &str, path: PathBuf, io: Box<dyn AttributeIo>) -> Self {
        Self {
            name: name.to_string(),
            path,
            io,
        }
    }

    /// Attribute file name, e.g. `speed_sp`
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the attribute as a trimmed string
    pub fn read_str(&mut self) -> Result<String> {
        let raw = self
            .io
            .read_from_start()
            .map_err(|e| Error::io(&self.path, e))?;
        Ok(raw.trim().to_string())
    }

    /// Read the attribute as a base-10 integer
    pub fn read_int(&mut self) -> Result<i64> {
        let text = self.read_str()?;
        text.parse().map_err(|_| Error::Parse {
            path: self.path.clone(),
            value: text,
        })
    }

    pub fn write_str(&mut self, value: &str) -> Result<()> {
        trace!("{} <- {}", self.path.display(), value);
        self.io
            .write_flushed(value)
            .map_err(|e| Error::io(&self.path, e))
    }

    pub fn write_int(&mut self, value: i64) -> Result<()> {
        self.write_str(&value.to_string())
    }

    /// Write a duty cycle, clamped to [-100, 100], without formatting it
    pub fn write_duty(&mut self, duty: i64) -> Result<()> {
        let index = (duty.clamp(DUTY_MIN, DUTY_MAX) - DUTY_MIN) as usize;
        let encoded = &DUTY_STRINGS[index];
        self.io
            .write_flushed(encoded)
            .map_err(|e| Error::io(&self.path, e))
    }
}

impl fmt::Debug for AttributeChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeChannel")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records writes and serves a fixed read value
    #[derive(Clone, Default)]
    struct Recorder {
        contents: Arc<Mutex<String>>,
        writes: Arc<Mutex<Vec<String>>>,
    }

    impl AttributeIo for Recorder {
        fn read_from_start(&mut self) -> io::Result<String> {
            Ok(self.contents.lock().unwrap().clone())
        }

        fn write_flushed(&mut self, value: &str) -> io::Result<()> {
            *self.contents.lock().unwrap() = value.to_string();
            self.writes.lock().unwrap().push(value.to_string());
            Ok(())
        }
    }

    fn channel(initial: &str) -> (AttributeChannel, Recorder) {
        let recorder = Recorder::default();
        *recorder.contents.lock().unwrap() = initial.to_string();
        let channel = AttributeChannel::new(
            "value0",
            PathBuf::from("sensor0/value0"),
            Box::new(recorder.clone()),
        );
        (channel, recorder)
    }

    #[test]
    fn test_duty_table_covers_range() {
        assert_eq!(DUTY_STRINGS.len(), 201);
        assert_eq!(DUTY_STRINGS[0], "-100");
        assert_eq!(DUTY_STRINGS[100], "0");
        assert_eq!(DUTY_STRINGS[200], "100");
    }

    #[test]
    fn test_write_duty_clamps() {
        let (mut channel, recorder) = channel("0");
        channel.write_duty(42).unwrap();
        channel.write_duty(250).unwrap();
        channel.write_duty(-101).unwrap();
        assert_eq!(*recorder.writes.lock().unwrap(), vec!["42", "100", "-100"]);
    }

    #[test]
    fn test_read_int_trims_newline() {
        let (mut channel, _) = channel("-360\n");
        assert_eq!(channel.read_int().unwrap(), -360);
    }

    #[test]
    fn test_read_int_rejects_text() {
        let (mut channel, _) = channel("n/a\n");
        match channel.read_int() {
            Err(Error::Parse { value, path }) => {
                assert_eq!(value, "n/a");
                assert_eq!(path, PathBuf::from("sensor0/value0"));
            }
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_write_int_plain_decimal() {
        let (mut channel, recorder) = channel("0");
        channel.write_int(-75).unwrap();
        assert_eq!(channel.read_str().unwrap(), "-75");
        assert_eq!(*recorder.writes.lock().unwrap(), vec!["-75"]);
    }
}
