// Device bus: resolves ports to device directories and opens attribute channels
//
// The real bus reads the kernel's sysfs class directories. Any directory tree
// with the same layout (such as one produced by `virtual_hardware::populate`)
// can be used instead by pointing the bus at a different root.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::channel::{AttributeChannel, AttributeIo};
use super::{Access, DeviceClass, DeviceHandle};
use crate::config::SYSFS_CLASS_ROOT;
use crate::error::{Error, Result};

/// Source of device handles and attribute channels
pub trait DeviceBus {
    /// All devices of a class, ordered by directory name
    fn devices(&self, class: DeviceClass) -> Result<Vec<DeviceHandle>>;

    /// Open one attribute of a resolved device
    fn open(&self, handle: &DeviceHandle, attribute: &str, access: Access)
    -> Result<AttributeChannel>;

    /// First device of `class` whose address contains `port`
    fn resolve(&self, class: DeviceClass, port: &str) -> Result<DeviceHandle> {
        self.devices(class)?
            .into_iter()
            .find(|handle| handle.address.contains(port))
            .ok_or_else(|| Error::NotAttached {
                class,
                port: port.to_string(),
            })
    }
}

/// Bus over a sysfs-shaped directory tree
#[derive(Debug, Clone)]
pub struct SysfsBus {
    root: PathBuf,
    // Plain files keep stale bytes past a shorter write; sysfs attributes do not
    truncate_on_write: bool,
}

impl SysfsBus {
    /// The kernel's `/sys/class`
    pub fn system() -> Self {
        Self {
            root: PathBuf::from(SYSFS_CLASS_ROOT),
            truncate_on_write: false,
        }
    }

    /// A regular directory laid out like `/sys/class`
    pub fn with_root<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            truncate_on_write: true,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DeviceBus for SysfsBus {
    fn devices(&self, class: DeviceClass) -> Result<Vec<DeviceHandle>> {
        let class_dir = self.root.join(class.dir_name());
        let entries = match fs::read_dir(&class_dir) {
            Ok(entries) => entries,
            // No device of this class has ever been attached
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&class_dir, e)),
        };

        let mut handles = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&class_dir, e))?;
            let path = entry.path();
            let address_path = path.join("address");
            let address = fs::read_to_string(&address_path)
                .map_err(|e| Error::io(&address_path, e))?
                .trim()
                .to_string();
            handles.push(DeviceHandle {
                class,
                name: entry.file_name().to_string_lossy().into_owned(),
                address,
                path,
            });
        }
        handles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(handles)
    }

    fn open(
        &self,
        handle: &DeviceHandle,
        attribute: &str,
        access: Access,
    ) -> Result<AttributeChannel> {
        let path = handle.path.join(attribute);
        let mut options = OpenOptions::new();
        options.read(access.readable()).write(access.writable());
        let file = options.open(&path).map_err(|e| Error::io(&path, e))?;
        debug!("Opened {} ({:?})", path.display(), access);

        let io = FileAttribute {
            file,
            truncate: self.truncate_on_write,
        };
        Ok(AttributeChannel::new(attribute, path, Box::new(io)))
    }
}

struct FileAttribute {
    file: File,
    truncate: bool,
}

impl AttributeIo for FileAttribute {
    fn read_from_start(&mut self) -> io::Result<String> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut contents = String::new();
        self.file.read_to_string(&mut contents)?;
        Ok(contents)
    }

    fn write_flushed(&mut self, value: &str) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(value.as_bytes())?;
        if self.truncate {
            self.file.set_len(value.len() as u64)?;
        }
        self.file.flush()
    }
}
