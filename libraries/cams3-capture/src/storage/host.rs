//! Host directory standing in for the SD card.
//!
//! Volume paths (`/DCIM/a.jpg`) are resolved below a root directory. Writes are
//! clipped at a configurable capacity so a full card can be reproduced on a
//! desktop machine.

use cams3_core::{
    CardType, DirEntry, DriverError, DriverResult, SpiBusConfig, VolumeDriver, WriteMode,
};
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default capacity reported for a host volume (32 GiB, a common SDHC size)
const DEFAULT_CAPACITY: u64 = 32 * 1024 * 1024 * 1024;

fn driver_error(e: &io::Error) -> DriverError {
    match e.kind() {
        io::ErrorKind::NotFound => DriverError::NOT_FOUND,
        io::ErrorKind::InvalidInput => DriverError::INVALID_ARG,
        _ => DriverError::FAIL,
    }
}

/// `VolumeDriver` backed by a directory on the host filesystem
#[derive(Debug)]
pub struct HostVolume {
    root: PathBuf,
    capacity: u64,
    bus: Option<SpiBusConfig>,
    mounted: bool,
}

impl HostVolume {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            capacity: DEFAULT_CAPACITY,
            bus: None,
            mounted: false,
        }
    }

    pub fn with_capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Host path for a volume path; `..` components are rejected
    fn resolve(&self, path: &str) -> DriverResult<PathBuf> {
        let relative = path.trim_start_matches('/');
        if relative.split('/').any(|part| part == "..") {
            return Err(DriverError::INVALID_ARG);
        }
        Ok(self.root.join(relative))
    }

    fn require_mounted(&self) -> DriverResult<()> {
        if self.mounted {
            Ok(())
        } else {
            Err(DriverError::INVALID_STATE)
        }
    }

    fn usage(dir: &Path) -> u64 {
        let Ok(entries) = fs::read_dir(dir) else {
            return 0;
        };
        entries
            .flatten()
            .map(|entry| match entry.metadata() {
                Ok(meta) if meta.is_dir() => Self::usage(&entry.path()),
                Ok(meta) => meta.len(),
                Err(_) => 0,
            })
            .sum()
    }
}

impl VolumeDriver for HostVolume {
    fn attach_bus(&mut self, bus: &SpiBusConfig) -> DriverResult<()> {
        self.bus = Some(*bus);
        Ok(())
    }

    fn detach_bus(&mut self) {
        self.bus = None;
    }

    fn mount(&mut self) -> DriverResult<()> {
        if self.bus.is_none() {
            return Err(DriverError::INVALID_STATE);
        }
        fs::create_dir_all(&self.root).map_err(|e| driver_error(&e))?;
        self.mounted = true;
        debug!(root = %self.root.display(), "host volume mounted");
        Ok(())
    }

    fn unmount(&mut self) {
        self.mounted = false;
    }

    fn card_type(&self) -> CardType {
        if self.mounted {
            CardType::Sdhc
        } else {
            CardType::None
        }
    }

    fn total_bytes(&self) -> u64 {
        self.capacity
    }

    fn used_bytes(&self) -> u64 {
        Self::usage(&self.root)
    }

    fn write(&mut self, path: &str, data: &[u8], mode: WriteMode) -> DriverResult<usize> {
        self.require_mounted()?;
        let target = self.resolve(path)?;

        let mut options = OpenOptions::new();
        options.create(true);
        match mode {
            WriteMode::Truncate => options.write(true).truncate(true),
            WriteMode::Append => options.append(true),
        };

        // Truncating frees the old contents before the capacity check
        let existing = match mode {
            WriteMode::Truncate => fs::metadata(&target).map_or(0, |m| m.len()),
            WriteMode::Append => 0,
        };
        let free = self
            .capacity
            .saturating_sub(self.used_bytes().saturating_sub(existing));
        let accepted = data.len().min(usize::try_from(free).unwrap_or(usize::MAX));

        let mut file = options.open(&target).map_err(|e| driver_error(&e))?;
        file.write_all(&data[..accepted])
            .map_err(|e| driver_error(&e))?;
        Ok(accepted)
    }

    fn read(&mut self, path: &str, buf: &mut [u8]) -> DriverResult<usize> {
        self.require_mounted()?;
        let mut file = fs::File::open(self.resolve(path)?).map_err(|e| driver_error(&e))?;

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(driver_error(&e)),
            }
        }
        Ok(filled)
    }

    fn exists(&self, path: &str) -> bool {
        self.mounted && self.resolve(path).is_ok_and(|p| p.exists())
    }

    fn remove(&mut self, path: &str) -> DriverResult<()> {
        self.require_mounted()?;
        fs::remove_file(self.resolve(path)?).map_err(|e| driver_error(&e))
    }

    fn rename(&mut self, from: &str, to: &str) -> DriverResult<()> {
        self.require_mounted()?;
        fs::rename(self.resolve(from)?, self.resolve(to)?).map_err(|e| driver_error(&e))
    }

    fn mkdir(&mut self, path: &str) -> DriverResult<()> {
        self.require_mounted()?;
        fs::create_dir(self.resolve(path)?).map_err(|e| driver_error(&e))
    }

    fn rmdir(&mut self, path: &str) -> DriverResult<()> {
        self.require_mounted()?;
        fs::remove_dir(self.resolve(path)?).map_err(|e| driver_error(&e))
    }

    fn file_size(&self, path: &str) -> DriverResult<u64> {
        self.require_mounted()?;
        let meta = fs::metadata(self.resolve(path)?).map_err(|e| driver_error(&e))?;
        Ok(meta.len())
    }

    fn list_dir(&self, path: &str) -> DriverResult<Vec<DirEntry>> {
        self.require_mounted()?;
        let dir = self.resolve(path)?;
        let base = path.trim_end_matches('/');

        let mut entries = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| driver_error(&e))? {
            let entry = entry.map_err(|e| driver_error(&e))?;
            let meta = entry.metadata().map_err(|e| driver_error(&e))?;
            let child = format!("{base}/{}", entry.file_name().to_string_lossy());

            entries.push(if meta.is_dir() {
                DirEntry::dir(child)
            } else {
                DirEntry::file(child, meta.len())
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }
}
