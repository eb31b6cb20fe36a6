//! Block store: SD volume lifecycle and all-or-nothing file I/O.
//!
//! A write only succeeds if the volume accepted every requested byte. A short
//! write is reported as `PartialWrite` even though the file now exists.

mod host;
pub mod naming;

pub use host::HostVolume;

use crate::config::StorageSettings;
use crate::peripheral::PeripheralHandle;
use cams3_core::{
    CaptureError, CardType, Clock, DirEntry, DriverError, FrameBuffer, Peripheral,
    PeripheralState, Result, VolumeDriver, WriteMode,
};
use naming::NameGenerator;
use tracing::{debug, info, warn};

/// Attempts at finding a generated name that is not already on the volume
const MAX_NAME_ATTEMPTS: usize = 16;

fn hardware(e: DriverError) -> CaptureError {
    CaptureError::hardware(Peripheral::Storage, e)
}

/// Map a driver status for an operation on `path`
fn fault(path: &str, e: DriverError) -> CaptureError {
    if e == DriverError::NOT_FOUND {
        CaptureError::NotFound(path.to_string())
    } else {
        hardware(e)
    }
}

/// Owns the mounted volume
pub struct BlockStore<V: VolumeDriver, C: Clock> {
    handle: PeripheralHandle<V>,
    clock: C,
    settings: StorageSettings,
    names: NameGenerator,
}

impl<V: VolumeDriver, C: Clock> BlockStore<V, C> {
    pub fn new(volume: V, clock: C) -> Self {
        Self {
            handle: PeripheralHandle::new(Peripheral::Storage, volume),
            clock,
            settings: StorageSettings::default(),
            names: NameGenerator::new(),
        }
    }

    pub fn state(&self) -> PeripheralState {
        self.handle.state()
    }

    pub fn is_initialized(&self) -> bool {
        self.handle.is_ready()
    }

    pub fn require_ready(&self) -> Result<()> {
        self.handle.require_ready()
    }

    pub fn settings(&self) -> &StorageSettings {
        &self.settings
    }

    /// Attach the SPI bus at `settings.spi_frequency_hz` and mount the volume.
    ///
    /// Fails if the mount fails or no card is present; the bus is released again
    /// in both cases.
    pub fn initialize(&mut self, settings: &StorageSettings) -> Result<()> {
        if self.handle.is_ready() {
            return Ok(());
        }

        let bus = settings.bus_config();
        self.handle.initialize_with(|volume| {
            volume.attach_bus(&bus).map_err(hardware)?;

            if let Err(e) = volume.mount() {
                volume.detach_bus();
                return Err(hardware(e));
            }

            if !volume.card_type().is_present() {
                volume.unmount();
                volume.detach_bus();
                return Err(hardware(DriverError::NOT_FOUND));
            }
            Ok(())
        })?;

        self.settings = settings.clone();
        info!(
            card = %self.card_type(),
            total_mb = self.total_bytes() / (1024 * 1024),
            frequency_hz = bus.frequency_hz,
            "storage mounted"
        );
        Ok(())
    }

    /// Unmount and release the bus. Safe to call repeatedly.
    pub fn teardown(&mut self) -> Result<()> {
        self.handle.teardown_with(|volume| {
            volume.unmount();
            volume.detach_bus();
            Ok(())
        })
    }

    // ===== File I/O =====

    fn write_all(&mut self, path: &str, data: &[u8], mode: WriteMode) -> Result<()> {
        if path.is_empty() {
            return Err(CaptureError::invalid_input("empty path"));
        }

        let volume = self.handle.ready_driver_mut()?;
        let written = volume.write(path, data, mode).map_err(|e| fault(path, e))?;

        if written != data.len() {
            warn!(path, written, requested = data.len(), "partial write");
            return Err(CaptureError::PartialWrite {
                path: path.to_string(),
                written,
                requested: data.len(),
            });
        }

        debug!(path, bytes = written, ?mode, "file written");
        Ok(())
    }

    /// Create or truncate `path` and write all of `data`
    pub fn write_file(&mut self, path: &str, data: &[u8]) -> Result<()> {
        self.write_all(path, data, WriteMode::Truncate)
    }

    /// Append all of `data` to `path`, creating it if needed
    pub fn append_file(&mut self, path: &str, data: &[u8]) -> Result<()> {
        self.write_all(path, data, WriteMode::Append)
    }

    /// Read from the start of `path`; returns the number of bytes read (at most `buf.len()`)
    pub fn read_file(&mut self, path: &str, buf: &mut [u8]) -> Result<usize> {
        let volume = self.handle.ready_driver_mut()?;
        let read = volume.read(path, buf).map_err(|e| fault(path, e))?;
        Ok(read.min(buf.len()))
    }

    /// `false` when the store is not mounted
    pub fn exists(&self, path: &str) -> bool {
        self.handle.is_ready() && self.handle.driver().exists(path)
    }

    pub fn remove(&mut self, path: &str) -> Result<()> {
        let volume = self.handle.ready_driver_mut()?;
        volume.remove(path).map_err(|e| fault(path, e))
    }

    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let volume = self.handle.ready_driver_mut()?;
        volume.rename(from, to).map_err(|e| fault(from, e))
    }

    pub fn mkdir(&mut self, path: &str) -> Result<()> {
        let volume = self.handle.ready_driver_mut()?;
        volume.mkdir(path).map_err(|e| fault(path, e))
    }

    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        let volume = self.handle.ready_driver_mut()?;
        volume.rmdir(path).map_err(|e| fault(path, e))
    }

    pub fn file_size(&self, path: &str) -> Result<u64> {
        self.handle.require_ready()?;
        self.handle
            .driver()
            .file_size(path)
            .map_err(|e| fault(path, e))
    }

    /// Depth-first listing of `path`, descending `levels` directories deep
    pub fn list_dir(&self, path: &str, levels: u8) -> Result<Vec<DirEntry>> {
        self.handle.require_ready()?;
        let mut out = Vec::new();
        self.walk(path, levels, &mut out)?;
        Ok(out)
    }

    fn walk(&self, path: &str, levels: u8, out: &mut Vec<DirEntry>) -> Result<()> {
        let entries = self
            .handle
            .driver()
            .list_dir(path)
            .map_err(|e| fault(path, e))?;

        for entry in entries {
            let descend = entry.is_dir && levels > 0;
            let child = entry.path.clone();
            out.push(entry);
            if descend {
                self.walk(&child, levels - 1, out)?;
            }
        }
        Ok(())
    }

    // ===== Card info =====

    /// `CardType::None` when not mounted
    pub fn card_type(&self) -> CardType {
        if self.handle.is_ready() {
            self.handle.driver().card_type()
        } else {
            CardType::None
        }
    }

    pub fn card_type_name(&self) -> &'static str {
        self.card_type().name()
    }

    pub fn total_bytes(&self) -> u64 {
        if self.handle.is_ready() {
            self.handle.driver().total_bytes()
        } else {
            0
        }
    }

    pub fn used_bytes(&self) -> u64 {
        if self.handle.is_ready() {
            self.handle.driver().used_bytes()
        } else {
            0
        }
    }

    pub fn free_bytes(&self) -> u64 {
        self.total_bytes().saturating_sub(self.used_bytes())
    }

    // ===== Naming =====

    /// Next `/<prefix>_<millis>_<counter>.<extension>` name.
    ///
    /// Names that already exist on the mounted volume are skipped.
    pub fn generate_unique_name(&mut self, prefix: &str, extension: &str) -> String {
        let mut name = self.names.next(prefix, extension, self.clock.millis());
        for _ in 1..MAX_NAME_ATTEMPTS {
            if !self.exists(&name) {
                break;
            }
            debug!(name = %name, "generated name taken, trying next");
            name = self.names.next(prefix, extension, self.clock.millis());
        }
        name
    }

    /// Write a frame's bytes unchanged to `path`, or to a generated image name.
    ///
    /// Returns the path written.
    pub fn save_frame(&mut self, frame: &FrameBuffer, path: Option<&str>) -> Result<String> {
        self.handle.require_ready()?;
        let path = match path {
            Some(path) => path.to_string(),
            None => {
                let prefix = self.settings.image_prefix.clone();
                self.generate_unique_name(&prefix, frame.format().extension())
            }
        };

        self.write_file(&path, frame.as_bytes())?;
        info!(path = %path, bytes = frame.len(), "frame saved");
        Ok(path)
    }

    pub fn driver(&self) -> &V {
        self.handle.driver()
    }

    pub fn driver_mut(&mut self) -> &mut V {
        self.handle.driver_mut()
    }
}
