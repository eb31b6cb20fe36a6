/// Driver-boundary traits for the CamS3 capture stack
///
/// Board support crates implement these over the vendor drivers (camera, I2S PDM,
/// SD/FAT); the capture pipeline only ever talks to hardware through them. Every
/// call reports success or a `DriverError` status code and never panics.
use crate::error::DriverResult;
use crate::types::{
    CameraConfig, CardType, DirEntry, FrameBuffer, PdmConfig, SensorSetting, SpiBusConfig,
    WriteMode,
};

/// Image sensor driver
///
/// Owns the frame-buffer pool. Frames leave the pool through `frame_get` and must
/// come back through `frame_return`.
pub trait CameraDriver: Send {
    /// Bring up the sensor and allocate the frame-buffer pool
    fn init(&mut self, config: &CameraConfig) -> DriverResult<()>;

    /// Release the sensor and the frame-buffer pool
    fn deinit(&mut self) -> DriverResult<()>;

    /// Product ID of the attached sensor, if one answered over SCCB
    fn sensor_pid(&self) -> Option<u16>;

    /// Block until a frame is available
    ///
    /// Returns `None` when the driver times out or the pool is exhausted.
    fn frame_get(&mut self) -> Option<FrameBuffer>;

    /// Return a frame to the pool
    fn frame_return(&mut self, frame: FrameBuffer);

    /// Apply a single sensor register setting
    fn apply(&mut self, setting: SensorSetting) -> DriverResult<()>;
}

/// PDM receive channel driver (I2S peripheral in PDM RX mode)
pub trait PdmDriver: Send {
    /// Allocate the channel
    fn create_channel(&mut self) -> DriverResult<()>;

    /// Configure clocks, slots and GPIOs for PDM receive
    fn configure(&mut self, config: &PdmConfig) -> DriverResult<()>;

    /// Start the channel
    fn enable(&mut self) -> DriverResult<()>;

    /// Stop the channel
    fn disable(&mut self) -> DriverResult<()>;

    /// Free the channel. Safe to call on a channel that was never enabled.
    fn delete_channel(&mut self);

    /// Read up to `buf.len()` bytes, blocking at most `timeout_ms`
    ///
    /// Returns the number of bytes read, which is less than requested when the
    /// timeout elapsed first.
    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> DriverResult<usize>;
}

/// SD card volume driver (SPI transport + FAT filesystem)
pub trait VolumeDriver: Send {
    /// Claim the SPI bus for the card slot
    fn attach_bus(&mut self, bus: &SpiBusConfig) -> DriverResult<()>;

    /// Release the SPI bus
    fn detach_bus(&mut self);

    /// Mount the filesystem
    fn mount(&mut self) -> DriverResult<()>;

    /// Unmount the filesystem
    fn unmount(&mut self);

    /// Card detected in the slot
    fn card_type(&self) -> CardType;

    /// Volume capacity in bytes
    fn total_bytes(&self) -> u64;

    /// Bytes in use
    fn used_bytes(&self) -> u64;

    /// Open `path` in `mode` and write `data`
    ///
    /// Returns the number of bytes the filesystem accepted; an `Err` means the file
    /// could not be opened at all.
    fn write(&mut self, path: &str, data: &[u8], mode: WriteMode) -> DriverResult<usize>;

    /// Read from the start of `path` into `buf`
    fn read(&mut self, path: &str, buf: &mut [u8]) -> DriverResult<usize>;

    fn exists(&self, path: &str) -> bool;

    fn remove(&mut self, path: &str) -> DriverResult<()>;

    fn rename(&mut self, from: &str, to: &str) -> DriverResult<()>;

    fn mkdir(&mut self, path: &str) -> DriverResult<()>;

    fn rmdir(&mut self, path: &str) -> DriverResult<()>;

    fn file_size(&self, path: &str) -> DriverResult<u64>;

    /// Immediate children of the directory at `path`
    fn list_dir(&self, path: &str) -> DriverResult<Vec<DirEntry>>;
}

/// Millisecond time source used for deadlines and filename timestamps
pub trait Clock: Send {
    /// Milliseconds since an arbitrary fixed origin (monotonic)
    fn millis(&self) -> u64;
}

/// Status LED
pub trait Indicator: Send {
    fn set(&mut self, on: bool);
}
