//! Core error types for the CamS3 capture stack

use std::fmt;
use thiserror::Error;

/// Result type alias using `CaptureError`
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Result type returned by driver-boundary calls
pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// The three peripherals coordinated by the capture pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Peripheral {
    /// Image sensor (DVP camera)
    Camera,
    /// PDM digital microphone
    Microphone,
    /// SD card block store
    Storage,
}

impl Peripheral {
    pub fn as_str(&self) -> &'static str {
        match self {
            Peripheral::Camera => "camera",
            Peripheral::Microphone => "microphone",
            Peripheral::Storage => "storage",
        }
    }
}

impl fmt::Display for Peripheral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque status code returned by a hardware driver.
///
/// Codes follow the ESP-IDF `esp_err_t` numbering so that values coming from a
/// real board driver can be passed through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[error("driver error 0x{code:x}")]
pub struct DriverError {
    pub code: i32,
}

impl DriverError {
    /// Generic failure
    pub const FAIL: DriverError = DriverError { code: -1 };
    /// Out of memory
    pub const NO_MEM: DriverError = DriverError { code: 0x101 };
    /// Invalid argument
    pub const INVALID_ARG: DriverError = DriverError { code: 0x102 };
    /// Operation not valid in the current driver state
    pub const INVALID_STATE: DriverError = DriverError { code: 0x103 };
    /// Requested resource (file, sensor, medium) not found
    pub const NOT_FOUND: DriverError = DriverError { code: 0x105 };

    pub const fn new(code: i32) -> Self {
        Self { code }
    }
}

/// Classification of a `CaptureError` into the capture pipeline's error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation attempted before the peripheral reached `Ready`
    NotInitialized,
    /// A driver call returned a non-success status
    HardwareFault,
    /// Allocation failure or buffer-pool starvation
    ResourceExhausted,
    /// A bounded read or acquire exceeded its deadline
    Timeout,
    /// Storage accepted fewer bytes than requested
    PartialWrite,
    /// The caller used the API incorrectly (bad argument, wrong lifecycle step)
    Usage,
}

/// Core error type for the capture pipeline
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Peripheral is not in the `Ready` state
    #[error("{peripheral} is not initialized")]
    NotInitialized { peripheral: Peripheral },

    /// Previous initialization failed; a teardown is required before retrying
    #[error("{peripheral} initialization failed earlier; tear down before reinitializing")]
    RequiresTeardown { peripheral: Peripheral },

    /// Driver returned a failure status
    #[error("{peripheral} hardware fault: {source}")]
    HardwareFault {
        peripheral: Peripheral,
        #[source]
        source: DriverError,
    },

    /// Allocation failure
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Bounded acquire/read gave up
    #[error("{peripheral} timed out")]
    Timeout { peripheral: Peripheral },

    /// A frame is already checked out from the image source
    #[error("A frame buffer is already checked out; release it before acquiring another")]
    FrameAlreadyCheckedOut,

    /// Recording finished without a single sample
    #[error("No audio samples were captured")]
    NoSamplesCaptured,

    /// Storage wrote fewer bytes than requested
    #[error("Partial write to {path}: {written}/{requested} bytes")]
    PartialWrite {
        path: String,
        written: usize,
        requested: usize,
    },

    /// File or directory not found on the volume
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed container data
    #[error("Invalid container: {0}")]
    InvalidContainer(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CaptureError {
    /// Create a not-initialized error
    pub fn not_initialized(peripheral: Peripheral) -> Self {
        Self::NotInitialized { peripheral }
    }

    /// Wrap a driver status code as a hardware fault
    pub fn hardware(peripheral: Peripheral, source: DriverError) -> Self {
        Self::HardwareFault { peripheral, source }
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a resource exhausted error
    pub fn exhausted(msg: impl Into<String>) -> Self {
        Self::ResourceExhausted(msg.into())
    }

    /// Which taxonomy bucket this error belongs to
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotInitialized { .. } => ErrorKind::NotInitialized,
            Self::HardwareFault { .. } | Self::NotFound(_) => ErrorKind::HardwareFault,
            Self::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            Self::Timeout { .. } | Self::NoSamplesCaptured => ErrorKind::Timeout,
            Self::PartialWrite { .. } => ErrorKind::PartialWrite,
            Self::RequiresTeardown { .. }
            | Self::FrameAlreadyCheckedOut
            | Self::InvalidContainer(_)
            | Self::InvalidInput(_)
            | Self::Config(_) => ErrorKind::Usage,
        }
    }

    /// Driver status code, if this error came from a driver
    pub fn driver_code(&self) -> Option<i32> {
        match self {
            Self::HardwareFault { source, .. } => Some(source.code),
            _ => None,
        }
    }
}
