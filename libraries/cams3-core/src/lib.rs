//! CamS3 Core
//!
//! Platform-agnostic types, driver-boundary traits, and error handling for the CamS3
//! capture stack (image sensor, PDM microphone, SD card).
//!
//! This crate provides the foundational building blocks shared by the capture pipeline
//! and any board-specific driver implementation.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `FrameBuffer`, `SampleBuffer`, `PeripheralState`, `SensorModel`, etc.
//! - **Driver Traits**: `CameraDriver`, `PdmDriver`, `VolumeDriver`, `Clock`, `Indicator`
//! - **Containers**: the canonical 44-byte WAV header and PCM payload encoder
//! - **Error Handling**: Unified `CaptureError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use cams3_core::types::{BitDepth, SampleBuffer};
//! use cams3_core::wav;
//!
//! let buffer = SampleBuffer::from_samples(&[0, 1000, -1000, 0], 16_000, BitDepth::Bits16);
//! let bytes = wav::encode(&buffer).unwrap();
//!
//! assert_eq!(bytes.len(), wav::HEADER_LEN + 8);
//! assert_eq!(&bytes[0..4], b"RIFF");
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod traits;
pub mod types;
pub mod wav;

// Re-export commonly used types
pub use error::{CaptureError, DriverError, DriverResult, ErrorKind, Peripheral, Result};
pub use traits::{CameraDriver, Clock, Indicator, PdmDriver, VolumeDriver};

pub use types::{
    // Lifecycle
    PeripheralState,
    // Camera
    CameraConfig, CameraPins, FrameBuffer, FrameSize, PixelFormat, SensorModel, SensorSetting,
    // Audio
    BitDepth, PdmConfig, SampleBuffer,
    // Storage
    CardType, DirEntry, SpiBusConfig, WriteMode,
};
pub use wav::WavHeader;
