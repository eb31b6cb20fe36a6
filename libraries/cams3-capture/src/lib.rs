//! CamS3 capture pipeline
//!
//! Coordinates the three peripherals of the CamS3 board to capture, encode, and
//! persist multimedia:
//!
//! | Module | Purpose |
//! | ------ | ------- |
//! | [`peripheral`] | Lifecycle guard shared by every peripheral |
//! | [`camera`] | `ImageSource`: sensor bring-up, calibration, frame checkout |
//! | [`mic`] | `AudioSource`: bounded PDM reads, fixed-duration recording, levels |
//! | [`storage`] | `BlockStore`: all-or-nothing file I/O on the SD volume |
//! | [`orchestrator`] | `CaptureOrchestrator`: image-to-file and audio-to-WAV pipelines |
//! | [`config`] | Board pin tables and user-tunable settings |
//!
//! Everything runs synchronously on the calling thread. Each peripheral has exactly
//! one owner; the orchestrator is the only place where they meet.
//!
//! # Example
//!
//! ```rust
//! use cams3_capture::config::CaptureConfig;
//! use cams3_capture::sim::{ManualClock, SimCamera, SimPdm, SimVolume, Signal};
//! use cams3_capture::CaptureOrchestrator;
//!
//! let clock = ManualClock::new();
//! let mut rig = CaptureOrchestrator::new(
//!     SimCamera::ov5640(),
//!     SimPdm::new(Signal::Alternating(1000)).with_clock(clock.clone()),
//!     SimVolume::new(),
//!     clock,
//!     CaptureConfig::default(),
//! );
//!
//! rig.initialize_all(true, true).unwrap();
//! let image = rig.capture_image_to_store(Some("/snap.jpg")).unwrap();
//! let audio = rig.record_audio_to_store(None, 250).unwrap();
//!
//! assert_eq!(image, "/snap.jpg");
//! assert!(audio.ends_with(".wav"));
//! ```

#![forbid(unsafe_code)]

pub mod analysis;
pub mod camera;
pub mod clock;
pub mod config;
pub mod mic;
pub mod orchestrator;
pub mod peripheral;
pub mod storage;

#[cfg(any(test, feature = "sim"))]
pub mod sim;

pub use camera::ImageSource;
pub use clock::MonotonicClock;
pub use config::CaptureConfig;
pub use mic::{AudioSource, Recording};
pub use orchestrator::CaptureOrchestrator;
pub use peripheral::PeripheralHandle;
pub use storage::{BlockStore, HostVolume};
