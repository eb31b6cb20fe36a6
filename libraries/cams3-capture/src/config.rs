//! Board configuration and capture settings
//!
//! Two layers live here:
//! - [`pins`]: fixed GPIO assignment of the M5Stack Unit CamS3-5MP board
//! - [`CaptureConfig`]: user-tunable settings (resolution, sample rate, timing),
//!   loaded from an optional TOML file plus `CAMS3__*` environment overrides

use cams3_core::{
    BitDepth, CameraConfig, CaptureError, FrameSize, PdmConfig, PixelFormat, Result, SpiBusConfig,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================================================
// GPIO Pin Assignments
// ============================================================================

/// Fixed pin tables for the CamS3 board
pub mod pins {
    use cams3_core::CameraPins;

    /// Camera DVP / SCCB pins
    pub mod camera {
        /// Power-down (not wired)
        pub const PWDN: Option<u8> = None;
        pub const RESET: Option<u8> = Some(21);
        pub const XCLK: u8 = 11;
        pub const SIOD: u8 = 17;
        pub const SIOC: u8 = 41;

        /// D0..D7 (Y2..Y9)
        pub const DATA: [u8; 8] = [6, 15, 16, 7, 5, 10, 4, 13];

        pub const VSYNC: u8 = 42;
        pub const HREF: u8 = 18;
        pub const PCLK: u8 = 12;

        /// Sensor master clock
        pub const XCLK_FREQ_HZ: u32 = 20_000_000;
    }

    /// Status LED next to the lens
    pub const LED: u8 = 14;

    /// SD card slot (SPI)
    pub mod sd {
        pub const CS: u8 = 9;
        pub const MOSI: u8 = 38;
        pub const SCK: u8 = 39;
        pub const MISO: u8 = 40;

        /// Default SPI clock (40 MHz)
        pub const DEFAULT_FREQUENCY_HZ: u32 = 40_000_000;
    }

    /// PDM microphone
    pub mod mic {
        pub const CLK: u8 = 47;
        pub const DATA: u8 = 48;

        pub const DMA_DESC_NUM: u32 = 6;
        pub const DMA_FRAME_NUM: u32 = 240;
    }

    /// Complete camera pin table
    pub const CAMERA: CameraPins = CameraPins {
        pwdn: camera::PWDN,
        reset: camera::RESET,
        xclk: camera::XCLK,
        sccb_sda: camera::SIOD,
        sccb_scl: camera::SIOC,
        data: camera::DATA,
        vsync: camera::VSYNC,
        href: camera::HREF,
        pclk: camera::PCLK,
    };
}

// ============================================================================
// Settings
// ============================================================================

/// Top-level capture settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CaptureConfig {
    #[serde(default)]
    pub camera: CameraSettings,

    #[serde(default)]
    pub microphone: MicrophoneSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub recording: RecordingSettings,
}

/// Camera bring-up parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CameraSettings {
    pub frame_size: FrameSize,
    pub pixel_format: PixelFormat,
    /// 0-63, lower is better
    pub jpeg_quality: u8,
    pub frame_buffer_count: u8,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            frame_size: FrameSize::Vga,
            pixel_format: PixelFormat::Jpeg,
            jpeg_quality: 12,
            frame_buffer_count: 2,
        }
    }
}

impl CameraSettings {
    /// Driver configuration for the CamS3 board pins
    pub fn driver_config(&self) -> CameraConfig {
        CameraConfig::new(
            pins::CAMERA,
            pins::camera::XCLK_FREQ_HZ,
            self.frame_size,
            self.pixel_format,
            self.jpeg_quality,
            self.frame_buffer_count,
        )
    }
}

/// PDM microphone parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MicrophoneSettings {
    pub sample_rate_hz: u32,
    pub bit_depth: BitDepth,
}

impl Default for MicrophoneSettings {
    fn default() -> Self {
        Self {
            sample_rate_hz: 16_000,
            bit_depth: BitDepth::Bits16,
        }
    }
}

impl MicrophoneSettings {
    /// Driver configuration for the CamS3 board pins
    pub fn driver_config(&self) -> PdmConfig {
        PdmConfig {
            sample_rate_hz: self.sample_rate_hz,
            bit_depth: self.bit_depth,
            clk_pin: pins::mic::CLK,
            data_pin: pins::mic::DATA,
            dma_desc_num: pins::mic::DMA_DESC_NUM,
            dma_frame_num: pins::mic::DMA_FRAME_NUM,
        }
    }
}

/// SD card and file naming parameters
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageSettings {
    pub spi_frequency_hz: u32,
    /// Prefix of generated image names (`/IMG_<millis>_<n>.jpg`)
    pub image_prefix: String,
    /// Prefix of generated recording names (`/REC_<millis>_<n>.wav`)
    pub audio_prefix: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            spi_frequency_hz: pins::sd::DEFAULT_FREQUENCY_HZ,
            image_prefix: "IMG".to_string(),
            audio_prefix: "REC".to_string(),
        }
    }
}

impl StorageSettings {
    /// SPI transport for the CamS3 card slot
    pub fn bus_config(&self) -> SpiBusConfig {
        SpiBusConfig {
            sck: pins::sd::SCK,
            miso: pins::sd::MISO,
            mosi: pins::sd::MOSI,
            cs: pins::sd::CS,
            frequency_hz: self.spi_frequency_hz,
        }
    }
}

/// Timing of the recording loop and level meters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RecordingSettings {
    /// Maximum samples requested per bounded read
    pub chunk_samples: usize,
    /// Timeout of each bounded read inside the recording loop
    pub read_timeout_ms: u32,
    /// Extra wall-clock allowance past the nominal duration before the loop gives up
    pub grace_ms: u32,
    /// Default window for peak/RMS readings
    pub level_window: usize,
    /// Timeout of the single read behind a peak/RMS reading
    pub level_timeout_ms: u32,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            chunk_samples: 1024,
            read_timeout_ms: 100,
            grace_ms: 1000,
            level_window: 256,
            level_timeout_ms: 500,
        }
    }
}

impl CaptureConfig {
    /// Load configuration from an optional TOML file and the environment.
    ///
    /// Environment variables use the `CAMS3` prefix and `__` as the section
    /// separator, e.g. `CAMS3__MICROPHONE__SAMPLE_RATE_HZ=8000`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(CaptureError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            settings = settings.add_source(config::File::from(path));
        }

        settings = settings.add_source(
            config::Environment::with_prefix("CAMS3")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = settings
            .build()
            .map_err(|e| CaptureError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| CaptureError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.camera.jpeg_quality > 63 {
            return Err(CaptureError::Config(format!(
                "jpeg_quality {} out of range 0-63",
                self.camera.jpeg_quality
            )));
        }
        if self.camera.frame_buffer_count == 0 {
            return Err(CaptureError::Config(
                "frame_buffer_count must be at least 1".to_string(),
            ));
        }
        if self.microphone.sample_rate_hz == 0 {
            return Err(CaptureError::Config(
                "sample_rate_hz must be non-zero".to_string(),
            ));
        }
        if self.recording.chunk_samples == 0 {
            return Err(CaptureError::Config(
                "chunk_samples must be non-zero".to_string(),
            ));
        }
        if self.storage.image_prefix.is_empty() || self.storage.audio_prefix.is_empty() {
            return Err(CaptureError::Config(
                "file prefixes must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Mutex, MutexGuard};

    /// `load` reads the process environment; tests that call it take this lock
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn env_lock() -> MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[test]
    fn test_defaults_match_board() {
        let config = CaptureConfig::default();
        config.validate().unwrap();

        assert_eq!(config.microphone.sample_rate_hz, 16_000);
        assert_eq!(config.microphone.bit_depth, BitDepth::Bits16);
        assert_eq!(config.storage.spi_frequency_hz, 40_000_000);
        assert_eq!(config.recording.chunk_samples, 1024);
        assert_eq!(config.recording.grace_ms, 1000);

        let cam = config.camera.driver_config();
        assert_eq!(cam.pins.xclk, 11);
        assert_eq!(cam.fb_count, 2);
        assert_eq!(config.microphone.driver_config().clk_pin, 47);
        assert_eq!(config.storage.bus_config().cs, 9);
    }

    #[test]
    fn test_load_from_toml() {
        let _env = env_lock();
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[camera]
frame_size = "uxga"
jpeg_quality = 10

[microphone]
sample_rate_hz = 8000
bit_depth = 32

[storage]
image_prefix = "PIC"
"#
        )
        .unwrap();

        let config = CaptureConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.camera.frame_size, FrameSize::Uxga);
        assert_eq!(config.camera.jpeg_quality, 10);
        assert_eq!(config.camera.pixel_format, PixelFormat::Jpeg);
        assert_eq!(config.microphone.sample_rate_hz, 8000);
        assert_eq!(config.microphone.bit_depth, BitDepth::Bits32);
        assert_eq!(config.storage.image_prefix, "PIC");
        assert_eq!(config.storage.audio_prefix, "REC");
    }

    #[test]
    fn test_load_rejects_bad_bit_depth() {
        let _env = env_lock();
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[microphone]\nbit_depth = 24").unwrap();
        assert!(CaptureConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let _env = env_lock();
        let err = CaptureConfig::load(Some(Path::new("/nonexistent/cams3.toml"))).unwrap_err();
        assert!(matches!(err, CaptureError::Config(_)));
    }

    #[test]
    fn test_environment_overrides_defaults() {
        let _env = env_lock();
        std::env::set_var("CAMS3__MICROPHONE__SAMPLE_RATE_HZ", "8000");
        std::env::set_var("CAMS3__STORAGE__IMAGE_PREFIX", "PIC");

        let loaded = CaptureConfig::load(None);

        std::env::remove_var("CAMS3__MICROPHONE__SAMPLE_RATE_HZ");
        std::env::remove_var("CAMS3__STORAGE__IMAGE_PREFIX");

        let config = loaded.unwrap();
        assert_eq!(config.microphone.sample_rate_hz, 8000);
        assert_eq!(config.storage.image_prefix, "PIC");
        assert_eq!(config.storage.audio_prefix, "REC");
        assert_eq!(config.microphone.bit_depth, BitDepth::Bits16);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = CaptureConfig::default();
        config.camera.jpeg_quality = 64;
        assert!(config.validate().is_err());

        let mut config = CaptureConfig::default();
        config.recording.chunk_samples = 0;
        assert!(config.validate().is_err());
    }
}
