//! Camera types: frame geometry, sensor identity, and frame buffers

use serde::{Deserialize, Serialize};
use std::fmt;

/// Output resolution of the image sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FrameSize {
    /// 160x120
    Qqvga,
    /// 320x240
    Qvga,
    /// 400x296
    Cif,
    /// 480x320
    Hvga,
    /// 640x480
    #[default]
    Vga,
    /// 800x600
    Svga,
    /// 1024x768
    Xga,
    /// 1280x720
    Hd,
    /// 1280x1024
    Sxga,
    /// 1600x1200
    Uxga,
    /// 1920x1080
    Fhd,
    /// 2048x1536
    Qxga,
    /// 2560x1920 (full 5MP)
    Qsxga,
}

impl FrameSize {
    /// Width and height in pixels
    pub fn dimensions(&self) -> (u16, u16) {
        match self {
            FrameSize::Qqvga => (160, 120),
            FrameSize::Qvga => (320, 240),
            FrameSize::Cif => (400, 296),
            FrameSize::Hvga => (480, 320),
            FrameSize::Vga => (640, 480),
            FrameSize::Svga => (800, 600),
            FrameSize::Xga => (1024, 768),
            FrameSize::Hd => (1280, 720),
            FrameSize::Sxga => (1280, 1024),
            FrameSize::Uxga => (1600, 1200),
            FrameSize::Fhd => (1920, 1080),
            FrameSize::Qxga => (2048, 1536),
            FrameSize::Qsxga => (2560, 1920),
        }
    }
}

/// Pixel encoding produced by the sensor pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// JPEG stream encoded by the sensor/driver
    #[default]
    Jpeg,
    Rgb565,
    Yuv422,
    Grayscale,
}

impl PixelFormat {
    /// File extension conventionally used for frames in this encoding
    pub fn extension(&self) -> &'static str {
        match self {
            PixelFormat::Jpeg => "jpg",
            PixelFormat::Rgb565 | PixelFormat::Yuv422 | PixelFormat::Grayscale => "raw",
        }
    }
}

/// Known image sensor models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SensorModel {
    Ov5640,
    Ov3660,
    Ov2640,
    #[default]
    Unknown,
}

impl SensorModel {
    /// OV5640 product ID
    pub const OV5640_PID: u16 = 0x5640;
    /// OV3660 product ID
    pub const OV3660_PID: u16 = 0x3660;
    /// OV2640 product ID (as reported over SCCB at bring-up)
    pub const OV2640_PID: u16 = 0x26;

    /// Classify a sensor from its product ID
    pub fn from_pid(pid: u16) -> Self {
        match pid {
            Self::OV5640_PID => SensorModel::Ov5640,
            Self::OV3660_PID => SensorModel::Ov3660,
            Self::OV2640_PID => SensorModel::Ov2640,
            _ => SensorModel::Unknown,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SensorModel::Ov5640 => "OV5640",
            SensorModel::Ov3660 => "OV3660",
            SensorModel::Ov2640 => "OV2640",
            SensorModel::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for SensorModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single register-level sensor adjustment forwarded to the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorSetting {
    FrameSize(FrameSize),
    /// JPEG quality 0-63, lower is better
    Quality(u8),
    VerticalFlip(bool),
    HorizontalMirror(bool),
    /// -2..=2
    Brightness(i8),
    /// -2..=2
    Saturation(i8),
    /// -2..=2
    Contrast(i8),
    SpecialEffect(u8),
    WhiteBalance(bool),
    ExposureControl(bool),
    GainControl(bool),
}

/// DVP and SCCB pin assignment for the image sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraPins {
    /// Power-down pin, if wired
    pub pwdn: Option<u8>,
    /// Reset pin, if wired
    pub reset: Option<u8>,
    pub xclk: u8,
    pub sccb_sda: u8,
    pub sccb_scl: u8,
    /// Data lines D0..D7
    pub data: [u8; 8],
    pub vsync: u8,
    pub href: u8,
    pub pclk: u8,
}

/// Driver configuration for camera bring-up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraConfig {
    pub pins: CameraPins,
    pub xclk_freq_hz: u32,
    pub frame_size: FrameSize,
    pub pixel_format: PixelFormat,
    /// JPEG quality 0-63, lower is better
    pub jpeg_quality: u8,
    /// Number of frame buffers in the driver pool
    pub fb_count: u8,
}

impl CameraConfig {
    /// Build a configuration, forcing a single frame buffer for non-JPEG formats.
    ///
    /// Uncompressed frames are large enough that a second PSRAM buffer does not fit.
    pub fn new(
        pins: CameraPins,
        xclk_freq_hz: u32,
        frame_size: FrameSize,
        pixel_format: PixelFormat,
        jpeg_quality: u8,
        fb_count: u8,
    ) -> Self {
        let fb_count = if pixel_format == PixelFormat::Jpeg {
            fb_count.max(1)
        } else {
            1
        };

        Self {
            pins,
            xclk_freq_hz,
            frame_size,
            pixel_format,
            jpeg_quality,
            fb_count,
        }
    }
}

/// A captured frame checked out of the driver's buffer pool.
///
/// Deliberately not `Clone`: a frame buffer is a pool slot, and it must go back
/// to the driver exactly once via `CameraDriver::frame_return`.
#[derive(Debug, PartialEq, Eq)]
pub struct FrameBuffer {
    slot: usize,
    data: Vec<u8>,
    width: u16,
    height: u16,
    format: PixelFormat,
}

impl FrameBuffer {
    /// Create a frame buffer for pool slot `slot`
    pub fn new(slot: usize, data: Vec<u8>, width: u16, height: u16, format: PixelFormat) -> Self {
        Self {
            slot,
            data,
            width,
            height,
            format,
        }
    }

    /// Pool slot this buffer occupies
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Raw bytes exactly as produced by the driver
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }
}
