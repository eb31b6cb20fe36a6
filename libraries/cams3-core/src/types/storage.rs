//! Storage types for the SD card volume

use std::fmt;

/// Type of card detected in the slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CardType {
    /// No card attached
    #[default]
    None,
    Mmc,
    Sd,
    Sdhc,
}

impl CardType {
    pub fn name(&self) -> &'static str {
        match self {
            CardType::Mmc => "MMC",
            CardType::Sd => "SD",
            CardType::Sdhc => "SDHC",
            CardType::None => "Unknown",
        }
    }

    pub fn is_present(&self) -> bool {
        !matches!(self, CardType::None)
    }
}

impl fmt::Display for CardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a file is opened for writing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Create or truncate
    Truncate,
    /// Create or append at end
    Append,
}

/// SPI transport settings for the card slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiBusConfig {
    pub sck: u8,
    pub miso: u8,
    pub mosi: u8,
    pub cs: u8,
    pub frequency_hz: u32,
}

/// One entry of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Absolute path on the volume (e.g. `/DCIM/IMG_1.jpg`)
    pub path: String,
    pub is_dir: bool,
    /// Size in bytes (0 for directories)
    pub size: u64,
}

impl DirEntry {
    pub fn file(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
            size,
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
            size: 0,
        }
    }

    /// Last path component
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}
