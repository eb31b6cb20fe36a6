//! Canonical PCM WAV container
//!
//! Produces the classic 44-byte RIFF header (`RIFF`/`WAVE`/`fmt `/`data`, all
//! little-endian) followed immediately by the PCM payload. Only uncompressed PCM
//! (`AudioFormat = 1`) is written.

use crate::error::{CaptureError, Result};
use crate::types::{BitDepth, SampleBuffer};

/// Size of the canonical header in bytes
pub const HEADER_LEN: usize = 44;

/// `fmt ` chunk size for PCM
const FMT_CHUNK_SIZE: u32 = 16;

/// PCM audio format tag
const FORMAT_PCM: u16 = 1;

/// Fields of a canonical PCM WAV header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Size of the PCM payload in bytes (`Subchunk2Size`)
    pub data_size: u32,
}

impl WavHeader {
    /// Header for `sample_count` mono samples
    ///
    /// # Errors
    /// Returns an error if the payload would not fit the 32-bit RIFF size fields.
    pub fn mono(sample_rate: u32, bit_depth: BitDepth, sample_count: usize) -> Result<Self> {
        let data_size = sample_count
            .checked_mul(bit_depth.bytes_per_sample())
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| n.checked_add(36).is_some())
            .ok_or_else(|| {
                CaptureError::InvalidContainer(format!(
                    "{sample_count} samples exceed the RIFF size limit"
                ))
            })?;

        Ok(Self {
            channels: 1,
            sample_rate,
            bits_per_sample: bit_depth.bits(),
            data_size,
        })
    }

    /// `ChunkSize` field: everything after the first 8 bytes
    pub fn chunk_size(&self) -> u32 {
        self.data_size.saturating_add(36)
    }

    pub fn bytes_per_sample(&self) -> u16 {
        self.bits_per_sample / 8
    }

    /// `ByteRate = SampleRate * NumChannels * BytesPerSample`
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate
            .saturating_mul(u32::from(self.channels) * u32::from(self.bytes_per_sample()))
    }

    /// `BlockAlign = NumChannels * BytesPerSample`
    pub fn block_align(&self) -> u16 {
        self.channels.saturating_mul(self.bytes_per_sample())
    }

    /// Total file length (header + payload)
    pub fn file_len(&self) -> usize {
        HEADER_LEN + self.data_size as usize
    }

    /// Serialize to the 44-byte on-disk layout
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(b"RIFF");
        out[4..8].copy_from_slice(&self.chunk_size().to_le_bytes());
        out[8..12].copy_from_slice(b"WAVE");

        out[12..16].copy_from_slice(b"fmt ");
        out[16..20].copy_from_slice(&FMT_CHUNK_SIZE.to_le_bytes());
        out[20..22].copy_from_slice(&FORMAT_PCM.to_le_bytes());
        out[22..24].copy_from_slice(&self.channels.to_le_bytes());
        out[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        out[28..32].copy_from_slice(&self.byte_rate().to_le_bytes());
        out[32..34].copy_from_slice(&self.block_align().to_le_bytes());
        out[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());

        out[36..40].copy_from_slice(b"data");
        out[40..44].copy_from_slice(&self.data_size.to_le_bytes());
        out
    }

    /// Parse a canonical header back from the first 44 bytes of `bytes`
    ///
    /// # Errors
    /// Returns an error if the chunk tags, format tag, or size fields are inconsistent.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(CaptureError::InvalidContainer(format!(
                "header needs {HEADER_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        let tag = |at: usize, expected: &[u8; 4]| -> Result<()> {
            if &bytes[at..at + 4] == expected {
                Ok(())
            } else {
                Err(CaptureError::InvalidContainer(format!(
                    "expected {:?} at offset {at}",
                    String::from_utf8_lossy(expected)
                )))
            }
        };
        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let u32_at =
            |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

        tag(0, b"RIFF")?;
        tag(8, b"WAVE")?;
        tag(12, b"fmt ")?;
        tag(36, b"data")?;

        if u32_at(16) != FMT_CHUNK_SIZE || u16_at(20) != FORMAT_PCM {
            return Err(CaptureError::InvalidContainer(
                "not a canonical PCM fmt chunk".to_string(),
            ));
        }

        let header = Self {
            channels: u16_at(22),
            sample_rate: u32_at(24),
            bits_per_sample: u16_at(34),
            data_size: u32_at(40),
        };

        if u32_at(4) != header.chunk_size()
            || u32_at(28) != header.byte_rate()
            || u16_at(32) != header.block_align()
        {
            return Err(CaptureError::InvalidContainer(
                "derived size fields do not match".to_string(),
            ));
        }

        Ok(header)
    }
}

/// Encode a sample buffer as a complete WAV file image (header + PCM payload)
///
/// # Errors
/// Returns an error if the buffer is too large for a RIFF container.
pub fn encode(buffer: &SampleBuffer) -> Result<Vec<u8>> {
    let header = WavHeader::mono(buffer.sample_rate(), buffer.bit_depth(), buffer.len())?;

    let mut out = Vec::new();
    out.try_reserve_exact(header.file_len())
        .map_err(|_| CaptureError::exhausted(format!("{} byte WAV image", header.file_len())))?;
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(buffer.pcm_le());

    debug_assert_eq!(out.len(), header.file_len());
    Ok(out)
}
