//! Audio types for PDM capture

use crate::error::CaptureError;
use serde::{Deserialize, Serialize};

/// Sample width delivered by the PDM channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum BitDepth {
    #[default]
    Bits16,
    Bits32,
}

impl BitDepth {
    pub fn bits(&self) -> u16 {
        match self {
            BitDepth::Bits16 => 16,
            BitDepth::Bits32 => 32,
        }
    }

    pub fn bytes_per_sample(&self) -> usize {
        match self {
            BitDepth::Bits16 => 2,
            BitDepth::Bits32 => 4,
        }
    }

    /// Decode little-endian PCM bytes into widened samples.
    ///
    /// Trailing bytes that do not form a whole sample are ignored.
    pub fn decode_le(&self, bytes: &[u8], out: &mut [i32]) -> usize {
        let width = self.bytes_per_sample();
        let mut count = 0;
        for (chunk, slot) in bytes.chunks_exact(width).zip(out.iter_mut()) {
            *slot = match self {
                BitDepth::Bits16 => i32::from(i16::from_le_bytes([chunk[0], chunk[1]])),
                BitDepth::Bits32 => i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
            };
            count += 1;
        }
        count
    }
}

impl TryFrom<u16> for BitDepth {
    type Error = CaptureError;

    fn try_from(bits: u16) -> Result<Self, Self::Error> {
        match bits {
            16 => Ok(BitDepth::Bits16),
            32 => Ok(BitDepth::Bits32),
            other => Err(CaptureError::invalid_input(format!(
                "unsupported bit depth {other} (must be 16 or 32)"
            ))),
        }
    }
}

impl From<BitDepth> for u16 {
    fn from(depth: BitDepth) -> Self {
        depth.bits()
    }
}

/// PDM receive channel configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdmConfig {
    pub sample_rate_hz: u32,
    pub bit_depth: BitDepth,
    pub clk_pin: u8,
    pub data_pin: u8,
    /// Number of DMA descriptors
    pub dma_desc_num: u32,
    /// Frames per DMA descriptor
    pub dma_frame_num: u32,
}

/// Mono PCM audio captured from the microphone.
///
/// Samples are held as signed little-endian PCM at the width they were captured
/// at, which is also the WAV payload layout. A 16-bit recording therefore costs
/// two bytes per sample. The buffer is an owned value: handing it to a consumer
/// transfers ownership, and dropping it releases the allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleBuffer {
    pcm: Vec<u8>,
    sample_rate: u32,
    bit_depth: BitDepth,
}

impl SampleBuffer {
    /// Wrap little-endian PCM bytes; a trailing partial sample is dropped
    pub fn from_pcm_le(mut pcm: Vec<u8>, sample_rate: u32, bit_depth: BitDepth) -> Self {
        let width = bit_depth.bytes_per_sample();
        pcm.truncate(pcm.len() / width * width);
        Self {
            pcm,
            sample_rate,
            bit_depth,
        }
    }

    /// Encode `samples` at `bit_depth`; 16-bit buffers keep the low 16 bits
    pub fn from_samples(samples: &[i32], sample_rate: u32, bit_depth: BitDepth) -> Self {
        let mut pcm = Vec::with_capacity(samples.len() * bit_depth.bytes_per_sample());
        for &s in samples {
            match bit_depth {
                BitDepth::Bits16 => pcm.extend_from_slice(&(s as i16).to_le_bytes()),
                BitDepth::Bits32 => pcm.extend_from_slice(&s.to_le_bytes()),
            }
        }
        Self {
            pcm,
            sample_rate,
            bit_depth,
        }
    }

    /// Raw payload: `len() * bit_depth.bytes_per_sample()` bytes
    pub fn pcm_le(&self) -> &[u8] {
        &self.pcm
    }

    /// Samples decoded back to `i32`
    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        let depth = self.bit_depth;
        self.pcm
            .chunks_exact(depth.bytes_per_sample())
            .map(move |chunk| match depth {
                BitDepth::Bits16 => i32::from(i16::from_le_bytes([chunk[0], chunk[1]])),
                BitDepth::Bits32 => i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]),
            })
    }

    pub fn len(&self) -> usize {
        self.pcm.len() / self.bit_depth.bytes_per_sample()
    }

    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    /// Channel count (the microphone is mono)
    pub fn channels(&self) -> u16 {
        1
    }

    /// Duration of the captured audio in milliseconds
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.len() as u64 * 1000 / u64::from(self.sample_rate)
    }
}
