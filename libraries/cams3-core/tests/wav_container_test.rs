//! WAV container tests
//!
//! The encoder output is parsed back both by our own header parser and by `hound`,
//! an independent WAV implementation, so layout mistakes cannot hide behind a
//! symmetric encode/decode bug.

use cams3_core::types::{BitDepth, SampleBuffer};
use cams3_core::wav::{self, WavHeader, HEADER_LEN};
use proptest::prelude::*;
use std::io::Cursor;

// ===== Helpers =====

fn alternating(count: usize, amplitude: i32) -> Vec<i32> {
    (0..count)
        .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
        .collect()
}

// ===== Concrete scenarios =====

#[test]
fn one_second_16khz_16bit_file_is_32044_bytes() {
    let buffer = SampleBuffer::from_samples(&[0; 16_000], 16_000, BitDepth::Bits16);
    let bytes = wav::encode(&buffer).unwrap();

    assert_eq!(bytes.len(), 32_044);

    let header = WavHeader::parse(&bytes).unwrap();
    assert_eq!(header.data_size, 32_000);
    assert_eq!(header.chunk_size(), 32_036);
    assert_eq!(header.sample_rate, 16_000);
    assert_eq!(header.channels, 1);
}

#[test]
fn hound_reads_16bit_samples_back() {
    let samples = alternating(100, 1000);
    let buffer = SampleBuffer::from_samples(&samples, 16_000, BitDepth::Bits16);
    let bytes = wav::encode(&buffer).unwrap();

    let mut reader = hound::WavReader::new(Cursor::new(bytes)).expect("hound accepts header");
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, 16_000);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(spec.sample_format, hound::SampleFormat::Int);

    let decoded: Vec<i32> = reader
        .samples::<i16>()
        .map(|s| i32::from(s.unwrap()))
        .collect();
    assert_eq!(decoded, samples);
}

#[test]
fn hound_reads_32bit_samples_back() {
    let samples = vec![i32::MIN, -1, 0, 1, i32::MAX, 123_456_789];
    let buffer = SampleBuffer::from_samples(&samples, 48_000, BitDepth::Bits32);
    let bytes = wav::encode(&buffer).unwrap();

    let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
    assert_eq!(reader.spec().bits_per_sample, 32);
    assert_eq!(reader.duration(), samples.len() as u32);

    let decoded: Vec<i32> = reader.samples::<i32>().map(Result::unwrap).collect();
    assert_eq!(decoded, samples);
}

#[test]
fn payload_follows_header_immediately() {
    let buffer = SampleBuffer::from_samples(&[0x0102, -2], 16_000, BitDepth::Bits16);
    let bytes = wav::encode(&buffer).unwrap();

    assert_eq!(&bytes[HEADER_LEN..], &[0x02, 0x01, 0xFE, 0xFF]);
}

// ===== Property tests =====

proptest! {
    /// Property: header fields follow the PCM size arithmetic for any 16-bit recording
    #[test]
    fn header_arithmetic_16bit(rate in 8_000u32..=96_000, count in 0usize..50_000) {
        let header = WavHeader::mono(rate, BitDepth::Bits16, count).unwrap();
        let parsed = WavHeader::parse(&header.to_bytes()).unwrap();

        prop_assert_eq!(parsed, header);
        prop_assert_eq!(parsed.chunk_size() as usize, 36 + 2 * count);
        prop_assert_eq!(parsed.data_size as usize, 2 * count);
        prop_assert_eq!(parsed.byte_rate(), rate * 2);
        prop_assert_eq!(parsed.block_align(), 2);
    }

    /// Property: encoded length is always header + samples * bytes-per-sample
    #[test]
    fn encoded_length_matches_header(
        samples in prop::collection::vec(any::<i16>(), 0..2_000),
        wide in any::<bool>(),
    ) {
        let depth = if wide { BitDepth::Bits32 } else { BitDepth::Bits16 };
        let widened: Vec<i32> = samples.iter().map(|&s| i32::from(s)).collect();
        let buffer = SampleBuffer::from_samples(&widened, 16_000, depth);

        let bytes = wav::encode(&buffer).unwrap();
        let header = WavHeader::parse(&bytes).unwrap();

        prop_assert_eq!(bytes.len(), HEADER_LEN + samples.len() * depth.bytes_per_sample());
        prop_assert_eq!(header.file_len(), bytes.len());
    }
}
