//! Level reductions over PCM sample windows

/// Maximum absolute sample value.
///
/// Returns 0 for an empty window.
pub fn peak_amplitude(samples: &[i32]) -> u32 {
    samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0)
}

/// Root mean square level, rounded to the nearest integer.
///
/// Squares are summed in a 128-bit accumulator so full-scale 32-bit windows
/// cannot overflow. Returns 0 for an empty window.
pub fn rms_level(samples: &[i32]) -> u32 {
    if samples.is_empty() {
        return 0;
    }

    let sum_squares: u128 = samples
        .iter()
        .map(|&s| {
            let m = u128::from(s.unsigned_abs());
            m * m
        })
        .sum();

    let mean = sum_squares as f64 / samples.len() as f64;
    mean.sqrt().round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_of_silence_is_zero() {
        assert_eq!(peak_amplitude(&[0; 256]), 0);
        assert_eq!(peak_amplitude(&[]), 0);
    }

    #[test]
    fn test_peak_of_alternating() {
        let window: Vec<i32> = (0..256)
            .map(|i| if i % 2 == 0 { 1000 } else { -1000 })
            .collect();
        assert_eq!(peak_amplitude(&window), 1000);
    }

    #[test]
    fn test_peak_handles_most_negative_sample() {
        assert_eq!(peak_amplitude(&[i32::from(i16::MIN), 5]), 32768);
        assert_eq!(peak_amplitude(&[i32::MIN]), 2_147_483_648);
    }

    #[test]
    fn test_rms() {
        assert_eq!(rms_level(&[]), 0);
        assert_eq!(rms_level(&[1000, -1000, 1000, -1000]), 1000);
        // sqrt((9 + 16) / 2) = 3.535.. -> 4
        assert_eq!(rms_level(&[3, 4]), 4);
        assert_eq!(rms_level(&[i32::MIN; 8]), 2_147_483_648);
    }
}
