use super::ManualClock;
use cams3_core::{BitDepth, DriverError, DriverResult, PdmConfig, PdmDriver};
use std::f64::consts::TAU;

/// Waveform produced by the simulated microphone
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Signal {
    Silence,
    Constant(i32),
    /// `+a, -a, +a, ...`
    Alternating(i32),
    /// Sine wave with the given amplitude and period in samples
    Tone { amplitude: i32, period: u32 },
}

impl Signal {
    /// Sample at absolute position `index`
    pub fn sample(&self, index: u64) -> i32 {
        match *self {
            Signal::Silence => 0,
            Signal::Constant(v) => v,
            Signal::Alternating(a) => {
                if index % 2 == 0 {
                    a
                } else {
                    -a
                }
            }
            Signal::Tone { amplitude, period } => {
                let phase = (index % u64::from(period.max(1))) as f64 / f64::from(period.max(1));
                (f64::from(amplitude) * (TAU * phase).sin()).round() as i32
            }
        }
    }
}

/// Simulated PDM receive channel.
///
/// With a clock attached, each read advances it by the audio time delivered, and
/// reads that deliver nothing advance it by their full timeout.
#[derive(Debug)]
pub struct SimPdm {
    signal: Signal,
    clock: Option<ManualClock>,
    config: Option<PdmConfig>,
    channel_open: bool,
    enabled: bool,
    create_error: Option<DriverError>,
    configure_error: Option<DriverError>,
    enable_error: Option<DriverError>,
    disable_error: Option<DriverError>,
    fail_reads: bool,
    stall_after: Option<u64>,
    max_per_read: Option<usize>,
    delivered: u64,
    pending_us: u64,
    created: u32,
    deleted: u32,
    read_calls: u32,
    max_read_samples: usize,
}

impl SimPdm {
    pub fn new(signal: Signal) -> Self {
        Self {
            signal,
            clock: None,
            config: None,
            channel_open: false,
            enabled: false,
            create_error: None,
            configure_error: None,
            enable_error: None,
            disable_error: None,
            fail_reads: false,
            stall_after: None,
            max_per_read: None,
            delivered: 0,
            pending_us: 0,
            created: 0,
            deleted: 0,
            read_calls: 0,
            max_read_samples: 0,
        }
    }

    pub fn with_clock(mut self, clock: ManualClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn fail_create(mut self, error: DriverError) -> Self {
        self.create_error = Some(error);
        self
    }

    pub fn fail_configure(mut self, error: DriverError) -> Self {
        self.configure_error = Some(error);
        self
    }

    pub fn fail_enable(mut self, error: DriverError) -> Self {
        self.enable_error = Some(error);
        self
    }

    /// Every read fails after waiting out its timeout
    pub fn fail_reads(mut self, fail: bool) -> Self {
        self.fail_reads = fail;
        self
    }

    /// Stop delivering after `samples` samples in total
    pub fn stall_after(mut self, samples: u64) -> Self {
        self.stall_after = Some(samples);
        self
    }

    /// Deliver at most `samples` per read
    pub fn short_reads(mut self, samples: usize) -> Self {
        self.max_per_read = Some(samples);
        self
    }

    pub fn set_disable_error(&mut self, error: Option<DriverError>) {
        self.disable_error = error;
    }

    pub fn config(&self) -> Option<&PdmConfig> {
        self.config.as_ref()
    }

    pub fn channel_open(&self) -> bool {
        self.channel_open
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn created(&self) -> u32 {
        self.created
    }

    pub fn deleted(&self) -> u32 {
        self.deleted
    }

    pub fn read_calls(&self) -> u32 {
        self.read_calls
    }

    /// Largest request seen by `read`, in samples
    pub fn max_read_samples(&self) -> usize {
        self.max_read_samples
    }

    pub fn samples_delivered(&self) -> u64 {
        self.delivered
    }

    fn wait(&self, millis: u32) {
        if let Some(clock) = &self.clock {
            clock.advance(u64::from(millis));
        }
    }

    /// Advance the clock by the play time of `samples` at `rate`
    fn elapse(&mut self, samples: usize, rate: u32) {
        let Some(clock) = &self.clock else {
            return;
        };
        self.pending_us += samples as u64 * 1_000_000 / u64::from(rate.max(1));
        clock.advance(self.pending_us / 1000);
        self.pending_us %= 1000;
    }
}

impl PdmDriver for SimPdm {
    fn create_channel(&mut self) -> DriverResult<()> {
        if let Some(error) = self.create_error {
            return Err(error);
        }
        if self.channel_open {
            return Err(DriverError::INVALID_STATE);
        }
        self.channel_open = true;
        self.created += 1;
        Ok(())
    }

    fn configure(&mut self, config: &PdmConfig) -> DriverResult<()> {
        if !self.channel_open {
            return Err(DriverError::INVALID_STATE);
        }
        if let Some(error) = self.configure_error {
            return Err(error);
        }
        self.config = Some(*config);
        Ok(())
    }

    fn enable(&mut self) -> DriverResult<()> {
        if !self.channel_open || self.config.is_none() {
            return Err(DriverError::INVALID_STATE);
        }
        if let Some(error) = self.enable_error {
            return Err(error);
        }
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> DriverResult<()> {
        if let Some(error) = self.disable_error {
            return Err(error);
        }
        if !self.enabled {
            return Err(DriverError::INVALID_STATE);
        }
        self.enabled = false;
        Ok(())
    }

    fn delete_channel(&mut self) {
        if self.channel_open {
            self.channel_open = false;
            self.enabled = false;
            self.deleted += 1;
        }
    }

    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> DriverResult<usize> {
        let Some(config) = self.config.filter(|_| self.enabled) else {
            return Err(DriverError::INVALID_STATE);
        };
        self.read_calls += 1;

        if self.fail_reads {
            self.wait(timeout_ms);
            return Err(DriverError::FAIL);
        }

        let width = config.bit_depth.bytes_per_sample();
        let requested = buf.len() / width;
        self.max_read_samples = self.max_read_samples.max(requested);

        let mut count = requested;
        if let Some(max) = self.max_per_read {
            count = count.min(max);
        }
        if let Some(limit) = self.stall_after {
            let left = usize::try_from(limit.saturating_sub(self.delivered)).unwrap_or(usize::MAX);
            count = count.min(left);
        }

        if count == 0 {
            self.wait(timeout_ms);
            return Ok(0);
        }

        for (i, chunk) in buf.chunks_exact_mut(width).take(count).enumerate() {
            let sample = self.signal.sample(self.delivered + i as u64);
            match config.bit_depth {
                BitDepth::Bits16 => {
                    let clamped = sample.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
                    chunk.copy_from_slice(&clamped.to_le_bytes());
                }
                BitDepth::Bits32 => chunk.copy_from_slice(&sample.to_le_bytes()),
            }
        }

        self.delivered += count as u64;
        self.elapse(count, config.sample_rate_hz);
        Ok(count * width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_is_bounded() {
        let tone = Signal::Tone {
            amplitude: 1000,
            period: 16,
        };
        assert_eq!(tone.sample(0), 0);
        assert_eq!(tone.sample(4), 1000);
        assert_eq!(tone.sample(12), -1000);
        assert!((0..64).all(|i| tone.sample(i).abs() <= 1000));
    }
}
