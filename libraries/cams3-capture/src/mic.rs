//! Audio source: PDM channel lifecycle, bounded reads, and fixed-duration recording.
//!
//! Every read is bounded by a timeout, and `record_duration` is bounded by a
//! wall-clock deadline of `duration + grace`. A stalled or under-delivering channel
//! therefore yields a short recording instead of a hang.

use crate::analysis;
use crate::config::{MicrophoneSettings, RecordingSettings};
use crate::peripheral::PeripheralHandle;
use cams3_core::{
    BitDepth, CaptureError, Clock, DriverError, PdmDriver, Peripheral, PeripheralState, Result,
    SampleBuffer,
};
use tracing::{debug, info, warn};

fn hardware(e: DriverError) -> CaptureError {
    CaptureError::hardware(Peripheral::Microphone, e)
}

/// Outcome of a fixed-duration recording
#[derive(Debug)]
pub struct Recording {
    /// Captured samples; may hold fewer than `target_samples`
    pub buffer: SampleBuffer,
    /// `sample_rate * duration_ms / 1000`
    pub target_samples: usize,
    /// Wall-clock time spent in the capture loop
    pub elapsed_ms: u64,
}

impl Recording {
    pub fn captured(&self) -> usize {
        self.buffer.len()
    }

    /// Deadline hit before the target count was reached
    pub fn is_short(&self) -> bool {
        self.buffer.len() < self.target_samples
    }

    pub fn into_buffer(self) -> SampleBuffer {
        self.buffer
    }
}

/// Owns the PDM receive channel
pub struct AudioSource<D: PdmDriver, C: Clock> {
    handle: PeripheralHandle<D>,
    clock: C,
    sample_rate: u32,
    bit_depth: BitDepth,
    timing: RecordingSettings,
    scratch: Vec<u8>,
}

impl<D: PdmDriver, C: Clock> AudioSource<D, C> {
    pub fn new(driver: D, clock: C) -> Self {
        let defaults = MicrophoneSettings::default();
        Self {
            handle: PeripheralHandle::new(Peripheral::Microphone, driver),
            clock,
            sample_rate: defaults.sample_rate_hz,
            bit_depth: defaults.bit_depth,
            timing: RecordingSettings::default(),
            scratch: Vec::new(),
        }
    }

    /// Override chunking and timeouts of the recording loop
    pub fn with_timing(mut self, timing: RecordingSettings) -> Self {
        self.timing = timing;
        self
    }

    pub fn state(&self) -> PeripheralState {
        self.handle.state()
    }

    pub fn is_initialized(&self) -> bool {
        self.handle.is_ready()
    }

    pub fn require_ready(&self) -> Result<()> {
        self.handle.require_ready()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    /// Create, configure, and enable the PDM channel.
    ///
    /// Idempotent while `Ready`. If configuring or enabling fails, the channel is
    /// deleted again before the error is returned.
    pub fn initialize(&mut self, sample_rate: u32, bit_depth: BitDepth) -> Result<()> {
        if self.handle.is_ready() {
            return Ok(());
        }
        if sample_rate == 0 {
            return Err(CaptureError::invalid_input("sample rate must be non-zero"));
        }

        let config = MicrophoneSettings {
            sample_rate_hz: sample_rate,
            bit_depth,
        }
        .driver_config();

        self.handle.initialize_with(|driver| {
            driver.create_channel().map_err(hardware)?;

            let configured = match driver.configure(&config) {
                Ok(()) => driver.enable(),
                Err(e) => Err(e),
            };
            if let Err(e) = configured {
                driver.delete_channel();
                return Err(hardware(e));
            }
            Ok(())
        })?;

        self.sample_rate = sample_rate;
        self.bit_depth = bit_depth;
        info!(
            sample_rate,
            bits = bit_depth.bits(),
            "microphone initialized"
        );
        Ok(())
    }

    /// Single bounded read of raw little-endian PCM bytes
    pub fn read_bytes(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize> {
        let driver = self.handle.ready_driver_mut()?;
        let read = driver.read(buf, timeout_ms).map_err(hardware)?;
        Ok(read.min(buf.len()))
    }

    /// Single bounded read of up to `out.len()` samples.
    ///
    /// Returns fewer samples than requested when the timeout elapses first.
    pub fn read_samples(&mut self, out: &mut [i32], timeout_ms: u32) -> Result<usize> {
        let driver = self.handle.ready_driver_mut()?;

        let want = out.len() * self.bit_depth.bytes_per_sample();
        self.scratch.resize(want, 0);
        let read = driver
            .read(&mut self.scratch[..want], timeout_ms)
            .map_err(hardware)?;

        Ok(self.bit_depth.decode_le(&self.scratch[..read.min(want)], out))
    }

    /// Number of samples a recording of `duration_ms` aims for
    pub fn target_samples(&self, duration_ms: u32) -> Result<usize> {
        let target = u64::from(self.sample_rate) * u64::from(duration_ms) / 1000;
        usize::try_from(target)
            .map_err(|_| CaptureError::exhausted(format!("{target} samples do not fit in memory")))
    }

    /// Record `duration_ms` of audio.
    ///
    /// Reads in chunks of at most `chunk_samples` until the target count is reached
    /// or `duration_ms + grace_ms` has passed, whichever comes first. Each read's
    /// timeout is capped to the time left before the deadline. Failed reads are
    /// retried until the deadline. The returned buffer holds only the samples
    /// actually captured.
    pub fn record_duration(&mut self, duration_ms: u32) -> Result<Recording> {
        self.handle.require_ready()?;

        let target = self.target_samples(duration_ms)?;
        let width = self.bit_depth.bytes_per_sample();
        let target_bytes = target.checked_mul(width).ok_or_else(|| {
            CaptureError::exhausted(format!("{target} samples do not fit in memory"))
        })?;
        let mut pcm: Vec<u8> = Vec::new();
        pcm.try_reserve_exact(target_bytes).map_err(|_| {
            CaptureError::exhausted(format!("sample buffer of {target} samples"))
        })?;
        pcm.resize(target_bytes, 0);

        let chunk = self.timing.chunk_samples.max(1);
        let start = self.clock.millis();
        let deadline = start + u64::from(duration_ms) + u64::from(self.timing.grace_ms);
        let mut filled = 0;
        let mut failed_reads = 0u32;

        while filled < target {
            let now = self.clock.millis();
            if now >= deadline {
                warn!(
                    captured = filled,
                    target,
                    "recording deadline reached before target"
                );
                break;
            }

            let remaining = u32::try_from(deadline - now).unwrap_or(u32::MAX);
            let timeout = self.timing.read_timeout_ms.min(remaining);
            let want = (target - filled).min(chunk);

            match self.read_bytes(&mut pcm[filled * width..(filled + want) * width], timeout) {
                // a trailing partial sample is overwritten by the next read
                Ok(n) => filled += n / width,
                Err(e) => {
                    failed_reads += 1;
                    debug!(error = %e, "bounded read failed");
                }
            }
        }

        pcm.truncate(filled * width);
        let elapsed_ms = self.clock.millis().saturating_sub(start);
        info!(
            captured = filled,
            target,
            elapsed_ms,
            failed_reads,
            "recording finished"
        );

        Ok(Recording {
            buffer: SampleBuffer::from_pcm_le(pcm, self.sample_rate, self.bit_depth),
            target_samples: target,
            elapsed_ms,
        })
    }

    /// One bounded read of `count` samples for the level meters
    fn level_window(&mut self, count: usize) -> Option<Vec<i32>> {
        if !self.handle.is_ready() || count == 0 {
            return None;
        }

        let mut window = Vec::new();
        if window.try_reserve_exact(count).is_err() {
            warn!(count, "level window allocation failed");
            return None;
        }
        window.resize(count, 0);

        match self.read_samples(&mut window, self.timing.level_timeout_ms) {
            Ok(n) => {
                window.truncate(n);
                Some(window)
            }
            Err(e) => {
                debug!(error = %e, "level read failed");
                None
            }
        }
    }

    /// Largest absolute sample in a fresh window of `count` samples; 0 on failure
    pub fn peak_amplitude(&mut self, count: usize) -> u32 {
        self.level_window(count)
            .map_or(0, |window| analysis::peak_amplitude(&window))
    }

    /// Rounded RMS of a fresh window of `count` samples; 0 on failure
    pub fn rms_level(&mut self, count: usize) -> u32 {
        self.level_window(count)
            .map_or(0, |window| analysis::rms_level(&window))
    }

    pub fn is_sound_detected(&mut self, threshold: u32, count: usize) -> bool {
        self.peak_amplitude(count) > threshold
    }

    /// Disable and delete the channel. Safe to call repeatedly.
    pub fn teardown(&mut self) -> Result<()> {
        self.handle.teardown_with(|driver| {
            if let Err(e) = driver.disable() {
                warn!(error = %e, "disabling PDM channel failed; deleting anyway");
            }
            driver.delete_channel();
            Ok(())
        })?;
        self.scratch = Vec::new();
        Ok(())
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn driver(&self) -> &D {
        self.handle.driver()
    }

    pub fn driver_mut(&mut self) -> &mut D {
        self.handle.driver_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{ManualClock, Signal, SimPdm};
    use cams3_core::ErrorKind;

    fn source(pdm: SimPdm, clock: &ManualClock) -> AudioSource<SimPdm, ManualClock> {
        AudioSource::new(pdm.with_clock(clock.clone()), clock.clone())
    }

    fn ready(signal: Signal) -> (AudioSource<SimPdm, ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let mut mic = source(SimPdm::new(signal), &clock);
        mic.initialize(16_000, BitDepth::Bits16).unwrap();
        (mic, clock)
    }

    #[test]
    fn test_initialize_configures_board_pins() {
        let (mic, _) = ready(Signal::Silence);
        let config = mic.driver().config().unwrap();

        assert_eq!(config.sample_rate_hz, 16_000);
        assert_eq!(config.clk_pin, 47);
        assert_eq!(config.data_pin, 48);
        assert!(mic.driver().is_enabled());
    }

    #[test]
    fn test_enable_failure_deletes_channel() {
        let clock = ManualClock::new();
        let mut mic = source(SimPdm::new(Signal::Silence).fail_enable(DriverError::FAIL), &clock);

        let err = mic.initialize(16_000, BitDepth::Bits16).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HardwareFault);
        assert_eq!(mic.state(), PeripheralState::Failed);
        assert!(!mic.driver().channel_open());
        assert_eq!(mic.driver().created(), 1);
        assert_eq!(mic.driver().deleted(), 1);
    }

    #[test]
    fn test_configure_failure_deletes_channel() {
        let clock = ManualClock::new();
        let mut mic = source(
            SimPdm::new(Signal::Silence).fail_configure(DriverError::INVALID_ARG),
            &clock,
        );

        assert!(mic.initialize(16_000, BitDepth::Bits32).is_err());
        assert!(!mic.driver().channel_open());
    }

    #[test]
    fn test_zero_rate_rejected_without_touching_driver() {
        let clock = ManualClock::new();
        let mut mic = source(SimPdm::new(Signal::Silence), &clock);

        let err = mic.initialize(0, BitDepth::Bits16).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(mic.driver().created(), 0);
        assert_eq!(mic.state(), PeripheralState::Uninitialized);
    }

    #[test]
    fn test_read_requires_ready() {
        let clock = ManualClock::new();
        let mut mic = source(SimPdm::new(Signal::Constant(5)), &clock);
        let mut out = [0i32; 8];

        let err = mic.read_samples(&mut out, 100).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotInitialized);
        assert_eq!(mic.peak_amplitude(8), 0);
        assert_eq!(mic.rms_level(8), 0);
    }

    #[test]
    fn test_read_bytes() {
        let clock = ManualClock::new();
        let mut idle = source(SimPdm::new(Signal::Alternating(1000)), &clock);
        let mut buf = [0u8; 7];
        let err = idle.read_bytes(&mut buf, 100).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotInitialized);

        // 7 bytes hold three whole 16-bit samples
        let (mut mic, _) = ready(Signal::Alternating(1000));
        let n = mic.read_bytes(&mut buf, 100).unwrap();
        assert!(n <= buf.len());
        assert_eq!(n, 6);
        assert_eq!(&buf[..n], &[0xE8, 0x03, 0x18, 0xFC, 0xE8, 0x03]);
    }

    #[test]
    fn test_read_samples_decodes_signal() {
        let (mut mic, _) = ready(Signal::Alternating(1000));
        let mut out = [0i32; 4];

        assert_eq!(mic.read_samples(&mut out, 100).unwrap(), 4);
        assert_eq!(out, [1000, -1000, 1000, -1000]);
    }

    #[test]
    fn test_record_one_second() {
        let (mut mic, _) = ready(Signal::Constant(7));
        let recording = mic.record_duration(1000).unwrap();

        assert_eq!(recording.target_samples, 16_000);
        assert_eq!(recording.captured(), 16_000);
        assert!(!recording.is_short());
        assert!(recording.buffer.iter().all(|s| s == 7));
        assert_eq!(recording.buffer.pcm_le().len(), 32_000);
        assert!(mic.driver().max_read_samples() <= 1024);
    }

    #[test]
    fn test_record_zero_duration() {
        let (mut mic, _) = ready(Signal::Constant(7));
        let recording = mic.record_duration(0).unwrap();

        assert_eq!(recording.target_samples, 0);
        assert!(recording.buffer.is_empty());
        assert_eq!(mic.driver().read_calls(), 0);
    }

    #[test]
    fn test_stalled_channel_stops_at_deadline() {
        let clock = ManualClock::new();
        let mut mic = source(SimPdm::new(Signal::Constant(1)).stall_after(4000), &clock);
        mic.initialize(16_000, BitDepth::Bits16).unwrap();

        let recording = mic.record_duration(1000).unwrap();
        assert_eq!(recording.captured(), 4000);
        assert!(recording.is_short());
        assert!(recording.elapsed_ms <= 2000);
        assert!(clock.millis() <= 2000);
    }

    #[test]
    fn test_failing_reads_still_terminate() {
        let clock = ManualClock::new();
        let mut mic = source(SimPdm::new(Signal::Constant(1)).fail_reads(true), &clock);
        mic.initialize(8_000, BitDepth::Bits16).unwrap();

        let recording = mic.record_duration(500).unwrap();
        assert!(recording.buffer.is_empty());
        assert!(recording.elapsed_ms <= 1500);
    }

    #[test]
    fn test_levels() {
        let (mut mic, _) = ready(Signal::Alternating(1000));
        assert_eq!(mic.peak_amplitude(256), 1000);
        assert_eq!(mic.rms_level(256), 1000);
        assert!(mic.is_sound_detected(500, 256));
        assert!(!mic.is_sound_detected(1000, 256));

        let (mut quiet, _) = ready(Signal::Silence);
        assert_eq!(quiet.peak_amplitude(256), 0);
        assert!(!quiet.is_sound_detected(0, 256));
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let (mut mic, _) = ready(Signal::Silence);
        mic.teardown().unwrap();
        mic.teardown().unwrap();

        assert_eq!(mic.state(), PeripheralState::Uninitialized);
        assert!(!mic.driver().channel_open());
        assert_eq!(mic.driver().deleted(), 1);
    }

    #[test]
    fn test_teardown_survives_disable_failure() {
        let (mut mic, _) = ready(Signal::Silence);
        mic.driver_mut().set_disable_error(Some(DriverError::INVALID_STATE));

        mic.teardown().unwrap();
        assert!(!mic.driver().channel_open());
    }
}
