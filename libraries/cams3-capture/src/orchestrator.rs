//! Capture orchestrator: image-to-file and audio-to-WAV pipelines.
//!
//! Owns one of each peripheral and sequences them. Every checked-out frame and
//! every sample buffer is released on all exit paths: frames through
//! `ImageSource::with_frame`, sample buffers by ownership (they are dropped as
//! soon as the WAV bytes exist).

use crate::camera::ImageSource;
use crate::config::CaptureConfig;
use crate::mic::AudioSource;
use crate::storage::BlockStore;
use cams3_core::{
    wav, CameraDriver, CaptureError, Clock, PdmDriver, Result, VolumeDriver,
};
use tracing::{info, warn};

/// The three CamS3 peripherals plus their settings
pub struct CaptureOrchestrator<C, P, V, K>
where
    C: CameraDriver,
    P: PdmDriver,
    V: VolumeDriver,
    K: Clock + Clone,
{
    camera: ImageSource<C>,
    mic: AudioSource<P, K>,
    store: BlockStore<V, K>,
    config: CaptureConfig,
}

impl<C, P, V, K> CaptureOrchestrator<C, P, V, K>
where
    C: CameraDriver,
    P: PdmDriver,
    V: VolumeDriver,
    K: Clock + Clone,
{
    pub fn new(camera: C, pdm: P, volume: V, clock: K, config: CaptureConfig) -> Self {
        Self::from_parts(
            ImageSource::new(camera),
            AudioSource::new(pdm, clock.clone()).with_timing(config.recording),
            BlockStore::new(volume, clock),
            config,
        )
    }

    /// Assemble from already-built sources (e.g. an `ImageSource` with an LED attached)
    pub fn from_parts(
        camera: ImageSource<C>,
        mic: AudioSource<P, K>,
        store: BlockStore<V, K>,
        config: CaptureConfig,
    ) -> Self {
        Self {
            camera,
            mic,
            store,
            config,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Bring up the camera, then the requested optional peripherals.
    ///
    /// The camera is mandatory: if it fails nothing else is attempted. Storage and
    /// audio are each attempted when requested; if either fails, the first error is
    /// returned but whatever did come up stays `Ready`.
    pub fn initialize_all(&mut self, enable_store: bool, enable_audio: bool) -> Result<()> {
        self.camera.initialize(&self.config.camera)?;

        let mut first_error = None;

        if enable_store {
            if let Err(e) = self.store.initialize(&self.config.storage) {
                warn!(error = %e, "storage unavailable");
                first_error.get_or_insert(e);
            }
        }

        if enable_audio {
            let mic = self.config.microphone;
            if let Err(e) = self.mic.initialize(mic.sample_rate_hz, mic.bit_depth) {
                warn!(error = %e, "microphone unavailable");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!(
                    sensor = %self.camera.sensor_model(),
                    storage = self.store.is_initialized(),
                    audio = self.mic.is_initialized(),
                    "capture pipeline ready"
                );
                Ok(())
            }
        }
    }

    /// Capture one frame and store its bytes unchanged.
    ///
    /// Writes to `path`, or to a generated `/IMG_<millis>_<n>.<ext>` name. The frame
    /// goes back to the pool whether or not the write succeeded. Returns the path.
    pub fn capture_image_to_store(&mut self, path: Option<&str>) -> Result<String> {
        self.camera.require_ready()?;
        self.store.require_ready()?;

        let store = &mut self.store;
        self.camera
            .with_frame(|frame| store.save_frame(frame, path))?
    }

    /// Record `duration_ms` of audio and store it as a WAV file.
    ///
    /// A recording with zero samples fails with `NoSamplesCaptured` before storage
    /// is touched. A short recording is stored as-is. Returns the path.
    pub fn record_audio_to_store(&mut self, path: Option<&str>, duration_ms: u32) -> Result<String> {
        self.mic.require_ready()?;
        self.store.require_ready()?;

        let recording = self.mic.record_duration(duration_ms)?;
        if recording.buffer.is_empty() {
            warn!(duration_ms, "recording captured no samples");
            return Err(CaptureError::NoSamplesCaptured);
        }
        if recording.is_short() {
            warn!(
                captured = recording.captured(),
                target = recording.target_samples,
                "storing short recording"
            );
        }

        let bytes = wav::encode(&recording.buffer)?;
        let duration = recording.buffer.duration_ms();
        drop(recording);

        let path = match path {
            Some(path) => path.to_string(),
            None => {
                let prefix = self.store.settings().audio_prefix.clone();
                self.store.generate_unique_name(&prefix, "wav")
            }
        };

        self.store.write_file(&path, &bytes)?;
        info!(path = %path, bytes = bytes.len(), duration_ms = duration, "recording saved");
        Ok(path)
    }

    /// Tear down every peripheral, attempting all of them; returns the first error
    pub fn teardown_all(&mut self) -> Result<()> {
        let results = [
            self.mic.teardown(),
            self.store.teardown(),
            self.camera.teardown(),
        ];
        results.into_iter().collect::<Result<Vec<()>>>().map(|_| ())
    }

    pub fn camera(&self) -> &ImageSource<C> {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut ImageSource<C> {
        &mut self.camera
    }

    pub fn mic(&self) -> &AudioSource<P, K> {
        &self.mic
    }

    pub fn mic_mut(&mut self) -> &mut AudioSource<P, K> {
        &mut self.mic
    }

    pub fn store(&self) -> &BlockStore<V, K> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut BlockStore<V, K> {
        &mut self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{ManualClock, Signal, SimCamera, SimPdm, SimVolume};
    use cams3_core::{CardType, DriverError, ErrorKind, PeripheralState};

    type SimRig = CaptureOrchestrator<SimCamera, SimPdm, SimVolume, ManualClock>;

    fn rig_with(camera: SimCamera, pdm: SimPdm, volume: SimVolume) -> SimRig {
        let clock = ManualClock::at(1000);
        CaptureOrchestrator::new(
            camera,
            pdm.with_clock(clock.clone()),
            volume,
            clock,
            CaptureConfig::default(),
        )
    }

    fn rig() -> SimRig {
        rig_with(
            SimCamera::ov5640(),
            SimPdm::new(Signal::Alternating(1000)),
            SimVolume::new(),
        )
    }

    #[test]
    fn test_camera_failure_stops_bring_up() {
        let mut rig = rig_with(
            SimCamera::ov5640().fail_init(DriverError::FAIL),
            SimPdm::new(Signal::Silence),
            SimVolume::new(),
        );

        assert!(rig.initialize_all(true, true).is_err());
        assert_eq!(rig.store().state(), PeripheralState::Uninitialized);
        assert_eq!(rig.mic().state(), PeripheralState::Uninitialized);
    }

    #[test]
    fn test_optional_failure_keeps_siblings() {
        let mut rig = rig_with(
            SimCamera::ov5640(),
            SimPdm::new(Signal::Silence),
            SimVolume::new().with_card(CardType::None),
        );

        let err = rig.initialize_all(true, true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::HardwareFault);
        assert!(rig.camera().is_initialized());
        assert!(rig.mic().is_initialized());
        assert_eq!(rig.store().state(), PeripheralState::Failed);
    }

    #[test]
    fn test_unrequested_peripherals_stay_down() {
        let mut rig = rig();
        rig.initialize_all(false, false).unwrap();

        assert!(rig.camera().is_initialized());
        assert!(!rig.store().is_initialized());
        assert!(!rig.mic().is_initialized());
    }

    #[test]
    fn test_capture_requires_store() {
        let mut rig = rig();
        rig.initialize_all(false, false).unwrap();

        let err = rig.capture_image_to_store(None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotInitialized);
        assert_eq!(rig.camera().driver().frames_served(), 0);
    }

    #[test]
    fn test_capture_releases_frame_on_write_failure() {
        let mut rig = rig();
        rig.initialize_all(true, false).unwrap();
        rig.store_mut().driver_mut().set_short_write(Some(1));

        let err = rig.capture_image_to_store(Some("/x.jpg")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PartialWrite);
        assert_eq!(rig.camera().driver().outstanding(), 0);
        assert!(rig.camera().frame().is_none());
    }

    #[test]
    fn test_record_zero_duration_never_touches_storage() {
        let mut rig = rig();
        rig.initialize_all(true, true).unwrap();

        let err = rig.record_audio_to_store(None, 0).unwrap_err();
        assert!(matches!(err, CaptureError::NoSamplesCaptured));
        assert_eq!(rig.store().driver().write_calls(), 0);
    }

    #[test]
    fn test_record_writes_wav() {
        let mut rig = rig();
        rig.initialize_all(true, true).unwrap();

        let path = rig.record_audio_to_store(Some("/one.wav"), 1000).unwrap();
        let file = rig.store().driver().file(&path).unwrap();
        assert_eq!(file.len(), 32_044);
        assert_eq!(&file[0..4], b"RIFF");
    }

    #[test]
    fn test_generated_audio_name() {
        let mut rig = rig();
        rig.initialize_all(true, true).unwrap();

        let path = rig.record_audio_to_store(None, 100).unwrap();
        assert!(path.starts_with("/REC_"));
        assert!(path.ends_with("_1.wav"));
    }

    #[test]
    fn test_teardown_all_twice() {
        let mut rig = rig();
        rig.initialize_all(true, true).unwrap();

        rig.teardown_all().unwrap();
        rig.teardown_all().unwrap();
        assert!(!rig.camera().is_initialized());
        assert!(!rig.store().driver().is_mounted());
        assert!(!rig.mic().driver().channel_open());
    }
}
