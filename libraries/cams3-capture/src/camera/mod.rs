//! Image source: sensor bring-up, calibration, and single-slot frame checkout.
//!
//! At most one frame is checked out at a time. A second `acquire_frame` before
//! `release_frame` is rejected with `FrameAlreadyCheckedOut` rather than silently
//! replacing the outstanding buffer, which would leak a pool slot.

pub mod calibration;

use crate::config::CameraSettings;
use crate::peripheral::PeripheralHandle;
use cams3_core::{
    CameraDriver, CaptureError, DriverError, FrameBuffer, FrameSize, Indicator, Peripheral,
    PeripheralState, Result, SensorModel, SensorSetting,
};
use tracing::{debug, info, warn};

fn hardware(e: DriverError) -> CaptureError {
    CaptureError::hardware(Peripheral::Camera, e)
}

/// Owns the camera driver and the currently checked-out frame
pub struct ImageSource<D: CameraDriver> {
    handle: PeripheralHandle<D>,
    sensor_pid: Option<u16>,
    sensor: SensorModel,
    frame: Option<FrameBuffer>,
    led: Option<Box<dyn Indicator>>,
}

impl<D: CameraDriver> ImageSource<D> {
    pub fn new(driver: D) -> Self {
        Self {
            handle: PeripheralHandle::new(Peripheral::Camera, driver),
            sensor_pid: None,
            sensor: SensorModel::Unknown,
            frame: None,
            led: None,
        }
    }

    /// Attach the board's status LED
    pub fn with_indicator(mut self, led: impl Indicator + 'static) -> Self {
        self.led = Some(Box::new(led));
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

    /// Initialize the camera.
    ///
    /// Idempotent while `Ready`. On success the sensor is identified and its
    /// calibration profile is applied. If the driver comes up but no sensor answers,
    /// the driver is deinitialized again and the source is left `Failed`.
    pub fn initialize(&mut self, settings: &CameraSettings) -> Result<()> {
        if self.handle.is_ready() {
            return Ok(());
        }

        self.led_off();
        let config = settings.driver_config();
        let mut detected = None;

        self.handle.initialize_with(|driver| {
            driver.init(&config).map_err(hardware)?;

            let Some(pid) = driver.sensor_pid() else {
                if let Err(e) = driver.deinit() {
                    warn!(error = %e, "camera deinit after missing sensor failed");
                }
                return Err(hardware(DriverError::NOT_FOUND));
            };

            let model = SensorModel::from_pid(pid);
            info!(sensor = %model, pid = %format!("0x{pid:X}"), "camera sensor detected");

            for setting in calibration::profile_for(model) {
                // Calibration is best effort: a rejected register leaves the sensor usable.
                if let Err(e) = driver.apply(*setting) {
                    warn!(?setting, error = %e, "calibration setting rejected");
                } else {
                    debug!(?setting, "calibration applied");
                }
            }

            detected = Some((pid, model));
            Ok(())
        })?;

        if let Some((pid, model)) = detected {
            self.sensor_pid = Some(pid);
            self.sensor = model;
        }
        info!(
            frame_size = ?config.frame_size,
            format = ?config.pixel_format,
            buffers = config.fb_count,
            "camera initialized"
        );
        Ok(())
    }

    /// Check out the next frame from the driver pool.
    ///
    /// Blocks for as long as the driver does. Fails with `Timeout` if the driver
    /// produced nothing, and with `FrameAlreadyCheckedOut` if the previous frame
    /// was not released.
    pub fn acquire_frame(&mut self) -> Result<&FrameBuffer> {
        self.handle.require_ready()?;
        if self.frame.is_some() {
            return Err(CaptureError::FrameAlreadyCheckedOut);
        }

        let Some(frame) = self.handle.ready_driver_mut()?.frame_get() else {
            warn!("camera returned no frame");
            return Err(CaptureError::Timeout {
                peripheral: Peripheral::Camera,
            });
        };

        debug!(slot = frame.slot(), bytes = frame.len(), "frame acquired");
        Ok(self.frame.insert(frame))
    }

    /// Currently checked-out frame, if any
    pub fn frame(&self) -> Option<&FrameBuffer> {
        self.frame.as_ref()
    }

    /// Return the checked-out frame to the pool.
    ///
    /// Returns `false` (and does nothing) when no frame is checked out.
    pub fn release_frame(&mut self) -> bool {
        match self.frame.take() {
            Some(frame) => {
                debug!(slot = frame.slot(), "frame released");
                self.handle.driver_mut().frame_return(frame);
                true
            }
            None => false,
        }
    }

    /// Acquire a frame, run `f` on it, and release it again on every path
    pub fn with_frame<R, F>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&FrameBuffer) -> R,
    {
        let out = {
            let frame = self.acquire_frame()?;
            f(frame)
        };
        self.release_frame();
        Ok(out)
    }

    /// Release all driver resources and forget the sensor identity.
    ///
    /// Any checked-out frame is returned first. Safe to call repeatedly.
    pub fn teardown(&mut self) -> Result<()> {
        if self.release_frame() {
            debug!("returned outstanding frame before teardown");
        }

        self.handle
            .teardown_with(|driver| driver.deinit().map_err(hardware))?;

        self.sensor_pid = None;
        self.sensor = SensorModel::Unknown;
        Ok(())
    }

    pub fn sensor_model(&self) -> SensorModel {
        self.sensor
    }

    pub fn sensor_name(&self) -> &'static str {
        self.sensor.name()
    }

    pub fn sensor_pid(&self) -> Option<u16> {
        self.sensor_pid
    }

    // ===== Sensor settings =====

    /// Forward a register setting to the sensor
    pub fn apply(&mut self, setting: SensorSetting) -> Result<()> {
        if self.sensor_pid.is_none() {
            return Err(CaptureError::not_initialized(Peripheral::Camera));
        }
        self.handle.driver_mut().apply(setting).map_err(hardware)
    }

    pub fn set_frame_size(&mut self, size: FrameSize) -> Result<()> {
        self.apply(SensorSetting::FrameSize(size))
    }

    pub fn set_quality(&mut self, quality: u8) -> Result<()> {
        self.apply(SensorSetting::Quality(quality))
    }

    pub fn set_vflip(&mut self, flip: bool) -> Result<()> {
        self.apply(SensorSetting::VerticalFlip(flip))
    }

    pub fn set_hmirror(&mut self, mirror: bool) -> Result<()> {
        self.apply(SensorSetting::HorizontalMirror(mirror))
    }

    pub fn set_brightness(&mut self, level: i8) -> Result<()> {
        self.apply(SensorSetting::Brightness(level))
    }

    pub fn set_saturation(&mut self, level: i8) -> Result<()> {
        self.apply(SensorSetting::Saturation(level))
    }

    pub fn set_contrast(&mut self, level: i8) -> Result<()> {
        self.apply(SensorSetting::Contrast(level))
    }

    pub fn set_special_effect(&mut self, effect: u8) -> Result<()> {
        self.apply(SensorSetting::SpecialEffect(effect))
    }

    pub fn set_white_balance(&mut self, enable: bool) -> Result<()> {
        self.apply(SensorSetting::WhiteBalance(enable))
    }

    pub fn set_exposure_ctrl(&mut self, enable: bool) -> Result<()> {
        self.apply(SensorSetting::ExposureControl(enable))
    }

    pub fn set_gain_ctrl(&mut self, enable: bool) -> Result<()> {
        self.apply(SensorSetting::GainControl(enable))
    }

    // ===== Status LED =====

    pub fn led_on(&mut self) {
        self.led_set(true);
    }

    pub fn led_off(&mut self) {
        self.led_set(false);
    }

    pub fn led_set(&mut self, on: bool) {
        if let Some(led) = self.led.as_mut() {
            led.set(on);
        }
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
    use crate::sim::{SimCamera, SimLed};
    use cams3_core::ErrorKind;

    fn ready(camera: SimCamera) -> ImageSource<SimCamera> {
        let mut source = ImageSource::new(camera);
        source.initialize(&CameraSettings::default()).unwrap();
        source
    }

    #[test]
    fn test_initialize_detects_and_calibrates() {
        let source = ready(SimCamera::ov3660());

        assert_eq!(source.sensor_model(), SensorModel::Ov3660);
        assert_eq!(source.sensor_name(), "OV3660");
        assert_eq!(
            source.driver().applied(),
            &[
                SensorSetting::VerticalFlip(true),
                SensorSetting::Brightness(1),
                SensorSetting::Saturation(-2),
            ]
        );
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut source = ready(SimCamera::ov5640());
        source.initialize(&CameraSettings::default()).unwrap();

        assert_eq!(source.driver().init_calls(), 1);
        assert_eq!(source.driver().applied(), &[SensorSetting::VerticalFlip(true)]);
    }

    #[test]
    fn test_unknown_sensor_gets_no_calibration() {
        let source = ready(SimCamera::with_pid(Some(0x9999)));
        assert_eq!(source.sensor_model(), SensorModel::Unknown);
        assert!(source.driver().applied().is_empty());
    }

    #[test]
    fn test_driver_failure_leaves_failed() {
        let mut source = ImageSource::new(SimCamera::ov5640().fail_init(DriverError::new(0x20001)));
        let err = source.initialize(&CameraSettings::default()).unwrap_err();

        assert_eq!(err.driver_code(), Some(0x20001));
        assert_eq!(source.state(), PeripheralState::Failed);
        assert_eq!(source.sensor_pid(), None);

        let again = source.initialize(&CameraSettings::default()).unwrap_err();
        assert!(matches!(again, CaptureError::RequiresTeardown { .. }));
    }

    #[test]
    fn test_missing_sensor_unwinds_driver() {
        let mut source = ImageSource::new(SimCamera::with_pid(None));
        assert!(source.initialize(&CameraSettings::default()).is_err());

        assert_eq!(source.state(), PeripheralState::Failed);
        assert!(!source.driver().is_initialized());
    }

    #[test]
    fn test_second_acquire_is_rejected() {
        let mut source = ready(SimCamera::ov5640());

        let first_slot = source.acquire_frame().unwrap().slot();
        let err = source.acquire_frame().unwrap_err();
        assert!(matches!(err, CaptureError::FrameAlreadyCheckedOut));
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(source.frame().unwrap().slot(), first_slot);
        assert_eq!(source.driver().outstanding(), 1);

        assert!(source.release_frame());
        assert!(!source.release_frame());
        assert_eq!(source.driver().outstanding(), 0);
    }

    #[test]
    fn test_acquire_requires_ready() {
        let mut source = ImageSource::new(SimCamera::ov5640());
        let err = source.acquire_frame().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotInitialized);
    }

    #[test]
    fn test_acquire_timeout() {
        let mut source = ready(SimCamera::ov5640());
        source.driver_mut().set_frames_available(false);

        let err = source.acquire_frame().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(source.frame().is_none());
    }

    #[test]
    fn test_with_frame_releases() {
        let mut source = ready(SimCamera::ov5640());
        let len = source.with_frame(FrameBuffer::len).unwrap();

        assert!(len > 0);
        assert!(source.frame().is_none());
        assert_eq!(source.driver().outstanding(), 0);
    }

    #[test]
    fn test_teardown_returns_frame_and_is_idempotent() {
        let mut source = ready(SimCamera::ov5640());
        source.acquire_frame().unwrap();

        source.teardown().unwrap();
        source.teardown().unwrap();

        assert_eq!(source.state(), PeripheralState::Uninitialized);
        assert_eq!(source.sensor_model(), SensorModel::Unknown);
        assert_eq!(source.driver().outstanding(), 0);
        assert_eq!(source.driver().deinit_calls(), 1);
    }

    #[test]
    fn test_setters_need_sensor() {
        let mut source = ImageSource::new(SimCamera::ov5640());
        assert!(source.set_hmirror(true).is_err());

        source.initialize(&CameraSettings::default()).unwrap();
        source.set_hmirror(true).unwrap();
        source.set_frame_size(FrameSize::Uxga).unwrap();
        assert_eq!(
            source.driver().applied().last(),
            Some(&SensorSetting::FrameSize(FrameSize::Uxga))
        );

        source.driver_mut().reject_settings(true);
        assert_eq!(
            source.set_contrast(2).unwrap_err().kind(),
            ErrorKind::HardwareFault
        );
    }

    #[test]
    fn test_led_switched_off_on_init() {
        let led = SimLed::new();
        led.clone().set(true);
        let mut source = ImageSource::new(SimCamera::ov5640()).with_indicator(led.clone());

        source.initialize(&CameraSettings::default()).unwrap();
        assert!(!led.is_on());

        source.led_on();
        assert!(led.is_on());
    }
}
