use cams3_core::{
    CameraConfig, CameraDriver, DriverError, DriverResult, FrameBuffer, SensorModel,
    SensorSetting,
};

/// Simulated DVP camera with a fixed-size frame pool
#[derive(Debug)]
pub struct SimCamera {
    pid: Option<u16>,
    config: Option<CameraConfig>,
    init_error: Option<DriverError>,
    reject_settings: bool,
    frames_available: bool,
    applied: Vec<SensorSetting>,
    outstanding: usize,
    next_slot: usize,
    served: u64,
    returned: u64,
    init_calls: u32,
    deinit_calls: u32,
}

impl SimCamera {
    /// Camera whose sensor answers the SCCB ID read with `pid` (`None`: no sensor attached)
    pub fn with_pid(pid: Option<u16>) -> Self {
        Self {
            pid,
            config: None,
            init_error: None,
            reject_settings: false,
            frames_available: true,
            applied: Vec::new(),
            outstanding: 0,
            next_slot: 0,
            served: 0,
            returned: 0,
            init_calls: 0,
            deinit_calls: 0,
        }
    }

    pub fn ov5640() -> Self {
        Self::with_pid(Some(SensorModel::OV5640_PID))
    }

    pub fn ov3660() -> Self {
        Self::with_pid(Some(SensorModel::OV3660_PID))
    }

    pub fn ov2640() -> Self {
        Self::with_pid(Some(SensorModel::OV2640_PID))
    }

    /// Make `init` fail with `error`
    pub fn fail_init(mut self, error: DriverError) -> Self {
        self.init_error = Some(error);
        self
    }

    /// Make `frame_get` time out (`false`) or produce frames again (`true`)
    pub fn set_frames_available(&mut self, available: bool) {
        self.frames_available = available;
    }

    /// Make every sensor setting fail
    pub fn reject_settings(&mut self, reject: bool) {
        self.reject_settings = reject;
    }

    pub fn is_initialized(&self) -> bool {
        self.config.is_some()
    }

    pub fn config(&self) -> Option<&CameraConfig> {
        self.config.as_ref()
    }

    /// Settings accepted so far, in order
    pub fn applied(&self) -> &[SensorSetting] {
        &self.applied
    }

    /// Frames checked out and not yet returned
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn frames_served(&self) -> u64 {
        self.served
    }

    pub fn frames_returned(&self) -> u64 {
        self.returned
    }

    pub fn init_calls(&self) -> u32 {
        self.init_calls
    }

    pub fn deinit_calls(&self) -> u32 {
        self.deinit_calls
    }

    /// Minimal JPEG-shaped payload: SOI, frame counter, EOI
    fn payload(&self) -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&self.served.to_le_bytes());
        data.extend_from_slice(&[0xFF, 0xD9]);
        data
    }
}

impl CameraDriver for SimCamera {
    fn init(&mut self, config: &CameraConfig) -> DriverResult<()> {
        self.init_calls += 1;
        if let Some(error) = self.init_error {
            return Err(error);
        }
        self.config = Some(*config);
        self.outstanding = 0;
        Ok(())
    }

    fn deinit(&mut self) -> DriverResult<()> {
        if self.config.take().is_none() {
            return Err(DriverError::INVALID_STATE);
        }
        self.deinit_calls += 1;
        Ok(())
    }

    fn sensor_pid(&self) -> Option<u16> {
        self.pid.filter(|_| self.is_initialized())
    }

    fn frame_get(&mut self) -> Option<FrameBuffer> {
        let config = self.config?;
        let pool = usize::from(config.fb_count.max(1));
        if !self.frames_available || self.outstanding >= pool {
            return None;
        }

        let slot = self.next_slot % pool;
        self.next_slot += 1;
        self.outstanding += 1;
        self.served += 1;

        let (width, height) = config.frame_size.dimensions();
        Some(FrameBuffer::new(
            slot,
            self.payload(),
            width,
            height,
            config.pixel_format,
        ))
    }

    fn frame_return(&mut self, _frame: FrameBuffer) {
        self.outstanding = self.outstanding.saturating_sub(1);
        self.returned += 1;
    }

    fn apply(&mut self, setting: SensorSetting) -> DriverResult<()> {
        if !self.is_initialized() {
            return Err(DriverError::INVALID_STATE);
        }
        if self.reject_settings {
            return Err(DriverError::INVALID_ARG);
        }
        self.applied.push(setting);
        Ok(())
    }
}
