//! Domain types for the capture pipeline

mod audio;
mod camera;
mod state;
mod storage;

pub use audio::{BitDepth, PdmConfig, SampleBuffer};
pub use camera::{
    CameraConfig, CameraPins, FrameBuffer, FrameSize, PixelFormat, SensorModel, SensorSetting,
};
pub use state::PeripheralState;
pub use storage::{CardType, DirEntry, SpiBusConfig, WriteMode};
