//! Frame checkout invariants of `ImageSource`
//!
//! Random sequences of acquire/release/teardown calls must never return more
//! frames to the driver than were handed out, and never leave more than one
//! frame checked out.

use cams3_capture::config::CameraSettings;
use cams3_capture::sim::SimCamera;
use cams3_capture::ImageSource;
use cams3_core::{CaptureError, PixelFormat, SensorModel};
use proptest::prelude::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    Acquire,
    Release,
    WithFrame,
    Starve(bool),
    Teardown,
    Initialize,
}

fn arbitrary_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => Just(Op::Acquire),
        4 => Just(Op::Release),
        2 => Just(Op::WithFrame),
        1 => any::<bool>().prop_map(Op::Starve),
        1 => Just(Op::Teardown),
        1 => Just(Op::Initialize),
    ]
}

proptest! {
    /// Property: releases never exceed acquires; at most one frame is ever out
    #[test]
    fn checkout_is_single_slot(
        ops in prop::collection::vec(arbitrary_op(), 1..60),
        buffers in 1u8..4,
    ) {
        let settings = CameraSettings { frame_buffer_count: buffers, ..CameraSettings::default() };
        let mut source = ImageSource::new(SimCamera::ov5640());
        source.initialize(&settings).unwrap();

        let mut acquired = 0u64;
        let mut released = 0u64;

        for op in ops {
            match op {
                Op::Acquire => {
                    let was_out = source.frame().is_some();
                    match source.acquire_frame() {
                        Ok(_) => {
                            prop_assert!(!was_out);
                            acquired += 1;
                        }
                        Err(CaptureError::FrameAlreadyCheckedOut) => prop_assert!(was_out),
                        Err(_) => {}
                    }
                }
                Op::Release => {
                    if source.release_frame() {
                        released += 1;
                    }
                }
                Op::WithFrame => {
                    if source.with_frame(|frame| frame.len()).is_ok() {
                        acquired += 1;
                        released += 1;
                    }
                }
                Op::Starve(starve) => source.driver_mut().set_frames_available(!starve),
                Op::Teardown => {
                    if source.frame().is_some() {
                        released += 1;
                    }
                    source.teardown().unwrap();
                }
                Op::Initialize => {
                    source.initialize(&settings).unwrap();
                }
            }

            prop_assert!(released <= acquired);
            prop_assert!(source.driver().outstanding() <= 1);
            prop_assert_eq!(
                source.driver().outstanding() as u64,
                u64::from(source.frame().is_some())
            );
        }

        source.teardown().unwrap();
        prop_assert_eq!(source.driver().outstanding(), 0);
        prop_assert_eq!(source.driver().frames_served(), source.driver().frames_returned());
    }
}

#[test]
fn non_jpeg_formats_get_a_single_buffer() {
    let settings = CameraSettings {
        pixel_format: PixelFormat::Rgb565,
        frame_buffer_count: 3,
        ..CameraSettings::default()
    };
    let mut source = ImageSource::new(SimCamera::ov2640());
    source.initialize(&settings).unwrap();

    assert_eq!(source.driver().config().unwrap().fb_count, 1);
    assert_eq!(source.sensor_model(), SensorModel::Ov2640);
    assert!(source.driver().applied().is_empty());

    let frame = source.acquire_frame().unwrap();
    assert_eq!(frame.format(), PixelFormat::Rgb565);
    assert_eq!((frame.width(), frame.height()), (640, 480));
}

#[test]
fn reinitialize_after_teardown_detects_sensor_again() {
    let mut source = ImageSource::new(SimCamera::ov5640());
    source.initialize(&CameraSettings::default()).unwrap();
    source.teardown().unwrap();
    assert_eq!(source.sensor_model(), SensorModel::Unknown);

    source.initialize(&CameraSettings::default()).unwrap();
    assert_eq!(source.sensor_model(), SensorModel::Ov5640);
    assert_eq!(source.driver().init_calls(), 2);
}
