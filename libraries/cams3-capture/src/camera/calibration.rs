//! Post-init calibration profiles keyed by sensor model.
//!
//! Each detected sensor gets a fixed, ordered list of register settings applied
//! right after bring-up. The table is data, not policy: to support a new module,
//! add a row.

use cams3_core::{SensorModel, SensorSetting};

/// Calibration actions per sensor, applied in order
pub const PROFILES: &[(SensorModel, &[SensorSetting])] = &[
    // OV5640 modules on this board are mounted upside down
    (SensorModel::Ov5640, &[SensorSetting::VerticalFlip(true)]),
    (
        SensorModel::Ov3660,
        &[
            SensorSetting::VerticalFlip(true),
            SensorSetting::Brightness(1),
            SensorSetting::Saturation(-2),
        ],
    ),
    (SensorModel::Ov2640, &[]),
];

/// Calibration actions for `model` (empty for unknown sensors)
pub fn profile_for(model: SensorModel) -> &'static [SensorSetting] {
    match PROFILES.iter().find(|(m, _)| *m == model) {
        Some((_, actions)) => *actions,
        None => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles() {
        assert_eq!(
            profile_for(SensorModel::Ov5640),
            &[SensorSetting::VerticalFlip(true)]
        );
        assert_eq!(
            profile_for(SensorModel::Ov3660),
            &[
                SensorSetting::VerticalFlip(true),
                SensorSetting::Brightness(1),
                SensorSetting::Saturation(-2),
            ]
        );
        assert!(profile_for(SensorModel::Ov2640).is_empty());
        assert!(profile_for(SensorModel::Unknown).is_empty());
    }

    #[test]
    fn test_each_model_listed_once() {
        for (i, (model, _)) in PROFILES.iter().enumerate() {
            assert!(
                PROFILES[i + 1..].iter().all(|(m, _)| m != model),
                "{model} listed twice"
            );
        }
    }
}
