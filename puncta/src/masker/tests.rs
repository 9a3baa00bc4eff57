//! Tests for cell-volume masking.

use super::*;
use crate::error::Error;
use crate::testing::cell_with_puncta;

fn sample_volume() -> Volume {
    cell_with_puncta(32, 32, 4, &[(16.0, 16.0, 2.0), (12.0, 18.0, 1.0)])
}

#[test]
fn test_mask_covers_cell_and_excludes_background() {
    let volume = sample_volume();
    let output = ThresholdMasker::default()
        .mask_and_apply(&volume, "Huang")
        .unwrap();

    let mask = output.mask.data();
    for z in 0..volume.depth() {
        assert_eq!(mask[(16, 16, z)], 1, "cell centre in slice {}", z);
        assert_eq!(mask[(0, 0, z)], 0, "corner in slice {}", z);
        assert_eq!(mask[(31, 31, z)], 0, "corner in slice {}", z);
    }
    assert!(output.mask.count_ones() > 0);
    assert!(output.mask.count_ones() < mask.len());
}

#[test]
fn test_masked_volume_is_raw_times_mask() {
    let volume = sample_volume();
    let output = ThresholdMasker::default()
        .mask_and_apply(&volume, "Huang")
        .unwrap();

    for ((&raw, &m), &masked) in volume
        .data()
        .iter()
        .zip(output.mask.data().iter())
        .zip(output.masked.data().iter())
    {
        if m == 1 {
            assert_eq!(masked, volume.bit_depth().saturate(raw));
        } else {
            assert_eq!(m, 0, "mask must be binary");
            assert_eq!(masked, 0.0);
        }
    }
}

#[test]
fn test_masking_is_deterministic_and_leaves_raw_untouched() {
    let volume = sample_volume();
    let before = volume.clone();
    let masker = ThresholdMasker::default();

    let first = masker.mask_and_apply(&volume, "Huang").unwrap();
    let second = masker.mask_and_apply(&volume, "Huang").unwrap();

    assert_eq!(first.mask, second.mask);
    assert_eq!(first.masked, second.masked);
    assert_eq!(volume, before, "raw volume must not change");
}

#[test]
fn test_masked_title_and_metadata() {
    let volume = sample_volume();
    let output = ThresholdMasker::default().mask(&volume).unwrap();
    assert_eq!(output.masked.title(), "synthetic_crop.tif_Masked");
    assert_eq!(output.masked.bit_depth(), volume.bit_depth());
    assert_eq!(output.masked.calibration(), volume.calibration());
    assert!(output.masked.data().same_shape(volume.data()));
}

#[test]
fn test_unknown_method_is_configuration_error() {
    let volume = sample_volume();
    let result = ThresholdMasker::default().mask_and_apply(&volume, "Nope");
    assert!(matches!(result, Err(Error::Configuration(_))));
}

#[test]
fn test_constant_volume_gives_empty_mask() {
    let volume = crate::testing::volume_from_fn(8, 8, 2, |_, _, _| 50.0);
    let output = ThresholdMasker::default()
        .mask_and_apply(&volume, "Otsu")
        .unwrap();
    assert_eq!(output.mask.count_ones(), 0);
    assert!(output.masked.data().iter().all(|&v| v == 0.0));
}
