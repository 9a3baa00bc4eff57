//! Tests for DoG blob detection.

use super::*;
use crate::error::Error;
use crate::testing::{gaussian_spot, volume_from_fn};

fn spots_volume(
    size: (usize, usize, usize),
    background: f32,
    spots: &[(f32, f32, f32)],
    amplitude: f32,
) -> Volume {
    let (w, h, d) = size;
    volume_from_fn(w, h, d, |x, y, z| {
        background
            + spots
                .iter()
                .map(|&c| gaussian_spot((x, y, z), c, 1.2, amplitude))
                .sum::<f32>()
    })
}

// ============================================================================
// Scale computation
// ============================================================================

#[test]
fn test_sigmas_for_unit_pixels() {
    let sigmas = DogSigmas::compute(1.0, 1.475, &Calibration::default());
    let small = (1.0f64 - 0.25).sqrt();
    let large = (1.475f64 * 1.475 - 0.25).sqrt();
    for d in 0..3 {
        assert!((sigmas.smaller[d] - small).abs() < 1e-12);
        assert!((sigmas.larger[d] - large).abs() < 1e-12);
    }
}

#[test]
fn test_sigmas_are_converted_per_axis() {
    let calibration = Calibration {
        pixel_width: 0.1,
        pixel_height: 0.1,
        voxel_depth: 2.0,
        unit: "micron".to_string(),
    };
    let sigmas = DogSigmas::compute(1.0, 2.0, &calibration);
    // 1.0 / 0.1 = 10 pixels in XY.
    assert!((sigmas.smaller[0] - (100.0f64 - 0.25).sqrt()).abs() < 1e-9);
    assert!((sigmas.larger[1] - (400.0f64 - 0.25).sqrt()).abs() < 1e-9);
    // 1.0 / 2.0 = 0.5 pixel in Z, raised to the one pixel minimum.
    assert!((sigmas.smaller[2] - 0.75f64.sqrt()).abs() < 1e-12);
    assert!((sigmas.larger[2] - (4.0f64 - 0.25).sqrt()).abs() < 1e-12);
}

#[test]
fn test_normalized_threshold() {
    let detector = DogDetector::new(DogConfig {
        normalized: true,
        ..DogConfig::default()
    });
    assert!((detector.threshold() - 8.1 * 0.475).abs() < 1e-12);
    assert_eq!(DogDetector::default().threshold(), 8.1);
}

// ============================================================================
// Detection
// ============================================================================

#[test]
fn test_bright_spot_is_a_minimum() {
    let volume = spots_volume((21, 21, 11), 100.0, &[(10.0, 10.0, 5.0)], 2000.0);
    let detector = DogDetector::default();

    let dog = detector.response(&volume);
    assert!(dog[(10, 10, 5)] < -100.0, "bright spots give negative response");

    let peaks = detector.detect(&volume).unwrap();
    assert_eq!(peaks.len(), 1, "peaks: {:?}", peaks);
    let p = peaks[0].position;
    assert!((p - DVec3::new(10.0, 10.0, 5.0)).length() < 0.1, "at {:?}", p);
    assert!(peaks[0].value < 0.0);
    assert_eq!(peaks[0].position.z.round(), 5.0);
}

#[test]
fn test_maxima_polarity_finds_dark_spot() {
    let volume = spots_volume((21, 21, 11), 3000.0, &[(10.0, 10.0, 5.0)], -2000.0);
    let minima = DogDetector::default().detect(&volume).unwrap();
    let maxima = DogDetector::new(DogConfig {
        extrema: ExtremaType::Maxima,
        ..DogConfig::default()
    })
    .detect(&volume)
    .unwrap();

    assert_eq!(maxima.len(), 1);
    assert!(maxima[0].value > 0.0);
    assert!(
        minima.iter().all(|p| (p.position - maxima[0].position).length() > 1.0),
        "the dark spot itself is not a minimum"
    );
}

#[test]
fn test_threshold_rejects_weak_spots() {
    let volume = spots_volume((21, 21, 11), 100.0, &[(10.0, 10.0, 5.0)], 10.0);
    assert!(DogDetector::default().detect(&volume).unwrap().is_empty());

    let sensitive = DogDetector::new(DogConfig {
        min_peak_value: 1.0,
        ..DogConfig::default()
    });
    assert_eq!(sensitive.detect(&volume).unwrap().len(), 1);
}

#[test]
fn test_subpixel_refinement_tracks_true_centre() {
    let centre = (10.3f32, 9.8f32, 5.0f32);
    let volume = spots_volume((21, 21, 11), 100.0, &[centre], 2000.0);

    let peaks = DogDetector::default().detect(&volume).unwrap();
    assert_eq!(peaks.len(), 1);
    let p = peaks[0].position;
    assert!((p.x - 10.3).abs() < 0.2, "x = {}", p.x);
    assert!((p.y - 9.8).abs() < 0.2, "y = {}", p.y);
    assert!((p.z - 5.0).abs() < 0.2, "z = {}", p.z);

    let integer = DogDetector::new(DogConfig {
        subpixel: false,
        ..DogConfig::default()
    })
    .detect(&volume)
    .unwrap();
    assert_eq!(integer[0].position, DVec3::new(10.0, 10.0, 5.0));
}

#[test]
fn test_peaks_are_in_raster_order() {
    let spots = [(15.0, 5.0, 6.0), (5.0, 15.0, 2.0), (5.0, 5.0, 6.0)];
    let volume = spots_volume((21, 21, 9), 100.0, &spots, 2000.0);
    let peaks = DogDetector::new(DogConfig {
        subpixel: false,
        ..DogConfig::default()
    })
    .detect(&volume)
    .unwrap();

    let positions: Vec<DVec3> = peaks.iter().map(|p| p.position).collect();
    assert_eq!(
        positions,
        vec![
            DVec3::new(5.0, 15.0, 2.0),
            DVec3::new(5.0, 5.0, 6.0),
            DVec3::new(15.0, 5.0, 6.0),
        ]
    );
}

#[test]
fn test_spot_on_border_is_detected() {
    let volume = spots_volume((21, 21, 11), 100.0, &[(0.0, 10.0, 5.0)], 2000.0);
    let peaks = DogDetector::default().detect(&volume).unwrap();
    assert_eq!(peaks.len(), 1);
    assert!(peaks[0].position.x.abs() < 0.5);
    assert!(peaks[0].position.x >= 0.0, "position stays inside the volume");
}

#[test]
fn test_single_slice_volume() {
    let volume = spots_volume((21, 21, 1), 100.0, &[(10.0, 10.0, 0.0)], 2000.0);
    let peaks = DogDetector::default().detect(&volume).unwrap();
    assert_eq!(peaks.len(), 1);
    assert_eq!(peaks[0].position.z, 0.0);
    assert_eq!(peaks[0].slice(), 0);
}

#[test]
fn test_flat_volume_has_no_peaks() {
    let volume = volume_from_fn(12, 12, 4, |_, _, _| 500.0);
    assert!(DogDetector::default().detect(&volume).unwrap().is_empty());
}

#[test]
fn test_invalid_sigmas_are_configuration_errors() {
    let volume = volume_from_fn(4, 4, 2, |_, _, _| 1.0);
    let detector = DogDetector::new(DogConfig {
        sigma_smaller: 1.5,
        sigma_larger: 1.0,
        ..DogConfig::default()
    });
    assert!(matches!(
        detector.detect(&volume),
        Err(Error::Configuration(_))
    ));
}
