//! Difference-of-Gaussians blob detection in 3D.
//!
//! The volume is smoothed at two scales, the finer result is subtracted from
//! the coarser one and local extrema of the response beyond a threshold are
//! reported, optionally refined to sub-pixel precision by fitting a quadratic
//! to the 3x3x3 neighbourhood.
//!
//! Sigmas are given in calibrated units and converted per axis. Each is
//! corrected for the blur already present in a sampled image (sigma 0.5) and
//! never drops below one pixel, so strongly anisotropic voxels still get a
//! usable kernel along the coarse axis.

#[cfg(test)]
mod tests;

use glam::{DMat3, DVec3};
use rayon::prelude::*;

use common::Buffer3;

use crate::config::{DogConfig, ExtremaType};
use crate::convolution::{gaussian_blur_3d, mirror_index};
use crate::error::Result;
use crate::volume::{Calibration, Volume};

/// Blur assumed to be present in any sampled image, in pixels.
pub const IMAGE_SIGMA: f64 = 0.5;

/// Smallest smoothing scale relative to [`IMAGE_SIGMA`].
pub const MIN_SCALE_FACTOR: f64 = 2.0;

/// Maximum number of times sub-pixel refinement may move to a neighbour.
pub const MAX_SUBPIXEL_MOVES: usize = 4;

/// A detected blob.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Pixel coordinates `(x, y, z)`, sub-pixel when refinement is enabled.
    pub position: DVec3,
    /// DoG response at `position`.
    pub value: f64,
    /// Integer voxel `(x, y, z)` where the extremum was found.
    pub voxel: [usize; 3],
}

impl Peak {
    /// 0-based slice of the detected extremum.
    ///
    /// Refinement can move `position.z` across a slice boundary; the slice is
    /// always the one holding the strongest sampled response.
    pub fn slice(&self) -> usize {
        self.voxel[2]
    }
}

/// Per-axis Gaussian sigmas in pixels, already corrected for image blur.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DogSigmas {
    pub smaller: [f64; 3],
    pub larger: [f64; 3],
}

impl DogSigmas {
    pub fn compute(sigma_smaller: f64, sigma_larger: f64, calibration: &Calibration) -> Self {
        let k = sigma_larger / sigma_smaller;
        let min_sigma = MIN_SCALE_FACTOR * IMAGE_SIGMA;
        let correct = |s: f64| (s * s - IMAGE_SIGMA * IMAGE_SIGMA).max(0.0).sqrt();

        let mut smaller = [0.0; 3];
        let mut larger = [0.0; 3];
        for (d, pixel_size) in calibration.voxel_size().into_iter().enumerate() {
            let pixel_size = if pixel_size > 0.0 { pixel_size } else { 1.0 };
            let s1 = (sigma_smaller / pixel_size).max(min_sigma);
            let s2 = k * s1;
            smaller[d] = correct(s1);
            larger[d] = correct(s2);
        }
        Self { smaller, larger }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DogDetector {
    config: DogConfig,
}

impl DogDetector {
    pub fn new(config: DogConfig) -> Self {
        Self { config }
    }

    /// Threshold applied to the absolute DoG response.
    pub fn threshold(&self) -> f64 {
        if self.config.normalized {
            self.config.min_peak_value * (self.config.sigma_larger / self.config.sigma_smaller - 1.0)
        } else {
            self.config.min_peak_value
        }
    }

    /// `G(larger) - G(smaller)` of the volume.
    pub fn response(&self, volume: &Volume) -> Buffer3<f32> {
        let sigmas = DogSigmas::compute(
            self.config.sigma_smaller,
            self.config.sigma_larger,
            volume.calibration(),
        );
        let fine = gaussian_blur_3d(volume.data(), sigmas.smaller);
        let coarse = gaussian_blur_3d(volume.data(), sigmas.larger);

        let voxels = coarse
            .voxels()
            .par_iter()
            .zip(fine.voxels().par_iter())
            .map(|(&c, &f)| c - f)
            .collect();
        Buffer3::new(volume.width(), volume.height(), volume.depth(), voxels)
    }

    /// Detect peaks in `volume`, returned in raster order (z, then y, then x
    /// of the integer extremum).
    pub fn detect(&self, volume: &Volume) -> Result<Vec<Peak>> {
        self.config.validate()?;
        if volume.data().is_empty() {
            return Ok(Vec::new());
        }

        let dog = self.response(volume);
        let threshold = self.threshold() as f32;
        let extrema = self.config.extrema;

        let candidates: Vec<[usize; 3]> = (0..dog.depth())
            .into_par_iter()
            .flat_map_iter(|z| {
                let mut found = Vec::new();
                for y in 0..dog.height() {
                    for x in 0..dog.width() {
                        if is_extremum(&dog, [x, y, z], extrema, threshold) {
                            found.push([x, y, z]);
                        }
                    }
                }
                found
            })
            .collect();

        let peaks: Vec<Peak> = candidates
            .par_iter()
            .map(|&p| {
                if self.config.subpixel {
                    refine(&dog, p, MAX_SUBPIXEL_MOVES)
                } else {
                    Peak {
                        position: DVec3::new(p[0] as f64, p[1] as f64, p[2] as f64),
                        value: dog[(p[0], p[1], p[2])] as f64,
                        voxel: p,
                    }
                }
            })
            .collect();

        tracing::debug!(
            title = volume.title(),
            %extrema,
            threshold,
            peaks = peaks.len(),
            "DoG detection"
        );
        Ok(peaks)
    }
}

/// Neighbour offsets along one axis; axes of extent 1 have no neighbours.
#[inline]
fn axis_offsets(extent: usize) -> std::ops::RangeInclusive<isize> {
    if extent > 1 {
        -1..=1
    } else {
        0..=0
    }
}

#[inline]
fn sample(dog: &Buffer3<f32>, p: [isize; 3]) -> f32 {
    dog[(
        mirror_index(p[0], dog.width()),
        mirror_index(p[1], dog.height()),
        mirror_index(p[2], dog.depth()),
    )]
}

/// Strict extremum beyond `threshold` against every mirrored neighbour.
fn is_extremum(dog: &Buffer3<f32>, p: [usize; 3], extrema: ExtremaType, threshold: f32) -> bool {
    let centre = dog[(p[0], p[1], p[2])];
    let beyond = match extrema {
        ExtremaType::Minima => centre < -threshold,
        ExtremaType::Maxima => centre > threshold,
    };
    if !beyond {
        return false;
    }

    let (x, y, z) = (p[0] as isize, p[1] as isize, p[2] as isize);
    for dz in axis_offsets(dog.depth()) {
        for dy in axis_offsets(dog.height()) {
            for dx in axis_offsets(dog.width()) {
                if dx == 0 && dy == 0 && dz == 0 {
                    continue;
                }
                let n = sample(dog, [x + dx, y + dy, z + dz]);
                let dominated = match extrema {
                    ExtremaType::Minima => n <= centre,
                    ExtremaType::Maxima => n >= centre,
                };
                if dominated {
                    return false;
                }
            }
        }
    }
    true
}

/// Quadratic sub-pixel localization.
///
/// Fits gradient and Hessian by central differences and solves for the
/// offset of the vertex. When the offset leaves the current voxel by more
/// than half a pixel the fit restarts from the neighbour in that direction,
/// at most `max_moves` times. The final offset is limited to half a pixel and
/// the position to the volume bounds.
fn refine(dog: &Buffer3<f32>, start: [usize; 3], max_moves: usize) -> Peak {
    let extent = [dog.width(), dog.height(), dog.depth()];
    let active = extent.map(|n| n > 1);
    let mut pos = start.map(|v| v as isize);

    let mut moves = 0;
    loop {
        let at = |offset: [isize; 3]| {
            sample(
                dog,
                [pos[0] + offset[0], pos[1] + offset[1], pos[2] + offset[2]],
            ) as f64
        };
        let unit = |d: usize, s: isize| {
            let mut o = [0isize; 3];
            o[d] = s;
            o
        };

        let centre = at([0, 0, 0]);
        let mut gradient = [0.0f64; 3];
        let mut hessian = [[0.0f64; 3]; 3];
        for d in 0..3 {
            if !active[d] {
                hessian[d][d] = 1.0;
                continue;
            }
            let plus = at(unit(d, 1));
            let minus = at(unit(d, -1));
            gradient[d] = (plus - minus) * 0.5;
            hessian[d][d] = plus - 2.0 * centre + minus;

            for e in d + 1..3 {
                if !active[e] {
                    continue;
                }
                let mut pp = unit(d, 1);
                pp[e] = 1;
                let mut pm = unit(d, 1);
                pm[e] = -1;
                let mut mp = unit(d, -1);
                mp[e] = 1;
                let mut mm = unit(d, -1);
                mm[e] = -1;
                let value = (at(pp) - at(pm) - at(mp) + at(mm)) * 0.25;
                hessian[d][e] = value;
                hessian[e][d] = value;
            }
        }

        let at_integer = DVec3::new(pos[0] as f64, pos[1] as f64, pos[2] as f64);
        let hessian = DMat3::from_cols_array_2d(&hessian);
        let gradient = DVec3::from_array(gradient);

        if hessian.determinant().abs() < 1e-12 {
            return Peak {
                position: at_integer,
                value: centre,
                voxel: start,
            };
        }

        let offset = -(hessian.inverse() * gradient);

        let mut moved = false;
        if moves < max_moves {
            for d in 0..3 {
                if !active[d] || offset[d].abs() <= 0.5 {
                    continue;
                }
                let next = pos[d] + offset[d].signum() as isize;
                if next >= 0 && next < extent[d] as isize {
                    pos[d] = next;
                    moved = true;
                }
            }
        }

        if moved {
            moves += 1;
            continue;
        }

        let offset = offset.clamp(DVec3::splat(-0.5), DVec3::splat(0.5));
        let upper = DVec3::new(
            (extent[0] - 1) as f64,
            (extent[1] - 1) as f64,
            (extent[2] - 1) as f64,
        );
        return Peak {
            position: (at_integer + offset).clamp(DVec3::ZERO, upper),
            value: centre + 0.5 * gradient.dot(offset),
            voxel: start,
        };
    }
}
