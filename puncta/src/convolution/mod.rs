//! Separable 3D Gaussian smoothing with mirror boundaries.
//!
//! The volume is convolved along X, then Y, then Z with 1D kernels, each
//! axis with its own sigma. Samples outside the volume are read from the
//! mirrored position without repeating the edge sample (`-1 -> 1`,
//! `n -> n - 2`), so a spot near the border is not dimmed by implicit zeros.


use rayon::prelude::*;

use common::Buffer3;

/// Compute a normalized 1D Gaussian kernel of radius `ceil(3 * sigma)`.
pub fn gaussian_kernel_1d(sigma: f64) -> Vec<f32> {
    assert!(sigma > 0.0, "Sigma must be positive");

    let radius = (3.0 * sigma).ceil() as usize;
    let two_sigma_sq = 2.0 * sigma * sigma;

    let mut kernel: Vec<f64> = (0..2 * radius + 1)
        .map(|i| {
            let x = i as f64 - radius as f64;
            (-x * x / two_sigma_sq).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    for v in &mut kernel {
        *v /= sum;
    }

    kernel.into_iter().map(|v| v as f32).collect()
}

/// Map any integer coordinate onto `0..n` by single mirroring.
#[inline]
pub fn mirror_index(i: isize, n: usize) -> usize {
    if n <= 1 {
        return 0;
    }
    let period = 2 * (n as isize - 1);
    let m = i.rem_euclid(period);
    if m >= n as isize {
        (period - m) as usize
    } else {
        m as usize
    }
}

/// Gaussian blur with a separate sigma per axis, in pixels.
///
/// Axes with a non-positive sigma or an extent of 1 are left untouched.
pub fn gaussian_blur_3d(data: &Buffer3<f32>, sigma: [f64; 3]) -> Buffer3<f32> {
    let mut current = data.clone();
    if current.is_empty() {
        return current;
    }

    if sigma[0] > 0.0 && data.width() > 1 {
        current = convolve_x(&current, &gaussian_kernel_1d(sigma[0]));
    }
    if sigma[1] > 0.0 && data.height() > 1 {
        current = convolve_y(&current, &gaussian_kernel_1d(sigma[1]));
    }
    if sigma[2] > 0.0 && data.depth() > 1 {
        current = convolve_z(&current, &gaussian_kernel_1d(sigma[2]));
    }
    current
}

fn convolve_x(input: &Buffer3<f32>, kernel: &[f32]) -> Buffer3<f32> {
    let width = input.width();
    let radius = (kernel.len() / 2) as isize;
    let mut output = vec![0.0f32; input.len()];

    output
        .par_chunks_mut(width)
        .zip(input.voxels().par_chunks(width))
        .for_each(|(out_row, in_row)| {
            for (x, out) in out_row.iter_mut().enumerate() {
                let mut sum = 0.0f32;
                for (k, &kval) in kernel.iter().enumerate() {
                    let sx = mirror_index(x as isize + k as isize - radius, width);
                    sum += in_row[sx] * kval;
                }
                *out = sum;
            }
        });

    Buffer3::new(input.width(), input.height(), input.depth(), output)
}

fn convolve_y(input: &Buffer3<f32>, kernel: &[f32]) -> Buffer3<f32> {
    let (width, height) = (input.width(), input.height());
    let radius = (kernel.len() / 2) as isize;
    let mut output = vec![0.0f32; input.len()];

    output
        .par_chunks_mut(input.slice_len())
        .enumerate()
        .for_each(|(z, out_slice)| {
            let in_slice = input.slice(z);
            for y in 0..height {
                let out_row = &mut out_slice[y * width..(y + 1) * width];
                for (k, &kval) in kernel.iter().enumerate() {
                    let sy = mirror_index(y as isize + k as isize - radius, height);
                    let in_row = &in_slice[sy * width..(sy + 1) * width];
                    for (out, &v) in out_row.iter_mut().zip(in_row) {
                        *out += v * kval;
                    }
                }
            }
        });

    Buffer3::new(input.width(), input.height(), input.depth(), output)
}

fn convolve_z(input: &Buffer3<f32>, kernel: &[f32]) -> Buffer3<f32> {
    let depth = input.depth();
    let radius = (kernel.len() / 2) as isize;
    let mut output = vec![0.0f32; input.len()];

    output
        .par_chunks_mut(input.slice_len())
        .enumerate()
        .for_each(|(z, out_slice)| {
            for (k, &kval) in kernel.iter().enumerate() {
                let sz = mirror_index(z as isize + k as isize - radius, depth);
                for (out, &v) in out_slice.iter_mut().zip(input.slice(sz)) {
                    *out += v * kval;
                }
            }
        });

    Buffer3::new(input.width(), input.height(), input.depth(), output)
}
