//! Slice-wise binary morphology for the cell mask.
//!
//! Every operation works on each Z slice independently, in parallel over
//! slices, and returns a new volume with values in `{0, 255}`. Pixels outside
//! the slice count as background for closing; rank filtering clamps
//! coordinates to the nearest edge pixel.


use rayon::prelude::*;

use common::Buffer3;

use crate::volume::BinaryVolume;

const FG: u8 = BinaryVolume::FOREGROUND;
const BG: u8 = BinaryVolume::BACKGROUND;

/// Binary closing: 3x3 dilation followed by 3x3 erosion.
///
/// Fills one-pixel gaps and notches in the foreground. Because the outside of
/// the slice is background, foreground touching the slice border is eroded
/// from the edge.
pub fn close(binary: &BinaryVolume) -> BinaryVolume {
    let dilated = per_slice(binary, dilate_slice);
    per_slice(&dilated, erode_slice)
}

/// Replace pixels brighter than the median of their circular neighbourhood
/// by more than `threshold` with that median.
///
/// On a binary slice this removes isolated foreground specks smaller than
/// roughly half the kernel area.
pub fn remove_bright_outliers(binary: &BinaryVolume, radius: f64, threshold: f64) -> BinaryVolume {
    let kernel = CircularKernel::new(radius);
    per_slice(binary, |input, output, width, height| {
        let mut window = Vec::with_capacity(kernel.len());
        for y in 0..height {
            for x in 0..width {
                window.clear();
                kernel.gather(input, width, height, x, y, &mut window);
                let mid = window.len() / 2;
                let median = *window.select_nth_unstable(mid).1;
                let value = input[y * width + x];
                output[y * width + x] = if value as f64 - median as f64 > threshold {
                    median
                } else {
                    value
                };
            }
        }
    })
}

/// Fill holes: background not 4-connected to the slice border becomes
/// foreground.
pub fn fill_holes(binary: &BinaryVolume) -> BinaryVolume {
    per_slice(binary, fill_holes_slice)
}

/// Apply `f(input_slice, output_slice, width, height)` to every Z slice.
fn per_slice<F>(binary: &BinaryVolume, f: F) -> BinaryVolume
where
    F: Fn(&[u8], &mut [u8], usize, usize) + Sync,
{
    let data = binary.data();
    let (width, height, depth) = (data.width(), data.height(), data.depth());
    let mut output = vec![BG; data.len()];

    if data.slice_len() > 0 {
        output
            .par_chunks_mut(data.slice_len())
            .enumerate()
            .for_each(|(z, out_slice)| f(data.slice(z), out_slice, width, height));
    }

    BinaryVolume::new(Buffer3::new(width, height, depth, output))
}

fn dilate_slice(input: &[u8], output: &mut [u8], width: usize, height: usize) {
    for y in 0..height {
        for x in 0..width {
            let mut any = false;
            'search: for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                    if input[ny * width + nx] == FG {
                        any = true;
                        break 'search;
                    }
                }
            }
            output[y * width + x] = if any { FG } else { BG };
        }
    }
}

fn erode_slice(input: &[u8], output: &mut [u8], width: usize, height: usize) {
    for y in 0..height {
        for x in 0..width {
            let on_border = x == 0 || y == 0 || x + 1 == width || y + 1 == height;
            let keep = !on_border
                && (y - 1..=y + 1)
                    .all(|ny| (x - 1..=x + 1).all(|nx| input[ny * width + nx] == FG));
            output[y * width + x] = if keep { FG } else { BG };
        }
    }
}

fn fill_holes_slice(input: &[u8], output: &mut [u8], width: usize, height: usize) {
    let mut reached = vec![false; input.len()];
    let mut stack = Vec::new();

    let seed = |x: usize, y: usize, reached: &mut [bool], stack: &mut Vec<usize>| {
        let idx = y * width + x;
        if input[idx] == BG && !reached[idx] {
            reached[idx] = true;
            stack.push(idx);
        }
    };

    for x in 0..width {
        seed(x, 0, &mut reached, &mut stack);
        seed(x, height - 1, &mut reached, &mut stack);
    }
    for y in 0..height {
        seed(0, y, &mut reached, &mut stack);
        seed(width - 1, y, &mut reached, &mut stack);
    }

    while let Some(idx) = stack.pop() {
        let (x, y) = (idx % width, idx / width);
        if x > 0 {
            seed(x - 1, y, &mut reached, &mut stack);
        }
        if x + 1 < width {
            seed(x + 1, y, &mut reached, &mut stack);
        }
        if y > 0 {
            seed(x, y - 1, &mut reached, &mut stack);
        }
        if y + 1 < height {
            seed(x, y + 1, &mut reached, &mut stack);
        }
    }

    for (out, (&value, &outside)) in output.iter_mut().zip(input.iter().zip(&reached)) {
        *out = if value == FG || !outside { FG } else { BG };
    }
}

/// Circular neighbourhood as one horizontal extent per row offset.
///
/// Uses the rank-filter convention `dx² + dy² <= r² + 1`, so radius 2 gives
/// the 21-pixel disc.
#[derive(Debug, Clone)]
struct CircularKernel {
    /// `(dy, half_width)` pairs.
    rows: Vec<(isize, isize)>,
}

impl CircularKernel {
    fn new(radius: f64) -> Self {
        let r2 = (radius * radius) as isize + 1;
        let k_radius = ((r2 as f64) + 1e-10).sqrt() as isize;
        let rows = (-k_radius..=k_radius)
            .map(|dy| (dy, ((r2 - dy * dy) as f64 + 1e-10).sqrt() as isize))
            .collect();
        Self { rows }
    }

    fn len(&self) -> usize {
        self.rows.iter().map(|&(_, dx)| (2 * dx + 1) as usize).sum()
    }

    fn gather(
        &self,
        input: &[u8],
        width: usize,
        height: usize,
        x: usize,
        y: usize,
        window: &mut Vec<u8>,
    ) {
        let clamp = |v: isize, n: usize| v.clamp(0, n as isize - 1) as usize;
        for &(dy, half) in &self.rows {
            let sy = clamp(y as isize + dy, height);
            let row = &input[sy * width..(sy + 1) * width];
            for dx in -half..=half {
                window.push(row[clamp(x as isize + dx, width)]);
            }
        }
    }
}
