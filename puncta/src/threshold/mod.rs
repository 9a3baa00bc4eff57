//! Stack-histogram auto-thresholding.
//!
//! One histogram is accumulated over every slice of the volume and a single
//! threshold is applied uniformly, so the segmentation of a slice does not
//! depend on the slice's own contrast. Voxels whose histogram bin lies above
//! the threshold become foreground (bright objects on a dark background).
//!
//! The methods follow the ImageJ "Auto Threshold" definitions of the same
//! name and are selected by that name.

mod methods;


use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use common::Buffer3;

use crate::error::{Error, Result};
use crate::volume::{BinaryVolume, BitDepth, Volume};

/// Number of bins used for floating point stacks.
const FLOAT_BINS: usize = 256;

/// Named global thresholding algorithm.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
pub enum ThresholdMethod {
    /// ImageJ's default: the iterative intermeans variant of IsoData.
    #[strum(serialize = "Default")]
    #[serde(rename = "Default")]
    IjIsoData,
    /// Minimum fuzzy entropy (Huang & Wang, 1995).
    #[default]
    Huang,
    /// Faster Huang variant with class means rounded to whole bins.
    Huang2,
    /// Iterative minimum cross entropy.
    Li,
    /// Mean of the histogram.
    Mean,
    /// Maximum between-class variance.
    Otsu,
    /// Zack's triangle method.
    Triangle,
}

impl ThresholdMethod {
    /// Look up a method by its ImageJ name (case-sensitive).
    pub fn from_name(name: &str) -> Result<Self> {
        name.parse().map_err(|_| {
            let known: Vec<String> = ThresholdMethod::iter().map(|m| m.to_string()).collect();
            Error::Configuration(format!(
                "unknown threshold method '{}', expected one of: {}",
                name,
                known.join(", ")
            ))
        })
    }

    /// Threshold bin index for `histogram`. Bins above the returned index are
    /// foreground.
    pub fn compute(self, histogram: &[u64]) -> usize {
        match self {
            ThresholdMethod::IjIsoData => methods::ij_isodata(histogram),
            ThresholdMethod::Huang => methods::huang(histogram),
            ThresholdMethod::Huang2 => methods::huang2(histogram),
            ThresholdMethod::Li => methods::li(histogram),
            ThresholdMethod::Mean => methods::mean(histogram),
            ThresholdMethod::Otsu => methods::otsu(histogram),
            ThresholdMethod::Triangle => methods::triangle(histogram),
        }
    }
}

/// Histogram accumulated over a whole stack.
///
/// 8-bit stacks use the full 256-value range. 16-bit stacks use one bin per
/// integer value between the stack's minimum and maximum. Float stacks are
/// divided into 256 equal bins spanning their range.
#[derive(Debug, Clone)]
pub struct StackHistogram {
    counts: Vec<u64>,
    min: f32,
    bin_width: f32,
}

impl StackHistogram {
    pub fn from_volume(volume: &Volume) -> Self {
        let (lo, hi) = volume.min_max().unwrap_or((0.0, 0.0));

        let (min, bins, bin_width) = match volume.bit_depth() {
            BitDepth::U8 => (0.0, 256, 1.0),
            BitDepth::U16 => {
                let lo = lo.floor();
                let hi = hi.floor();
                (lo, (hi - lo) as usize + 1, 1.0)
            }
            BitDepth::F32 => {
                if hi > lo {
                    (lo, FLOAT_BINS, (hi - lo) / FLOAT_BINS as f32)
                } else {
                    (lo, 1, 1.0)
                }
            }
        };

        let mut histogram = StackHistogram {
            counts: vec![0; bins],
            min,
            bin_width,
        };
        for &v in volume.data() {
            let bin = histogram.bin_of(v);
            histogram.counts[bin] += 1;
        }
        histogram
    }

    /// Bin holding `value`, clamped to the histogram range.
    #[inline]
    pub fn bin_of(&self, value: f32) -> usize {
        let pos = ((value - self.min) / self.bin_width).floor();
        if pos <= 0.0 {
            0
        } else {
            (pos as usize).min(self.counts.len() - 1)
        }
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Number of bins holding at least one voxel.
    pub fn occupied_bins(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }
}

/// Binarize `volume` with one threshold computed from its stack histogram.
///
/// Foreground voxels are set to [`BinaryVolume::FOREGROUND`]. A stack with a
/// single intensity value has no foreground.
pub fn threshold_stack(volume: &Volume, method: ThresholdMethod) -> BinaryVolume {
    let histogram = StackHistogram::from_volume(volume);
    let data = volume.data();

    if histogram.occupied_bins() < 2 {
        tracing::debug!(title = volume.title(), "Constant stack, empty mask");
        return BinaryVolume::new(Buffer3::new_filled(
            data.width(),
            data.height(),
            data.depth(),
            BinaryVolume::BACKGROUND,
        ));
    }

    let threshold = method.compute(histogram.counts());
    tracing::debug!(
        title = volume.title(),
        %method,
        threshold_bin = threshold,
        threshold_value = histogram.min + threshold as f32 * histogram.bin_width,
        "Stack threshold"
    );

    let voxels: Vec<u8> = data
        .voxels()
        .par_iter()
        .map(|&v| {
            if histogram.bin_of(v) > threshold {
                BinaryVolume::FOREGROUND
            } else {
                BinaryVolume::BACKGROUND
            }
        })
        .collect();

    BinaryVolume::new(Buffer3::new(
        data.width(),
        data.height(),
        data.depth(),
        voxels,
    ))
}
