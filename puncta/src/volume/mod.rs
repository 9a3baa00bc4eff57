//! Z-stack volumes, binary masks and voxel calibration.
//!
//! A [`Volume`] is a single channel `width x height x depth` intensity field
//! stored as `f32` regardless of the on-disk sample format. The original
//! format is kept in [`BitDepth`] so results can be written back unchanged.
//! A [`Hyperstack`] is everything read from one file before the channel of
//! interest is split off.

mod binary;
pub(crate) mod imagej;
mod io;


pub use binary::{BinaryVolume, Mask};
pub use io::{load_hyperstack, save_volume};

use common::Buffer3;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Physical size of one voxel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub voxel_depth: f64,
    pub unit: String,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            pixel_width: 1.0,
            pixel_height: 1.0,
            voxel_depth: 1.0,
            unit: "pixel".to_string(),
        }
    }
}

impl Calibration {
    /// Voxel size per axis in (x, y, z) order.
    pub fn voxel_size(&self) -> [f64; 3] {
        [self.pixel_width, self.pixel_height, self.voxel_depth]
    }

    /// Physical area covered by one pixel of a slice.
    pub fn pixel_area(&self) -> f64 {
        self.pixel_width * self.pixel_height
    }
}

/// Sample format of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitDepth {
    U8,
    #[default]
    U16,
    F32,
}

impl BitDepth {
    /// Largest value the sample format can represent.
    pub fn max_value(self) -> f64 {
        match self {
            BitDepth::U8 => u8::MAX as f64,
            BitDepth::U16 => u16::MAX as f64,
            BitDepth::F32 => f32::MAX as f64,
        }
    }

    /// Round and clamp `value` into the representable range.
    #[inline]
    pub fn saturate(self, value: f32) -> f32 {
        match self {
            BitDepth::U8 => value.round().clamp(0.0, u8::MAX as f32),
            BitDepth::U16 => value.round().clamp(0.0, u16::MAX as f32),
            BitDepth::F32 => value,
        }
    }
}

/// Single channel intensity stack.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    title: String,
    data: Buffer3<f32>,
    bit_depth: BitDepth,
    calibration: Calibration,
}

impl Volume {
    pub fn new(
        title: impl Into<String>,
        data: Buffer3<f32>,
        bit_depth: BitDepth,
        calibration: Calibration,
    ) -> Self {
        Self {
            title: title.into(),
            data,
            bit_depth,
            calibration,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn data(&self) -> &Buffer3<f32> {
        &self.data
    }

    pub fn width(&self) -> usize {
        self.data.width()
    }

    pub fn height(&self) -> usize {
        self.data.height()
    }

    pub fn depth(&self) -> usize {
        self.data.depth()
    }

    pub fn bit_depth(&self) -> BitDepth {
        self.bit_depth
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Element-wise product with a `{0, 1}` mask, producing a new volume.
    ///
    /// The result keeps this volume's bit depth and calibration.
    pub fn multiply(&self, mask: &Mask, title: impl Into<String>) -> Result<Volume> {
        if !self.data.same_shape(mask.data()) {
            return Err(Error::Collaborator(format!(
                "mask shape {}x{}x{} does not match volume shape {}x{}x{}",
                mask.data().width(),
                mask.data().height(),
                mask.data().depth(),
                self.width(),
                self.height(),
                self.depth()
            )));
        }

        let voxels = self
            .data
            .iter()
            .zip(mask.data().iter())
            .map(|(&v, &m)| self.bit_depth.saturate(v * m as f32))
            .collect();

        Ok(Volume {
            title: title.into(),
            data: Buffer3::new(self.width(), self.height(), self.depth(), voxels),
            bit_depth: self.bit_depth,
            calibration: self.calibration.clone(),
        })
    }

    /// Maximum intensity projection along Z, row-major `width * height`.
    pub fn max_projection(&self) -> Vec<f32> {
        let mut projection = vec![f32::NEG_INFINITY; self.data.slice_len()];
        for z in 0..self.depth() {
            for (p, &v) in projection.iter_mut().zip(self.data.slice(z)) {
                *p = p.max(v);
            }
        }
        projection
    }

    /// Minimum and maximum voxel value, `None` for an empty volume.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.data.iter().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

/// All planes read from one file, in ImageJ order (channel fastest, then
/// slice, then frame).
#[derive(Debug, Clone)]
pub struct Hyperstack {
    pub title: String,
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub planes: Vec<Vec<f32>>,
    pub bit_depth: BitDepth,
    pub calibration: Calibration,
}

impl Hyperstack {
    /// Number of planes per channel.
    pub fn depth(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.planes.len() / self.channels
        }
    }

    /// Extract the planes of one channel as a volume titled like the file.
    pub fn split_channel(&self, channel: usize) -> Result<Volume> {
        if channel >= self.channels {
            return Err(Error::Collaborator(format!(
                "channel {} requested but '{}' has {} channel(s)",
                channel, self.title, self.channels
            )));
        }
        if self.planes.is_empty() || self.planes.len() % self.channels != 0 {
            return Err(Error::Collaborator(format!(
                "'{}' has {} plane(s), not a multiple of {} channel(s)",
                self.title,
                self.planes.len(),
                self.channels
            )));
        }

        let plane_len = self.width * self.height;
        let mut voxels = Vec::with_capacity(plane_len * self.depth());
        for plane in self.planes.iter().skip(channel).step_by(self.channels) {
            if plane.len() != plane_len {
                return Err(Error::Collaborator(format!(
                    "plane of {} samples in '{}', expected {}",
                    plane.len(),
                    self.title,
                    plane_len
                )));
            }
            voxels.extend_from_slice(plane);
        }

        Ok(Volume::new(
            self.title.clone(),
            Buffer3::new(self.width, self.height, self.depth(), voxels),
            self.bit_depth,
            self.calibration.clone(),
        ))
    }
}
