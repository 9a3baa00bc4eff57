//! Synthetic stacks and TIFF fixtures shared by the unit tests.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use common::Buffer3;
use tiff::encoder::{colortype, Rational, TiffEncoder};
use tiff::tags::{ResolutionUnit, Tag};

use crate::volume::{BitDepth, Calibration, Volume};

/// 16-bit volume filled by `f(x, y, z)`.
pub fn volume_from_fn<F>(width: usize, height: usize, depth: usize, f: F) -> Volume
where
    F: Fn(usize, usize, usize) -> f32,
{
    let mut voxels = Vec::with_capacity(width * height * depth);
    for z in 0..depth {
        for y in 0..height {
            for x in 0..width {
                voxels.push(f(x, y, z));
            }
        }
    }
    Volume::new(
        "synthetic_crop.tif",
        Buffer3::new(width, height, depth, voxels),
        BitDepth::U16,
        Calibration::default(),
    )
}

/// Value of an isotropic 3D Gaussian spot at a voxel.
pub fn gaussian_spot(
    (x, y, z): (usize, usize, usize),
    (cx, cy, cz): (f32, f32, f32),
    sigma: f32,
    amplitude: f32,
) -> f32 {
    let dx = x as f32 - cx;
    let dy = y as f32 - cy;
    let dz = z as f32 - cz;
    let r2 = dx * dx + dy * dy + dz * dz;
    amplitude * (-r2 / (2.0 * sigma * sigma)).exp()
}

/// A dim background with a bright elliptical cell body in every slice and
/// bright Gaussian puncta at the given centres.
pub fn cell_with_puncta(
    width: usize,
    height: usize,
    depth: usize,
    puncta: &[(f32, f32, f32)],
) -> Volume {
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let rx = width as f32 * 0.35;
    let ry = height as f32 * 0.35;

    volume_from_fn(width, height, depth, |x, y, z| {
        let nx = (x as f32 - cx) / rx;
        let ny = (y as f32 - cy) / ry;
        let mut value = if nx * nx + ny * ny <= 1.0 { 400.0 } else { 20.0 };
        for &centre in puncta {
            value += gaussian_spot((x, y, z), centre, 1.2, 2000.0);
        }
        value
    })
}

/// Write 16-bit planes as an ImageJ hyperstack (channel fastest).
pub fn write_hyperstack(
    path: &Path,
    width: usize,
    height: usize,
    channels: usize,
    planes: &[Vec<u16>],
    pixel_width: f64,
    spacing: f64,
) {
    let slices = planes.len() / channels;
    let description = format!(
        "ImageJ=1.53t\nimages={}\nchannels={}\nslices={}\nhyperstack=true\n\
         unit=micron\nspacing={}\nloop=false\n",
        planes.len(),
        channels,
        slices,
        spacing
    );

    let file = BufWriter::new(File::create(path).unwrap());
    let mut encoder = TiffEncoder::new(file).unwrap();
    for (i, plane) in planes.iter().enumerate() {
        assert_eq!(plane.len(), width * height);
        let mut image = encoder
            .new_image::<colortype::Gray16>(width as u32, height as u32)
            .unwrap();
        if i == 0 {
            image
                .encoder()
                .write_tag(Tag::ImageDescription, description.as_str())
                .unwrap();
        }
        image.resolution(
            ResolutionUnit::None,
            Rational {
                n: (1.0 / pixel_width * 1000.0).round() as u32,
                d: 1000,
            },
        );
        image.write_data(plane).unwrap();
    }
}

/// Interleave a channel-0 volume with a constant second channel and write it
/// as a two-channel hyperstack.
pub fn write_two_channel_stack(path: &Path, channel0: &Volume) {
    let plane_len = channel0.width() * channel0.height();
    let mut planes = Vec::with_capacity(channel0.depth() * 2);
    for z in 0..channel0.depth() {
        planes.push(
            channel0
                .data()
                .slice(z)
                .iter()
                .map(|&v| v.round().clamp(0.0, u16::MAX as f32) as u16)
                .collect(),
        );
        planes.push(vec![777u16; plane_len]);
    }
    write_hyperstack(
        path,
        channel0.width(),
        channel0.height(),
        2,
        &planes,
        1.0,
        1.0,
    );
}
