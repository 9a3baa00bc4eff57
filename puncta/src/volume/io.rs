use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, Write};
use std::path::Path;

use tiff::decoder::ifd::Value;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{colortype, Rational, TiffEncoder, TiffValue};
use tiff::tags::{ResolutionUnit, Tag};

use super::imagej::ImageJInfo;
use super::{BitDepth, Calibration, Hyperstack, Volume};
use crate::error::{Error, Result};

/// Load every page of a (possibly multi-channel) TIFF stack.
///
/// Gray pages are grouped into channels using the ImageJ description when
/// present. Chunky RGB/RGBA pages contribute one plane per sample, so the
/// samples become channels.
pub fn load_hyperstack(path: &Path) -> Result<Hyperstack> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    // Microscopy stacks routinely exceed the decoder's default buffer limits.
    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(|e| Error::tiff(path, e))?
        .with_limits(Limits::unlimited());

    let info = decoder
        .get_tag_ascii_string(Tag::ImageDescription)
        .ok()
        .and_then(|text| ImageJInfo::parse(&text))
        .unwrap_or_default();
    let calibration = read_calibration(&mut decoder, &info);

    let (width, height) = decoder.dimensions().map_err(|e| Error::tiff(path, e))?;
    let (width, height) = (width as usize, height as usize);

    let mut planes = Vec::new();
    let mut bit_depth = None;
    let mut samples_per_pixel: usize;

    loop {
        let dims = decoder.dimensions().map_err(|e| Error::tiff(path, e))?;
        if (dims.0 as usize, dims.1 as usize) != (width, height) {
            return Err(Error::Collaborator(format!(
                "page {} of '{}' is {}x{}, expected {}x{}",
                planes.len(),
                path.display(),
                dims.0,
                dims.1,
                width,
                height
            )));
        }

        samples_per_pixel = match decoder.colortype().map_err(|e| Error::tiff(path, e))? {
            tiff::ColorType::Gray(_) => 1,
            tiff::ColorType::RGB(_) => 3,
            tiff::ColorType::RGBA(_) => 4,
            other => {
                return Err(Error::Collaborator(format!(
                    "unsupported TIFF color type {:?} in '{}'",
                    other,
                    path.display()
                )));
            }
        };

        let image = decoder.read_image().map_err(|e| Error::tiff(path, e))?;
        let (samples, page_depth) = decode_samples(image, path)?;
        match bit_depth {
            None => bit_depth = Some(page_depth),
            Some(depth) if depth != page_depth => {
                return Err(Error::Collaborator(format!(
                    "mixed sample formats in '{}'",
                    path.display()
                )));
            }
            Some(_) => {}
        }

        if samples_per_pixel == 1 {
            planes.push(samples);
        } else {
            for s in 0..samples_per_pixel {
                planes.push(
                    samples
                        .iter()
                        .skip(s)
                        .step_by(samples_per_pixel)
                        .copied()
                        .collect(),
                );
            }
        }

        if !decoder.more_images() {
            break;
        }
        decoder.next_image().map_err(|e| Error::tiff(path, e))?;
    }

    let channels = if samples_per_pixel > 1 {
        samples_per_pixel
    } else {
        info.channels.unwrap_or(1).max(1)
    };

    tracing::debug!(
        path = %path.display(),
        width,
        height,
        channels,
        planes = planes.len(),
        "Loaded TIFF stack"
    );

    Ok(Hyperstack {
        title: file_title(path),
        width,
        height,
        channels,
        planes,
        bit_depth: bit_depth.unwrap_or_default(),
        calibration,
    })
}

/// Write a volume as a multi-page grayscale TIFF in its own bit depth.
///
/// The first page carries an ImageJ description so the stack reopens with
/// its slice count, unit and Z spacing.
pub fn save_volume(volume: &Volume, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let mut encoder = TiffEncoder::new(&mut writer).map_err(|e| Error::tiff(path, e))?;

    match volume.bit_depth() {
        BitDepth::U8 => {
            write_stack::<colortype::Gray8, _, _>(&mut encoder, volume, path, |v| v as u8)?
        }
        BitDepth::U16 => {
            write_stack::<colortype::Gray16, _, _>(&mut encoder, volume, path, |v| v as u16)?
        }
        BitDepth::F32 => {
            write_stack::<colortype::Gray32Float, _, _>(&mut encoder, volume, path, |v| v)?
        }
    }

    drop(encoder);
    writer.flush().map_err(|e| Error::io(path, e))?;
    Ok(())
}

fn write_stack<C, W, F>(
    encoder: &mut TiffEncoder<W>,
    volume: &Volume,
    path: &Path,
    convert: F,
) -> Result<()>
where
    C: colortype::ColorType,
    [C::Inner]: TiffValue,
    W: Write + Seek,
    F: Fn(f32) -> C::Inner,
{
    let description = ImageJInfo::format_stack(volume.depth(), volume.calibration());
    let pixels_per_unit = 1.0 / volume.calibration().pixel_width;
    let bit_depth = volume.bit_depth();

    for z in 0..volume.depth() {
        let buf: Vec<C::Inner> = volume
            .data()
            .slice(z)
            .iter()
            .map(|&v| convert(bit_depth.saturate(v)))
            .collect();

        let mut image = encoder
            .new_image::<C>(volume.width() as u32, volume.height() as u32)
            .map_err(|e| Error::tiff(path, e))?;
        if z == 0 {
            image
                .encoder()
                .write_tag(Tag::ImageDescription, description.as_str())
                .map_err(|e| Error::tiff(path, e))?;
        }
        image.resolution(ResolutionUnit::None, to_rational(pixels_per_unit));
        image.write_data(&buf).map_err(|e| Error::tiff(path, e))?;
    }

    Ok(())
}

fn decode_samples(image: DecodingResult, path: &Path) -> Result<(Vec<f32>, BitDepth)> {
    match image {
        DecodingResult::U8(buf) => Ok((buf.into_iter().map(f32::from).collect(), BitDepth::U8)),
        DecodingResult::U16(buf) => Ok((buf.into_iter().map(f32::from).collect(), BitDepth::U16)),
        DecodingResult::F32(buf) => Ok((buf, BitDepth::F32)),
        _ => Err(Error::Collaborator(format!(
            "unsupported TIFF sample format in '{}'",
            path.display()
        ))),
    }
}

fn read_calibration<R: Read + Seek>(decoder: &mut Decoder<R>, info: &ImageJInfo) -> Calibration {
    let x_res = read_rational(decoder, Tag::XResolution);
    let y_res = read_rational(decoder, Tag::YResolution).or(x_res);
    let resolution_unit = match decoder.find_tag(Tag::ResolutionUnit) {
        Ok(Some(Value::Short(unit))) => Some(unit),
        _ => None,
    };

    let unit = info.unit.clone().or_else(|| match resolution_unit {
        Some(2) => Some("inch".to_string()),
        Some(3) => Some("cm".to_string()),
        _ => None,
    });

    match unit {
        Some(unit) => Calibration {
            pixel_width: x_res.map_or(1.0, |r| 1.0 / r),
            pixel_height: y_res.map_or(1.0, |r| 1.0 / r),
            voxel_depth: info.spacing.unwrap_or(1.0),
            unit,
        },
        None => Calibration::default(),
    }
}

fn read_rational<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> Option<f64> {
    match decoder.find_tag(tag) {
        Ok(Some(Value::Rational(n, d))) if n != 0 && d != 0 => Some(n as f64 / d as f64),
        _ => None,
    }
}

fn to_rational(value: f64) -> Rational {
    if !value.is_finite() || value <= 0.0 {
        return Rational { n: 1, d: 1 };
    }

    let mut d: u32 = 1_000_000;
    while d > 1 && value * d as f64 > u32::MAX as f64 {
        d /= 10;
    }
    let n = (value * d as f64).round().clamp(1.0, u32::MAX as f64) as u32;
    Rational { n, d }
}

fn file_title(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
