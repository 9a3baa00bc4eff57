//! ImageJ `ImageDescription` header: hyperstack layout and Z calibration.

use super::Calibration;

const IMAGEJ_VERSION: &str = "1.54f";

/// Keys of the ImageJ description that affect how planes are interpreted.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ImageJInfo {
    pub channels: Option<usize>,
    pub spacing: Option<f64>,
    pub unit: Option<String>,
}

impl ImageJInfo {
    /// Parse a description written by ImageJ. Returns `None` for any other
    /// description text.
    pub fn parse(description: &str) -> Option<Self> {
        if !description.starts_with("ImageJ=") {
            return None;
        }

        let mut info = ImageJInfo::default();
        for line in description.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "channels" => info.channels = value.parse().ok(),
                "spacing" => info.spacing = value.parse().ok(),
                "unit" => info.unit = Some(unescape_unit(value)),
                _ => {}
            }
        }
        Some(info)
    }

    /// Description for a single channel stack of `depth` slices.
    pub fn format_stack(depth: usize, calibration: &Calibration) -> String {
        let mut text = format!("ImageJ={}\nimages={}\n", IMAGEJ_VERSION, depth);
        if depth > 1 {
            text.push_str(&format!("slices={}\n", depth));
        }
        if calibration.unit != "pixel" {
            text.push_str(&format!("unit={}\n", escape_unit(&calibration.unit)));
        }
        if depth > 1 && calibration.voxel_depth != 1.0 {
            text.push_str(&format!("spacing={}\n", calibration.voxel_depth));
        }
        text.push_str("loop=false\n");
        text
    }
}

// ImageJ writes the micro sign as a Java escape.
fn unescape_unit(unit: &str) -> String {
    unit.replace("\\u00B5", "\u{00B5}")
}

fn escape_unit(unit: &str) -> String {
    unit.replace('\u{00B5}', "\\u00B5")
}
