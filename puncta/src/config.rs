//! Configuration types for the batch pipeline.
//!
//! [`BatchConfig`] groups the per-stage settings. Every field has a default
//! so a config file only needs to name what it changes; command line flags
//! are applied on top by the binary.

use std::path::{Path, PathBuf};

use common::serde::deserialize;
use common::SerdeFormat;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::error::{Error, Result};
use crate::threshold::ThresholdMethod;

// ============================================================================
// Enums
// ============================================================================

/// Which DoG extrema count as peaks.
///
/// The response is `G(large) - G(small)`, so bright spots on a dark background
/// are minima.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
pub enum ExtremaType {
    #[default]
    Minima,
    Maxima,
}

// ============================================================================
// Stage configuration
// ============================================================================

/// Cell mask construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskConfig {
    /// ImageJ auto-threshold method name, e.g. `Huang`.
    pub method: String,
    /// Radius of the circular outlier-removal kernel in pixels.
    pub outlier_radius: f64,
    /// How far above the local median a pixel must be to count as an outlier.
    pub outlier_threshold: f64,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            method: ThresholdMethod::default().to_string(),
            outlier_radius: 2.0,
            outlier_threshold: 50.0,
        }
    }
}

impl MaskConfig {
    pub fn validate(&self) -> Result<()> {
        ThresholdMethod::from_name(&self.method)?;
        if !(self.outlier_radius >= 0.0) {
            return Err(Error::Configuration(format!(
                "outlier_radius must be non-negative, got {}",
                self.outlier_radius
            )));
        }
        Ok(())
    }
}

/// Per-slice measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasureConfig {
    /// Smallest included pixel value.
    pub lower: f64,
    /// Largest included pixel value. `None` means the sample format maximum.
    pub upper: Option<f64>,
    /// Decimal places written to the results table.
    pub decimals: usize,
}

impl Default for MeasureConfig {
    fn default() -> Self {
        Self {
            lower: 1.0,
            upper: None,
            decimals: 2,
        }
    }
}

impl MeasureConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(upper) = self.upper {
            if !(upper >= self.lower) {
                return Err(Error::Configuration(format!(
                    "measurement range is empty: lower {} > upper {}",
                    self.lower, upper
                )));
            }
        }
        if self.decimals > 9 {
            return Err(Error::Configuration(format!(
                "decimals must be at most 9, got {}",
                self.decimals
            )));
        }
        Ok(())
    }
}

/// Difference-of-Gaussians peak detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DogConfig {
    /// Smaller Gaussian sigma in calibrated units.
    pub sigma_smaller: f64,
    /// Larger Gaussian sigma in calibrated units.
    pub sigma_larger: f64,
    /// Minimum absolute DoG response of a peak.
    pub min_peak_value: f64,
    /// Scale `min_peak_value` by `sigma_larger / sigma_smaller - 1`.
    pub normalized: bool,
    pub extrema: ExtremaType,
    /// Quadratic sub-pixel localization of each peak.
    pub subpixel: bool,
}

impl Default for DogConfig {
    fn default() -> Self {
        Self {
            sigma_smaller: 1.0,
            sigma_larger: 1.475,
            min_peak_value: 8.1,
            normalized: false,
            extrema: ExtremaType::Minima,
            subpixel: true,
        }
    }
}

impl DogConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.sigma_smaller > 0.0 && self.sigma_larger > 0.0) {
            return Err(Error::Configuration(format!(
                "DoG sigmas must be positive, got {} and {}",
                self.sigma_smaller, self.sigma_larger
            )));
        }
        if self.sigma_smaller >= self.sigma_larger {
            return Err(Error::Configuration(format!(
                "sigma_smaller ({}) must be below sigma_larger ({})",
                self.sigma_smaller, self.sigma_larger
            )));
        }
        if !(self.min_peak_value >= 0.0) {
            return Err(Error::Configuration(format!(
                "min_peak_value must be non-negative, got {}",
                self.min_peak_value
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Batch configuration
// ============================================================================

/// Complete batch run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Required file name suffix, case-sensitive.
    pub extension: String,
    /// Required file name substring, case-sensitive.
    pub contains: String,
    /// Channel of each hyperstack to analyse, 0-based.
    pub channel: usize,
    /// Appended to the input file name for the saved masked stack.
    pub masked_suffix: String,
    /// Write a max-projection PNG with the detected peaks per file.
    pub save_overlays: bool,
    pub mask: MaskConfig,
    pub measure: MeasureConfig,
    pub dog: DogConfig,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::new(),
            output_dir: PathBuf::new(),
            extension: ".tif".to_string(),
            contains: "crop".to_string(),
            channel: 0,
            masked_suffix: "_Masked.tif".to_string(),
            save_overlays: false,
            mask: MaskConfig::default(),
            measure: MeasureConfig::default(),
            dog: DogConfig::default(),
        }
    }
}

impl BatchConfig {
    /// Read a YAML or JSON config, chosen by the file extension.
    pub fn load(path: &Path) -> Result<Self> {
        let file_name = path.to_string_lossy();
        let format = SerdeFormat::from_file_name(&file_name)
            .map_err(|e| Error::Configuration(format!("{}: {}", path.display(), e)))?;
        let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
        deserialize(&bytes, format)
            .map_err(|e| Error::Configuration(format!("{}: {:#}", path.display(), e)))
    }

    /// Check every stage's parameters and the selection rules.
    ///
    /// Directories are checked when the batch starts, not here.
    pub fn validate(&self) -> Result<()> {
        if self.masked_suffix.is_empty() {
            return Err(Error::Configuration(
                "masked_suffix must not be empty, outputs would overwrite inputs".to_string(),
            ));
        }
        self.mask.validate()?;
        self.measure.validate()?;
        self.dog.validate()
    }

    /// True when a file name passes both selection rules.
    pub fn selects(&self, file_name: &str) -> bool {
        file_name.ends_with(&self.extension) && file_name.contains(&self.contains)
    }
}
