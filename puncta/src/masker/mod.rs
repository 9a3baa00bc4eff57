//! Cell-volume masking.
//!
//! Segments the cell body by global auto-thresholding, cleans the binary
//! volume slice by slice and multiplies the raw intensities by the resulting
//! `{0, 1}` mask. The raw volume is only read.

#[cfg(test)]
mod tests;

use crate::config::MaskConfig;
use crate::error::Result;
use crate::morphology;
use crate::threshold::{threshold_stack, ThresholdMethod};
use crate::volume::{Mask, Volume};

/// Suffix appended to the title of a masked volume.
pub const MASKED_TITLE_SUFFIX: &str = "_Masked";

/// Result of [`ThresholdMasker::mask_and_apply`].
#[derive(Debug, Clone)]
pub struct MaskOutput {
    /// Cleaned cell mask, `{0, 1}`.
    pub mask: Mask,
    /// Raw volume multiplied by the mask, titled `<title>_Masked`.
    pub masked: Volume,
}

#[derive(Debug, Clone, Default)]
pub struct ThresholdMasker {
    config: MaskConfig,
}

impl ThresholdMasker {
    pub fn new(config: MaskConfig) -> Self {
        Self { config }
    }

    /// Build the cell mask for `volume` with the named threshold method and
    /// apply it.
    ///
    /// The steps run in a fixed order: stack threshold, closing, bright
    /// outlier removal, hole filling, normalization, multiplication.
    /// Deterministic for a given input and method.
    pub fn mask_and_apply(&self, volume: &Volume, method_name: &str) -> Result<MaskOutput> {
        let method = ThresholdMethod::from_name(method_name)?;

        let binary = threshold_stack(volume, method);
        let binary = morphology::close(&binary);
        let binary = morphology::remove_bright_outliers(
            &binary,
            self.config.outlier_radius,
            self.config.outlier_threshold,
        );
        let binary = morphology::fill_holes(&binary);
        tracing::debug!(
            title = volume.title(),
            foreground = binary.foreground_count(),
            total = binary.data().len(),
            "Cell mask"
        );

        let mask = binary.normalize();
        let masked = volume.multiply(&mask, format!("{}{}", volume.title(), MASKED_TITLE_SUFFIX))?;

        Ok(MaskOutput { mask, masked })
    }

    /// [`Self::mask_and_apply`] with the configured method.
    pub fn mask(&self, volume: &Volume) -> Result<MaskOutput> {
        self.mask_and_apply(volume, &self.config.method)
    }
}
