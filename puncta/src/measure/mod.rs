//! Per-slice intensity statistics of a masked volume.
//!
//! Pixels outside `[lower, upper]` are excluded, which with the default
//! `lower = 1` drops everything the cell mask zeroed. Each slice yields one
//! [`MeasurementRow`].


use rayon::prelude::*;

use crate::config::MeasureConfig;
use crate::error::Result;
use crate::table::{format_number, ResultsTable, TableRow};
use crate::volume::Volume;

/// Statistics of one slice.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRow {
    /// `<volume title>:<slice>`.
    pub label: String,
    /// 1-based slice number.
    pub slice: usize,
    /// Included pixel count times the calibrated pixel area.
    pub area: f64,
    /// Mean of included pixels, NaN when none are included.
    pub mean: f64,
    /// `area * mean`, zero when no pixel is included.
    pub int_den: f64,
    /// Sum of included pixel values.
    pub raw_int_den: f64,
}

impl TableRow for MeasurementRow {
    const COLUMNS: &'static [&'static str] =
        &["Label", "Slice", "Area", "Mean", "IntDen", "RawIntDen"];

    fn values(&self, decimals: usize) -> Vec<String> {
        vec![
            self.label.clone(),
            self.slice.to_string(),
            format_number(self.area, decimals),
            format_number(self.mean, decimals),
            format_number(self.int_den, decimals),
            format_number(self.raw_int_den, decimals),
        ]
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct SliceStats {
    count: u64,
    sum: f64,
}

#[derive(Debug, Clone, Default)]
pub struct StackMeasurer {
    config: MeasureConfig,
}

impl StackMeasurer {
    pub fn new(config: MeasureConfig) -> Self {
        Self { config }
    }

    /// Inclusive value range counted by [`Self::measure`] for `volume`.
    pub fn limits(&self, volume: &Volume) -> (f64, f64) {
        let upper = self
            .config
            .upper
            .unwrap_or_else(|| volume.bit_depth().max_value());
        (self.config.lower, upper)
    }

    /// Append one row per slice of `masked` to `table`, in slice order.
    ///
    /// Returns the number of rows appended, which equals the slice count.
    pub fn measure(
        &self,
        masked: &Volume,
        table: &mut ResultsTable<MeasurementRow>,
    ) -> Result<usize> {
        let (lower, upper) = self.limits(masked);
        let pixel_area = masked.calibration().pixel_area();
        let data = masked.data();

        let stats: Vec<SliceStats> = (0..masked.depth())
            .into_par_iter()
            .map(|z| {
                data.slice(z)
                    .iter()
                    .map(|&v| v as f64)
                    .filter(|&v| v >= lower && v <= upper)
                    .fold(SliceStats::default(), |acc, v| SliceStats {
                        count: acc.count + 1,
                        sum: acc.sum + v,
                    })
            })
            .collect();

        for (z, s) in stats.iter().enumerate() {
            let area = s.count as f64 * pixel_area;
            let (mean, int_den) = if s.count == 0 {
                (f64::NAN, 0.0)
            } else {
                let mean = s.sum / s.count as f64;
                (mean, area * mean)
            };
            table.append(MeasurementRow {
                label: format!("{}:{}", masked.title(), z + 1),
                slice: z + 1,
                area,
                mean,
                int_den,
                raw_int_den: s.sum,
            })?;
        }

        tracing::debug!(
            title = masked.title(),
            slices = stats.len(),
            lower,
            upper,
            "Measured slices"
        );
        Ok(stats.len())
    }
}
