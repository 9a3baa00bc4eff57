//! Puncta - batch analysis of microscopy Z-stacks.
//!
//! For every selected multi-channel TIFF stack in an input tree the library:
//! - segments the cell volume by stack-histogram auto-thresholding and
//!   slice-wise binary cleanup, and masks the raw intensities with it
//! - measures area, mean and integrated density of every masked slice
//! - detects punctate spots with a 3D difference-of-Gaussians detector
//! - accumulates per-slice and per-file tables persisted as CSV
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use puncta::{BatchConfig, BatchOrchestrator};
//!
//! let config = BatchConfig {
//!     input_dir: "stacks".into(),
//!     output_dir: "results".into(),
//!     ..BatchConfig::default()
//! };
//! let report = BatchOrchestrator::new(config).run()?;
//! println!("{} files processed", report.processed.len());
//! ```

pub mod batch;
pub mod config;
pub(crate) mod convolution;
pub mod dog;
pub mod error;
pub mod masker;
pub mod measure;
pub mod morphology;
pub mod peaks;
pub mod table;
pub mod threshold;
pub mod volume;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Pipeline
// ============================================================================

pub use batch::{BatchOrchestrator, BatchReport, FileFailure};
pub use config::{BatchConfig, DogConfig, ExtremaType, MaskConfig, MeasureConfig};
pub use error::{Error, Result};

// ============================================================================
// Stages
// ============================================================================

pub use dog::{DogDetector, Peak};
pub use masker::{MaskOutput, ThresholdMasker};
pub use measure::{MeasurementRow, StackMeasurer};
pub use peaks::{AnnotationSet, PeakDetector, PeakRow, PointAnnotation};
pub use table::{ResultsTable, TableRow};
pub use threshold::ThresholdMethod;

// ============================================================================
// Data
// ============================================================================

pub use volume::{
    load_hyperstack, save_volume, BinaryVolume, BitDepth, Calibration, Hyperstack, Mask, Volume,
};
