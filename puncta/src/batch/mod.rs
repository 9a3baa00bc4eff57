//! Batch traversal of an input tree.
//!
//! Every selected file is run through the same pipeline: load, split the
//! analysed channel, mask, measure, detect puncta, save the masked stack.
//! A file either contributes all of its rows to the shared tables or none:
//! rows are staged per file and committed only after the whole pipeline
//! succeeded, then flushed so finished work survives an interrupted run.
//! A failing file is logged and reported; the batch carries on.

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use common::file_utils::{file_name_str, files_recursive_sorted};

use crate::config::BatchConfig;
use crate::error::{Error, Result};
use crate::masker::ThresholdMasker;
use crate::measure::{MeasurementRow, StackMeasurer};
use crate::peaks::{AnnotationSet, PeakDetector, PeakRow};
use crate::table::ResultsTable;
use crate::volume::{load_hyperstack, save_volume};

/// Name of the per-file peak count table in the output directory.
pub const PEAKS_TABLE: &str = "Peaks.csv";
/// Name of the per-slice measurement table in the output directory.
pub const RESULTS_TABLE: &str = "Results.csv";
/// Suffix of the optional peak overlay image.
pub const OVERLAY_SUFFIX: &str = "_Peaks.png";

/// A selected file that could not be processed.
#[derive(Debug, Clone, PartialEq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    /// Files processed successfully, in processing order.
    pub processed: Vec<PathBuf>,
    pub failed: Vec<FileFailure>,
    /// Files seen but not selected.
    pub skipped: usize,
    /// Processed files whose outputs replaced those of an earlier file with
    /// the same name in this run.
    pub overwritten: Vec<PathBuf>,
    pub peak_rows: usize,
    pub measurement_rows: usize,
}

impl BatchReport {
    pub fn selected(&self) -> usize {
        self.processed.len() + self.failed.len()
    }

    /// Process exit code: 0 when every selected file succeeded.
    pub fn exit_code(&self) -> i32 {
        if self.failed.is_empty() {
            0
        } else {
            1
        }
    }
}

/// Rows produced by one file, kept apart until the file is done.
struct StagedRows {
    measurements: ResultsTable<MeasurementRow>,
    peaks: ResultsTable<PeakRow>,
}

pub struct BatchOrchestrator {
    config: BatchConfig,
    masker: ThresholdMasker,
    measurer: StackMeasurer,
    peak_detector: PeakDetector,
}

impl BatchOrchestrator {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            masker: ThresholdMasker::new(config.mask.clone()),
            measurer: StackMeasurer::new(config.measure.clone()),
            peak_detector: PeakDetector::new(config.dog.clone()),
            config,
        }
    }

    /// Run the whole batch.
    ///
    /// Errors are returned only for problems that stop the batch as a whole:
    /// invalid configuration, an unusable input or output directory, or a
    /// table that can no longer be written. Per-file failures end up in the
    /// report.
    pub fn run(&self) -> Result<BatchReport> {
        let config = &self.config;
        config.validate()?;

        if !config.input_dir.is_dir() {
            return Err(Error::Configuration(format!(
                "input directory '{}' does not exist or is not a directory",
                config.input_dir.display()
            )));
        }
        fs::create_dir_all(&config.output_dir).map_err(|e| Error::io(&config.output_dir, e))?;

        let files = files_recursive_sorted(&config.input_dir, Some(&config.output_dir))
            .map_err(|e| Error::io(&config.input_dir, e))?;

        tracing::info!(
            input = %config.input_dir.display(),
            output = %config.output_dir.display(),
            files = files.len(),
            extension = %config.extension,
            contains = %config.contains,
            method = %config.mask.method,
            "Starting batch"
        );

        let mut peaks = ResultsTable::<PeakRow>::create(&config.output_dir.join(PEAKS_TABLE))?;
        let mut measurements =
            ResultsTable::<MeasurementRow>::create(&config.output_dir.join(RESULTS_TABLE))?
                .with_decimals(config.measure.decimals);
        let mut annotations = AnnotationSet::new();
        let mut report = BatchReport::default();
        let mut written: HashSet<PathBuf> = HashSet::new();

        for path in files {
            let Some(file_name) = file_name_str(&path) else {
                report.skipped += 1;
                continue;
            };
            if !config.selects(file_name) {
                tracing::debug!(path = %path.display(), "Checking file");
                report.skipped += 1;
                continue;
            }

            tracing::info!(path = %path.display(), "Processing");
            match self.process_file(&path, file_name, &mut annotations) {
                Ok(staged) => {
                    measurements.commit(staged.measurements)?;
                    peaks.commit(staged.peaks)?;
                    measurements.flush()?;
                    peaks.flush()?;
                    let masked_path = self.masked_path(file_name);
                    if written.contains(&masked_path) {
                        tracing::warn!(
                            path = %path.display(),
                            output = %masked_path.display(),
                            "Output overwritten by a file with the same name"
                        );
                        report.overwritten.push(path.clone());
                    }
                    written.insert(masked_path);
                    report.processed.push(path);
                }
                Err(e) => {
                    tracing::error!(path = %path.display(), error = %e, "Failed to process file");
                    report.failed.push(FileFailure {
                        path,
                        error: e.to_string(),
                    });
                }
            }
        }

        report.peak_rows = peaks.len();
        report.measurement_rows = measurements.len();
        peaks.close()?;
        measurements.close()?;

        tracing::info!(
            processed = report.processed.len(),
            failed = report.failed.len(),
            skipped = report.skipped,
            overwritten = report.overwritten.len(),
            peak_rows = report.peak_rows,
            measurement_rows = report.measurement_rows,
            "Batch finished"
        );
        Ok(report)
    }

    fn process_file(
        &self,
        path: &Path,
        file_name: &str,
        annotations: &mut AnnotationSet,
    ) -> Result<StagedRows> {
        let config = &self.config;

        let stack = load_hyperstack(path)?;
        let raw = stack.split_channel(config.channel)?;

        let output = self.masker.mask_and_apply(&raw, &config.mask.method)?;

        let mut staged = StagedRows {
            measurements: ResultsTable::in_memory(),
            peaks: ResultsTable::in_memory(),
        };
        self.measurer
            .measure(&output.masked, &mut staged.measurements)?;
        let count = self
            .peak_detector
            .detect_and_record(&raw, annotations, &mut staged.peaks)?;

        let masked_path = self.masked_path(file_name);
        tracing::info!(path = %masked_path.display(), peaks = count, "Saving output");
        save_volume(&output.masked, &masked_path)?;

        if config.save_overlays {
            let overlay_path = config
                .output_dir
                .join(format!("{}{}", file_name, OVERLAY_SUFFIX));
            self.peak_detector
                .save_overlay(&raw, annotations, &overlay_path)?;
        }

        Ok(staged)
    }

    /// Outputs are written flat into the output directory, keyed by file name.
    fn masked_path(&self, file_name: &str) -> PathBuf {
        self.config
            .output_dir
            .join(format!("{}{}", file_name, self.config.masked_suffix))
    }
}
