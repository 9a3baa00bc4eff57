//! Punctum detection and per-file recording.
//!
//! [`PeakDetector`] runs DoG detection on a raw volume, turns every peak into
//! a [`PointAnnotation`] and appends one [`PeakRow`] with the count. The
//! annotation set is owned by the caller and cleared at the start of every
//! call, so points never carry over from a previous file.

mod overlay;


use std::path::Path;

pub use overlay::save_overlay;

use crate::config::DogConfig;
use crate::dog::{DogDetector, Peak};
use crate::error::Result;
use crate::table::{ResultsTable, TableRow};
use crate::volume::Volume;

/// A marked point: pixel position in the slice plus the 0-based slice index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointAnnotation {
    pub x: f64,
    pub y: f64,
    pub slice: usize,
}

impl From<&Peak> for PointAnnotation {
    fn from(peak: &Peak) -> Self {
        Self {
            x: peak.position.x,
            y: peak.position.y,
            slice: peak.slice(),
        }
    }
}

/// Ordered point annotations for the file currently being processed.
#[derive(Debug, Clone, Default)]
pub struct AnnotationSet {
    points: Vec<PointAnnotation>,
}

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn add(&mut self, point: PointAnnotation) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PointAnnotation> {
        self.points.iter()
    }

    /// Points lying in slice `z`.
    pub fn in_slice(&self, z: usize) -> impl Iterator<Item = &PointAnnotation> {
        self.points.iter().filter(move |p| p.slice == z)
    }
}

impl<'a> IntoIterator for &'a AnnotationSet {
    type Item = &'a PointAnnotation;
    type IntoIter = std::slice::Iter<'a, PointAnnotation>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// Peak count of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeakRow {
    pub file: String,
    pub peak_count: usize,
}

impl TableRow for PeakRow {
    const COLUMNS: &'static [&'static str] = &["File", "Peak Number"];

    fn values(&self, _decimals: usize) -> Vec<String> {
        vec![self.file.clone(), self.peak_count.to_string()]
    }
}

#[derive(Debug, Clone, Default)]
pub struct PeakDetector {
    detector: DogDetector,
}

impl PeakDetector {
    pub fn new(config: DogConfig) -> Self {
        Self {
            detector: DogDetector::new(config),
        }
    }

    /// Detect puncta in `raw`, replace the contents of `annotations` with
    /// them and append one row to `table`.
    ///
    /// Returns the peak count, always equal to `annotations.len()`.
    pub fn detect_and_record(
        &self,
        raw: &Volume,
        annotations: &mut AnnotationSet,
        table: &mut ResultsTable<PeakRow>,
    ) -> Result<usize> {
        annotations.clear();

        let peaks = self.detector.detect(raw)?;
        for peak in &peaks {
            annotations.add(PointAnnotation::from(peak));
        }

        let count = annotations.len();
        table.append(PeakRow {
            file: raw.title().to_string(),
            peak_count: count,
        })?;

        tracing::debug!(title = raw.title(), peaks = count, "Recorded peaks");
        Ok(count)
    }

    /// Write `annotations` over the max projection of `raw` as a PNG.
    pub fn save_overlay(&self, raw: &Volume, annotations: &AnnotationSet, path: &Path) -> Result<()> {
        save_overlay(raw, annotations, path)
    }
}
