//! Append-only result tables persisted as CSV.
//!
//! A table's columns are fixed by its row type, so the header and every line
//! carry the same fields in the same order. File-backed tables write each row
//! as it is appended; [`ResultsTable::flush`] makes the lines durable, which
//! lets a long batch keep its results when it stops partway.


use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Number of decimal places used for floating point cells.
pub const DEFAULT_DECIMALS: usize = 2;

/// A row type with a fixed column layout.
pub trait TableRow {
    /// Column names in output order.
    const COLUMNS: &'static [&'static str];

    /// Cell text for each column, in [`Self::COLUMNS`] order.
    fn values(&self, decimals: usize) -> Vec<String>;
}

/// Format a floating point cell.
pub fn format_number(value: f64, decimals: usize) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else {
        format!("{:.*}", decimals, value)
    }
}

/// Quote a cell when it contains a separator, quote or line break.
pub fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[derive(Debug)]
struct CsvSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl CsvSink {
    fn write_line<S: AsRef<str>>(&mut self, cells: &[S]) -> Result<()> {
        let line = cells
            .iter()
            .map(|c| escape_field(c.as_ref()))
            .collect::<Vec<_>>()
            .join(",");
        writeln!(self.writer, "{}", line).map_err(|e| Error::io(&self.path, e))
    }
}

/// Ordered, append-only collection of rows of one type.
#[derive(Debug)]
pub struct ResultsTable<R> {
    rows: Vec<R>,
    sink: Option<CsvSink>,
    decimals: usize,
}

impl<R: TableRow> ResultsTable<R> {
    /// Table that only keeps rows in memory.
    pub fn in_memory() -> Self {
        Self {
            rows: Vec::new(),
            sink: None,
            decimals: DEFAULT_DECIMALS,
        }
    }

    /// Create (or truncate) a CSV file and write the header line.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| Error::io(path, e))?;
        let mut sink = CsvSink {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        };
        sink.write_line(R::COLUMNS)?;
        sink.writer.flush().map_err(|e| Error::io(path, e))?;

        Ok(Self {
            rows: Vec::new(),
            sink: Some(sink),
            decimals: DEFAULT_DECIMALS,
        })
    }

    pub fn with_decimals(mut self, decimals: usize) -> Self {
        self.decimals = decimals;
        self
    }

    /// Add one row at the end of the table.
    pub fn append(&mut self, row: R) -> Result<()> {
        if let Some(sink) = &mut self.sink {
            sink.write_line(&row.values(self.decimals))?;
        }
        self.rows.push(row);
        Ok(())
    }

    /// Move every row of `staged` to the end of this table, in order.
    pub fn commit(&mut self, staged: ResultsTable<R>) -> Result<usize> {
        let count = staged.rows.len();
        for row in staged.rows {
            self.append(row)?;
        }
        Ok(count)
    }

    /// Push buffered lines to the file. No-op for in-memory tables.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(sink) = &mut self.sink {
            sink.writer.flush().map_err(|e| Error::io(&sink.path, e))?;
        }
        Ok(())
    }

    /// Flush and release the file.
    pub fn close(mut self) -> Result<Vec<R>> {
        self.flush()?;
        Ok(self.rows)
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn path(&self) -> Option<&Path> {
        self.sink.as_ref().map(|s| s.path.as_path())
    }
}
