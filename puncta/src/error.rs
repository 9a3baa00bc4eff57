//! Error types for the batch pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while processing a batch or a single file.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid parameters: unknown threshold method, bad sigmas, bad directories.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to read or write TIFF '{path}': {source}")]
    Tiff {
        path: PathBuf,
        #[source]
        source: tiff::TiffError,
    },

    #[error("Failed to write image '{path}': {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// An image operation received or produced data of an unexpected shape.
    #[error("Image operation failed: {0}")]
    Collaborator(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn tiff(path: impl Into<PathBuf>, source: tiff::TiffError) -> Self {
        Error::Tiff {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
