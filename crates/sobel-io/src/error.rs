//! Error types for raster I/O.

use std::io;
use thiserror::Error;

/// Raster read/write error.
#[derive(Debug, Error)]
pub enum IoError {
    /// File open, read or write failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed header: magic token, dimensions, max value, or trailing data.
    #[error("format error: {0}")]
    Format(String),

    /// Pixel payload is short, unparsable, or exceeds the declared max value.
    #[error("pixel data error: {0}")]
    PixelData(String),

    /// Header and pixels do not form a valid image.
    #[error("invalid image: {0}")]
    Image(#[from] sobel_core::Error),
}

impl IoError {
    /// True for header/format problems, as opposed to pixel I/O problems.
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format(_))
    }
}

/// Result type for raster I/O.
pub type IoResult<T> = Result<T, IoError>;
