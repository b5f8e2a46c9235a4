//! Error types for sobel-core operations.
//!
//! The [`Error`] enum covers failures of the data model and of the pure
//! numerics:
//! - Image construction (dimensions, buffer length, intensity range)
//! - Partition planning (worker count versus image height)
//! - Rescaling a flat image under [`FlatRangePolicy::Fail`](crate::FlatRangePolicy::Fail)
//!
//! # Usage
//!
//! ```rust
//! use sobel_core::{plan, Error};
//!
//! let err = plan(4, 8).unwrap_err();
//! assert!(matches!(err, Error::InvalidWorkerCount { workers: 8, height: 4 }));
//! ```

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or transforming an image.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Width or height is zero.
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Image width.
        width: u32,
        /// Image height.
        height: u32,
    },

    /// Pixel buffer length does not match `width * height`.
    #[error("buffer size mismatch: expected {expected}, got {actual}")]
    BufferSizeMismatch {
        /// Expected element count.
        expected: usize,
        /// Actual element count.
        actual: usize,
    },

    /// A maximum intensity outside `0..=255`.
    #[error("max intensity {0} outside 0..=255")]
    InvalidMaxIntensity(u32),

    /// Worker count is zero or exceeds the number of rows.
    #[error("cannot split {height} rows across {workers} workers")]
    InvalidWorkerCount {
        /// Requested workers.
        workers: u32,
        /// Image height in rows.
        height: u32,
    },

    /// Partitions do not tile `[0, height)` contiguously.
    #[error("invalid partition set: {0}")]
    InvalidPartitions(String),

    /// Global minimum equals global maximum, so the rescale has no span.
    ///
    /// Only returned under [`FlatRangePolicy::Fail`](crate::FlatRangePolicy::Fail).
    #[error("cannot rescale a flat image (every pixel is {value})")]
    FlatRange {
        /// The single value held by every pixel.
        value: u32,
    },

    /// Rescale requested before any value was reduced.
    #[error("cannot rescale: no values were reduced")]
    EmptyRange,

    /// A pixel or window lies outside the image.
    #[error("{0}")]
    OutOfBounds(String),
}
