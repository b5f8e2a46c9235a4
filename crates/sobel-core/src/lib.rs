//! # sobel-core
//!
//! Core types for Sobel gradient-magnitude edge detection.
//!
//! This crate holds everything that does not depend on how work is scheduled:
//!
//! - [`ImageBuffer`] - Owned row-major grayscale intensity grid
//! - [`Snapshot`] / [`RowBand`] - Read-only pre-pass view and disjoint write band
//! - [`Partition`], [`plan`] - Deterministic row partitioning across workers
//! - [`gradient_at`] - The 3x3 Sobel kernel with a zero border
//! - [`ValueRange`], [`Rescaler`] - Min/max reduction and the rescale pass
//! - [`Pass`] - A pass applied to one partition, shared by every backend
//!
//! ## Crate Structure
//!
//! ```text
//! sobel-core (this crate)
//!    ^
//!    |
//!    +-- sobel-io      (P2/P5 raster codec)
//!    +-- sobel-compute (threads, process group, wgpu executors + pipeline)
//!    +-- sobel-cli     (binary)
//! ```
//!
//! ## Disjointness
//!
//! Workers never share write access. A pass reads from a [`Snapshot`] of the
//! pre-pass image and writes into a [`RowBand`], which is a `&mut` slice of a
//! separate output buffer obtained through [`split_rows`]. The borrow checker
//! guarantees that two bands never overlap.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod image;
pub mod kernel;
pub mod partition;
pub mod pass;
pub mod range;

pub use error::{Error, Result};
pub use image::{ImageBuffer, RowBand, Snapshot, MAX_INTENSITY};
pub use kernel::{gradient_at, gradient_image, gradient_rows, magnitude, sobel_components};
pub use partition::{plan, split_rows, validate_partitions, Partition};
pub use pass::Pass;
pub use range::{reduce, FlatRangePolicy, Rescaler, ValueRange};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::image::{ImageBuffer, RowBand, Snapshot};
    pub use crate::partition::{plan, Partition};
    pub use crate::pass::Pass;
    pub use crate::range::{FlatRangePolicy, Rescaler, ValueRange};
}
