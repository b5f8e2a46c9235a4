//! Passes applied by the executors.
//!
//! A [`Pass`] is plain data: it says *what* to compute for one partition, and
//! every backend applies it the same way through [`Pass::apply`]. That keeps
//! the numerics in one place while the executors only differ in how they move
//! snapshots and bands between workers.

use serde::{Deserialize, Serialize};

use crate::image::{RowBand, Snapshot};
use crate::kernel::gradient_rows;
use crate::range::{Rescaler, ValueRange};

/// One of the two parallel passes of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pass {
    /// Replace each pixel with its Sobel gradient magnitude.
    Gradient,
    /// Map each pixel through the global rescale.
    Rescale(Rescaler),
}

impl Pass {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gradient => "gradient",
            Self::Rescale(_) => "rescale",
        }
    }

    /// Writes this pass's output for `band`, reading only from `src`.
    ///
    /// Returns the range of the values written, which the gradient pass
    /// feeds into the global reduction.
    pub fn apply(&self, src: &Snapshot<'_>, band: &mut RowBand<'_>) -> ValueRange {
        match self {
            Self::Gradient => gradient_rows(src, band),
            Self::Rescale(rescaler) => rescaler.rescale_rows(src, band),
        }
        ValueRange::of(band.values())
    }
}

impl std::fmt::Display for Pass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
