//! Row partitioning across workers.
//!
//! [`plan`] maps `(height, workers)` to contiguous, non-overlapping row ranges
//! that cover `[0, height)`. The first `height % workers` workers get one extra
//! row. Assignment follows worker id, so a given `(height, workers)` pair yields
//! the same partitions on every backend.
//!
//! Rows, not raw pixel counts, are the unit of division: the Sobel kernel
//! needs whole rows of context above and below each pixel.
//!
//! ```rust
//! use sobel_core::plan;
//!
//! let parts = plan(10, 3).unwrap();
//! let rows: Vec<u32> = parts.iter().map(|p| p.row_count).collect();
//! assert_eq!(rows, vec![4, 3, 3]);
//! ```

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::image::RowBand;
use crate::{Error, Result};

/// Row range assigned to one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Partition {
    /// Worker (thread, process rank) that owns the range.
    pub worker_id: u32,
    /// First row of the range.
    pub start_row: u32,
    /// Number of rows in the range.
    pub row_count: u32,
}

impl Partition {
    /// One past the last row.
    pub fn end_row(&self) -> u32 {
        self.start_row + self.row_count
    }

    /// Row range `[start_row, end_row)`.
    pub fn rows(&self) -> std::ops::Range<u32> {
        self.start_row..self.end_row()
    }

    /// First pixel index, `width * start_row`.
    pub fn start_index(&self, width: u32) -> usize {
        width as usize * self.start_row as usize
    }

    /// One past the last pixel index, `width * (start_row + row_count)`.
    pub fn end_index(&self, width: u32) -> usize {
        width as usize * self.end_row() as usize
    }

    /// Pixel index range of the partition.
    pub fn index_range(&self, width: u32) -> std::ops::Range<usize> {
        self.start_index(width)..self.end_index(width)
    }

    /// Rows needed to compute this partition: its own plus one halo row on
    /// each side, clipped to the image.
    pub fn halo_rows(&self, height: u32) -> std::ops::Range<u32> {
        self.start_row.saturating_sub(1)..(self.end_row() + 1).min(height)
    }
}

/// Splits `height` rows across `workers`.
///
/// Fails if `workers == 0` or `workers > height`.
pub fn plan(height: u32, workers: u32) -> Result<Vec<Partition>> {
    if workers == 0 || workers > height {
        return Err(Error::InvalidWorkerCount { workers, height });
    }

    let base = height / workers;
    let remainder = height % workers;

    let mut start_row = 0;
    let partitions: Vec<Partition> = (0..workers)
        .map(|worker_id| {
            let row_count = if worker_id < remainder { base + 1 } else { base };
            let part = Partition {
                worker_id,
                start_row,
                row_count,
            };
            start_row += row_count;
            part
        })
        .collect();

    debug!(height, workers, base, remainder, "planned row partitions");
    Ok(partitions)
}

/// Checks that `partitions` tile `[0, height)` in order with no gap or overlap.
pub fn validate_partitions(partitions: &[Partition], height: u32) -> Result<()> {
    if partitions.is_empty() {
        return Err(Error::InvalidPartitions("no partitions".into()));
    }
    let mut next = 0u32;
    for part in partitions {
        if part.row_count == 0 {
            return Err(Error::InvalidPartitions(format!(
                "worker {} has no rows",
                part.worker_id
            )));
        }
        if part.start_row != next {
            return Err(Error::InvalidPartitions(format!(
                "worker {} starts at row {}, expected {}",
                part.worker_id, part.start_row, next
            )));
        }
        next = part.end_row();
    }
    if next != height {
        return Err(Error::InvalidPartitions(format!(
            "partitions cover {next} rows, image has {height}"
        )));
    }
    Ok(())
}

/// Splits an output buffer into one mutable [`RowBand`] per partition.
///
/// Bands are carved with `split_at_mut`, so they cannot alias.
pub fn split_rows<'a>(
    out: &'a mut [u32],
    width: u32,
    partitions: &[Partition],
) -> Result<Vec<RowBand<'a>>> {
    let height = (out.len() / width.max(1) as usize) as u32;
    validate_partitions(partitions, height)?;

    let mut bands = Vec::with_capacity(partitions.len());
    let mut rest = out;
    for part in partitions {
        let len = part.row_count as usize * width as usize;
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(len);
        bands.push(RowBand::new(part.start_row, width, head)?);
        rest = tail;
    }
    Ok(bands)
}
