//! Shared-memory executor using a rayon thread pool.
//!
//! All workers read one immutable [`Snapshot`](sobel_core::Snapshot) of the
//! pre-pass image and write into disjoint [`RowBand`](sobel_core::RowBand)s
//! of a separate output buffer. No locks: `split_rows` hands out
//! non-overlapping `&mut` slices, and the pool's `install` returns only after
//! every band is done, which is the barrier between passes.

use std::time::Instant;

use rayon::prelude::*;
use sobel_core::{plan, split_rows, validate_partitions, ImageBuffer, Partition, Pass, ValueRange};
use tracing::{debug, trace};

use super::PassExecutor;
use crate::config::ThreadedConfig;
use crate::{ComputeError, ComputeResult};

/// Thread-pool executor.
pub struct ThreadedExecutor {
    pool: rayon::ThreadPool,
    workers: u32,
}

impl ThreadedExecutor {
    /// Builds a pool with `config.workers` threads.
    pub fn new(config: ThreadedConfig) -> ComputeResult<Self> {
        if config.workers == 0 {
            return Err(ComputeError::Configuration(
                "thread count must be at least 1".into(),
            ));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers as usize)
            .thread_name(|i| format!("sobel-worker-{i}"))
            .build()
            .map_err(|e| ComputeError::Configuration(format!("thread pool: {e}")))?;
        debug!(workers = config.workers, "thread pool ready");
        Ok(Self {
            pool,
            workers: config.workers,
        })
    }
}

impl PassExecutor for ThreadedExecutor {
    fn name(&self) -> &'static str {
        "threads"
    }

    fn workers(&self) -> u32 {
        self.workers
    }

    /// Never asks for more partitions than there are rows.
    fn plan(&self, height: u32) -> ComputeResult<Vec<Partition>> {
        Ok(plan(height, self.workers.min(height))?)
    }

    fn run_pass(
        &mut self,
        image: &mut ImageBuffer,
        partitions: &[Partition],
        pass: &Pass,
    ) -> ComputeResult<Vec<ValueRange>> {
        trace!(pass = pass.name(), partitions = partitions.len(), "threaded pass");
        validate_partitions(partitions, image.height())?;

        let start = Instant::now();
        let mut out = vec![0u32; image.len()];
        let ranges = {
            let snapshot = image.snapshot();
            let mut bands = split_rows(&mut out, image.width(), partitions)?;
            self.pool.install(|| {
                bands
                    .par_iter_mut()
                    .map(|band| pass.apply(&snapshot, band))
                    .collect::<Vec<_>>()
            })
        };
        image.replace_pixels(out)?;

        debug!(
            pass = pass.name(),
            workers = partitions.len(),
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "threaded pass done"
        );
        Ok(ranges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sobel_core::gradient_image;

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(
            ThreadedExecutor::new(ThreadedConfig { workers: 0 }),
            Err(ComputeError::Configuration(_))
        ));
    }

    #[test]
    fn test_plan_caps_at_height() {
        let exec = ThreadedExecutor::new(ThreadedConfig { workers: 8 }).unwrap();
        assert_eq!(exec.plan(3).unwrap().len(), 3);
        assert_eq!(exec.plan(100).unwrap().len(), 8);
    }

    #[test]
    fn test_gradient_matches_reference() {
        let px: Vec<u32> = (0..12 * 10).map(|i| (i * 97 % 256) as u32).collect();
        let reference = {
            let img = ImageBuffer::new(12, 10, 255, px.clone()).unwrap();
            gradient_image(&img.snapshot())
        };

        let mut exec = ThreadedExecutor::new(ThreadedConfig { workers: 3 }).unwrap();
        let mut img = ImageBuffer::new(12, 10, 255, px).unwrap();
        let parts = exec.plan(10).unwrap();
        let ranges = exec.run_pass(&mut img, &parts, &Pass::Gradient).unwrap();
        assert_eq!(img.pixels(), &reference[..]);
        assert_eq!(ranges.len(), 3);
    }

    #[test]
    fn test_rejects_foreign_partitions() {
        let mut exec = ThreadedExecutor::new(ThreadedConfig { workers: 2 }).unwrap();
        let mut img = ImageBuffer::zeros(4, 4, 255).unwrap();
        let parts = plan(5, 2).unwrap();
        assert!(exec.run_pass(&mut img, &parts, &Pass::Gradient).is_err());
    }
}
