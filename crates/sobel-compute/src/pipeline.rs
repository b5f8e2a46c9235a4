//! Two-pass pipeline orchestration.
//!
//! ```text
//! Loaded -> GradientComputed -> RangeReduced -> Rescaled -> Stored
//! ```
//!
//! Each arrow is a full barrier: the gradient pass completes on every worker
//! before the global range is reduced, and the rescale pass starts only once
//! that range is known. Stages never move backwards.

use std::time::{Duration, Instant};

use sobel_core::{reduce, ImageBuffer, Pass, Rescaler, ValueRange, MAX_INTENSITY};
use tracing::{debug, info, trace};

use crate::backend::PassExecutor;
use crate::config::PipelineConfig;
use crate::{ComputeError, ComputeResult};

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Loaded,
    GradientComputed,
    RangeReduced,
    Rescaled,
    Stored,
}

impl Stage {
    /// The only stage reachable from this one.
    pub fn next(self) -> Option<Stage> {
        match self {
            Self::Loaded => Some(Self::GradientComputed),
            Self::GradientComputed => Some(Self::RangeReduced),
            Self::RangeReduced => Some(Self::Rescaled),
            Self::Rescaled => Some(Self::Stored),
            Self::Stored => None,
        }
    }
}

/// Enforces strictly sequential stage transitions.
#[derive(Debug)]
struct StageTracker {
    current: Stage,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            current: Stage::Loaded,
        }
    }

    fn advance(&mut self, to: Stage) -> ComputeResult<()> {
        if self.current.next() != Some(to) {
            return Err(ComputeError::Stage(format!(
                "cannot move from {:?} to {:?}",
                self.current, to
            )));
        }
        info!(stage = ?to, "stage reached");
        self.current = to;
        Ok(())
    }
}

/// Summary of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// Executor that ran the passes.
    pub backend: &'static str,
    /// Workers the executor was built with.
    pub workers: u32,
    /// Partitions the passes ran over.
    pub partitions: usize,
    /// Image width.
    pub width: u32,
    /// Image height.
    pub height: u32,
    /// Global gradient range used for the rescale.
    pub range: ValueRange,
    /// Last stage reached.
    pub stage: Stage,
    /// Wall time of the gradient pass.
    pub gradient_time: Duration,
    /// Wall time of the rescale pass.
    pub rescale_time: Duration,
}

/// Gradient + rescale pipeline over one executor.
pub struct Pipeline<E: PassExecutor> {
    executor: E,
    config: PipelineConfig,
}

impl<E: PassExecutor> Pipeline<E> {
    pub fn new(executor: E, config: PipelineConfig) -> Self {
        Self { executor, config }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Runs both passes on `image` in place. On success every pixel lies in
    /// `0..=255` and the image's max intensity is 255.
    pub fn process(&mut self, image: &mut ImageBuffer) -> ComputeResult<PipelineReport> {
        let mut stages = StageTracker::new();
        self.process_tracked(image, &mut stages)
    }

    fn process_tracked(
        &mut self,
        image: &mut ImageBuffer,
        stages: &mut StageTracker,
    ) -> ComputeResult<PipelineReport> {
        trace!(width = image.width(), height = image.height(), "pipeline start");
        let partitions = self.executor.plan(image.height())?;
        debug!(
            backend = self.executor.name(),
            partitions = ?partitions.iter().map(|p| (p.start_row, p.row_count)).collect::<Vec<_>>(),
            "partition plan"
        );

        let start = Instant::now();
        let ranges = self.executor.run_pass(image, &partitions, &Pass::Gradient)?;
        let gradient_time = start.elapsed();
        stages.advance(Stage::GradientComputed)?;

        let range = reduce(ranges);
        debug!(min = range.min, max = range.max, "global gradient range");
        stages.advance(Stage::RangeReduced)?;

        let rescaler = Rescaler::new(range, self.config.flat_range)?;
        let start = Instant::now();
        self.executor
            .run_pass(image, &partitions, &Pass::Rescale(rescaler))?;
        image.set_max_intensity(MAX_INTENSITY)?;
        let rescale_time = start.elapsed();
        stages.advance(Stage::Rescaled)?;

        debug!(
            gradient_ms = gradient_time.as_secs_f64() * 1000.0,
            rescale_ms = rescale_time.as_secs_f64() * 1000.0,
            "passes done"
        );

        Ok(PipelineReport {
            backend: self.executor.name(),
            workers: self.executor.workers(),
            partitions: partitions.len(),
            width: image.width(),
            height: image.height(),
            range,
            stage: stages.current,
            gradient_time,
            rescale_time,
        })
    }

    /// Reads `input`, runs both passes and writes `output`.
    ///
    /// The output uses the input's raster variant unless
    /// [`PipelineConfig::output_format`] overrides it.
    #[cfg(feature = "io")]
    pub fn run_files<P, Q>(&mut self, input: P, output: Q) -> ComputeResult<PipelineReport>
    where
        P: AsRef<std::path::Path>,
        Q: AsRef<std::path::Path>,
    {
        let (mut image, input_format) = sobel_io::read(input.as_ref())?;
        let mut stages = StageTracker::new();
        info!(stage = ?Stage::Loaded, path = %input.as_ref().display(), "stage reached");

        let mut report = self.process_tracked(&mut image, &mut stages)?;

        let format = self.config.output_format.unwrap_or(input_format);
        sobel_io::write(output.as_ref(), &image, format)?;
        stages.advance(Stage::Stored)?;
        report.stage = stages.current;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ThreadedExecutor;
    use crate::config::ThreadedConfig;
    use sobel_core::FlatRangePolicy;

    fn threads(n: u32) -> Pipeline<ThreadedExecutor> {
        Pipeline::new(
            ThreadedExecutor::new(ThreadedConfig { workers: n }).unwrap(),
            PipelineConfig::default(),
        )
    }

    #[test]
    fn test_stage_order() {
        let mut t = StageTracker::new();
        assert!(t.advance(Stage::RangeReduced).is_err());
        t.advance(Stage::GradientComputed).unwrap();
        assert!(t.advance(Stage::GradientComputed).is_err());
        t.advance(Stage::RangeReduced).unwrap();
        t.advance(Stage::Rescaled).unwrap();
        t.advance(Stage::Stored).unwrap();
        assert_eq!(Stage::Stored.next(), None);
    }

    #[test]
    fn test_spike_image() {
        let mut px = vec![0u32; 25];
        px[12] = 100;
        let mut img = ImageBuffer::new(5, 5, 100, px).unwrap();
        let report = threads(2).process(&mut img).unwrap();

        assert_eq!(report.range, ValueRange { min: 0, max: 200 });
        assert_eq!(report.stage, Stage::Rescaled);
        assert_eq!(img.max_intensity(), 255);
        // 141 / 200 * 255 = 179.775
        #[rustfmt::skip]
        let expected = vec![
            0,   0,   0,   0, 0,
            0, 180, 255, 180, 0,
            0, 255,   0, 255, 0,
            0, 180, 255, 180, 0,
            0,   0,   0,   0, 0,
        ];
        assert_eq!(img.pixels(), &expected[..]);
    }

    #[test]
    fn test_all_zero_image_is_flat() {
        let mut img = ImageBuffer::zeros(4, 4, 255).unwrap();
        threads(2).process(&mut img).unwrap();
        assert!(img.pixels().iter().all(|&v| v == 0));

        let mut img = ImageBuffer::zeros(4, 4, 255).unwrap();
        let mut strict = Pipeline::new(
            ThreadedExecutor::new(ThreadedConfig { workers: 2 }).unwrap(),
            PipelineConfig::default().with_flat_range(FlatRangePolicy::Fail),
        );
        assert!(matches!(
            strict.process(&mut img),
            Err(ComputeError::Core(sobel_core::Error::FlatRange { value: 0 }))
        ));
    }
}
