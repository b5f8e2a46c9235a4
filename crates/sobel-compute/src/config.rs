//! Pipeline and executor configuration.

use std::ffi::OsString;
use std::path::PathBuf;

use sobel_core::FlatRangePolicy;

#[cfg(feature = "io")]
use sobel_io::RasterFormat;

/// Pipeline configuration.
#[derive(Clone, Debug, Default)]
pub struct PipelineConfig {
    /// What to do when the gradient image is flat.
    pub flat_range: FlatRangePolicy,
    /// Output raster variant (None = same as the input).
    #[cfg(feature = "io")]
    pub output_format: Option<RasterFormat>,
}

impl PipelineConfig {
    /// Sets the flat-range policy.
    pub fn with_flat_range(mut self, policy: FlatRangePolicy) -> Self {
        self.flat_range = policy;
        self
    }

    /// Forces the output raster variant.
    #[cfg(feature = "io")]
    pub fn with_output_format(mut self, format: RasterFormat) -> Self {
        self.output_format = Some(format);
        self
    }
}

/// Thread-pool executor configuration.
#[derive(Clone, Debug)]
pub struct ThreadedConfig {
    /// Number of worker threads. Capped at the image height when planning.
    pub workers: u32,
}

impl Default for ThreadedConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1);
        Self { workers }
    }
}

/// How the process-group coordinator ships the image for the gradient pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Distribution {
    /// Every worker receives the whole image.
    #[default]
    Broadcast,
    /// Every worker receives its own rows plus one boundary row on each side.
    Halo,
}

impl std::str::FromStr for Distribution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "broadcast" => Ok(Self::Broadcast),
            "halo" => Ok(Self::Halo),
            other => Err(format!("unknown distribution '{other}' (expected broadcast or halo)")),
        }
    }
}

/// Process-group executor configuration.
#[derive(Clone, Debug)]
pub struct ProcessGroupConfig {
    /// Number of worker processes, at least 2.
    pub workers: u32,
    /// Program to spawn for each worker. It must speak the worker protocol
    /// on stdin/stdout (see [`serve_stdio`](crate::serve_stdio)).
    pub program: PathBuf,
    /// Arguments passed to `program`.
    pub args: Vec<OsString>,
    /// Gradient-pass data distribution.
    pub distribution: Distribution,
}

impl ProcessGroupConfig {
    /// Worker count and program, with no arguments and broadcast distribution.
    pub fn new(workers: u32, program: impl Into<PathBuf>) -> Self {
        Self {
            workers,
            program: program.into(),
            args: Vec::new(),
            distribution: Distribution::Broadcast,
        }
    }

    /// Adds an argument for the worker program.
    pub fn with_arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Sets the gradient-pass distribution.
    pub fn with_distribution(mut self, distribution: Distribution) -> Self {
        self.distribution = distribution;
        self
    }
}

/// Accelerator sizing: `blocks * threads_per_block` work-items in work groups
/// of `threads_per_block`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WgpuConfig {
    /// Number of work groups dispatched.
    pub blocks: u32,
    /// Work-items per work group.
    pub threads_per_block: u32,
}

impl Default for WgpuConfig {
    fn default() -> Self {
        Self {
            blocks: 64,
            threads_per_block: 256,
        }
    }
}

/// Configuration for one of the three executors.
#[derive(Clone, Debug)]
pub enum BackendConfig {
    Threads(ThreadedConfig),
    Process(ProcessGroupConfig),
    Wgpu(WgpuConfig),
}
