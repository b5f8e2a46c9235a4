//! Pass executors.
//!
//! Every executor satisfies the same contract through [`PassExecutor::run_pass`]:
//!
//! - each worker reads a complete, unmodified pre-pass image (or the rows of
//!   it that its partition needs);
//! - each worker writes only its own rows of a separate output buffer;
//! - the call returns once every partition is merged back into the image.
//!
//! ```text
//! AnyExecutor
//!     +-- ThreadedExecutor      (rayon)
//!     +-- ProcessGroupExecutor  (child processes / in-process channels)
//!     +-- WgpuExecutor          (Vulkan/Metal/DX12)
//! ```

mod detect;
pub mod process;
mod threaded;

#[cfg(feature = "wgpu")]
mod wgpu_backend;

pub use detect::{describe_backends, detect_backends, BackendInfo};
pub use process::ProcessGroupExecutor;
pub use threaded::ThreadedExecutor;

#[cfg(feature = "wgpu")]
pub use wgpu_backend::WgpuExecutor;

use sobel_core::{plan, ImageBuffer, Partition, Pass, ValueRange};

use crate::config::BackendConfig;
#[cfg(not(feature = "wgpu"))]
use crate::ComputeError;
use crate::ComputeResult;

/// Available execution strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Shared-memory thread pool.
    #[default]
    Threads,
    /// Message-passing worker processes.
    Process,
    /// Accelerator offload via wgpu.
    Wgpu,
}

impl Backend {
    /// Check if this backend is available on current system.
    pub fn is_available(&self) -> bool {
        match self {
            Self::Threads => true,
            Self::Process => true,
            #[cfg(feature = "wgpu")]
            Self::Wgpu => WgpuExecutor::is_available(),
            #[cfg(not(feature = "wgpu"))]
            Self::Wgpu => false,
        }
    }

    /// Get human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Threads => "threads",
            Self::Process => "process",
            Self::Wgpu => "wgpu",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "threads" | "thread" => Ok(Self::Threads),
            "process" | "processes" => Ok(Self::Process),
            "wgpu" | "gpu" => Ok(Self::Wgpu),
            other => Err(format!(
                "unknown backend '{other}' (expected threads, process or wgpu)"
            )),
        }
    }
}

/// Runs one pass over a set of row partitions.
pub trait PassExecutor {
    /// Backend name, for logs and reports.
    fn name(&self) -> &'static str;

    /// Number of workers the executor was built with.
    fn workers(&self) -> u32;

    /// Partitions this executor will use for an image `height` rows tall.
    fn plan(&self, height: u32) -> ComputeResult<Vec<Partition>> {
        Ok(plan(height, self.workers())?)
    }

    /// Applies `pass` to every partition and swaps the result into `image`.
    ///
    /// Returns the range of values each partition wrote, in partition order.
    fn run_pass(
        &mut self,
        image: &mut ImageBuffer,
        partitions: &[Partition],
        pass: &Pass,
    ) -> ComputeResult<Vec<ValueRange>>;
}

/// Executor chosen at runtime.
pub enum AnyExecutor {
    Threads(ThreadedExecutor),
    Process(ProcessGroupExecutor),
    #[cfg(feature = "wgpu")]
    Wgpu(WgpuExecutor),
}

impl AnyExecutor {
    /// Backend of the wrapped executor.
    pub fn backend(&self) -> Backend {
        match self {
            Self::Threads(_) => Backend::Threads,
            Self::Process(_) => Backend::Process,
            #[cfg(feature = "wgpu")]
            Self::Wgpu(_) => Backend::Wgpu,
        }
    }
}

impl PassExecutor for AnyExecutor {
    fn name(&self) -> &'static str {
        match self {
            Self::Threads(e) => e.name(),
            Self::Process(e) => e.name(),
            #[cfg(feature = "wgpu")]
            Self::Wgpu(e) => e.name(),
        }
    }

    fn workers(&self) -> u32 {
        match self {
            Self::Threads(e) => e.workers(),
            Self::Process(e) => e.workers(),
            #[cfg(feature = "wgpu")]
            Self::Wgpu(e) => e.workers(),
        }
    }

    fn plan(&self, height: u32) -> ComputeResult<Vec<Partition>> {
        match self {
            Self::Threads(e) => e.plan(height),
            Self::Process(e) => e.plan(height),
            #[cfg(feature = "wgpu")]
            Self::Wgpu(e) => e.plan(height),
        }
    }

    fn run_pass(
        &mut self,
        image: &mut ImageBuffer,
        partitions: &[Partition],
        pass: &Pass,
    ) -> ComputeResult<Vec<ValueRange>> {
        match self {
            Self::Threads(e) => e.run_pass(image, partitions, pass),
            Self::Process(e) => e.run_pass(image, partitions, pass),
            #[cfg(feature = "wgpu")]
            Self::Wgpu(e) => e.run_pass(image, partitions, pass),
        }
    }
}

/// Builds the executor described by `config`.
pub fn create_executor(config: BackendConfig) -> ComputeResult<AnyExecutor> {
    match config {
        BackendConfig::Threads(cfg) => Ok(AnyExecutor::Threads(ThreadedExecutor::new(cfg)?)),
        BackendConfig::Process(cfg) => Ok(AnyExecutor::Process(ProcessGroupExecutor::spawn(cfg)?)),
        #[cfg(feature = "wgpu")]
        BackendConfig::Wgpu(cfg) => Ok(AnyExecutor::Wgpu(WgpuExecutor::new(cfg)?)),
        #[cfg(not(feature = "wgpu"))]
        BackendConfig::Wgpu(_) => Err(ComputeError::BackendNotAvailable(
            "wgpu support not compiled in (enable the `wgpu` feature)".into(),
        )),
    }
}
