//! Parallel execution of the Sobel pipeline.
//!
//! Three interchangeable [`PassExecutor`] strategies run the gradient and
//! rescale passes over row partitions:
//!
//! ```text
//! Pipeline<E: PassExecutor>
//!     +-- ThreadedExecutor      (rayon pool, shared read-only snapshot)
//!     +-- ProcessGroupExecutor  (worker processes, framed messages on pipes)
//!     +-- WgpuExecutor          (compute shaders, `wgpu` feature)
//! ```
//!
//! The [`Pipeline`] drives `Loaded -> GradientComputed -> RangeReduced ->
//! Rescaled -> Stored` identically for every backend; only the executor
//! differs.
//!
//! # Example
//!
//! ```ignore
//! use sobel_compute::{Pipeline, PipelineConfig, ThreadedConfig, ThreadedExecutor};
//!
//! let exec = ThreadedExecutor::new(ThreadedConfig { workers: 4 })?;
//! let mut pipeline = Pipeline::new(exec, PipelineConfig::default());
//! let report = pipeline.run_files("in.pgm", "out.pgm")?;
//! println!("{} rows in {} partitions", report.height, report.partitions);
//! ```

pub mod backend;
pub mod config;
pub mod pipeline;
#[cfg(feature = "wgpu")]
mod shaders;

pub use backend::{
    create_executor, describe_backends, detect_backends, AnyExecutor, Backend, BackendInfo,
    PassExecutor, ProcessGroupExecutor, ThreadedExecutor,
};
pub use backend::process::{run_worker, serve_stdio};
#[cfg(feature = "wgpu")]
pub use backend::WgpuExecutor;
pub use config::{
    BackendConfig, Distribution, PipelineConfig, ProcessGroupConfig, ThreadedConfig, WgpuConfig,
};
pub use pipeline::{Pipeline, PipelineReport, Stage};

use thiserror::Error;

/// Errors raised while executing the pipeline.
#[derive(Error, Debug)]
pub enum ComputeError {
    /// Executor configuration cannot work (e.g. fewer than two workers in a
    /// process group). Raised before any data moves.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("failed to create device: {0}")]
    DeviceCreation(String),

    #[error("GPU operation failed: {0}")]
    OperationFailed(String),

    /// A worker sent a frame that could not be decoded or did not match
    /// what was requested.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("worker {rank} failed: {reason}")]
    WorkerFailed { rank: u32, reason: String },

    /// Stages were driven out of order.
    #[error("stage error: {0}")]
    Stage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] sobel_core::Error),

    #[cfg(feature = "io")]
    #[error(transparent)]
    Raster(#[from] sobel_io::IoError),
}

pub type ComputeResult<T> = Result<T, ComputeError>;
