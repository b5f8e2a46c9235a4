//! Hidden worker entry point for the process backend.

use anyhow::{Context, Result};

/// Serves one coordinator over stdin/stdout until it shuts the worker down.
pub fn run() -> Result<()> {
    sobel_compute::serve_stdio().context("worker failed")
}
