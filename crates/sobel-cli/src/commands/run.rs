//! Edge detection command.

use anyhow::{Context, Result};
use sobel_compute::backend::process::MIN_WORKERS;
use sobel_compute::{
    create_executor, Backend, BackendConfig, PassExecutor, Pipeline, PipelineConfig,
    ProcessGroupConfig, ThreadedConfig, WgpuConfig,
};
use tracing::info;

use super::UsageError;
use crate::RunArgs;

/// Runs the pipeline from `args.input` to `args.output`.
///
/// The backend is started before the input is read, so a bad worker count
/// fails without touching either file.
pub fn run(args: RunArgs, verbose: u8) -> Result<()> {
    let (Some(input), Some(output)) = (&args.input, &args.output) else {
        return Err(UsageError("expected INPUT and OUTPUT paths".into()).into());
    };

    let backend = backend_config(&args, verbose)?;
    let mut config = PipelineConfig::default().with_flat_range(args.flat);
    if let Some(format) = args.format {
        config = config.with_output_format(format);
    }

    let executor = create_executor(backend)
        .with_context(|| format!("failed to start the {} backend", args.backend))?;
    info!(backend = executor.name(), workers = executor.workers(), "executor ready");

    let mut pipeline = Pipeline::new(executor, config);
    let report = pipeline
        .run_files(input, output)
        .with_context(|| format!("failed to process {}", input.display()))?;

    if verbose > 0 {
        println!("{} -> {}", input.display(), output.display());
        println!(
            "  backend: {} ({} workers, {} partitions)",
            report.backend, report.workers, report.partitions
        );
        println!("  size: {}x{}", report.width, report.height);
        println!("  gradient range: {}..={}", report.range.min, report.range.max);
        println!(
            "  gradient: {:.2?}, rescale: {:.2?}",
            report.gradient_time, report.rescale_time
        );
    }
    Ok(())
}

fn parse_count(param: &str) -> Result<u32> {
    param
        .parse::<u32>()
        .map_err(|_| UsageError(format!("'{param}' is not a non-negative integer")).into())
}

/// Maps the backend flag and its positional parameters to an executor
/// configuration.
fn backend_config(args: &RunArgs, verbose: u8) -> Result<BackendConfig> {
    let params = args
        .params
        .iter()
        .map(|p| parse_count(p))
        .collect::<Result<Vec<_>>>()?;

    let config = match (args.backend, params.as_slice()) {
        (Backend::Threads, []) => BackendConfig::Threads(ThreadedConfig::default()),
        (Backend::Threads, &[workers]) => BackendConfig::Threads(ThreadedConfig { workers }),
        (Backend::Process, []) => {
            BackendConfig::Process(process_config(args, MIN_WORKERS, verbose)?)
        }
        (Backend::Process, &[workers]) => {
            BackendConfig::Process(process_config(args, workers, verbose)?)
        }
        (Backend::Wgpu, []) => BackendConfig::Wgpu(WgpuConfig::default()),
        (Backend::Wgpu, &[blocks, threads_per_block]) => BackendConfig::Wgpu(WgpuConfig {
            blocks,
            threads_per_block,
        }),
        (backend, params) => {
            let expected = match backend {
                Backend::Wgpu => "0 or 2",
                _ => "0 or 1",
            };
            return Err(UsageError(format!(
                "the {backend} backend takes {expected} parameters, got {}",
                params.len()
            ))
            .into());
        }
    };
    Ok(config)
}

/// Worker processes are this executable running the hidden `worker`
/// subcommand.
fn process_config(args: &RunArgs, workers: u32, verbose: u8) -> Result<ProcessGroupConfig> {
    let program = std::env::current_exe().context("cannot locate the sobel executable")?;
    let mut config = ProcessGroupConfig::new(workers, program)
        .with_arg("worker")
        .with_distribution(args.distribution);
    for _ in 0..verbose {
        config = config.with_arg("-v");
    }
    Ok(config)
}
