//! sobel - parallel Sobel edge detection for PGM images
//!
//! Reads a P2/P5 image, computes the gradient magnitude, rescales it to
//! 0..255 and writes the result with one of three executors.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, CommandFactory, Parser, Subcommand};
use sobel_compute::{Backend, Distribution};
use sobel_core::FlatRangePolicy;
use sobel_io::RasterFormat;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "sobel")]
#[command(author, version, about = "Sobel edge detection for PGM images")]
#[command(args_conflicts_with_subcommands = true)]
#[command(long_about = "
Computes the Sobel gradient magnitude of a grayscale PGM image (P2 or P5),
rescales it to 0..255 and writes the result.

PARAM depends on the backend:
  threads   [THREADS]                    worker threads (default: all cores)
  process   [PROCESSES]                  worker processes, at least 2 (default 2)
  wgpu      [BLOCKS THREADS_PER_BLOCK]   dispatch sizing (default 64 256)

Examples:
  sobel in.pgm out.pgm                          # thread pool, all cores
  sobel in.pgm out.pgm 4                        # four threads
  sobel -b process in.pgm out.pgm 8             # eight worker processes
  sobel -b process --distribution halo in.pgm out.pgm 4
  sobel -b wgpu in.pgm out.pgm 128 256
  sobel --format binary in.pgm out.pgm          # write P5
  sobel backends                                # list backends
")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    run: RunArgs,

    /// Verbose output (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List execution backends and whether they are usable
    Backends,

    /// Serve the process-group worker protocol on stdin/stdout
    #[command(hide = true)]
    Worker,
}

#[derive(Args)]
struct RunArgs {
    /// Execution backend: threads, process, wgpu
    #[arg(short, long, default_value = "threads")]
    backend: Backend,

    /// How the process backend ships rows for the gradient pass: broadcast, halo
    #[arg(long, default_value = "broadcast")]
    distribution: Distribution,

    /// What to do when the gradient image is flat: zero, fail
    #[arg(long, default_value = "zero")]
    flat: FlatRangePolicy,

    /// Output variant: ascii (P2) or binary (P5). Defaults to the input's
    #[arg(short, long)]
    format: Option<RasterFormat>,

    /// Input image
    input: Option<PathBuf>,

    /// Output image
    output: Option<PathBuf>,

    /// Backend parameters
    #[arg(value_name = "PARAM")]
    params: Vec<String>,
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(commands::EXIT_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Backends) => commands::backends::run(),
        Some(Commands::Worker) => commands::worker::run(),
        None => commands::run::run(cli.run, cli.verbose),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let code = commands::exit_code(&err);
            eprintln!("error: {err:#}");
            if code == commands::EXIT_USAGE {
                eprintln!("\n{}", Cli::command().render_usage());
            }
            ExitCode::from(code)
        }
    }
}
