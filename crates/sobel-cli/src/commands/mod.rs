//! CLI command implementations and exit-code mapping.

pub mod backends;
pub mod run;
pub mod worker;

use sobel_compute::ComputeError;
use sobel_io::IoError;

pub const EXIT_USAGE: u8 = 1;
pub const EXIT_PIXEL_IO: u8 = 2;
pub const EXIT_FORMAT: u8 = 3;
pub const EXIT_CONFIGURATION: u8 = 4;
pub const EXIT_FAILURE: u8 = 5;

/// Bad command line. Reported with the usage text.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct UsageError(pub String);

/// Exit status for the first recognized cause in `err`'s chain.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if cause.downcast_ref::<UsageError>().is_some() {
            return EXIT_USAGE;
        }
        if let Some(e) = cause.downcast_ref::<ComputeError>() {
            return compute_exit_code(e);
        }
        if let Some(e) = cause.downcast_ref::<IoError>() {
            return raster_exit_code(e);
        }
        if let Some(e) = cause.downcast_ref::<sobel_core::Error>() {
            return core_exit_code(e);
        }
    }
    EXIT_FAILURE
}

fn compute_exit_code(err: &ComputeError) -> u8 {
    match err {
        ComputeError::Configuration(_) => EXIT_CONFIGURATION,
        ComputeError::Core(e) => core_exit_code(e),
        ComputeError::Raster(e) => raster_exit_code(e),
        _ => EXIT_FAILURE,
    }
}

fn raster_exit_code(err: &IoError) -> u8 {
    match err {
        IoError::Format(_) => EXIT_FORMAT,
        IoError::Image(e) => core_exit_code(e),
        IoError::Io(_) | IoError::PixelData(_) => EXIT_PIXEL_IO,
    }
}

fn core_exit_code(err: &sobel_core::Error) -> u8 {
    use sobel_core::Error;
    match err {
        Error::InvalidWorkerCount { .. } => EXIT_CONFIGURATION,
        Error::InvalidDimensions { .. } | Error::InvalidMaxIntensity(_) => EXIT_FORMAT,
        _ => EXIT_FAILURE,
    }
}
