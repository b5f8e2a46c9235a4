//! # sobel-io
//!
//! PGM raster reader and writer for sobel-rs.
//!
//! Two variants are supported, selected by the magic token:
//!
//! - **P2** - whitespace-separated decimal intensities ([`AsciiCodec`])
//! - **P5** - one raw byte per pixel ([`BinaryCodec`])
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use sobel_io::{read, write};
//!
//! let (image, format) = read("input.pgm")?;
//! write("copy.pgm", &image, format)?;
//! # Ok::<(), sobel_io::IoError>(())
//! ```
//!
//! # Errors
//!
//! Header problems surface as [`IoError::Format`]; file access failures as
//! [`IoError::Io`]; a short or malformed payload as [`IoError::PixelData`].
//! The binary maps these to distinct exit codes.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod codec;
mod error;
mod header;

pub use codec::{load, store, AsciiCodec, BinaryCodec, RasterCodec};
pub use error::{IoError, IoResult};
pub use header::{read_header, write_header, Header, RasterFormat};

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor};
use std::path::Path;

use sobel_core::ImageBuffer;
use tracing::debug;

/// Reads a raster file, returning the image and the variant it was stored in.
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<(ImageBuffer, RasterFormat)> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let (image, format) = load(&mut reader)?;
    debug!(
        path = %path.display(),
        %format,
        width = image.width(),
        height = image.height(),
        "read raster"
    );
    Ok((image, format))
}

/// Writes `image` to `path` in the given variant.
pub fn write<P: AsRef<Path>>(path: P, image: &ImageBuffer, format: RasterFormat) -> IoResult<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    store(image, format, &mut writer)?;
    debug!(path = %path.display(), %format, "wrote raster");
    Ok(())
}

/// Parses a raster held in memory.
pub fn from_bytes(data: &[u8]) -> IoResult<(ImageBuffer, RasterFormat)> {
    load(&mut Cursor::new(data))
}

/// Encodes a raster into memory.
pub fn to_bytes(image: &ImageBuffer, format: RasterFormat) -> IoResult<Vec<u8>> {
    let mut buf = Vec::new();
    store(image, format, &mut buf)?;
    Ok(buf)
}
