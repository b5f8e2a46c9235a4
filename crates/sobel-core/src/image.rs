//! Image buffer types.
//!
//! - [`ImageBuffer`] - The single owned intensity grid of a run
//! - [`Snapshot`] - Immutable view of the pre-pass image (or a window of its rows)
//! - [`RowBand`] - Mutable band of an output buffer owned by one worker
//!
//! # Memory Layout
//!
//! Pixels are stored row-major, top to bottom, one `u32` per pixel:
//!
//! ```text
//! index = y * width + x
//! ```
//!
//! `u32` rather than `u8` because the gradient pass produces magnitudes up to
//! `ceil(sqrt(2) * 4 * 255)`, which only the rescale pass brings back into
//! `0..=255`.
//!
//! # Usage
//!
//! ```rust
//! use sobel_core::ImageBuffer;
//!
//! let img = ImageBuffer::new(3, 2, 255, vec![0, 1, 2, 3, 4, 5]).unwrap();
//! assert_eq!(img.get(2, 1), 5);
//! assert_eq!(img.snapshot().row(1), &[3, 4, 5]);
//! ```

use crate::{Error, Result};

/// Largest intensity a raster may declare, and the rescale target.
pub const MAX_INTENSITY: u32 = 255;

/// Owned row-major grayscale image.
///
/// Invariants: `width > 0`, `height > 0`, `max_intensity <= 255`,
/// `pixels.len() == width * height`.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    max_intensity: u32,
    pixels: Vec<u32>,
}

impl ImageBuffer {
    /// Builds an image from validated header fields and pixel data.
    pub fn new(width: u32, height: u32, max_intensity: u32, pixels: Vec<u32>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        if max_intensity > MAX_INTENSITY {
            return Err(Error::InvalidMaxIntensity(max_intensity));
        }
        let expected = pixel_count(width, height);
        if pixels.len() != expected {
            return Err(Error::BufferSizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            max_intensity,
            pixels,
        })
    }

    /// Creates an all-zero image.
    pub fn zeros(width: u32, height: u32, max_intensity: u32) -> Result<Self> {
        Self::new(width, height, max_intensity, vec![0; pixel_count(width, height)])
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Declared maximum intensity.
    pub fn max_intensity(&self) -> u32 {
        self.max_intensity
    }

    /// Sets the declared maximum intensity.
    pub fn set_max_intensity(&mut self, max_intensity: u32) -> Result<()> {
        if max_intensity > MAX_INTENSITY {
            return Err(Error::InvalidMaxIntensity(max_intensity));
        }
        self.max_intensity = max_intensity;
        Ok(())
    }

    /// Number of pixels.
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    /// Always false; an image has at least one pixel.
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Row-major pixel data.
    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Pixel at `(x, y)`. Panics when out of bounds, like slice indexing.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    /// Read-only view of the whole image.
    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            width: self.width,
            height: self.height,
            first_row: 0,
            pixels: &self.pixels,
        }
    }

    /// Swaps in the output of a completed pass.
    ///
    /// The previous contents are returned so callers can reuse the allocation.
    pub fn replace_pixels(&mut self, pixels: Vec<u32>) -> Result<Vec<u32>> {
        if pixels.len() != self.pixels.len() {
            return Err(Error::BufferSizeMismatch {
                expected: self.pixels.len(),
                actual: pixels.len(),
            });
        }
        Ok(std::mem::replace(&mut self.pixels, pixels))
    }

    /// Consumes the image, returning its pixel data.
    pub fn into_pixels(self) -> Vec<u32> {
        self.pixels
    }
}

impl std::fmt::Debug for ImageBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("max_intensity", &self.max_intensity)
            .field("pixels", &self.pixels.len())
            .finish()
    }
}

/// `width * height` as a buffer length.
#[inline]
pub(crate) fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

/// Immutable view of pre-pass pixels.
///
/// A snapshot covers rows `first_row..first_row + rows()` of an image that is
/// `height` rows tall. The whole-image snapshot has `first_row == 0`; the halo
/// windows handed to distributed workers cover only a partition plus its
/// boundary rows. Coordinates passed to [`get`](Self::get) are always absolute.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    width: u32,
    height: u32,
    first_row: u32,
    pixels: &'a [u32],
}

impl<'a> Snapshot<'a> {
    /// Builds a window of rows starting at `first_row` of a `width x height` image.
    pub fn window(width: u32, height: u32, first_row: u32, pixels: &'a [u32]) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidDimensions { width, height });
        }
        if pixels.len() % width as usize != 0 {
            return Err(Error::BufferSizeMismatch {
                expected: pixels.len() / width as usize * width as usize,
                actual: pixels.len(),
            });
        }
        let rows = (pixels.len() / width as usize) as u64;
        if first_row as u64 + rows > height as u64 {
            return Err(Error::OutOfBounds(format!(
                "window rows {}..{} exceed image height {}",
                first_row,
                first_row as u64 + rows,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            first_row,
            pixels,
        })
    }

    /// Image width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Full image height, not the window height.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// First row held by this view.
    pub fn first_row(&self) -> u32 {
        self.first_row
    }

    /// Number of rows held by this view.
    pub fn rows(&self) -> u32 {
        (self.pixels.len() / self.width as usize) as u32
    }

    /// Whether absolute row `y` is held by this view.
    pub fn holds_row(&self, y: u32) -> bool {
        y >= self.first_row && y - self.first_row < self.rows()
    }

    /// Pixel at absolute `(x, y)`.
    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u32 {
        self.pixels[(y - self.first_row) as usize * self.width as usize + x as usize]
    }

    /// Absolute row `y`.
    pub fn row(&self, y: u32) -> &'a [u32] {
        let start = (y - self.first_row) as usize * self.width as usize;
        &self.pixels[start..start + self.width as usize]
    }

    /// Underlying pixels of the view.
    pub fn pixels(&self) -> &'a [u32] {
        self.pixels
    }
}

/// A contiguous band of rows in an output buffer, owned by one worker.
#[derive(Debug)]
pub struct RowBand<'a> {
    start_row: u32,
    width: u32,
    out: &'a mut [u32],
}

impl<'a> RowBand<'a> {
    /// Wraps `out`, which must hold whole rows starting at `start_row`.
    pub fn new(start_row: u32, width: u32, out: &'a mut [u32]) -> Result<Self> {
        if width == 0 || out.len() % width as usize != 0 {
            return Err(Error::BufferSizeMismatch {
                expected: out.len() / width.max(1) as usize * width as usize,
                actual: out.len(),
            });
        }
        Ok(Self {
            start_row,
            width,
            out,
        })
    }

    /// First absolute row of the band.
    pub fn start_row(&self) -> u32 {
        self.start_row
    }

    /// Number of rows in the band.
    pub fn rows(&self) -> u32 {
        (self.out.len() / self.width as usize) as u32
    }

    /// Row width.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Absolute row range covered.
    pub fn row_range(&self) -> std::ops::Range<u32> {
        self.start_row..self.start_row + self.rows()
    }

    /// Mutable row at absolute `y`.
    pub fn row_mut(&mut self, y: u32) -> &mut [u32] {
        let start = (y - self.start_row) as usize * self.width as usize;
        &mut self.out[start..start + self.width as usize]
    }

    /// Band contents.
    pub fn values(&self) -> &[u32] {
        &*self.out
    }

    /// Mutable band contents.
    pub fn values_mut(&mut self) -> &mut [u32] {
        &mut *self.out
    }
}
