//! 3x3 Sobel gradient kernel.
//!
//! For interior pixels:
//!
//! ```text
//! Gx = I(x+1,y-1) + 2*I(x+1,y) + I(x+1,y+1) - I(x-1,y-1) - 2*I(x-1,y) - I(x-1,y+1)
//! Gy = I(x-1,y+1) + 2*I(x,y+1) + I(x+1,y+1) - I(x-1,y-1) - 2*I(x,y-1) - I(x+1,y-1)
//! |G| = round(sqrt(Gx^2 + Gy^2))
//! ```
//!
//! Border pixels (first/last row or column) are 0; they are never computed.
//! Magnitudes are not clamped and may exceed 255.

use crate::image::{RowBand, Snapshot};

/// Horizontal and vertical Sobel responses at an interior pixel.
///
/// `(x, y)` must not lie on the image border, and the snapshot must hold rows
/// `y - 1..=y + 1`.
#[inline]
pub fn sobel_components(src: &Snapshot<'_>, x: u32, y: u32) -> (i64, i64) {
    let p = |dx: i32, dy: i32| -> i64 {
        src.get((x as i32 + dx) as u32, (y as i32 + dy) as u32) as i64
    };

    let gx = p(1, -1) + 2 * p(1, 0) + p(1, 1) - p(-1, -1) - 2 * p(-1, 0) - p(-1, 1);
    let gy = p(-1, 1) + 2 * p(0, 1) + p(1, 1) - p(-1, -1) - 2 * p(0, -1) - p(1, -1);
    (gx, gy)
}

/// `round(sqrt(gx^2 + gy^2))`.
#[inline]
pub fn magnitude(gx: i64, gy: i64) -> u32 {
    ((gx * gx + gy * gy) as f64).sqrt().round() as u32
}

/// Gradient magnitude at `(x, y)` with the zero-border policy.
pub fn gradient_at(src: &Snapshot<'_>, x: u32, y: u32) -> u32 {
    if x == 0 || y == 0 || x + 1 >= src.width() || y + 1 >= src.height() {
        return 0;
    }
    let (gx, gy) = sobel_components(src, x, y);
    magnitude(gx, gy)
}

/// Fills `band` with gradient magnitudes read from `src`.
///
/// `src` must hold every row of the band plus the row above and below it
/// (where those exist).
pub fn gradient_rows(src: &Snapshot<'_>, band: &mut RowBand<'_>) {
    let width = src.width();
    for y in band.row_range() {
        let row = band.row_mut(y);
        for (x, out) in (0..width).zip(row.iter_mut()) {
            *out = gradient_at(src, x, y);
        }
    }
}

/// Single-threaded gradient of a whole snapshot. Reference for the executors.
pub fn gradient_image(src: &Snapshot<'_>) -> Vec<u32> {
    let width = src.width();
    let height = src.height();
    let mut out = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            out.push(gradient_at(src, x, y));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ImageBuffer;

    fn spike_5x5() -> ImageBuffer {
        let mut px = vec![0u32; 25];
        px[2 * 5 + 2] = 100;
        ImageBuffer::new(5, 5, 255, px).unwrap()
    }

    #[test]
    fn test_all_zero_image() {
        let img = ImageBuffer::zeros(4, 4, 255).unwrap();
        assert!(gradient_image(&img.snapshot()).iter().all(|&v| v == 0));
    }

    #[test]
    fn test_single_spike() {
        let img = spike_5x5();
        let snap = img.snapshot();

        // The centre sees a symmetric neighbourhood of zeros.
        assert_eq!(sobel_components(&snap, 2, 2), (0, 0));
        // Edge-adjacent neighbours: one axis sees 2*100.
        assert_eq!(sobel_components(&snap, 1, 2), (200, 0));
        assert_eq!(sobel_components(&snap, 3, 2), (-200, 0));
        assert_eq!(sobel_components(&snap, 2, 1), (0, 200));
        assert_eq!(sobel_components(&snap, 2, 3), (0, -200));
        // Diagonal neighbours see 100 on both axes.
        assert_eq!(sobel_components(&snap, 1, 1), (100, 100));
        assert_eq!(sobel_components(&snap, 3, 3), (-100, -100));

        let out = gradient_image(&snap);
        #[rustfmt::skip]
        let expected = vec![
            0,   0,   0,   0, 0,
            0, 141, 200, 141, 0,
            0, 200,   0, 200, 0,
            0, 141, 200, 141, 0,
            0,   0,   0,   0, 0,
        ];
        assert_eq!(out, expected);
    }

    #[test]
    fn test_border_is_zero() {
        let px: Vec<u32> = (0..6 * 5).map(|i| (i * 37 % 256) as u32).collect();
        let img = ImageBuffer::new(6, 5, 255, px).unwrap();
        let out = gradient_image(&img.snapshot());
        for y in 0..5u32 {
            for x in 0..6u32 {
                if x == 0 || y == 0 || x == 5 || y == 4 {
                    assert_eq!(out[(y * 6 + x) as usize], 0, "({x},{y})");
                }
            }
        }
    }

    #[test]
    fn test_tiny_images_are_all_border() {
        for (w, h) in [(1, 1), (2, 2), (1, 5), (5, 2)] {
            let img = ImageBuffer::new(w, h, 255, vec![200; (w * h) as usize]).unwrap();
            assert!(gradient_image(&img.snapshot()).iter().all(|&v| v == 0));
        }
    }

    #[test]
    fn test_magnitude_rounds() {
        assert_eq!(magnitude(3, 4), 5);
        assert_eq!(magnitude(1, 1), 1); // 1.414
        assert_eq!(magnitude(1, 2), 2); // 2.236
        assert_eq!(magnitude(2, 2), 3); // 2.828
        assert_eq!(magnitude(-1020, -1020), 1442); // 1442.497
    }

    #[test]
    fn test_gradient_rows_matches_reference() {
        let px: Vec<u32> = (0..7 * 6).map(|i| (i * 53 % 251) as u32).collect();
        let img = ImageBuffer::new(7, 6, 255, px).unwrap();
        let snap = img.snapshot();
        let reference = gradient_image(&snap);

        let mut out = vec![0u32; 7 * 2];
        let mut band = RowBand::new(2, 7, &mut out).unwrap();
        gradient_rows(&snap, &mut band);
        assert_eq!(&out[..], &reference[14..28]);
    }

    #[test]
    fn test_gradient_rows_from_halo_window() {
        let px: Vec<u32> = (0..5 * 8).map(|i| (i * 29 % 200) as u32).collect();
        let img = ImageBuffer::new(5, 8, 255, px.clone()).unwrap();
        let reference = gradient_image(&img.snapshot());

        // Rows 3..5 need rows 2..6.
        let window = Snapshot::window(5, 8, 2, &px[10..30]).unwrap();
        let mut out = vec![0u32; 10];
        let mut band = RowBand::new(3, 5, &mut out).unwrap();
        gradient_rows(&window, &mut band);
        assert_eq!(&out[..], &reference[15..25]);
    }
}
