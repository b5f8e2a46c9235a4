//! Pixel payload codecs.
//!
//! [`RasterCodec`] is the load/store capability for one [`RasterFormat`].
//! The two implementations are zero-sized and picked by tag through
//! [`load`] / [`store`], so there is no shared base type to dispatch through.

use std::io::{BufRead, ErrorKind, Read, Write};

use sobel_core::ImageBuffer;
use tracing::trace;

use crate::header::{read_header, write_header, Header, RasterFormat};
use crate::{IoError, IoResult};

/// Reads and writes the pixel payload of one raster variant.
pub trait RasterCodec {
    /// Variant handled by this codec.
    const FORMAT: RasterFormat;

    /// Reads exactly `header.pixel_count()` pixels following the header.
    fn read_pixels<R: BufRead>(&self, header: &Header, reader: &mut R) -> IoResult<Vec<u32>>;

    /// Writes the pixel payload of `image`.
    fn write_pixels<W: Write>(&self, image: &ImageBuffer, writer: &mut W) -> IoResult<()>;

    /// Reads pixels for an already-parsed header and builds the image.
    fn load<R: BufRead>(&self, header: &Header, reader: &mut R) -> IoResult<ImageBuffer> {
        let pixels = self.read_pixels(header, reader)?;
        Ok(ImageBuffer::new(
            header.width,
            header.height,
            header.max_value,
            pixels,
        )?)
    }

    /// Writes header and payload.
    fn store<W: Write>(&self, image: &ImageBuffer, writer: &mut W) -> IoResult<()> {
        let header = Header {
            format: Self::FORMAT,
            width: image.width(),
            height: image.height(),
            max_value: image.max_intensity(),
        };
        write_header(writer, &header)?;
        self.write_pixels(image, writer)?;
        writer.flush()?;
        Ok(())
    }
}

fn check_max(value: u32, max: u32, index: usize) -> IoResult<u32> {
    if value > max {
        return Err(IoError::PixelData(format!(
            "pixel {index} has value {value}, above max value {max}"
        )));
    }
    Ok(value)
}

/// `P2` codec: decimal tokens separated by whitespace.
#[derive(Debug, Clone, Copy, Default)]
pub struct AsciiCodec;

impl RasterCodec for AsciiCodec {
    const FORMAT: RasterFormat = RasterFormat::Ascii;

    fn read_pixels<R: BufRead>(&self, header: &Header, reader: &mut R) -> IoResult<Vec<u32>> {
        let mut text = String::new();
        reader.read_to_string(&mut text).map_err(|e| match e.kind() {
            ErrorKind::InvalidData => IoError::PixelData("pixel data is not text".into()),
            _ => IoError::Io(e),
        })?;

        // Every value takes at least one digit and one separator.
        let expected = header.pixel_count();
        let mut pixels = Vec::with_capacity(expected.min(text.len() / 2 + 1));
        for token in text.split_whitespace() {
            let index = pixels.len();
            if index == expected {
                return Err(IoError::PixelData(format!(
                    "more than {expected} pixel values"
                )));
            }
            let value = token.parse::<u32>().map_err(|_| {
                IoError::PixelData(format!("pixel {index} is not an intensity: '{token}'"))
            })?;
            pixels.push(check_max(value, header.max_value, index)?);
        }
        if pixels.len() != expected {
            return Err(IoError::PixelData(format!(
                "expected {expected} pixel values, found {}",
                pixels.len()
            )));
        }
        trace!(count = pixels.len(), "read ascii pixels");
        Ok(pixels)
    }

    fn write_pixels<W: Write>(&self, image: &ImageBuffer, writer: &mut W) -> IoResult<()> {
        let width = image.width() as usize;
        let max = image.max_intensity();
        for (y, row) in image.pixels().chunks(width).enumerate() {
            let mut line = String::with_capacity(row.len() * 4);
            for (x, &v) in row.iter().enumerate() {
                check_max(v, max, y * width + x)?;
                if x > 0 {
                    line.push(' ');
                }
                line.push_str(&v.to_string());
            }
            line.push('\n');
            writer.write_all(line.as_bytes())?;
        }
        Ok(())
    }
}

/// `P5` codec: one raw byte per pixel.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl RasterCodec for BinaryCodec {
    const FORMAT: RasterFormat = RasterFormat::Binary;

    fn read_pixels<R: BufRead>(&self, header: &Header, reader: &mut R) -> IoResult<Vec<u32>> {
        // The header is untrusted, so the buffer grows with the bytes read.
        let expected = header.pixel_count();
        let mut bytes = Vec::new();
        reader.take(expected as u64).read_to_end(&mut bytes)?;
        if bytes.len() != expected {
            return Err(IoError::PixelData(format!(
                "expected {expected} pixel bytes, found {}",
                bytes.len()
            )));
        }
        let pixels = bytes
            .iter()
            .enumerate()
            .map(|(i, &b)| check_max(b as u32, header.max_value, i))
            .collect::<IoResult<Vec<u32>>>()?;
        trace!(count = pixels.len(), "read binary pixels");
        Ok(pixels)
    }

    fn write_pixels<W: Write>(&self, image: &ImageBuffer, writer: &mut W) -> IoResult<()> {
        let max = image.max_intensity();
        let bytes = image
            .pixels()
            .iter()
            .enumerate()
            .map(|(i, &v)| check_max(v, max, i).map(|v| v as u8))
            .collect::<IoResult<Vec<u8>>>()?;
        writer.write_all(&bytes)?;
        Ok(())
    }
}

/// Reads a header and dispatches to the codec it names.
pub fn load<R: BufRead>(reader: &mut R) -> IoResult<(ImageBuffer, RasterFormat)> {
    let header = read_header(reader)?;
    let image = match header.format {
        RasterFormat::Ascii => AsciiCodec.load(&header, reader)?,
        RasterFormat::Binary => BinaryCodec.load(&header, reader)?,
    };
    Ok((image, header.format))
}

/// Stores `image` with the codec for `format`.
pub fn store<W: Write>(image: &ImageBuffer, format: RasterFormat, writer: &mut W) -> IoResult<()> {
    match format {
        RasterFormat::Ascii => AsciiCodec.store(image, writer),
        RasterFormat::Binary => BinaryCodec.store(image, writer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn remaining<R: Read>(reader: &mut R) -> Vec<u8> {
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        rest
    }

    fn image(width: u32, height: u32, max: u32, px: &[u32]) -> ImageBuffer {
        ImageBuffer::new(width, height, max, px.to_vec()).unwrap()
    }

    #[test]
    fn test_ascii_layout() {
        let img = image(3, 2, 200, &[0, 10, 200, 3, 4, 5]);
        let mut buf = Vec::new();
        AsciiCodec.store(&img, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "P2\n3 2\n200\n0 10 200\n3 4 5\n");
    }

    #[test]
    fn test_ascii_tokens_span_lines() {
        let (img, fmt) = load(&mut Cursor::new("P2\n2 2\n9\n1\n2 3\n\t4  \n")).unwrap();
        assert_eq!(fmt, RasterFormat::Ascii);
        assert_eq!(img.pixels(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_ascii_count_mismatch() {
        let short = load(&mut Cursor::new("P2\n2 2\n9\n1 2 3\n")).unwrap_err();
        assert!(matches!(short, IoError::PixelData(_)));
        let long = load(&mut Cursor::new("P2\n2 2\n9\n1 2 3 4 5\n")).unwrap_err();
        assert!(matches!(long, IoError::PixelData(_)));
    }

    #[test]
    fn test_ascii_bad_token() {
        let err = load(&mut Cursor::new("P2\n2 1\n9\n1 x\n")).unwrap_err();
        assert!(matches!(err, IoError::PixelData(_)));
        let err = load(&mut Cursor::new("P2\n2 1\n9\n1 -2\n")).unwrap_err();
        assert!(matches!(err, IoError::PixelData(_)));
    }

    #[test]
    fn test_value_above_max() {
        let err = load(&mut Cursor::new("P2\n2 1\n9\n1 10\n")).unwrap_err();
        assert!(matches!(err, IoError::PixelData(_)));
        let err = load(&mut Cursor::new(b"P5\n2 1\n9\n\x01\x0a".to_vec())).unwrap_err();
        assert!(matches!(err, IoError::PixelData(_)));
    }

    #[test]
    fn test_binary_reads_exact_payload() {
        let mut cur = Cursor::new(b"P5\n2 2\n255\n\x00\x0a\xff\x80tail".to_vec());
        let (img, fmt) = load(&mut cur).unwrap();
        assert_eq!(fmt, RasterFormat::Binary);
        assert_eq!(img.pixels(), &[0, 10, 255, 128]);
        assert_eq!(remaining(&mut cur), b"tail");
    }

    #[test]
    fn test_binary_payload_may_contain_newlines() {
        let (img, _) = load(&mut Cursor::new(b"P5\n3 1\n255\n\n\n\x20".to_vec())).unwrap();
        assert_eq!(img.pixels(), &[10, 10, 32]);
    }

    #[test]
    fn test_binary_short_payload() {
        let err = load(&mut Cursor::new(b"P5\n2 2\n255\n\x00\x01\x02".to_vec())).unwrap_err();
        assert!(matches!(err, IoError::PixelData(_)));
    }

    #[test]
    fn test_huge_declared_size_is_pixel_error() {
        let err = load(&mut Cursor::new(b"P5\n4000000000 4000000000\n255\n\x01\x02".to_vec()))
            .unwrap_err();
        assert!(matches!(err, IoError::PixelData(_)));
        let err = load(&mut Cursor::new("P2\n4000000000 4000000000\n255\n1 2\n")).unwrap_err();
        assert!(matches!(err, IoError::PixelData(_)));
        let err = load(&mut Cursor::new("P2\n100000 100000\n255\n7\n")).unwrap_err();
        assert!(matches!(err, IoError::PixelData(_)));
    }

    #[test]
    fn test_store_rejects_values_above_max() {
        let mut img = image(2, 1, 255, &[0, 255]);
        img.replace_pixels(vec![0, 300]).unwrap();
        assert!(matches!(
            store(&img, RasterFormat::Binary, &mut Vec::new()),
            Err(IoError::PixelData(_))
        ));
        assert!(matches!(
            store(&img, RasterFormat::Ascii, &mut Vec::new()),
            Err(IoError::PixelData(_))
        ));
    }

    #[test]
    fn test_store_then_load_both_formats() {
        let img = image(4, 3, 250, &[0, 1, 2, 3, 50, 60, 70, 80, 247, 248, 249, 250]);
        for format in [RasterFormat::Ascii, RasterFormat::Binary] {
            let mut buf = Vec::new();
            store(&img, format, &mut buf).unwrap();
            let (back, fmt) = load(&mut Cursor::new(buf)).unwrap();
            assert_eq!(fmt, format);
            assert_eq!(back, img);
        }
    }
}
