//! PGM header parsing.
//!
//! Layout accepted:
//!
//! ```text
//! P2|P5            magic, nothing but whitespace after it
//! # comment        any number of comment or blank lines
//! width height     both > 0, nothing after them
//! # comment
//! maxValue         0..=255, nothing after it
//! <pixel data>
//! ```
//!
//! Binary pixel data starts immediately after the newline that ends the
//! `maxValue` line.

use std::io::{BufRead, Write};
use std::str::FromStr;

use tracing::trace;

use crate::{IoError, IoResult};

/// Pixel encoding variant of a raster file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RasterFormat {
    /// `P2`: whitespace-separated decimal intensities.
    Ascii,
    /// `P5`: one raw byte per pixel.
    Binary,
}

impl RasterFormat {
    /// Magic token written on the first header line.
    pub fn magic(&self) -> &'static str {
        match self {
            Self::Ascii => "P2",
            Self::Binary => "P5",
        }
    }

    /// Parses a magic token.
    pub fn from_magic(magic: &str) -> Option<Self> {
        match magic {
            "P2" => Some(Self::Ascii),
            "P5" => Some(Self::Binary),
            _ => None,
        }
    }
}

impl FromStr for RasterFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ascii" | "text" | "p2" => Ok(Self::Ascii),
            "binary" | "raw" | "p5" => Ok(Self::Binary),
            other => Err(format!("unknown raster format '{other}' (expected ascii or binary)")),
        }
    }
}

impl std::fmt::Display for RasterFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Ascii => "ascii",
            Self::Binary => "binary",
        })
    }
}

/// Parsed raster header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Pixel encoding.
    pub format: RasterFormat,
    /// Width in pixels, > 0.
    pub width: u32,
    /// Height in pixels, > 0.
    pub height: u32,
    /// Declared maximum intensity, 0..=255.
    pub max_value: u32,
}

impl Header {
    /// Number of pixels the payload must hold.
    pub fn pixel_count(&self) -> usize {
        (self.width as usize).saturating_mul(self.height as usize)
    }
}

/// A line is a comment if its first non-whitespace character is `#`, or if it
/// is blank.
fn is_comment(line: &str) -> bool {
    match line.trim_start().chars().next() {
        None => true,
        Some(c) => c == '#',
    }
}

/// Reads one header line. Non-UTF-8 bytes (possible in comments) are replaced
/// rather than failing the read.
fn read_text_line<R: BufRead>(reader: &mut R, line: &mut String) -> IoResult<usize> {
    let mut raw = Vec::new();
    let n = reader.read_until(b'\n', &mut raw)?;
    line.clear();
    line.push_str(&String::from_utf8_lossy(&raw));
    Ok(n)
}

/// Reads lines until one is not a comment. EOF is a format error naming `what`.
fn next_field_line<R: BufRead>(reader: &mut R, line: &mut String, what: &str) -> IoResult<()> {
    loop {
        if read_text_line(reader, line)? == 0 {
            return Err(IoError::Format(format!("unexpected end of header, missing {what}")));
        }
        if !is_comment(line) {
            return Ok(());
        }
    }
}

fn parse_field(token: Option<&str>, what: &str) -> IoResult<i64> {
    let token = token.ok_or_else(|| IoError::Format(format!("cannot read {what}")))?;
    token
        .parse::<i64>()
        .map_err(|_| IoError::Format(format!("cannot read {what}: '{token}'")))
}

fn reject_trailing<'a>(mut rest: impl Iterator<Item = &'a str>, after: &str) -> IoResult<()> {
    match rest.next() {
        Some(extra) => Err(IoError::Format(format!("extra data after {after}: '{extra}'"))),
        None => Ok(()),
    }
}

/// Reads and validates a header, leaving `reader` at the first pixel byte.
pub fn read_header<R: BufRead>(reader: &mut R) -> IoResult<Header> {
    let mut line = String::new();
    if read_text_line(reader, &mut line)? == 0 {
        return Err(IoError::Format("empty file".into()));
    }

    let mut tokens = line.split_whitespace();
    let magic = tokens
        .next()
        .ok_or_else(|| IoError::Format("missing magic number".into()))?;
    let format = RasterFormat::from_magic(magic)
        .ok_or_else(|| IoError::Format(format!("unsupported magic number '{magic}'")))?;
    reject_trailing(tokens, "magic number")?;

    next_field_line(reader, &mut line, "width and height")?;
    let mut tokens = line.split_whitespace();
    let width = parse_field(tokens.next(), "width")?;
    let height = parse_field(tokens.next(), "height")?;
    reject_trailing(tokens, "width and height")?;
    if width <= 0 || height <= 0 || width > u32::MAX as i64 || height > u32::MAX as i64 {
        return Err(IoError::Format(format!(
            "width and height must be positive, got {width}x{height}"
        )));
    }

    next_field_line(reader, &mut line, "max value")?;
    let mut tokens = line.split_whitespace();
    let max_value = parse_field(tokens.next(), "max value")?;
    reject_trailing(tokens, "max value")?;
    if !(0..=255).contains(&max_value) {
        return Err(IoError::Format(format!("max value {max_value} outside 0..=255")));
    }

    let header = Header {
        format,
        width: width as u32,
        height: height as u32,
        max_value: max_value as u32,
    };
    trace!(?header, "read raster header");
    Ok(header)
}

/// Writes a header that [`read_header`] accepts.
pub fn write_header<W: Write>(writer: &mut W, header: &Header) -> IoResult<()> {
    writeln!(writer, "{}", header.format.magic())?;
    writeln!(writer, "{} {}", header.width, header.height)?;
    writeln!(writer, "{}", header.max_value)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(text: &str) -> IoResult<Header> {
        read_header(&mut Cursor::new(text.as_bytes()))
    }

    #[test]
    fn test_plain_header() {
        let h = parse("P2\n4 3\n255\n").unwrap();
        assert_eq!(
            h,
            Header { format: RasterFormat::Ascii, width: 4, height: 3, max_value: 255 }
        );
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let h = parse("P5  \n# made by hand\n\n   # indented\n7 2\n# max next\n100\n").unwrap();
        assert_eq!(h.format, RasterFormat::Binary);
        assert_eq!((h.width, h.height, h.max_value), (7, 2, 100));
    }

    #[test]
    fn test_reader_left_at_pixels() {
        let mut cur = Cursor::new(b"P5\n2 1\n255\n\x0a\x0b".to_vec());
        read_header(&mut cur).unwrap();
        assert_eq!(cur.position(), 11);
    }

    #[test]
    fn test_rejects_bad_magic() {
        assert!(parse("P6\n1 1\n255\n").unwrap_err().is_format());
        assert!(parse("P2 4 3 255\n").unwrap_err().is_format());
        assert!(parse("").unwrap_err().is_format());
    }

    #[test]
    fn test_rejects_trailing_data() {
        assert!(parse("P2\n4 3 9\n255\n").unwrap_err().is_format());
        assert!(parse("P2\n4 3\n255 x\n").unwrap_err().is_format());
        assert!(parse("P2\n4\n3\n255\n").unwrap_err().is_format());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(parse("P2\n0 3\n255\n").unwrap_err().is_format());
        assert!(parse("P2\n-4 3\n255\n").unwrap_err().is_format());
        assert!(parse("P2\n4 3\n256\n").unwrap_err().is_format());
        assert!(parse("P2\n4 3\n-1\n").unwrap_err().is_format());
        assert!(parse("P2\nfour 3\n255\n").unwrap_err().is_format());
        assert!(parse("P2\n4 3\n").unwrap_err().is_format());
    }

    #[test]
    fn test_write_header_rereads() {
        let h = Header { format: RasterFormat::Binary, width: 640, height: 480, max_value: 255 };
        let mut buf = Vec::new();
        write_header(&mut buf, &h).unwrap();
        assert_eq!(buf, b"P5\n640 480\n255\n");
        assert_eq!(parse(std::str::from_utf8(&buf).unwrap()).unwrap(), h);
    }
}
