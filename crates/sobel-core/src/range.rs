//! Min/max reduction and the rescale transform.
//!
//! Each worker reports the [`ValueRange`] of the rows it wrote; [`reduce`]
//! folds those into the global range. The fold is associative and
//! commutative, so reports may arrive in any order.
//!
//! A [`Rescaler`] built from the global range maps every value into
//! `0..=255`:
//!
//! ```text
//! new = round((v - min) / (max - min) * 255)
//! ```
//!
//! computed in integers as `((v - min) * 510 + span) / (2 * span)`, which is
//! round-half-up of the exact quotient. Integer math keeps every backend
//! bit-identical.
//!
//! ```rust
//! use sobel_core::{FlatRangePolicy, Rescaler, ValueRange};
//!
//! let range = ValueRange::of(&[10, 20, 110]);
//! let r = Rescaler::new(range, FlatRangePolicy::Fail).unwrap();
//! assert_eq!(r.apply(10), 0);
//! assert_eq!(r.apply(60), 128);
//! assert_eq!(r.apply(110), 255);
//! ```

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::image::RowBand;
use crate::{Error, Result, MAX_INTENSITY};

/// Running `(min, max)` of a set of pixel values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueRange {
    /// Smallest value observed.
    pub min: u32,
    /// Largest value observed.
    pub max: u32,
}

impl ValueRange {
    /// Identity of the fold: combining with it changes nothing.
    pub const EMPTY: Self = Self {
        min: u32::MAX,
        max: 0,
    };

    /// Range holding a single value.
    pub fn single(value: u32) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    /// Range of a slice of values; [`EMPTY`](Self::EMPTY) for an empty slice.
    pub fn of(values: &[u32]) -> Self {
        values.iter().fold(Self::EMPTY, |acc, &v| acc.observe(v))
    }

    /// Extends the range with one value.
    #[inline]
    pub fn observe(self, value: u32) -> Self {
        Self {
            min: self.min.min(value),
            max: self.max.max(value),
        }
    }

    /// Element-wise min/max of two ranges.
    #[inline]
    pub fn combine(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// True if no value has been observed.
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// True if every observed value is the same.
    pub fn is_flat(&self) -> bool {
        self.min == self.max
    }

    /// `max - min`, or 0 for an empty range.
    pub fn span(&self) -> u32 {
        self.max.saturating_sub(self.min)
    }
}

impl Default for ValueRange {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Folds per-partition ranges into the global range.
pub fn reduce<I>(ranges: I) -> ValueRange
where
    I: IntoIterator<Item = ValueRange>,
{
    ranges.into_iter().fold(ValueRange::EMPTY, ValueRange::combine)
}

/// What to do when the global minimum equals the global maximum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlatRangePolicy {
    /// Map every pixel to 0 and log a warning.
    #[default]
    Zero,
    /// Refuse with [`Error::FlatRange`].
    Fail,
}

impl std::str::FromStr for FlatRangePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zero" => Ok(Self::Zero),
            "fail" => Ok(Self::Fail),
            other => Err(format!("unknown flat-range policy '{other}' (expected zero or fail)")),
        }
    }
}

impl std::fmt::Display for FlatRangePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Zero => "zero",
            Self::Fail => "fail",
        })
    }
}

/// Per-pixel rescale derived from the global range.
///
/// Serializable so the process-group coordinator can broadcast it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rescaler {
    /// `round((v - min) * 255 / span)`; `span > 0`.
    Linear {
        /// Global minimum.
        min: u32,
        /// Global `max - min`.
        span: u32,
    },
    /// Flat input under [`FlatRangePolicy::Zero`]: every pixel becomes 0.
    Flat,
}

impl Rescaler {
    /// Builds the rescale for a completed global reduction.
    pub fn new(range: ValueRange, policy: FlatRangePolicy) -> Result<Self> {
        if range.is_empty() {
            return Err(Error::EmptyRange);
        }
        if range.is_flat() {
            return match policy {
                FlatRangePolicy::Fail => Err(Error::FlatRange { value: range.min }),
                FlatRangePolicy::Zero => {
                    warn!(value = range.min, "flat gradient range, every pixel rescales to 0");
                    Ok(Self::Flat)
                }
            };
        }
        Ok(Self::Linear {
            min: range.min,
            span: range.span(),
        })
    }

    /// Rescales one value. Values outside the range saturate to `0..=255`.
    #[inline]
    pub fn apply(&self, value: u32) -> u32 {
        match *self {
            Self::Flat => 0,
            Self::Linear { min, span } => {
                let delta = value.saturating_sub(min).min(span) as u64;
                let span = span as u64;
                ((delta * 2 * MAX_INTENSITY as u64 + span) / (2 * span)) as u32
            }
        }
    }

    /// Rescales `src` rows into `band`.
    pub fn rescale_rows(&self, src: &crate::Snapshot<'_>, band: &mut RowBand<'_>) {
        for y in band.row_range() {
            let input = src.row(y);
            for (out, &v) in band.row_mut(y).iter_mut().zip(input) {
                *out = self.apply(v);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ImageBuffer;

    #[test]
    fn test_reduce_order_independent() {
        let parts = [
            ValueRange::of(&[5, 900]),
            ValueRange::of(&[3, 40]),
            ValueRange::of(&[77]),
            ValueRange::EMPTY,
        ];
        let forward = reduce(parts);
        let mut reversed = parts;
        reversed.reverse();
        assert_eq!(forward, reduce(reversed));
        assert_eq!(forward, ValueRange { min: 3, max: 900 });

        // Grouping does not matter either.
        let left = parts[0].combine(parts[1]).combine(parts[2]);
        let right = parts[0].combine(parts[1].combine(parts[2]));
        assert_eq!(left, right);
    }

    #[test]
    fn test_empty_is_identity() {
        let r = ValueRange::of(&[12, 8]);
        assert_eq!(r.combine(ValueRange::EMPTY), r);
        assert!(ValueRange::EMPTY.is_empty());
        assert!(reduce(std::iter::empty()).is_empty());
    }

    #[test]
    fn test_range_above_255() {
        // Gradient magnitudes exceed the input intensity range.
        assert_eq!(ValueRange::of(&[1442, 0]).max, 1442);
    }

    #[test]
    fn test_rescale_bounds() {
        let values = [0u32, 141, 200, 1000, 1442];
        let r = Rescaler::new(ValueRange::of(&values), FlatRangePolicy::Fail).unwrap();
        assert_eq!(r.apply(0), 0);
        assert_eq!(r.apply(1442), 255);
        for v in 0..=1442 {
            assert!(r.apply(v) <= 255);
        }
    }

    #[test]
    fn test_rescale_rounds_half_up() {
        // span 2: 1 -> 127.5 -> 128
        let r = Rescaler::new(ValueRange { min: 0, max: 2 }, FlatRangePolicy::Fail).unwrap();
        assert_eq!(r.apply(1), 128);
        // span 200: 141 -> 179.775 -> 180
        let r = Rescaler::new(ValueRange { min: 0, max: 200 }, FlatRangePolicy::Fail).unwrap();
        assert_eq!(r.apply(141), 180);
        // min offset: (60 - 10) / 100 * 255 = 127.5 -> 128
        let r = Rescaler::new(ValueRange { min: 10, max: 110 }, FlatRangePolicy::Fail).unwrap();
        assert_eq!(r.apply(60), 128);
    }

    #[test]
    fn test_flat_range_zero_policy() {
        let img = ImageBuffer::new(3, 3, 255, vec![50; 9]).unwrap();
        let range = ValueRange::of(img.pixels());
        let r = Rescaler::new(range, FlatRangePolicy::Zero).unwrap();
        assert_eq!(r, Rescaler::Flat);

        let mut out = vec![7u32; 9];
        let mut band = RowBand::new(0, 3, &mut out).unwrap();
        r.rescale_rows(&img.snapshot(), &mut band);
        assert_eq!(out, vec![0; 9]);
    }

    #[test]
    fn test_flat_range_fail_policy() {
        let range = ValueRange::of(&[50; 9]);
        assert_eq!(
            Rescaler::new(range, FlatRangePolicy::Fail),
            Err(Error::FlatRange { value: 50 })
        );
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!("zero".parse::<FlatRangePolicy>(), Ok(FlatRangePolicy::Zero));
        assert_eq!("FAIL".parse::<FlatRangePolicy>(), Ok(FlatRangePolicy::Fail));
        assert!("clamp".parse::<FlatRangePolicy>().is_err());
    }
}
