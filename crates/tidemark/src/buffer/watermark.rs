use crate::error::{Error, Result};
use core::fmt;

/// Default low watermark: the consumer waits while a buffer holds this many
/// items or fewer.
pub const DEFAULT_LOW_WATERMARK: usize = 3;

/// Default high watermark: the producer waits while a buffer holds this many
/// items or more.
pub const DEFAULT_HIGH_WATERMARK: usize = 10;

/// A validated pair of queue-size thresholds.
///
/// - `low`: [`pop`] blocks while `len <= low`, so the consumer always leaves
///   at least `low` items behind while the producer is live.
/// - `high`: [`push`] blocks while `len >= high`.
///
/// The only constraint is `low < high`; `low` may be zero, in which case
/// `pop` never blocks once an item exists.
///
/// [`pop`]: crate::WatermarkBuffer::pop
/// [`push`]: crate::WatermarkBuffer::push
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Watermarks {
    low: usize,
    high: usize,
}

impl Watermarks {
    /// Validates and builds a watermark pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWatermarks`] unless `low < high`.
    ///
    /// # Example
    /// ```
    /// use tidemark::Watermarks;
    ///
    /// let marks = Watermarks::new(3, 10).unwrap();
    /// assert_eq!(marks.low(), 3);
    /// assert!(Watermarks::new(4, 4).is_err());
    /// ```
    pub fn new(low: usize, high: usize) -> Result<Self> {
        if low >= high {
            return Err(Error::InvalidWatermarks { low, high });
        }
        Ok(Self { low, high })
    }

    pub const fn low(&self) -> usize {
        self.low
    }

    pub const fn high(&self) -> usize {
        self.high
    }
}

impl Default for Watermarks {
    fn default() -> Self {
        Self {
            low: DEFAULT_LOW_WATERMARK,
            high: DEFAULT_HIGH_WATERMARK,
        }
    }
}

impl fmt::Display for Watermarks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.low, self.high)
    }
}
