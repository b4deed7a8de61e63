//! Time representation for frame-accurate editing
//!
//! Uses rational numbers to avoid floating-point accumulation errors.
//! Clip boundaries arrive as float seconds from the request layer and are
//! snapped onto a microsecond grid, after which all arithmetic is exact.

use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Denominator used when converting float seconds into rational time.
pub const SECONDS_PRECISION: i64 = 1_000_000;

/// A rational time value representing a point in time.
/// Uses rational arithmetic to maintain frame-accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RationalTime {
    /// Time value as a rational number (seconds)
    value: Rational64,
}

impl RationalTime {
    /// Create a new RationalTime from numerator and denominator.
    /// The time is `numerator / denominator` seconds.
    #[inline]
    pub fn new(numerator: i64, denominator: i64) -> Self {
        Self {
            value: Rational64::new(numerator, denominator),
        }
    }

    /// Whole seconds.
    #[inline]
    pub fn from_secs(seconds: i64) -> Self {
        Self::new(seconds, 1)
    }

    /// Milliseconds.
    #[inline]
    pub fn from_millis(millis: i64) -> Self {
        Self::new(millis, 1000)
    }

    /// Create a RationalTime from a frame number and frame rate.
    #[inline]
    pub fn from_frames(frames: i64, rate: FrameRate) -> Self {
        Self {
            value: Rational64::new(frames * rate.denominator as i64, rate.numerator as i64),
        }
    }

    /// Create a RationalTime from seconds as a float, rounded to the
    /// microsecond grid. Non-finite input yields `None`.
    pub fn try_from_seconds_f64(seconds: f64) -> Option<Self> {
        if !seconds.is_finite() {
            return None;
        }
        Some(Self {
            value: Rational64::new(
                (seconds * SECONDS_PRECISION as f64).round() as i64,
                SECONDS_PRECISION,
            ),
        })
    }

    /// Create a RationalTime from seconds as a float.
    /// Non-finite input maps to zero.
    pub fn from_seconds_f64(seconds: f64) -> Self {
        Self::try_from_seconds_f64(seconds).unwrap_or(Self::ZERO)
    }

    /// Convert to seconds as f64.
    #[inline]
    pub fn to_seconds_f64(self) -> f64 {
        *self.value.numer() as f64 / *self.value.denom() as f64
    }

    /// Convert to frame number at the given frame rate (floored).
    #[inline]
    pub fn to_frames(self, rate: FrameRate) -> i64 {
        let frames_rational =
            self.value * Rational64::new(rate.numerator as i64, rate.denominator as i64);
        frames_rational.floor().to_integer()
    }

    /// Frame count at the given rate, rounded to the nearest frame.
    #[inline]
    pub fn to_frames_rounded(self, rate: FrameRate) -> i64 {
        let frames_rational =
            self.value * Rational64::new(rate.numerator as i64, rate.denominator as i64);
        frames_rational.round().to_integer()
    }

    /// Const constructor for a fraction already in lowest terms with a
    /// positive denominator.
    pub const fn from_reduced(numerator: i64, denominator: i64) -> Self {
        Self {
            value: Rational64::new_raw(numerator, denominator),
        }
    }

    /// Zero time constant.
    pub const ZERO: Self = Self {
        value: Rational64::new_raw(0, 1),
    };

    /// Strictly greater than zero.
    #[inline]
    pub fn is_positive(self) -> bool {
        *self.value.numer() > 0
    }

    /// Get the absolute value of this time.
    #[inline]
    pub fn abs(self) -> Self {
        if *self.value.numer() < 0 {
            Self { value: -self.value }
        } else {
            self
        }
    }

    /// `|self - other| <= epsilon`.
    #[inline]
    pub fn approx_eq(self, other: Self, epsilon: Self) -> bool {
        (self - other).abs() <= epsilon
    }
}

impl Default for RationalTime {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Add for RationalTime {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            value: self.value + rhs.value,
        }
    }
}

impl Sub for RationalTime {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self {
            value: self.value - rhs.value,
        }
    }
}

impl Neg for RationalTime {
    type Output = Self;
    fn neg(self) -> Self {
        Self { value: -self.value }
    }
}

impl Mul<i64> for RationalTime {
    type Output = Self;
    fn mul(self, rhs: i64) -> Self {
        Self {
            value: self.value * rhs,
        }
    }
}

impl Div<i64> for RationalTime {
    type Output = Self;
    fn div(self, rhs: i64) -> Self {
        Self {
            value: self.value / rhs,
        }
    }
}

impl std::iter::Sum for RationalTime {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, t| acc + t)
    }
}

impl fmt::Display for RationalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.to_seconds_f64())
    }
}

/// Serde adapter that stores a [`RationalTime`] as float seconds.
///
/// Use with `#[serde(with = "adreel_core::time::seconds")]`.
pub mod seconds {
    use super::RationalTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &RationalTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(time.to_seconds_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<RationalTime, D::Error> {
        let secs = f64::deserialize(d)?;
        RationalTime::try_from_seconds_f64(secs)
            .ok_or_else(|| D::Error::custom(format!("time must be finite, got {secs}")))
    }
}

/// Optional variant of [`seconds`].
pub mod option_seconds {
    use super::RationalTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &Option<RationalTime>, s: S) -> Result<S::Ok, S::Error> {
        match time {
            Some(t) => s.serialize_some(&t.to_seconds_f64()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<RationalTime>, D::Error> {
        match Option::<f64>::deserialize(d)? {
            Some(secs) => RationalTime::try_from_seconds_f64(secs)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("time must be finite, got {secs}"))),
            None => Ok(None),
        }
    }
}

/// Frame rate as a rational number (e.g., 24000/1001 for 23.976 fps).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRate {
    /// Numerator (e.g., 24000)
    pub numerator: u32,
    /// Denominator (e.g., 1001)
    pub denominator: u32,
}

impl FrameRate {
    /// Create a new frame rate.
    #[inline]
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Best rational approximation of a float rate as reported by probes
    /// (`29.97` → `30000/1001`).
    pub fn from_fps_f64(fps: f64) -> Option<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return None;
        }
        for ntsc in [Self::FPS_23_976, Self::FPS_29_97, Self::FPS_59_94] {
            if (ntsc.to_fps_f64() - fps).abs() < 0.01 {
                return Some(ntsc);
            }
        }
        let rate = if (fps - fps.round()).abs() < 0.01 {
            Self::new(fps.round() as u32, 1)
        } else {
            Self::new((fps * 1000.0).round() as u32, 1000)
        };
        // Rates that round to zero would give an infinite frame duration.
        (rate.numerator > 0).then_some(rate)
    }

    /// Convert to frames per second as f64.
    #[inline]
    pub fn to_fps_f64(self) -> f64 {
        self.numerator as f64 / self.denominator as f64
    }

    /// Duration of a single frame.
    #[inline]
    pub fn frame_duration(self) -> RationalTime {
        RationalTime::new(self.denominator as i64, self.numerator as i64)
    }

    /// Common frame rates
    pub const FPS_23_976: Self = Self::new(24000, 1001);
    pub const FPS_24: Self = Self::new(24, 1);
    pub const FPS_25: Self = Self::new(25, 1);
    pub const FPS_29_97: Self = Self::new(30000, 1001);
    pub const FPS_30: Self = Self::new(30, 1);
    pub const FPS_50: Self = Self::new(50, 1);
    pub const FPS_59_94: Self = Self::new(60000, 1001);
    pub const FPS_60: Self = Self::new(60, 1);
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_30
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fps = self.to_fps_f64();
        if (fps - fps.round()).abs() < 0.001 {
            write!(f, "{} fps", fps.round() as u32)
        } else {
            write!(f, "{:.3} fps", fps)
        }
    }
}

/// A time range with inclusive start and exclusive end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start time (inclusive)
    pub start: RationalTime,
    /// Duration of the range
    pub duration: RationalTime,
}

impl TimeRange {
    /// Create a new time range from start and duration.
    #[inline]
    pub fn new(start: RationalTime, duration: RationalTime) -> Self {
        Self { start, duration }
    }

    /// Create a time range from start and end times.
    #[inline]
    pub fn from_start_end(start: RationalTime, end: RationalTime) -> Self {
        Self {
            start,
            duration: end - start,
        }
    }

    /// End time (exclusive).
    #[inline]
    pub fn end(self) -> RationalTime {
        self.start + self.duration
    }

    /// Check if a time is within this range.
    #[inline]
    pub fn contains(self, time: RationalTime) -> bool {
        time >= self.start && time < self.end()
    }

    /// Strictly inside: excludes both boundaries.
    #[inline]
    pub fn contains_strictly(self, time: RationalTime) -> bool {
        time > self.start && time < self.end()
    }

    /// Check if two ranges overlap.
    pub fn overlaps(self, other: Self) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    /// Compute the intersection of two ranges, if any.
    pub fn intersection(self, other: Self) -> Option<Self> {
        if !self.overlaps(other) {
            return None;
        }
        let start = self.start.max(other.start);
        let end = self.end().min(other.end());
        Some(Self::from_start_end(start, end))
    }

    /// Drop `amount` from the head of the range.
    pub fn trim_head(self, amount: RationalTime) -> Self {
        Self::from_start_end(self.start + amount, self.end())
    }

    /// Drop `amount` from the tail of the range.
    pub fn trim_tail(self, amount: RationalTime) -> Self {
        Self::new(self.start, self.duration - amount)
    }

    /// Empty range starting at zero.
    pub const EMPTY: Self = Self {
        start: RationalTime::ZERO,
        duration: RationalTime::ZERO,
    };
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end())
    }
}
