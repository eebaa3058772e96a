//! Histogram binning and totally ordered numeric keys.
//!
//! Dimension keys must be totally ordered so they can be kept in a sorted
//! index. `f64` is not `Ord`, so numeric keys are wrapped in [`BinKey`],
//! which orders by [`f64::total_cmp`] after normalizing `-0.0` to `0.0`.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Round `value` down to the start of its bin.
///
/// `bin = floor(value / width) * width`, so negative values land in the bin
/// below zero rather than being truncated toward it. A width that is not a
/// positive finite number leaves the value unbinned.
///
/// ```
/// use glucoscope_core::binning::bin;
///
/// assert_eq!(bin(12.0, 10.0), 10.0);
/// assert_eq!(bin(-3.0, 10.0), -10.0);
/// assert_eq!(bin(7.5, 0.0), 7.5);
/// ```
#[must_use]
pub fn bin(value: f64, width: f64) -> f64 {
    if !(width.is_finite() && width > 0.0) {
        return value;
    }
    let binned = (value / width).floor() * width;
    // floor(-0.0) stays -0.0; keep one zero bucket.
    if binned == 0.0 { 0.0 } else { binned }
}

/// A numeric dimension key with a total order.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BinKey(f64);

impl BinKey {
    /// Wrap a raw value.
    pub fn new(value: f64) -> Self {
        Self(if value == 0.0 { 0.0 } else { value })
    }

    /// Bin `value` with `width` and wrap the result.
    pub fn binned(value: f64, width: f64) -> Self {
        Self::new(bin(value, width))
    }

    /// The wrapped value.
    pub fn value(self) -> f64 {
        self.0
    }
}

impl From<f64> for BinKey {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl PartialEq for BinKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for BinKey {}

impl PartialOrd for BinKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BinKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl std::hash::Hash for BinKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for BinKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key of a two-dimensional (scatter) dimension.
///
/// Pairs hold raw, unbinned values; records group together only when both
/// coordinates are identical. Ordered by `x`, then `y`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey {
    /// Horizontal coordinate.
    pub x: BinKey,
    /// Vertical coordinate.
    pub y: BinKey,
}

impl PairKey {
    /// Build a pair from raw values.
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: BinKey::new(x),
            y: BinKey::new(y),
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
