//! Dimension filters.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::binning::{BinKey, PairKey};

/// Bound for dimension keys: totally ordered, cloneable and printable.
pub trait DimensionKey: Ord + Clone + fmt::Display + 'static {}

impl<T: Ord + Clone + fmt::Display + 'static> DimensionKey for T {}

/// The predicate a dimension applies to its keys.
///
/// Exact and range filters are resolved against the dimension's sorted
/// index by binary search. Custom predicates are evaluated per key.
pub enum Filter<K> {
    /// Accept every record.
    All,
    /// Accept records whose key equals the value.
    Exact(K),
    /// Accept keys in the half-open interval `[lo, hi)`.
    ///
    /// An empty or inverted interval accepts nothing.
    Range { lo: K, hi: K },
    /// Accept keys for which the predicate returns `true`.
    Custom {
        label: String,
        predicate: Arc<dyn Fn(&K) -> bool>,
    },
}

impl<K> Filter<K> {
    /// Exact match filter.
    pub fn exact(key: impl Into<K>) -> Self {
        Filter::Exact(key.into())
    }

    /// Half-open range filter `[lo, hi)`.
    pub fn range(lo: impl Into<K>, hi: impl Into<K>) -> Self {
        Filter::Range {
            lo: lo.into(),
            hi: hi.into(),
        }
    }

    /// Predicate filter. `label` is what events and logs show for it.
    pub fn custom(label: impl Into<String>, predicate: impl Fn(&K) -> bool + 'static) -> Self {
        Filter::Custom {
            label: label.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// True for [`Filter::All`].
    pub fn is_all(&self) -> bool {
        matches!(self, Filter::All)
    }
}

impl<K: Ord> Filter<K> {
    /// Whether a key passes this filter.
    pub fn accepts(&self, key: &K) -> bool {
        match self {
            Filter::All => true,
            Filter::Exact(value) => key == value,
            Filter::Range { lo, hi } => lo <= key && key < hi,
            Filter::Custom { predicate, .. } => predicate(key),
        }
    }
}

impl<K: fmt::Display> Filter<K> {
    /// A serializable description of the filter.
    pub fn summary(&self) -> FilterSummary {
        match self {
            Filter::All => FilterSummary::All,
            Filter::Exact(value) => FilterSummary::Exact {
                value: value.to_string(),
            },
            Filter::Range { lo, hi } => FilterSummary::Range {
                lo: lo.to_string(),
                hi: hi.to_string(),
            },
            Filter::Custom { label, .. } => FilterSummary::Custom {
                label: label.clone(),
            },
        }
    }
}

impl Filter<BinKey> {
    /// Range over raw numbers, as produced by a one-axis brush.
    pub fn brush(lo: f64, hi: f64) -> Self {
        Filter::range(lo, hi)
    }
}

impl Filter<PairKey> {
    /// Rectangular brush over a scatter dimension: `x0 <= x < x1 && y0 <= y < y1`.
    ///
    /// ```
    /// use glucoscope_core::{Filter, PairKey};
    ///
    /// let filter = Filter::rectangle(0.0, 20.0, 0.0, 50.0);
    /// assert!(filter.accepts(&PairKey::new(12.0, 40.0)));
    /// assert!(!filter.accepts(&PairKey::new(12.0, 50.0)));
    /// ```
    pub fn rectangle(x0: f64, x1: f64, y0: f64, y1: f64) -> Self {
        let (x0, x1, y0, y1) = (
            BinKey::new(x0),
            BinKey::new(x1),
            BinKey::new(y0),
            BinKey::new(y1),
        );
        Filter::custom(format!("[{x0}, {x1}) x [{y0}, {y1})"), move |key: &PairKey| {
            x0 <= key.x && key.x < x1 && y0 <= key.y && key.y < y1
        })
    }
}

impl<K: Clone> Clone for Filter<K> {
    fn clone(&self) -> Self {
        match self {
            Filter::All => Filter::All,
            Filter::Exact(value) => Filter::Exact(value.clone()),
            Filter::Range { lo, hi } => Filter::Range {
                lo: lo.clone(),
                hi: hi.clone(),
            },
            Filter::Custom { label, predicate } => Filter::Custom {
                label: label.clone(),
                predicate: Arc::clone(predicate),
            },
        }
    }
}

impl<K: fmt::Debug> fmt::Debug for Filter<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::All => write!(f, "All"),
            Filter::Exact(value) => f.debug_tuple("Exact").field(value).finish(),
            Filter::Range { lo, hi } => f
                .debug_struct("Range")
                .field("lo", lo)
                .field("hi", hi)
                .finish(),
            Filter::Custom { label, .. } => f.debug_struct("Custom").field("label", label).finish(),
        }
    }
}

impl<K> Default for Filter<K> {
    fn default() -> Self {
        Filter::All
    }
}

/// Serializable description of a filter, carried by events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterSummary {
    /// No filter.
    All,
    /// Exact match.
    Exact { value: String },
    /// Half-open range.
    Range { lo: String, hi: String },
    /// Custom predicate.
    Custom { label: String },
}
