//! Dimensions: a key function over records plus the sorted index it induces.
//!
//! A dimension keeps every record's key and a permutation of record indices
//! sorted by key. Exact and range filters map to a contiguous span of that
//! permutation, found by binary search; moving from one span to another only
//! touches the records in the symmetric difference of the two spans.

use std::any::Any;
use std::marker::PhantomData;
use std::ops::Range;

use crate::filter::{DimensionKey, Filter, FilterSummary};

/// Typed reference to a dimension of a [`Crossfilter`](crate::Crossfilter).
///
/// Handles are cheap to copy and only valid for the cube that created them.
#[derive(Debug)]
pub struct DimensionHandle<K> {
    pub(crate) cube: u64,
    pub(crate) index: usize,
    _key: PhantomData<fn() -> K>,
}

impl<K> DimensionHandle<K> {
    pub(crate) fn new(cube: u64, index: usize) -> Self {
        Self {
            cube,
            index,
            _key: PhantomData,
        }
    }

    /// Position of the dimension within its cube (also its exclusion bit).
    pub fn index(&self) -> usize {
        self.index
    }
}

impl<K> Clone for DimensionHandle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for DimensionHandle<K> {}

/// Object-safe view of a dimension, independent of its key type.
pub(crate) trait DimensionSlot {
    fn name(&self) -> &str;
    fn filter_summary(&self) -> FilterSummary;
    fn accepts_record(&self, record: usize) -> bool;
    fn is_filtered(&self) -> bool;
    /// Drop the filter; returns the records whose acceptance flipped.
    fn clear(&mut self) -> Vec<usize>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Key index and filter state of one dimension.
pub(crate) struct Dimension<K> {
    name: String,
    /// Key of each record, by record index.
    keys: Vec<K>,
    /// Record indices sorted by key (stable, so ties keep load order).
    order: Vec<usize>,
    filter: Filter<K>,
    /// Accepted span of `order`, or `None` while a custom predicate is active.
    span: Option<Range<usize>>,
    /// Acceptance of each record by this dimension's filter.
    accepted: Vec<bool>,
}

impl<K: DimensionKey> Dimension<K> {
    pub(crate) fn new(name: impl Into<String>, keys: Vec<K>) -> Self {
        let mut order: Vec<usize> = (0..keys.len()).collect();
        order.sort_by(|&a, &b| keys[a].cmp(&keys[b]));
        let len = keys.len();
        Self {
            name: name.into(),
            keys,
            order,
            filter: Filter::All,
            span: Some(0..len),
            accepted: vec![true; len],
        }
    }

    pub(crate) fn keys(&self) -> &[K] {
        &self.keys
    }

    pub(crate) fn order(&self) -> &[usize] {
        &self.order
    }

    pub(crate) fn filter(&self) -> &Filter<K> {
        &self.filter
    }

    fn key_at(&self, position: usize) -> &K {
        &self.keys[self.order[position]]
    }

    /// First sorted position whose key is not less than `key`.
    fn lower_bound(&self, key: &K) -> usize {
        self.order.partition_point(|&r| self.keys[r] < *key)
    }

    /// First sorted position whose key is greater than `key`.
    fn upper_bound(&self, key: &K) -> usize {
        self.order.partition_point(|&r| self.keys[r] <= *key)
    }

    fn span_for(&self, filter: &Filter<K>) -> Option<Range<usize>> {
        match filter {
            Filter::All => Some(0..self.order.len()),
            Filter::Exact(key) => Some(self.lower_bound(key)..self.upper_bound(key)),
            Filter::Range { lo, hi } if lo < hi => {
                Some(self.lower_bound(lo)..self.lower_bound(hi))
            }
            Filter::Range { .. } => Some(0..0),
            Filter::Custom { .. } => None,
        }
    }

    /// Install a new filter and return the records whose acceptance flipped.
    pub(crate) fn apply_filter(&mut self, filter: Filter<K>) -> Vec<usize> {
        let new_span = self.span_for(&filter);
        let mut flipped = Vec::new();

        match (self.span.take(), &new_span) {
            (Some(old), Some(new)) => {
                for position in span_difference(old, new.clone()) {
                    let record = self.order[position];
                    self.accepted[record] = !self.accepted[record];
                    flipped.push(record);
                }
            }
            _ => {
                for position in 0..self.order.len() {
                    let now = match &new_span {
                        Some(span) => span.contains(&position),
                        None => filter.accepts(self.key_at(position)),
                    };
                    let record = self.order[position];
                    if self.accepted[record] != now {
                        self.accepted[record] = now;
                        flipped.push(record);
                    }
                }
            }
        }

        self.span = new_span;
        self.filter = filter;
        flipped
    }
}

impl<K: DimensionKey> DimensionSlot for Dimension<K> {
    fn name(&self) -> &str {
        &self.name
    }

    fn filter_summary(&self) -> FilterSummary {
        self.filter.summary()
    }

    fn accepts_record(&self, record: usize) -> bool {
        self.accepted[record]
    }

    fn is_filtered(&self) -> bool {
        !self.filter.is_all()
    }

    fn clear(&mut self) -> Vec<usize> {
        self.apply_filter(Filter::All)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Positions in exactly one of two spans, in two runs.
fn span_difference(old: Range<usize>, new: Range<usize>) -> impl Iterator<Item = usize> {
    let disjoint = old.end <= new.start || new.end <= old.start || old.is_empty() || new.is_empty();
    let (first, second) = if disjoint {
        (old, new)
    } else {
        (
            old.start.min(new.start)..old.start.max(new.start),
            old.end.min(new.end)..old.end.max(new.end),
        )
    };
    first.chain(second)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::BinKey;

    fn carb_dimension() -> Dimension<BinKey> {
        // record index:        0     1     2     3     4
        let keys = [20.0, 0.0, 10.0, 20.0, 40.0].map(BinKey::new).to_vec();
        Dimension::new("carbs", keys)
    }

    fn accepted(dim: &Dimension<BinKey>) -> Vec<usize> {
        (0..dim.keys().len())
            .filter(|&r| dim.accepts_record(r))
            .collect()
    }

    fn sorted(mut v: Vec<usize>) -> Vec<usize> {
        v.sort_unstable();
        v
    }

    #[test]
    fn test_sorted_order_is_stable() {
        let dim = carb_dimension();
        assert_eq!(dim.order(), &[1, 2, 0, 3, 4]);
    }

    #[test]
    fn test_range_filter_flips_records() {
        let mut dim = carb_dimension();
        let flipped = dim.apply_filter(Filter::brush(10.0, 30.0));
        assert_eq!(sorted(flipped), vec![1, 4]);
        assert_eq!(accepted(&dim), vec![0, 2, 3]);
    }

    #[test]
    fn test_moving_range_touches_only_difference() {
        let mut dim = carb_dimension();
        dim.apply_filter(Filter::brush(0.0, 15.0));
        assert_eq!(accepted(&dim), vec![1, 2]);

        // [0, 15) -> [10, 25): record 1 leaves, records 0 and 3 enter.
        let flipped = dim.apply_filter(Filter::brush(10.0, 25.0));
        assert_eq!(sorted(flipped), vec![0, 1, 3]);
        assert_eq!(accepted(&dim), vec![0, 2, 3]);
    }

    #[test]
    fn test_disjoint_ranges() {
        let mut dim = carb_dimension();
        dim.apply_filter(Filter::brush(0.0, 5.0));
        let flipped = dim.apply_filter(Filter::brush(40.0, 50.0));
        assert_eq!(sorted(flipped), vec![1, 4]);
        assert_eq!(accepted(&dim), vec![4]);
    }

    #[test]
    fn test_exact_filter() {
        let mut dim = carb_dimension();
        dim.apply_filter(Filter::exact(20.0));
        assert_eq!(accepted(&dim), vec![0, 3]);
        assert_eq!(dim.filter_summary(), FilterSummary::Exact { value: "20".into() });
    }

    #[test]
    fn test_inverted_range_accepts_nothing() {
        let mut dim = carb_dimension();
        let flipped = dim.apply_filter(Filter::brush(30.0, 10.0));
        assert_eq!(flipped.len(), 5);
        assert!(accepted(&dim).is_empty());
    }

    #[test]
    fn test_custom_then_range_then_all() {
        let mut dim = carb_dimension();
        dim.apply_filter(Filter::custom("round hundreds", |k: &BinKey| k.value() == 0.0 || k.value() == 40.0));
        assert_eq!(accepted(&dim), vec![1, 4]);

        let flipped = dim.apply_filter(Filter::brush(0.0, 15.0));
        assert_eq!(sorted(flipped), vec![2, 4]);
        assert_eq!(accepted(&dim), vec![1, 2]);

        let flipped = dim.apply_filter(Filter::All);
        assert_eq!(sorted(flipped), vec![0, 3, 4]);
        assert_eq!(accepted(&dim), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_same_filter_twice_is_noop() {
        let mut dim = carb_dimension();
        dim.apply_filter(Filter::brush(10.0, 30.0));
        assert!(dim.apply_filter(Filter::brush(10.0, 30.0)).is_empty());
    }

    #[test]
    fn test_span_difference() {
        let collect = |a: Range<usize>, b: Range<usize>| sorted(span_difference(a, b).collect());
        assert_eq!(collect(0..5, 2..7), vec![0, 1, 5, 6]);
        assert_eq!(collect(2..7, 0..5), vec![0, 1, 5, 6]);
        assert_eq!(collect(0..2, 5..7), vec![0, 1, 5, 6]);
        assert_eq!(collect(3..3, 0..4), vec![0, 1, 2, 3]);
        assert_eq!(collect(1..4, 1..4), Vec::<usize>::new());
        assert_eq!(collect(0..10, 2..3), vec![0, 1, 3, 4, 5, 6, 7, 8, 9]);
    }
}
