//! Group aggregators: per-bucket reductions maintained incrementally.

use std::any::Any;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::reduce::Reducer;

/// Which records a group aggregates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupScope {
    /// Records accepted by every dimension's filter.
    #[default]
    Selected,
    /// Records accepted by every filter except the group's own dimension.
    ///
    /// A histogram in this scope keeps showing the bars outside its own
    /// brush, so the brush can be moved without losing context.
    IgnoreOwnFilter,
}

/// Typed reference to a group of a [`Crossfilter`](crate::Crossfilter).
///
/// `K` is the bucket key and `V` the reducer's value type.
#[derive(Debug)]
pub struct GroupHandle<K, V> {
    pub(crate) cube: u64,
    pub(crate) index: usize,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V> GroupHandle<K, V> {
    pub(crate) fn new(cube: u64, index: usize) -> Self {
        Self {
            cube,
            index,
            _types: PhantomData,
        }
    }
}

impl<K, V> Clone for GroupHandle<K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for GroupHandle<K, V> {}

/// The aggregate state of a group: one value and member count per bucket.
///
/// Buckets are fixed when the group is created (one per distinct key of its
/// dimension) and kept in key order. Buckets whose members are all filtered
/// out stay present with the reducer's initial value.
#[derive(Debug, Clone, PartialEq)]
pub struct Group<K, V> {
    name: String,
    scope: GroupScope,
    keys: Vec<K>,
    values: Vec<V>,
    members: Vec<usize>,
    initial: V,
}

impl<K: Ord, V> Group<K, V> {
    fn position(&self, key: &K) -> Option<usize> {
        self.keys.binary_search(key).ok()
    }

    /// Group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The subset this group observes.
    pub fn scope(&self) -> GroupScope {
        self.scope
    }

    /// Number of buckets.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// True when the group has no buckets.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Bucket keys in ascending order.
    pub fn keys(&self) -> &[K] {
        &self.keys
    }

    /// Value of a bucket; the reducer's initial value for unknown keys.
    pub fn value_for(&self, key: &K) -> &V {
        self.position(key).map_or(&self.initial, |i| &self.values[i])
    }

    /// Members of a bucket in the observed subset; 0 for unknown keys.
    pub fn member_count(&self, key: &K) -> usize {
        self.position(key).map_or(0, |i| self.members[i])
    }

    /// Every bucket, including those with no members.
    pub fn all_buckets(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.keys.iter().zip(&self.values)
    }

    /// Only the buckets with at least one member.
    pub fn populated_buckets(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.keys
            .iter()
            .zip(&self.values)
            .zip(&self.members)
            .filter(|(_, members)| **members > 0)
            .map(|(bucket, _)| bucket)
    }
}

impl<K: Ord + Clone, V: Clone> Group<K, V> {
    /// `(key, value)` pairs for every bucket, cloned.
    pub fn to_vec(&self) -> Vec<(K, V)> {
        self.all_buckets()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl<V> Group<(), V> {
    /// Value of a group-all (single bucket) group.
    pub fn value(&self) -> &V {
        self.values.first().unwrap_or(&self.initial)
    }

    /// Members of a group-all group.
    pub fn count(&self) -> usize {
        self.members.first().copied().unwrap_or(0)
    }
}

/// A record whose exclusion mask changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Transition {
    pub record: usize,
    pub before: u64,
    pub after: u64,
}

/// Object-safe view of a group, independent of key and reducer types.
pub(crate) trait GroupSlot<R> {
    fn name(&self) -> &str;

    /// Add entering and remove leaving records.
    fn apply(&mut self, records: &[R], transitions: &[Transition]);

    /// A `Group<K, V>` reduced from scratch over the current masks.
    fn rebuilt(&self, records: &[R], masks: &[u64]) -> Box<dyn Any>;

    /// The `Group<K, V>` this slot maintains.
    fn group_any(&self) -> &dyn Any;
}

/// A group plus what it needs to stay current.
pub(crate) struct GroupState<R, K, Rd: Reducer<R>> {
    group: Group<K, Rd::Value>,
    reducer: Rd,
    /// Bucket index of each record.
    slot: Vec<usize>,
    /// Exclusion bits this group does not observe.
    ignore: u64,
    _records: PhantomData<fn(&R)>,
}

/// Bucket layout shared by a group and its from-scratch rebuild.
pub(crate) struct BucketLayout<K> {
    pub keys: Vec<K>,
    pub slot: Vec<usize>,
}

impl<K: Ord + Clone> BucketLayout<K> {
    /// Distinct keys from records visited in key order.
    pub(crate) fn from_sorted(keys: &[K], order: &[usize]) -> Self {
        let mut distinct: Vec<K> = Vec::new();
        let mut slot = vec![0; keys.len()];
        for &record in order {
            let key = &keys[record];
            if distinct.last() != Some(key) {
                distinct.push(key.clone());
            }
            slot[record] = distinct.len() - 1;
        }
        Self {
            keys: distinct,
            slot,
        }
    }
}

impl BucketLayout<()> {
    /// One bucket holding every record.
    pub(crate) fn single(len: usize) -> Self {
        Self {
            keys: vec![()],
            slot: vec![0; len],
        }
    }
}

impl<R, K, Rd> GroupState<R, K, Rd>
where
    K: Ord + Clone,
    Rd: Reducer<R>,
{
    pub(crate) fn new(
        name: String,
        scope: GroupScope,
        layout: BucketLayout<K>,
        ignore: u64,
        reducer: Rd,
        records: &[R],
        masks: &[u64],
    ) -> Self {
        let group = reduce_all(
            name,
            scope,
            layout.keys,
            &layout.slot,
            ignore,
            &reducer,
            records,
            masks,
        );
        Self {
            group,
            reducer,
            slot: layout.slot,
            ignore,
            _records: PhantomData,
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn reduce_all<R, K, Rd: Reducer<R>>(
    name: String,
    scope: GroupScope,
    keys: Vec<K>,
    slot: &[usize],
    ignore: u64,
    reducer: &Rd,
    records: &[R],
    masks: &[u64],
) -> Group<K, Rd::Value> {
    let mut values = vec![reducer.initial(); keys.len()];
    let mut members = vec![0; keys.len()];
    for (index, record) in records.iter().enumerate() {
        if masks[index] & !ignore != 0 {
            continue;
        }
        let bucket = slot[index];
        let value = std::mem::replace(&mut values[bucket], reducer.initial());
        values[bucket] = reducer.add(value, record);
        members[bucket] += 1;
    }
    Group {
        name,
        scope,
        keys,
        values,
        members,
        initial: reducer.initial(),
    }
}

impl<R, K, Rd> GroupSlot<R> for GroupState<R, K, Rd>
where
    R: 'static,
    K: Ord + Clone + 'static,
    Rd: Reducer<R>,
{
    fn name(&self) -> &str {
        &self.group.name
    }

    fn apply(&mut self, records: &[R], transitions: &[Transition]) {
        let (mut added, mut removed) = (0usize, 0usize);
        for t in transitions {
            let was_in = t.before & !self.ignore == 0;
            let is_in = t.after & !self.ignore == 0;
            if was_in == is_in {
                continue;
            }

            let bucket = self.slot[t.record];
            let record = &records[t.record];
            let value = std::mem::replace(&mut self.group.values[bucket], self.reducer.initial());
            if is_in {
                self.group.values[bucket] = self.reducer.add(value, record);
                self.group.members[bucket] += 1;
                added += 1;
            } else {
                self.group.members[bucket] -= 1;
                // An emptied bucket is exactly the initial value.
                self.group.values[bucket] = if self.group.members[bucket] == 0 {
                    self.reducer.initial()
                } else {
                    self.reducer.remove(value, record)
                };
                removed += 1;
            }
        }

        if added + removed > 0 {
            trace!(
                "Group '{}' updated: {} added, {} removed",
                self.group.name, added, removed
            );
        }
    }

    fn rebuilt(&self, records: &[R], masks: &[u64]) -> Box<dyn Any> {
        Box::new(reduce_all(
            self.group.name.clone(),
            self.group.scope,
            self.group.keys.clone(),
            &self.slot,
            self.ignore,
            &self.reducer,
            records,
            masks,
        ))
    }

    fn group_any(&self) -> &dyn Any {
        &self.group
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduce::{Count, Sum};

    fn layout() -> BucketLayout<&'static str> {
        // records: 0 -> "b", 1 -> "a", 2 -> "b", 3 -> "c"
        let keys = vec!["b", "a", "b", "c"];
        BucketLayout::from_sorted(&keys, &[1, 0, 2, 3])
    }

    #[test]
    fn test_bucket_layout() {
        let layout = layout();
        assert_eq!(layout.keys, vec!["a", "b", "c"]);
        assert_eq!(layout.slot, vec![1, 0, 1, 2]);
    }

    #[test]
    fn test_initial_reduction_respects_masks() {
        let records = [1.0, 2.0, 3.0, 4.0];
        let masks = [0, 0, 0b1, 0];
        let state = GroupState::new(
            "g".into(),
            GroupScope::Selected,
            layout(),
            0,
            Sum::new(|v: &f64| *v),
            &records,
            &masks,
        );

        assert_eq!(*state.group.value_for(&"b"), 1.0);
        assert_eq!(state.group.member_count(&"b"), 1);
        assert_eq!(*state.group.value_for(&"a"), 2.0);
        assert_eq!(*state.group.value_for(&"zzz"), 0.0);
        assert_eq!(state.group.member_count(&"zzz"), 0);
    }

    #[test]
    fn test_apply_transitions() {
        let records = [1.0, 2.0, 3.0, 4.0];
        let mut masks = [0u64; 4];
        let mut state = GroupState::new(
            "g".into(),
            GroupScope::Selected,
            layout(),
            0,
            Count,
            &records,
            &masks,
        );
        assert_eq!(*state.group.value_for(&"b"), 2);

        masks[0] = 0b10;
        state.apply(&records, &[Transition { record: 0, before: 0, after: 0b10 }]);
        assert_eq!(*state.group.value_for(&"b"), 1);

        // Still excluded by another bit: no change.
        state.apply(&records, &[Transition { record: 0, before: 0b10, after: 0b11 }]);
        assert_eq!(*state.group.value_for(&"b"), 1);

        let fresh = state.rebuilt(&records, &masks);
        let fresh = fresh.downcast_ref::<Group<&'static str, u64>>().unwrap();
        assert_eq!(fresh, &state.group);
    }

    #[test]
    fn test_ignored_bit_is_not_observed() {
        let records = [1.0, 2.0, 3.0, 4.0];
        let masks = [0b1u64, 0b1, 0b10, 0];
        let state = GroupState::new(
            "g".into(),
            GroupScope::IgnoreOwnFilter,
            layout(),
            0b1,
            Count,
            &records,
            &masks,
        );
        // Records 0 and 1 are excluded only by the ignored bit.
        assert_eq!(*state.group.value_for(&"a"), 1);
        assert_eq!(*state.group.value_for(&"b"), 1);
        assert_eq!(*state.group.value_for(&"c"), 1);
    }

    #[test]
    fn test_populated_and_all_buckets() {
        let records = [1.0, 2.0, 3.0, 4.0];
        let masks = [0, 0b1, 0, 0b1];
        let state = GroupState::new(
            "g".into(),
            GroupScope::Selected,
            layout(),
            0,
            Count,
            &records,
            &masks,
        );
        let all: Vec<_> = state.group.all_buckets().map(|(k, v)| (*k, *v)).collect();
        assert_eq!(all, vec![("a", 0), ("b", 2), ("c", 0)]);
        let populated: Vec<_> = state.group.populated_buckets().map(|(k, _)| *k).collect();
        assert_eq!(populated, vec!["b"]);
        assert_eq!(state.group.len(), 3);
    }

    #[test]
    fn test_group_all() {
        let records = [1.0, 2.0, 3.0];
        let state = GroupState::new(
            "all".into(),
            GroupScope::Selected,
            BucketLayout::single(3),
            0,
            Sum::new(|v: &f64| *v),
            &records,
            &[0, 0b1, 0],
        );
        assert_eq!(*state.group.value(), 4.0);
        assert_eq!(state.group.count(), 2);
    }

    #[test]
    fn test_emptied_bucket_returns_to_initial() {
        let records = [0.1, 0.2, 0.3];
        let mut state = GroupState::new(
            "all".into(),
            GroupScope::Selected,
            BucketLayout::single(3),
            0,
            Sum::new(|v: &f64| *v),
            &records,
            &[0, 0, 0],
        );

        let leave = |record| Transition {
            record,
            before: 0,
            after: 0b1,
        };
        state.apply(&records, &[leave(0), leave(1)]);
        assert!((*state.group.value() - 0.3).abs() < 1e-12);
        assert_eq!(state.group.count(), 1);

        // Subtracting 0.3 here would leave a float residue of ~5.5e-17.
        state.apply(&records, &[leave(2)]);
        assert_eq!(*state.group.value(), 0.0);
        assert_eq!(state.group.count(), 0);

        let fresh = state.rebuilt(&records, &[0b1, 0b1, 0b1]);
        let fresh = fresh.downcast_ref::<Group<(), f64>>().unwrap();
        assert_eq!(fresh, &state.group);
    }
}
