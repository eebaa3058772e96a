//! The coordinator: records, exclusion masks, dimensions, groups, views and
//! observers.
//!
//! Each record carries a 64-bit exclusion mask with one bit per dimension;
//! a set bit means that dimension's filter rejects the record. A record is
//! selected when its mask is zero. A filter change flips one bit on the
//! records whose acceptance changed, and only those records are handed to
//! the groups as add/remove transitions.
//!
//! Every mutation runs to completion before returning:
//!
//! 1. masks and groups are updated incrementally,
//! 2. derived views are recomputed from the selected subset,
//! 3. observers are notified with a [`CubeEvent`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info};

use crate::derived::{DerivedView, ViewHandle, ViewSlot};
use crate::dimension::{Dimension, DimensionHandle, DimensionSlot};
use crate::error::{Error, Result};
use crate::events::{CubeEvent, ObserverList, SubscriptionId, UpdateSummary};
use crate::filter::{DimensionKey, Filter, FilterSummary};
use crate::group::{
    BucketLayout, Group, GroupHandle, GroupScope, GroupSlot, GroupState, Transition,
};
use crate::reduce::{Count, Reducer};

/// Maximum number of dimensions per cube (one mask bit each).
pub const MAX_DIMENSIONS: usize = u64::BITS as usize;

static NEXT_CUBE_ID: AtomicU64 = AtomicU64::new(1);

/// Multi-dimensional filter and aggregation model over immutable records.
///
/// # Example
///
/// ```
/// use glucoscope_core::{Count, Crossfilter, Filter, GroupScope};
///
/// let records = vec![
///     ("A".to_string(), 12.0),
///     ("A".to_string(), 22.0),
///     ("B".to_string(), 5.0),
/// ];
/// let mut cube = Crossfilter::new(records);
/// let person = cube.add_dimension("person", |r: &(String, f64)| r.0.clone())?;
/// let people = cube.add_group(&person, "people", GroupScope::Selected, Count)?;
///
/// cube.set_filter(&person, Filter::exact("A"))?;
/// assert_eq!(cube.selected_count(), 2);
/// assert_eq!(*cube.group(&people)?.value_for(&"B".to_string()), 0);
///
/// cube.reset();
/// assert_eq!(cube.selected_count(), 3);
/// # Ok::<(), glucoscope_core::Error>(())
/// ```
pub struct Crossfilter<R> {
    id: u64,
    records: Arc<[R]>,
    masks: Vec<u64>,
    dimensions: Vec<Box<dyn DimensionSlot>>,
    groups: Vec<Box<dyn GroupSlot<R>>>,
    views: Vec<Box<dyn ViewSlot<R>>>,
    observers: ObserverList<R>,
}

impl<R: 'static> Crossfilter<R> {
    /// Build a cube over `records` with nothing filtered.
    pub fn new(records: impl Into<Arc<[R]>>) -> Self {
        let records = records.into();
        let id = NEXT_CUBE_ID.fetch_add(1, Ordering::Relaxed);
        info!("Created cube #{} over {} records", id, records.len());
        Self {
            id,
            masks: vec![0; records.len()],
            records,
            dimensions: Vec::new(),
            groups: Vec::new(),
            views: Vec::new(),
            observers: ObserverList::new(),
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the cube holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records, selected or not, in load order.
    pub fn records(&self) -> &[R] {
        &self.records
    }

    /// Number of dimensions.
    pub fn dimension_count(&self) -> usize {
        self.dimensions.len()
    }

    /// Number of groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of derived views.
    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    // --- construction ---

    /// Add a dimension keyed by `key`.
    ///
    /// Fails with [`Error::DimensionLimit`] once [`MAX_DIMENSIONS`] exist.
    pub fn add_dimension<K: DimensionKey>(
        &mut self,
        name: impl Into<String>,
        key: impl Fn(&R) -> K,
    ) -> Result<DimensionHandle<K>> {
        let name = name.into();
        if self.dimensions.len() >= MAX_DIMENSIONS {
            return Err(Error::DimensionLimit {
                name,
                max: MAX_DIMENSIONS,
            });
        }

        let keys: Vec<K> = self.records.iter().map(key).collect();
        debug!("Added dimension '{}' (#{})", name, self.dimensions.len());
        self.dimensions.push(Box::new(Dimension::new(name, keys)));
        Ok(DimensionHandle::new(self.id, self.dimensions.len() - 1))
    }

    /// Add a group over a dimension's keys.
    ///
    /// The group has one bucket per distinct key and is reduced immediately
    /// over its observed subset.
    pub fn add_group<K, Rd>(
        &mut self,
        dimension: &DimensionHandle<K>,
        name: impl Into<String>,
        scope: GroupScope,
        reducer: Rd,
    ) -> Result<GroupHandle<K, Rd::Value>>
    where
        K: DimensionKey,
        Rd: Reducer<R>,
    {
        let dim = self.dimension_ref(dimension)?;
        let layout = BucketLayout::from_sorted(dim.keys(), dim.order());
        let ignore = match scope {
            GroupScope::Selected => 0,
            GroupScope::IgnoreOwnFilter => 1u64 << dimension.index,
        };

        let name = name.into();
        debug!(
            "Added group '{}' on '{}' with {} buckets",
            name,
            dim.name(),
            layout.keys.len()
        );
        let state = GroupState::new(
            name,
            scope,
            layout,
            ignore,
            reducer,
            &self.records,
            &self.masks,
        );
        self.groups.push(Box::new(state));
        Ok(GroupHandle::new(self.id, self.groups.len() - 1))
    }

    /// Add a counting group over a dimension's keys.
    pub fn add_count_group<K: DimensionKey>(
        &mut self,
        dimension: &DimensionHandle<K>,
        name: impl Into<String>,
        scope: GroupScope,
    ) -> Result<GroupHandle<K, u64>> {
        self.add_group(dimension, name, scope, Count)
    }

    /// Add a single-bucket group over the whole selected subset.
    pub fn add_group_all<Rd: Reducer<R>>(
        &mut self,
        name: impl Into<String>,
        reducer: Rd,
    ) -> GroupHandle<(), Rd::Value> {
        let name = name.into();
        debug!("Added group-all '{}'", name);
        let layout = BucketLayout::single(self.records.len());
        let state = GroupState::new(
            name,
            GroupScope::Selected,
            layout,
            0,
            reducer,
            &self.records,
            &self.masks,
        );
        self.groups.push(Box::new(state));
        GroupHandle::new(self.id, self.groups.len() - 1)
    }

    /// Register a derived view and compute it over the current selection.
    pub fn add_view<V: DerivedView<R>>(&mut self, mut view: V) -> ViewHandle<V> {
        let selected: Vec<&R> = selected(&self.records, &self.masks).collect();
        view.recompute(&selected);
        debug!("Added view '{}'", view.name());
        self.views.push(Box::new(view));
        ViewHandle::new(self.id, self.views.len() - 1)
    }

    // --- filtering ---

    /// Replace a dimension's filter.
    pub fn set_filter<K: DimensionKey>(
        &mut self,
        dimension: &DimensionHandle<K>,
        filter: Filter<K>,
    ) -> Result<UpdateSummary> {
        let summary = filter.summary();
        let (name, flipped) = {
            let dim = self.dimension_mut(dimension)?;
            let flipped = dim.apply_filter(filter);
            (dim.name().to_string(), flipped)
        };

        let event = |summary_of_change| {
            if matches!(summary, FilterSummary::All) {
                CubeEvent::FilterCleared {
                    dimension: name.clone(),
                    summary: summary_of_change,
                }
            } else {
                CubeEvent::FilterChanged {
                    dimension: name.clone(),
                    filter: summary.clone(),
                    summary: summary_of_change,
                }
            }
        };
        let transitions = self.flip(dimension.index, flipped);
        let update = self.propagate(&transitions, event);

        debug!(
            "Filter on '{}' set to {:?}: {} entered, {} left, {} selected",
            name, summary, update.entered, update.left, update.selected
        );
        Ok(update)
    }

    /// Remove a dimension's filter, leaving the others untouched.
    pub fn clear_filter<K: DimensionKey>(
        &mut self,
        dimension: &DimensionHandle<K>,
    ) -> Result<UpdateSummary> {
        self.set_filter(dimension, Filter::All)
    }

    /// Remove every filter at once, with a single notification.
    pub fn reset(&mut self) -> UpdateSummary {
        for dim in &mut self.dimensions {
            dim.clear();
        }

        let transitions: Vec<Transition> = self
            .masks
            .iter_mut()
            .enumerate()
            .filter(|(_, mask)| **mask != 0)
            .map(|(record, mask)| Transition {
                record,
                before: std::mem::take(mask),
                after: 0,
            })
            .collect();

        let update = self.propagate(&transitions, |summary| CubeEvent::Reset { summary });
        debug!(
            "Reset all filters: {} entered, {} selected",
            update.entered, update.selected
        );
        update
    }

    /// Toggle one mask bit on each flipped record.
    fn flip(&mut self, bit: usize, flipped: Vec<usize>) -> Vec<Transition> {
        let bit = 1u64 << bit;
        flipped
            .into_iter()
            .map(|record| {
                let before = self.masks[record];
                let after = before ^ bit;
                self.masks[record] = after;
                Transition {
                    record,
                    before,
                    after,
                }
            })
            .collect()
    }

    /// Update groups, recompute views and notify observers.
    fn propagate(
        &mut self,
        transitions: &[Transition],
        event: impl FnOnce(UpdateSummary) -> CubeEvent,
    ) -> UpdateSummary {
        for group in &mut self.groups {
            group.apply(&self.records, transitions);
        }

        let mut update = UpdateSummary::default();
        for t in transitions {
            match (t.before == 0, t.after == 0) {
                (false, true) => update.entered += 1,
                (true, false) => update.left += 1,
                _ => {}
            }
        }

        let selected: Vec<&R> = selected(&self.records, &self.masks).collect();
        update.selected = selected.len();
        for view in &mut self.views {
            view.refresh(&selected);
        }
        drop(selected);

        let event = event(update);
        let mut observers = self.observers.take();
        for (_, observer) in &mut observers {
            observer(&event, self);
        }
        self.observers.restore(observers);

        update
    }

    // --- queries ---

    /// The filter currently installed on a dimension.
    pub fn filter<K: DimensionKey>(&self, dimension: &DimensionHandle<K>) -> Result<&Filter<K>> {
        Ok(self.dimension_ref(dimension)?.filter())
    }

    /// Every dimension with a filter, by name.
    pub fn active_filters(&self) -> Vec<(&str, FilterSummary)> {
        self.dimensions
            .iter()
            .filter(|d| d.is_filtered())
            .map(|d| (d.name(), d.filter_summary()))
            .collect()
    }

    /// Whether a record passes one dimension's own filter.
    pub fn is_accepted_by<K: DimensionKey>(
        &self,
        dimension: &DimensionHandle<K>,
        record: usize,
    ) -> Result<bool> {
        let dim = self.dimension_ref(dimension)?;
        Ok(record < self.records.len() && dim.accepts_record(record))
    }

    /// Whether a record passes every filter.
    pub fn is_selected(&self, record: usize) -> bool {
        self.masks.get(record).is_some_and(|mask| *mask == 0)
    }

    /// Records passing every filter, in load order.
    pub fn selected_records(&self) -> impl Iterator<Item = &R> + '_ {
        selected(&self.records, &self.masks)
    }

    /// Size of the selected subset.
    pub fn selected_count(&self) -> usize {
        self.masks.iter().filter(|mask| **mask == 0).count()
    }

    /// Keys of a dimension paired with their selected records, in key order.
    ///
    /// Keys with no selected record are left out.
    pub fn dimension_entries<K: DimensionKey>(
        &self,
        dimension: &DimensionHandle<K>,
    ) -> Result<Vec<(K, Vec<&R>)>> {
        let dim = self.dimension_ref(dimension)?;
        let mut entries: Vec<(K, Vec<&R>)> = Vec::new();
        for &record in dim.order() {
            if self.masks[record] != 0 {
                continue;
            }
            let key = &dim.keys()[record];
            match entries.last_mut() {
                Some((last, members)) if last == key => members.push(&self.records[record]),
                _ => entries.push((key.clone(), vec![&self.records[record]])),
            }
        }
        Ok(entries)
    }

    /// A group's current state.
    pub fn group<K: 'static, V: 'static>(
        &self,
        handle: &GroupHandle<K, V>,
    ) -> Result<&Group<K, V>> {
        self.check_cube(handle.cube, || Error::UnknownGroup(format!("#{}", handle.index)))?;
        self.groups
            .get(handle.index)
            .and_then(|g| g.group_any().downcast_ref::<Group<K, V>>())
            .ok_or_else(|| Error::UnknownGroup(format!("#{}", handle.index)))
    }

    /// A group reduced from scratch over the current selection.
    ///
    /// Equal to [`group`](Self::group) whenever the reducer's `remove`
    /// exactly undoes its `add`.
    pub fn recompute_group<K: 'static, V: 'static>(
        &self,
        handle: &GroupHandle<K, V>,
    ) -> Result<Group<K, V>> {
        self.check_cube(handle.cube, || Error::UnknownGroup(format!("#{}", handle.index)))?;
        let unknown = || Error::UnknownGroup(format!("#{}", handle.index));
        let slot = self.groups.get(handle.index).ok_or_else(unknown)?;
        slot.rebuilt(&self.records, &self.masks)
            .downcast::<Group<K, V>>()
            .map(|group| *group)
            .map_err(|_| unknown())
    }

    /// A derived view.
    pub fn view<V: 'static>(&self, handle: &ViewHandle<V>) -> Result<&V> {
        self.check_cube(handle.cube, || Error::UnknownView(format!("#{}", handle.index)))?;
        self.views
            .get(handle.index)
            .and_then(|v| v.as_any().downcast_ref::<V>())
            .ok_or_else(|| Error::UnknownView(format!("#{}", handle.index)))
    }

    // --- observers ---

    /// Register a callback run after every mutation.
    ///
    /// Callbacks receive the event and the cube, already fully updated.
    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&CubeEvent, &Crossfilter<R>) + 'static,
    {
        self.observers.subscribe(Box::new(observer))
    }

    /// Remove a callback. Returns `false` if the id was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Number of registered callbacks.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    // --- handle resolution ---

    fn check_cube(&self, cube: u64, err: impl FnOnce() -> Error) -> Result<()> {
        if cube == self.id { Ok(()) } else { Err(err()) }
    }

    fn dimension_ref<K: DimensionKey>(&self, handle: &DimensionHandle<K>) -> Result<&Dimension<K>> {
        let unknown = || Error::UnknownDimension(format!("#{}", handle.index));
        self.check_cube(handle.cube, unknown)?;
        self.dimensions
            .get(handle.index)
            .and_then(|d| d.as_any().downcast_ref::<Dimension<K>>())
            .ok_or_else(unknown)
    }

    fn dimension_mut<K: DimensionKey>(
        &mut self,
        handle: &DimensionHandle<K>,
    ) -> Result<&mut Dimension<K>> {
        let unknown = || Error::UnknownDimension(format!("#{}", handle.index));
        self.check_cube(handle.cube, unknown)?;
        self.dimensions
            .get_mut(handle.index)
            .and_then(|d| d.as_any_mut().downcast_mut::<Dimension<K>>())
            .ok_or_else(unknown)
    }
}

fn selected<'a, R>(records: &'a [R], masks: &'a [u64]) -> impl Iterator<Item = &'a R> + 'a {
    records
        .iter()
        .zip(masks)
        .filter(|(_, mask)| **mask == 0)
        .map(|(record, _)| record)
}

impl<R> fmt::Debug for Crossfilter<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Crossfilter")
            .field("id", &self.id)
            .field("records", &self.records.len())
            .field("dimensions", &self.dimensions.iter().map(|d| d.name()).collect::<Vec<_>>())
            .field("groups", &self.groups.iter().map(|g| g.name()).collect::<Vec<_>>())
            .field("views", &self.views.iter().map(|v| v.view_name()).collect::<Vec<_>>())
            .field("observers", &self.observers.len())
            .finish()
    }
}
