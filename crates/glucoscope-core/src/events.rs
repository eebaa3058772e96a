//! Change notifications for cube observers.
//!
//! Every filter mutation ends with one [`CubeEvent`] delivered to each
//! subscribed observer, after groups and derived views are up to date.
//! Events are serializable so render adapters can forward them as-is.

use serde::{Deserialize, Serialize};

use crate::crossfilter::Crossfilter;
use crate::filter::FilterSummary;

/// How a mutation changed the selected subset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UpdateSummary {
    /// Records that joined the selected subset.
    pub entered: usize,
    /// Records that left the selected subset.
    pub left: usize,
    /// Size of the selected subset afterwards.
    pub selected: usize,
}

impl UpdateSummary {
    /// True when the selected subset did not change.
    pub fn is_unchanged(&self) -> bool {
        self.entered == 0 && self.left == 0
    }
}

/// Events delivered to observers.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum CubeEvent {
    /// A dimension's filter was replaced.
    FilterChanged {
        dimension: String,
        filter: FilterSummary,
        summary: UpdateSummary,
    },
    /// A dimension's filter was removed.
    FilterCleared {
        dimension: String,
        summary: UpdateSummary,
    },
    /// Every filter was removed at once.
    Reset { summary: UpdateSummary },
}

impl CubeEvent {
    /// The selection change this event reports.
    pub fn summary(&self) -> UpdateSummary {
        match self {
            CubeEvent::FilterChanged { summary, .. }
            | CubeEvent::FilterCleared { summary, .. }
            | CubeEvent::Reset { summary } => *summary,
        }
    }

    /// Name of the dimension involved, if the event concerns one.
    pub fn dimension(&self) -> Option<&str> {
        match self {
            CubeEvent::FilterChanged { dimension, .. }
            | CubeEvent::FilterCleared { dimension, .. } => Some(dimension),
            CubeEvent::Reset { .. } => None,
        }
    }
}

/// Token returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

/// Callback invoked after every mutation.
pub type Observer<R> = Box<dyn FnMut(&CubeEvent, &Crossfilter<R>)>;

/// Registered observers, in subscription order.
pub(crate) struct ObserverList<R> {
    next_id: u64,
    entries: Vec<(SubscriptionId, Observer<R>)>,
}

impl<R> ObserverList<R> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            entries: Vec::new(),
        }
    }

    pub(crate) fn subscribe(&mut self, observer: Observer<R>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, observer));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| *existing != id);
        self.entries.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Move the observers out so they can borrow the cube while running.
    pub(crate) fn take(&mut self) -> Vec<(SubscriptionId, Observer<R>)> {
        std::mem::take(&mut self.entries)
    }

    pub(crate) fn restore(&mut self, entries: Vec<(SubscriptionId, Observer<R>)>) {
        self.entries = entries;
    }
}
