//! Immutable in-memory tables.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use tracing::{error, info};

use glucoscope_types::{CurveSample, MealRecord, Measure};

use crate::error::Result;
use crate::load::{read_curves, read_meals};
use crate::models::SkippedRow;

/// The base table of meal records.
///
/// Cloning is cheap: the rows live behind an `Arc` and are never mutated.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Arc<[MealRecord]>,
}

impl RecordStore {
    /// Wrap loaded records.
    pub fn new(records: Vec<MealRecord>) -> Self {
        Self {
            records: records.into(),
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record by position.
    pub fn get(&self, index: usize) -> Option<&MealRecord> {
        self.records.get(index)
    }

    /// Iterate over records in load order.
    pub fn iter(&self) -> std::slice::Iter<'_, MealRecord> {
        self.records.iter()
    }

    /// All records as a slice.
    pub fn as_slice(&self) -> &[MealRecord] {
        &self.records
    }

    /// Shared handle to the rows, for building a cube without copying.
    pub fn shared(&self) -> Arc<[MealRecord]> {
        Arc::clone(&self.records)
    }

    /// Minimum and maximum of a measure across every record.
    ///
    /// Used for chart axis domains. Returns `(0.0, 0.0)` for an empty store.
    pub fn extent(&self, measure: Measure) -> (f64, f64) {
        let mut values = self.records.iter().map(|r| r.measure(measure));
        let Some(first) = values.next() else {
            return (0.0, 0.0);
        };
        values.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)))
    }

    /// Distinct subject identifiers, sorted.
    pub fn persons(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.person.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

impl<'a> IntoIterator for &'a RecordStore {
    type Item = &'a MealRecord;
    type IntoIter = std::slice::Iter<'a, MealRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Glucose curve samples indexed by meal group.
///
/// Each group's samples are kept sorted by `minutes_from_meal`, which is the
/// order a line chart draws them in.
#[derive(Debug, Clone, Default)]
pub struct CurveTable {
    by_group: HashMap<String, Vec<CurveSample>>,
    len: usize,
}

impl CurveTable {
    /// Index samples by `group_id`.
    pub fn new(samples: Vec<CurveSample>) -> Self {
        let len = samples.len();
        let mut by_group: HashMap<String, Vec<CurveSample>> = HashMap::new();
        for sample in samples {
            by_group
                .entry(sample.group_id.clone())
                .or_default()
                .push(sample);
        }
        for series in by_group.values_mut() {
            series.sort_by(|a, b| a.minutes_from_meal.total_cmp(&b.minutes_from_meal));
        }
        Self { by_group, len }
    }

    /// Total number of samples.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when there are no samples.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of distinct groups.
    pub fn group_count(&self) -> usize {
        self.by_group.len()
    }

    /// Samples of one group, ascending by minutes; empty for unknown ids.
    pub fn samples_for(&self, group_id: &str) -> &[CurveSample] {
        self.by_group
            .get(group_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Everything the dashboard needs, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// The meal table.
    pub records: RecordStore,
    /// The glucose curve table (empty when no curve file was given).
    pub curves: CurveTable,
    /// Meal rows left out during load.
    pub skipped_records: Vec<SkippedRow>,
    /// Curve rows left out during load.
    pub skipped_curves: Vec<SkippedRow>,
}

impl Dataset {
    /// Build a dataset from rows already in memory.
    pub fn from_parts(records: Vec<MealRecord>, curves: Vec<CurveSample>) -> Self {
        Self {
            records: RecordStore::new(records),
            curves: CurveTable::new(curves),
            skipped_records: Vec::new(),
            skipped_curves: Vec::new(),
        }
    }

    /// Load the meal file and, optionally, the curve file.
    ///
    /// Any file-level failure aborts the whole load; nothing partial is
    /// returned. Row-level problems are kept in `skipped_records` and
    /// `skipped_curves`.
    pub fn load(records: &Path, curves: Option<&Path>) -> Result<Self> {
        let meals = read_meals(records).inspect_err(|e| error!("Dataset load failed: {e}"))?;

        let curve_report = match curves {
            Some(path) => {
                Some(read_curves(path).inspect_err(|e| error!("Dataset load failed: {e}"))?)
            }
            None => None,
        };
        let (samples, skipped_curves) = curve_report
            .map(|report| (report.rows, report.skipped))
            .unwrap_or_default();

        let dataset = Self {
            records: RecordStore::new(meals.rows),
            curves: CurveTable::new(samples),
            skipped_records: meals.skipped,
            skipped_curves,
        };

        info!(
            "Dataset ready: {} meals, {} curve samples in {} groups",
            dataset.records.len(),
            dataset.curves.len(),
            dataset.curves.group_count()
        );
        Ok(dataset)
    }
}
