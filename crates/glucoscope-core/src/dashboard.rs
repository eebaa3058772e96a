//! The standard meal and glucose dashboard, wired over one cube.
//!
//! [`MealDashboard`] owns a [`Crossfilter`] over the meal table with:
//!
//! - a person dimension (select menu) with per-person counts,
//! - one binned histogram per measure in [`HISTOGRAM_MEASURES`],
//! - the carbohydrate × glucose-rise scatter dimension,
//! - group-all counters: selected meals, macro totals, nutrient totals,
//! - the glucose response view (curves and glucose-rise statistics).

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use glucoscope_store::{Dataset, RecordStore, SkippedRow};
use glucoscope_types::{MealRecord, Measure};

use crate::binning::{BinKey, PairKey};
use crate::config::DashboardConfig;
use crate::crossfilter::Crossfilter;
use crate::derived::{GlucoseResponse, GlucoseResponseView, ViewHandle};
use crate::dimension::DimensionHandle;
use crate::error::{Error, Result};
use crate::events::{CubeEvent, SubscriptionId, UpdateSummary};
use crate::filter::Filter;
use crate::group::{Group, GroupHandle, GroupScope};
use crate::reduce::{Count, MeasureSums, MeasureTotals};

/// Measures that get a histogram, in display order.
pub const HISTOGRAM_MEASURES: [Measure; 9] = [
    Measure::Carbohydrate,
    Measure::Protein,
    Measure::Fat,
    Measure::Sugar,
    Measure::Fiber,
    Measure::Calorie,
    Measure::DeltaGlucose,
    Measure::MinuteOfDay,
    Measure::HourOfDay,
];

#[derive(Debug, Clone, Copy)]
struct Histogram {
    dimension: DimensionHandle<BinKey>,
    counts: GroupHandle<BinKey, u64>,
    width: f64,
}

/// Linked meal, nutrient and glucose charts over one dataset.
///
/// # Example
///
/// ```
/// use glucoscope_core::MealDashboard;
/// use glucoscope_store::Dataset;
/// use glucoscope_types::{MealRecord, Measure};
///
/// let meal = |person: &str, carb: f64| MealRecord {
///     total_carb: carb,
///     ..MealRecord::new(person)
/// };
/// let dataset = Dataset::from_parts(vec![meal("A", 12.0), meal("B", 45.0)], Vec::new());
/// let mut dashboard = MealDashboard::with_defaults(dataset)?;
///
/// dashboard.brush(Measure::Carbohydrate, 10.0, 20.0)?;
/// assert_eq!(dashboard.selected_count()?, 1);
/// assert_eq!(dashboard.macro_totals()?.get(Measure::Carbohydrate), 12.0);
/// # Ok::<(), glucoscope_core::Error>(())
/// ```
pub struct MealDashboard {
    cube: Crossfilter<MealRecord>,
    store: RecordStore,
    skipped_records: Vec<SkippedRow>,
    person: DimensionHandle<String>,
    person_counts: GroupHandle<String, u64>,
    histograms: BTreeMap<Measure, Histogram>,
    scatter: DimensionHandle<PairKey>,
    scatter_counts: GroupHandle<PairKey, u64>,
    selected: GroupHandle<(), u64>,
    macros: GroupHandle<(), MeasureTotals>,
    nutrients: GroupHandle<(), MeasureTotals>,
    glucose: ViewHandle<GlucoseResponseView>,
}

impl MealDashboard {
    /// Build the dashboard over a loaded dataset.
    pub fn new(dataset: Dataset, config: &DashboardConfig) -> Result<Self> {
        let Dataset {
            records: store,
            curves,
            skipped_records,
            ..
        } = dataset;
        let mut cube = Crossfilter::new(store.shared());

        let person = cube.add_dimension("person", |r: &MealRecord| r.person.clone())?;
        let person_counts = cube.add_count_group(&person, "person", GroupScope::Selected)?;

        let scope = config.view.histogram_scope;
        let mut histograms = BTreeMap::new();
        for measure in HISTOGRAM_MEASURES {
            let width = config.bins.width(measure);
            let name = dimension_name(measure);
            let dimension = cube.add_dimension(name, move |r: &MealRecord| {
                BinKey::binned(r.measure(measure), width)
            })?;
            let counts = cube.add_count_group(&dimension, name, scope)?;
            histograms.insert(
                measure,
                Histogram {
                    dimension,
                    counts,
                    width,
                },
            );
        }

        let scatter = cube.add_dimension("carb_vs_delta_glucose", |r: &MealRecord| {
            PairKey::new(r.total_carb, r.delta_glucose)
        })?;
        let scatter_counts = cube.add_count_group(&scatter, "carb_vs_delta_glucose", scope)?;

        let selected = cube.add_group_all("selected", Count);
        let macros = cube.add_group_all("macros", MeasureSums::macros());
        let nutrients = cube.add_group_all("nutrients", MeasureSums::nutrients());
        let glucose = cube.add_view(GlucoseResponseView::new(Arc::new(curves)));

        info!(
            "Dashboard ready: {} meals, {} persons, {} dimensions, {} groups",
            store.len(),
            cube.group(&person_counts)?.len(),
            cube.dimension_count(),
            cube.group_count()
        );

        Ok(Self {
            cube,
            store,
            skipped_records,
            person,
            person_counts,
            histograms,
            scatter,
            scatter_counts,
            selected,
            macros,
            nutrients,
            glucose,
        })
    }

    /// Build the dashboard with default bin widths and scope.
    pub fn with_defaults(dataset: Dataset) -> Result<Self> {
        Self::new(dataset, &DashboardConfig::default())
    }

    /// Validate `config`, load its dataset and build the dashboard.
    pub fn open(config: &DashboardConfig) -> Result<Self> {
        config.validate()?;
        let dataset = Dataset::load(&config.dataset.records, config.dataset.curves.as_deref())?;
        Self::new(dataset, config)
    }

    /// Load a configuration file, then [`open`](Self::open) it.
    pub fn open_config<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = DashboardConfig::load_validated(path)?;
        Self::open(&config)
    }

    fn histogram_for(&self, measure: Measure) -> Result<Histogram> {
        self.histograms
            .get(&measure)
            .copied()
            .ok_or_else(|| Error::UnknownDimension(format!("no histogram for {}", measure)))
    }

    // --- gestures ---

    /// Restrict to one subject, or clear the subject filter with `None`.
    pub fn select_person(&mut self, person: Option<&str>) -> Result<UpdateSummary> {
        match person {
            Some(person) => self.cube.set_filter(&self.person, Filter::exact(person)),
            None => self.cube.clear_filter(&self.person),
        }
    }

    /// Brush a histogram: keep bins whose start lies in `[lo, hi)`.
    pub fn brush(&mut self, measure: Measure, lo: f64, hi: f64) -> Result<UpdateSummary> {
        let histogram = self.histogram_for(measure)?;
        self.cube
            .set_filter(&histogram.dimension, Filter::brush(lo, hi))
    }

    /// Remove a histogram's brush.
    pub fn clear(&mut self, measure: Measure) -> Result<UpdateSummary> {
        let histogram = self.histogram_for(measure)?;
        self.cube.clear_filter(&histogram.dimension)
    }

    /// Brush the scatter plot with a rectangle.
    pub fn brush_scatter(&mut self, x0: f64, x1: f64, y0: f64, y1: f64) -> Result<UpdateSummary> {
        self.cube
            .set_filter(&self.scatter, Filter::rectangle(x0, x1, y0, y1))
    }

    /// Remove the scatter brush.
    pub fn clear_scatter(&mut self) -> Result<UpdateSummary> {
        self.cube.clear_filter(&self.scatter)
    }

    /// Clear every filter.
    pub fn reset(&mut self) -> UpdateSummary {
        self.cube.reset()
    }

    // --- chart data ---

    /// Counts per bin of a measure's histogram.
    pub fn histogram(&self, measure: Measure) -> Result<&Group<BinKey, u64>> {
        let histogram = self.histogram_for(measure)?;
        self.cube.group(&histogram.counts)
    }

    /// Bin width of a measure's histogram.
    pub fn bin_width(&self, measure: Measure) -> Option<f64> {
        self.histograms.get(&measure).map(|h| h.width)
    }

    /// Meals per subject, for the select menu.
    pub fn person_counts(&self) -> Result<&Group<String, u64>> {
        self.cube.group(&self.person_counts)
    }

    /// Meals per (carbohydrate, glucose rise) point.
    pub fn scatter_points(&self) -> Result<&Group<PairKey, u64>> {
        self.cube.group(&self.scatter_counts)
    }

    /// Number of selected meals.
    pub fn selected_count(&self) -> Result<u64> {
        Ok(*self.cube.group(&self.selected)?.value())
    }

    /// Carbohydrate, fat and protein totals of the selected meals.
    pub fn macro_totals(&self) -> Result<&MeasureTotals> {
        Ok(self.cube.group(&self.macros)?.value())
    }

    /// Each macronutrient's share of the macro total (all 0 when the total is 0).
    pub fn macro_shares(&self) -> Result<Vec<(Measure, f64)>> {
        Ok(self.macro_totals()?.shares())
    }

    /// Calorie, carbohydrate, protein, fat and sugar totals of the selected meals.
    pub fn nutrient_totals(&self) -> Result<&MeasureTotals> {
        Ok(self.cube.group(&self.nutrients)?.value())
    }

    /// Glucose curves and glucose-rise statistics of the selected meals.
    pub fn glucose(&self) -> Result<&GlucoseResponse> {
        Ok(self.cube.view(&self.glucose)?.response())
    }

    /// Axis domain of a measure over the whole dataset.
    pub fn extent(&self, measure: Measure) -> (f64, f64) {
        self.store.extent(measure)
    }

    /// Distinct subjects, sorted.
    pub fn persons(&self) -> Vec<String> {
        self.store.persons()
    }

    /// Meal rows left out while loading.
    pub fn skipped_records(&self) -> &[SkippedRow] {
        &self.skipped_records
    }

    // --- observers ---

    /// Register a render callback run after every gesture.
    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&CubeEvent, &Crossfilter<MealRecord>) + 'static,
    {
        self.cube.subscribe(observer)
    }

    /// Remove a render callback.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.cube.unsubscribe(id)
    }

    /// The underlying cube, for custom dimensions and groups.
    pub fn cube(&self) -> &Crossfilter<MealRecord> {
        &self.cube
    }

    /// Mutable access to the underlying cube.
    pub fn cube_mut(&mut self) -> &mut Crossfilter<MealRecord> {
        &mut self.cube
    }
}

fn dimension_name(measure: Measure) -> &'static str {
    match measure {
        Measure::Carbohydrate => "carbohydrate",
        Measure::Protein => "protein",
        Measure::Fat => "fat",
        Measure::Sugar => "sugar",
        Measure::Fiber => "fiber",
        Measure::Calorie => "calorie",
        Measure::DeltaGlucose => "delta_glucose",
        Measure::MinuteOfDay => "minute_of_day",
        Measure::HourOfDay => "hour_of_day",
        _ => "measure",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glucoscope_types::CurveSample;

    fn meal(person: &str, carb: f64, delta: f64, minute: f64, group: &str) -> MealRecord {
        MealRecord {
            total_carb: carb,
            protein: carb / 2.0,
            total_fat: carb / 4.0,
            calorie: carb * 10.0,
            delta_glucose: delta,
            minute_in_day: minute,
            group_id: Some(group.to_string()),
            ..MealRecord::new(person)
        }
    }

    fn sample(group: &str, minutes: f64) -> CurveSample {
        CurveSample {
            group_id: group.to_string(),
            minutes_from_meal: minutes,
            glucose: 100.0 + minutes,
        }
    }

    fn dataset() -> Dataset {
        Dataset::from_parts(
            vec![
                meal("A", 40.0, 30.0, 480.0, "1"),
                meal("A", 80.0, 60.0, 750.0, "2"),
                meal("B", 20.0, -5.0, 1140.0, "3"),
                meal("C", 0.0, 0.0, 1150.0, "4"),
            ],
            vec![sample("1", 0.0), sample("1", 15.0), sample("2", 0.0), sample("3", 0.0)],
        )
    }

    fn bins(group: &Group<BinKey, u64>) -> Vec<(f64, u64)> {
        group
            .populated_buckets()
            .map(|(k, v)| (k.value(), *v))
            .collect()
    }

    #[test]
    fn test_initial_charts() {
        let dashboard = MealDashboard::with_defaults(dataset()).unwrap();
        assert_eq!(dashboard.selected_count().unwrap(), 4);
        assert_eq!(
            bins(dashboard.histogram(Measure::MinuteOfDay).unwrap()),
            vec![(480.0, 1), (720.0, 1), (1140.0, 2)]
        );
        assert_eq!(dashboard.persons(), vec!["A", "B", "C"]);
        assert_eq!(*dashboard.person_counts().unwrap().value_for(&"A".to_string()), 2);
        assert_eq!(dashboard.scatter_points().unwrap().len(), 4);
        assert_eq!(dashboard.glucose().unwrap().series.len(), 3);
        assert_eq!(dashboard.extent(Measure::DeltaGlucose), (-5.0, 60.0));
        assert_eq!(dashboard.bin_width(Measure::Calorie), Some(100.0));
        assert_eq!(dashboard.bin_width(Measure::HourOfDay), Some(1.0));
    }

    #[test]
    fn test_select_person() {
        let mut dashboard = MealDashboard::with_defaults(dataset()).unwrap();
        let update = dashboard.select_person(Some("A")).unwrap();
        assert_eq!(update.selected, 2);

        let totals = dashboard.macro_totals().unwrap();
        assert_eq!(totals.get(Measure::Carbohydrate), 120.0);
        assert_eq!(totals.get(Measure::Protein), 60.0);
        assert_eq!(totals.get(Measure::Fat), 30.0);
        assert_eq!(dashboard.nutrient_totals().unwrap().get(Measure::Calorie), 1200.0);

        let glucose = dashboard.glucose().unwrap();
        assert_eq!(glucose.stats.count, 2);
        assert_eq!(glucose.stats.mean, 45.0);
        assert_eq!(glucose.stats.std_dev, 15.0);
        let ids: Vec<&str> = glucose.series.iter().map(|s| s.group_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);

        dashboard.select_person(None).unwrap();
        assert_eq!(dashboard.selected_count().unwrap(), 4);
    }

    #[test]
    fn test_brush_and_clear() {
        let mut dashboard = MealDashboard::with_defaults(dataset()).unwrap();
        dashboard.brush(Measure::DeltaGlucose, 0.0, 40.0).unwrap();
        assert_eq!(dashboard.selected_count().unwrap(), 2);
        assert_eq!(
            bins(dashboard.histogram(Measure::Carbohydrate).unwrap()),
            vec![(0.0, 1), (40.0, 1)]
        );

        dashboard.clear(Measure::DeltaGlucose).unwrap();
        assert_eq!(dashboard.selected_count().unwrap(), 4);
    }

    #[test]
    fn test_hour_of_day_histogram() {
        let mut dashboard = MealDashboard::with_defaults(dataset()).unwrap();
        assert_eq!(
            bins(dashboard.histogram(Measure::HourOfDay).unwrap()),
            vec![(8.0, 1), (12.0, 1), (19.0, 2)]
        );

        let update = dashboard.brush(Measure::HourOfDay, 12.0, 20.0).unwrap();
        assert_eq!(update.selected, 3);
        assert_eq!(
            bins(dashboard.histogram(Measure::Carbohydrate).unwrap()),
            vec![(0.0, 1), (20.0, 1), (80.0, 1)]
        );
    }

    #[test]
    fn test_brush_scatter() {
        let mut dashboard = MealDashboard::with_defaults(dataset()).unwrap();
        dashboard.brush_scatter(10.0, 50.0, -10.0, 40.0).unwrap();
        assert_eq!(dashboard.selected_count().unwrap(), 2);
        assert_eq!(dashboard.scatter_points().unwrap().populated_buckets().count(), 2);

        dashboard.clear_scatter().unwrap();
        assert_eq!(dashboard.selected_count().unwrap(), 4);
    }

    #[test]
    fn test_empty_selection_is_all_zero() {
        let mut dashboard = MealDashboard::with_defaults(dataset()).unwrap();
        dashboard.select_person(Some("nobody")).unwrap();

        assert_eq!(dashboard.selected_count().unwrap(), 0);
        assert!(dashboard.macro_shares().unwrap().iter().all(|(_, s)| *s == 0.0));
        let glucose = dashboard.glucose().unwrap();
        assert_eq!(glucose.stats.count, 0);
        assert_eq!(glucose.stats.mean, 0.0);
        assert_eq!(glucose.stats.std_dev, 0.0);
        assert!(glucose.series.is_empty());
    }

    #[test]
    fn test_fractional_totals_empty_to_exact_zero() {
        let records = vec![
            meal("A", 0.1, 5.0, 480.0, "1"),
            meal("A", 0.2, 10.0, 500.0, "2"),
            meal("A", 0.3, 15.0, 520.0, "3"),
        ];
        let mut dashboard =
            MealDashboard::with_defaults(Dataset::from_parts(records, Vec::new())).unwrap();

        dashboard.select_person(Some("A")).unwrap();
        dashboard.select_person(Some("nobody")).unwrap();
        assert_eq!(dashboard.selected_count().unwrap(), 0);
        for (_, total) in dashboard.macro_totals().unwrap().entries() {
            assert_eq!(*total, 0.0);
        }
        assert!(dashboard.macro_shares().unwrap().iter().all(|(_, s)| *s == 0.0));
        assert_eq!(dashboard.nutrient_totals().unwrap().total(), 0.0);

        dashboard.select_person(None).unwrap();
        dashboard.brush(Measure::Carbohydrate, 50.0, 60.0).unwrap();
        assert_eq!(dashboard.selected_count().unwrap(), 0);
        assert_eq!(dashboard.macro_totals().unwrap().total(), 0.0);
        assert!(dashboard.macro_shares().unwrap().iter().all(|(_, s)| *s == 0.0));
    }

    #[test]
    fn test_histogram_scope_from_config() {
        let mut config = DashboardConfig::default();
        config.view.histogram_scope = GroupScope::IgnoreOwnFilter;
        config.bins.carbohydrate = 50.0;
        let mut dashboard = MealDashboard::new(dataset(), &config).unwrap();

        dashboard.brush(Measure::Carbohydrate, 50.0, 100.0).unwrap();
        assert_eq!(dashboard.selected_count().unwrap(), 1);
        // The brushed histogram still shows the bins outside its brush.
        assert_eq!(
            bins(dashboard.histogram(Measure::Carbohydrate).unwrap()),
            vec![(0.0, 3), (50.0, 1)]
        );
        // Other histograms follow the brush.
        assert_eq!(
            bins(dashboard.histogram(Measure::Protein).unwrap()),
            vec![(40.0, 1)]
        );
    }

    #[test]
    fn test_subscribe_and_unsubscribe() {
        use std::cell::Cell;
        use std::rc::Rc;

        let mut dashboard = MealDashboard::with_defaults(dataset()).unwrap();
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let id = dashboard.subscribe(move |_, cube| {
            counter.set(counter.get() + 1);
            assert!(cube.selected_count() <= cube.len());
        });

        dashboard.select_person(Some("B")).unwrap();
        dashboard.reset();
        assert_eq!(calls.get(), 2);

        assert!(dashboard.unsubscribe(id));
        dashboard.select_person(Some("B")).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_open_missing_dataset_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = DashboardConfig::default();
        config.dataset.records = temp_dir.path().join("missing.csv");
        assert!(matches!(
            MealDashboard::open(&config),
            Err(Error::Store(glucoscope_store::Error::Io { .. }))
        ));

        config.bins.fat = 0.0;
        assert!(matches!(MealDashboard::open(&config), Err(Error::Config(_))));
    }
}
