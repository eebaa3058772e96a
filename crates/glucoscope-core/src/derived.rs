//! Views re-derived from the selected subset after every filter change.
//!
//! Unlike groups, derived views are not maintained incrementally: each one
//! receives the full selected subset and rebuilds its output. This keeps
//! statistics such as the standard deviation exact, at the cost of a scan
//! per change.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use glucoscope_store::CurveTable;
use glucoscope_types::{CurveSample, MealRecord, Measure};

/// A view recomputed from scratch over the selected records.
pub trait DerivedView<R>: 'static {
    /// View name, for logs.
    fn name(&self) -> &str;

    /// Rebuild the view's output from the selected subset.
    fn recompute(&mut self, selected: &[&R]);
}

/// Typed reference to a derived view of a [`Crossfilter`](crate::Crossfilter).
#[derive(Debug)]
pub struct ViewHandle<V> {
    pub(crate) cube: u64,
    pub(crate) index: usize,
    _view: PhantomData<fn() -> V>,
}

impl<V> ViewHandle<V> {
    pub(crate) fn new(cube: u64, index: usize) -> Self {
        Self {
            cube,
            index,
            _view: PhantomData,
        }
    }
}

impl<V> Clone for ViewHandle<V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for ViewHandle<V> {}

/// Object-safe view of a derived view, with downcasting.
pub(crate) trait ViewSlot<R> {
    fn view_name(&self) -> &str;
    fn refresh(&mut self, selected: &[&R]);
    fn as_any(&self) -> &dyn Any;
}

impl<R, V: DerivedView<R>> ViewSlot<R> for V {
    fn view_name(&self) -> &str {
        self.name()
    }

    fn refresh(&mut self, selected: &[&R]) {
        self.recompute(selected);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Count, mean and population standard deviation of a set of values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    /// Number of values.
    pub count: usize,
    /// Arithmetic mean; 0 when there are no values.
    pub mean: f64,
    /// Population standard deviation (denominator `count`); 0 when there
    /// are no values.
    pub std_dev: f64,
}

impl SummaryStats {
    /// Compute the statistics of `values`.
    ///
    /// ```
    /// use glucoscope_core::SummaryStats;
    ///
    /// let stats = SummaryStats::from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
    /// assert_eq!(stats.count, 8);
    /// assert_eq!(stats.mean, 5.0);
    /// assert_eq!(stats.std_dev, 2.0);
    ///
    /// assert_eq!(SummaryStats::from_values(&[]), SummaryStats::default());
    /// ```
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self {
            count: values.len(),
            mean,
            std_dev: variance.sqrt(),
        }
    }
}

/// Glucose samples of one meal group, ascending by minutes from the meal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveSeries {
    pub group_id: String,
    pub samples: Vec<CurveSample>,
}

/// Output of [`GlucoseResponseView`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlucoseResponse {
    /// Statistics of `delta_glucose` over the selected meals.
    pub stats: SummaryStats,
    /// One curve per distinct `group_id` among the selected meals.
    pub series: Vec<CurveSeries>,
}

/// Glucose curves and glucose-rise statistics of the selected meals.
#[derive(Debug, Clone)]
pub struct GlucoseResponseView {
    curves: Arc<CurveTable>,
    response: GlucoseResponse,
}

impl GlucoseResponseView {
    /// A view over `curves`; empty until first recomputed.
    pub fn new(curves: Arc<CurveTable>) -> Self {
        Self {
            curves,
            response: GlucoseResponse::default(),
        }
    }

    /// The latest output.
    pub fn response(&self) -> &GlucoseResponse {
        &self.response
    }
}

impl DerivedView<MealRecord> for GlucoseResponseView {
    fn name(&self) -> &str {
        "glucose_response"
    }

    fn recompute(&mut self, selected: &[&MealRecord]) {
        let deltas: Vec<f64> = selected.iter().map(|r| r.delta_glucose).collect();

        let mut ids: Vec<&str> = selected
            .iter()
            .filter_map(|r| r.group_id.as_deref())
            .collect();
        ids.sort_by(|a, b| group_id_order(a).cmp(&group_id_order(b)));
        ids.dedup();

        let series = ids
            .into_iter()
            .filter_map(|id| {
                let samples = self.curves.samples_for(id);
                (!samples.is_empty()).then(|| CurveSeries {
                    group_id: id.to_string(),
                    samples: samples.to_vec(),
                })
            })
            .collect();

        self.response = GlucoseResponse {
            stats: SummaryStats::from_values(&deltas),
            series,
        };
    }
}

/// Numeric ids in numeric order, then the rest lexicographically.
fn group_id_order(id: &str) -> (bool, i64, &str) {
    match id.parse::<i64>() {
        Ok(n) => (false, n, id),
        Err(_) => (true, 0, id),
    }
}

/// Summary statistics of one numeric field of the selected records.
pub struct StatsView<R> {
    name: String,
    field: Box<dyn Fn(&R) -> f64>,
    stats: SummaryStats,
}

impl<R> StatsView<R> {
    /// Statistics of the value returned by `field`.
    pub fn new(name: impl Into<String>, field: impl Fn(&R) -> f64 + 'static) -> Self {
        Self {
            name: name.into(),
            field: Box::new(field),
            stats: SummaryStats::default(),
        }
    }

    /// The latest statistics.
    pub fn stats(&self) -> SummaryStats {
        self.stats
    }
}

impl StatsView<MealRecord> {
    /// Statistics of a record measure.
    pub fn of(measure: Measure) -> Self {
        Self::new(measure.to_string(), move |r: &MealRecord| r.measure(measure))
    }
}

impl<R: 'static> DerivedView<R> for StatsView<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn recompute(&mut self, selected: &[&R]) {
        let values: Vec<f64> = selected.iter().map(|r| (self.field)(r)).collect();
        self.stats = SummaryStats::from_values(&values);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meal(delta: f64, group: Option<&str>) -> MealRecord {
        MealRecord {
            delta_glucose: delta,
            group_id: group.map(str::to_string),
            ..MealRecord::new("A")
        }
    }

    fn sample(group: &str, minutes: f64, glucose: f64) -> CurveSample {
        CurveSample {
            group_id: group.to_string(),
            minutes_from_meal: minutes,
            glucose,
        }
    }

    fn curves() -> Arc<CurveTable> {
        Arc::new(CurveTable::new(vec![
            sample("10", 15.0, 120.0),
            sample("10", 0.0, 100.0),
            sample("2", 0.0, 90.0),
            sample("x", 0.0, 80.0),
        ]))
    }

    #[test]
    fn test_group_id_order() {
        let mut ids = vec!["b", "10", "2", "a", "-1"];
        ids.sort_by(|a, b| group_id_order(a).cmp(&group_id_order(b)));
        assert_eq!(ids, vec!["-1", "2", "10", "a", "b"]);
    }

    #[test]
    fn test_summary_stats_population() {
        let stats = SummaryStats::from_values(&[40.0, 55.0]);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.mean, 47.5);
        assert_eq!(stats.std_dev, 7.5);

        let single = SummaryStats::from_values(&[3.0]);
        assert_eq!(single.std_dev, 0.0);
    }

    #[test]
    fn test_glucose_view_series_and_stats() {
        let meals = [
            meal(40.0, Some("10")),
            meal(55.0, Some("2")),
            meal(10.0, Some("10")),
            meal(5.0, Some("x")),
            meal(0.0, Some("no-curve")),
            meal(20.0, None),
        ];
        let selected: Vec<&MealRecord> = meals.iter().collect();

        let mut view = GlucoseResponseView::new(curves());
        view.recompute(&selected);

        let response = view.response();
        assert_eq!(response.stats.count, 6);
        assert_eq!(response.stats.mean, 130.0 / 6.0);

        let ids: Vec<&str> = response.series.iter().map(|s| s.group_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "10", "x"]);
        let minutes: Vec<f64> = response.series[1]
            .samples
            .iter()
            .map(|s| s.minutes_from_meal)
            .collect();
        assert_eq!(minutes, vec![0.0, 15.0]);
    }

    #[test]
    fn test_glucose_view_empty_selection() {
        let mut view = GlucoseResponseView::new(curves());
        view.recompute(&[]);
        let response = view.response();
        assert_eq!(response.stats, SummaryStats::default());
        assert!(response.series.is_empty());
        assert!(!response.stats.mean.is_nan());
    }

    #[test]
    fn test_stats_view() {
        let meals = [meal(10.0, None), meal(30.0, None)];
        let selected: Vec<&MealRecord> = meals.iter().collect();
        let mut view = StatsView::of(Measure::DeltaGlucose);
        view.recompute(&selected);
        assert_eq!(view.stats().mean, 20.0);
        assert_eq!(view.stats().std_dev, 10.0);
        assert_eq!(DerivedView::name(&view), "ΔGlucose");
    }

    #[test]
    fn test_response_serializes() {
        let mut view = GlucoseResponseView::new(curves());
        let meals = [meal(1.0, Some("2"))];
        view.recompute(&meals.iter().collect::<Vec<_>>());
        let json = serde_json::to_value(view.response()).unwrap();
        assert_eq!(json["stats"]["count"], 1);
        assert_eq!(json["series"][0]["group_id"], "2");
    }
}
