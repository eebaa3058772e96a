//! Reducers: how a group folds records into per-bucket values.
//!
//! A reducer is three pure functions. `add` and `remove` take the current
//! accumulator by value and return the next one. `remove` must undo `add`,
//! because groups are maintained incrementally and never rebuilt after
//! construction. Float sums only undo up to rounding, so a group resets a
//! bucket to `initial` when its last member leaves.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use glucoscope_types::{MealRecord, Measure};

/// Incremental fold over records of type `R`.
pub trait Reducer<R>: 'static {
    /// Accumulator type.
    type Value: Clone + 'static;

    /// Value of a bucket with no members.
    fn initial(&self) -> Self::Value;

    /// Fold a record into the accumulator.
    fn add(&self, value: Self::Value, record: &R) -> Self::Value;

    /// Take a record back out of the accumulator.
    fn remove(&self, value: Self::Value, record: &R) -> Self::Value;
}

/// Counts members.
#[derive(Debug, Clone, Copy, Default)]
pub struct Count;

impl<R> Reducer<R> for Count {
    type Value = u64;

    fn initial(&self) -> u64 {
        0
    }

    fn add(&self, value: u64, _record: &R) -> u64 {
        value + 1
    }

    fn remove(&self, value: u64, _record: &R) -> u64 {
        debug_assert!(value > 0, "count removed below zero");
        value.saturating_sub(1)
    }
}

/// Sums one numeric field.
pub struct Sum<R> {
    field: Box<dyn Fn(&R) -> f64>,
}

impl<R> Sum<R> {
    /// Sum the value returned by `field`.
    pub fn new(field: impl Fn(&R) -> f64 + 'static) -> Self {
        Self {
            field: Box::new(field),
        }
    }
}

impl Sum<MealRecord> {
    /// Sum a record measure.
    pub fn of(measure: Measure) -> Self {
        Self::new(move |r: &MealRecord| r.measure(measure))
    }
}

impl<R: 'static> Reducer<R> for Sum<R> {
    type Value = f64;

    fn initial(&self) -> f64 {
        0.0
    }

    fn add(&self, value: f64, record: &R) -> f64 {
        value + (self.field)(record)
    }

    fn remove(&self, value: f64, record: &R) -> f64 {
        value - (self.field)(record)
    }
}

/// Reducer assembled from three closures.
///
/// ```
/// use glucoscope_core::{FnReducer, Reducer};
///
/// // Member count alongside a running total.
/// let reducer = FnReducer::new(
///     || (0u32, 0.0f64),
///     |(n, total): (u32, f64), v: &f64| (n + 1, total + v),
///     |(n, total): (u32, f64), v: &f64| (n - 1, total - v),
/// );
/// let value = reducer.add(reducer.initial(), &2.5);
/// assert_eq!(value, (1, 2.5));
/// assert_eq!(reducer.remove(value, &2.5), (0, 0.0));
/// ```
pub struct FnReducer<R, V, I, A, D> {
    initial: I,
    add: A,
    remove: D,
    _types: PhantomData<fn(&R) -> V>,
}

impl<R, V, I, A, D> FnReducer<R, V, I, A, D>
where
    I: Fn() -> V,
    A: Fn(V, &R) -> V,
    D: Fn(V, &R) -> V,
{
    /// Build a reducer from `initial`, `add` and `remove`.
    pub fn new(initial: I, add: A, remove: D) -> Self {
        Self {
            initial,
            add,
            remove,
            _types: PhantomData,
        }
    }
}

impl<R, V, I, A, D> Reducer<R> for FnReducer<R, V, I, A, D>
where
    R: 'static,
    V: Clone + 'static,
    I: Fn() -> V + 'static,
    A: Fn(V, &R) -> V + 'static,
    D: Fn(V, &R) -> V + 'static,
{
    type Value = V;

    fn initial(&self) -> V {
        (self.initial)()
    }

    fn add(&self, value: V, record: &R) -> V {
        (self.add)(value, record)
    }

    fn remove(&self, value: V, record: &R) -> V {
        (self.remove)(value, record)
    }
}

/// Sums several measures at once, keeping them in a fixed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasureSums {
    measures: Vec<Measure>,
}

impl MeasureSums {
    /// Sum the given measures.
    pub fn new(measures: impl IntoIterator<Item = Measure>) -> Self {
        Self {
            measures: measures.into_iter().collect(),
        }
    }

    /// Carbohydrate, fat and protein: the macronutrient split chart.
    pub fn macros() -> Self {
        Self::new([Measure::Carbohydrate, Measure::Fat, Measure::Protein])
    }

    /// Calories, carbohydrate, protein, fat and sugar: the nutrient panel.
    pub fn nutrients() -> Self {
        Self::new([
            Measure::Calorie,
            Measure::Carbohydrate,
            Measure::Protein,
            Measure::Fat,
            Measure::Sugar,
        ])
    }

    /// The summed measures.
    pub fn measures(&self) -> &[Measure] {
        &self.measures
    }
}

impl Reducer<MealRecord> for MeasureSums {
    type Value = MeasureTotals;

    fn initial(&self) -> MeasureTotals {
        MeasureTotals {
            entries: self.measures.iter().map(|&m| (m, 0.0)).collect(),
        }
    }

    fn add(&self, mut value: MeasureTotals, record: &MealRecord) -> MeasureTotals {
        for (measure, total) in &mut value.entries {
            *total += record.measure(*measure);
        }
        value
    }

    fn remove(&self, mut value: MeasureTotals, record: &MealRecord) -> MeasureTotals {
        for (measure, total) in &mut value.entries {
            *total -= record.measure(*measure);
        }
        value
    }
}

/// Named measure totals produced by [`MeasureSums`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasureTotals {
    entries: Vec<(Measure, f64)>,
}

impl MeasureTotals {
    /// Total for one measure, or 0 if it is not tracked.
    pub fn get(&self, measure: Measure) -> f64 {
        self.entries
            .iter()
            .find(|(m, _)| *m == measure)
            .map_or(0.0, |(_, v)| *v)
    }

    /// `(measure, total)` pairs in reducer order.
    pub fn entries(&self) -> &[(Measure, f64)] {
        &self.entries
    }

    /// Sum of every tracked total.
    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, v)| v).sum()
    }

    /// Each total as a fraction of [`total`](Self::total).
    ///
    /// A zero total gives a share of 0 for every measure.
    pub fn shares(&self) -> Vec<(Measure, f64)> {
        let values: Vec<f64> = self.entries.iter().map(|(_, v)| *v).collect();
        self.entries
            .iter()
            .map(|(m, _)| *m)
            .zip(shares(&values))
            .collect()
    }
}

/// Each value divided by the sum of all values; all zeros when the sum is 0.
///
/// ```
/// use glucoscope_core::reduce::shares;
///
/// assert_eq!(shares(&[1.0, 3.0]), vec![0.25, 0.75]);
/// assert_eq!(shares(&[0.0, 0.0]), vec![0.0, 0.0]);
/// ```
pub fn shares(values: &[f64]) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total == 0.0 || !total.is_finite() {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| v / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meal(carb: f64, fat: f64, protein: f64) -> MealRecord {
        MealRecord {
            total_carb: carb,
            total_fat: fat,
            protein,
            calorie: 10.0 * carb,
            ..MealRecord::new("A")
        }
    }

    #[test]
    fn test_count() {
        let r = meal(1.0, 1.0, 1.0);
        let v = Reducer::<MealRecord>::initial(&Count);
        let v = Count.add(v, &r);
        let v = Count.add(v, &r);
        assert_eq!(v, 2);
        assert_eq!(Count.remove(v, &r), 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "count removed below zero")]
    fn test_count_remove_without_add_panics() {
        let r = meal(1.0, 1.0, 1.0);
        Count.remove(0, &r);
    }

    #[test]
    fn test_sum_of_measure() {
        let sum = Sum::of(Measure::Carbohydrate);
        let a = meal(12.0, 0.0, 0.0);
        let b = meal(22.0, 0.0, 0.0);
        let v = sum.add(sum.add(sum.initial(), &a), &b);
        assert_eq!(v, 34.0);
        assert_eq!(sum.remove(v, &a), 22.0);
    }

    #[test]
    fn test_measure_sums_macros() {
        let reducer = MeasureSums::macros();
        let mut totals = reducer.initial();
        totals = reducer.add(totals, &meal(12.0, 3.0, 5.0));
        totals = reducer.add(totals, &meal(22.0, 6.0, 8.0));

        assert_eq!(totals.get(Measure::Carbohydrate), 34.0);
        assert_eq!(totals.get(Measure::Fat), 9.0);
        assert_eq!(totals.get(Measure::Protein), 13.0);
        assert_eq!(totals.get(Measure::Sugar), 0.0);
        assert_eq!(totals.total(), 56.0);

        let totals = reducer.remove(totals, &meal(22.0, 6.0, 8.0));
        assert_eq!(totals.get(Measure::Carbohydrate), 12.0);
    }

    #[test]
    fn test_measure_sums_nutrients_order() {
        let reducer = MeasureSums::nutrients();
        let totals = reducer.add(reducer.initial(), &meal(10.0, 2.0, 3.0));
        let measures: Vec<Measure> = totals.entries().iter().map(|(m, _)| *m).collect();
        assert_eq!(measures, reducer.measures());
        assert_eq!(totals.get(Measure::Calorie), 100.0);
    }

    #[test]
    fn test_shares_sum_to_one() {
        let reducer = MeasureSums::macros();
        let totals = reducer.add(reducer.initial(), &meal(2.0, 1.0, 1.0));
        let shares = totals.shares();
        assert_eq!(shares[0], (Measure::Carbohydrate, 0.5));
        let sum: f64 = shares.iter().map(|(_, s)| s).sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_total_shares_are_zero() {
        let totals = MeasureSums::macros().initial();
        assert!(totals.shares().iter().all(|(_, s)| *s == 0.0));
        assert!(shares(&[]).is_empty());
    }

    #[test]
    fn test_fn_reducer() {
        let reducer = FnReducer::new(
            Vec::new,
            |mut names: Vec<String>, r: &MealRecord| {
                names.push(r.person.clone());
                names
            },
            |mut names: Vec<String>, r: &MealRecord| {
                if let Some(pos) = names.iter().position(|n| *n == r.person) {
                    names.remove(pos);
                }
                names
            },
        );
        let a = MealRecord::new("A");
        let b = MealRecord::new("B");
        let v = reducer.add(reducer.add(reducer.initial(), &a), &b);
        assert_eq!(v, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(reducer.remove(v, &a), vec!["B".to_string()]);
    }
}
