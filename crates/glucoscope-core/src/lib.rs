//! Incremental cross-filtering engine for meal and glucose dashboards.
//!
//! This crate holds a fixed table of records in a [`Crossfilter`] cube and
//! keeps every chart's aggregate in step with the user's brushes. Changing one
//! dimension's filter only visits the records whose acceptance flipped, so a
//! drag across a histogram costs time proportional to what the drag touched,
//! not to the size of the table.
//!
//! # Features
//!
//! - **Dimensions**: any ordered key over a record, indexed once on creation
//! - **Filters**: exact value, half-open range, custom predicate, or all
//! - **Groups**: per-key reductions (count, sums, custom reducers) updated
//!   incrementally, scoped to the selection or ignoring their own filter
//! - **Derived views**: glucose curves and summary statistics re-derived
//!   from the selected subset after every change
//! - **Observers**: render callbacks notified once per gesture
//! - **Dashboard preset**: [`MealDashboard`] wires the standard meal charts
//!
//! # Quick Start
//!
//! ```
//! use glucoscope_core::{BinKey, Count, Crossfilter, Filter, GroupScope};
//!
//! let carbs = vec![12.0, 22.0, 5.0, 38.0];
//! let mut cube = Crossfilter::new(carbs);
//!
//! let carb = cube.add_dimension("carbohydrate", |c: &f64| BinKey::binned(*c, 10.0))?;
//! let histogram = cube.add_group(&carb, "carbohydrate", GroupScope::Selected, Count)?;
//! let total = cube.add_group_all("meals", Count);
//!
//! cube.set_filter(&carb, Filter::brush(10.0, 30.0))?;
//! assert_eq!(*cube.group(&total)?.value(), 2);
//! assert_eq!(*cube.group(&histogram)?.value_for(&BinKey::new(0.0)), 0);
//! # Ok::<(), glucoscope_core::Error>(())
//! ```

pub mod binning;
pub mod config;
pub mod crossfilter;
pub mod dashboard;
pub mod derived;
pub mod dimension;
pub mod error;
pub mod events;
pub mod filter;
pub mod group;
pub mod reduce;

// Re-export types
pub use glucoscope_types::types;

// Core exports
pub use crossfilter::{Crossfilter, MAX_DIMENSIONS};
pub use dashboard::{HISTOGRAM_MEASURES, MealDashboard};
pub use error::{Error, Result};

// Cube building blocks
pub use binning::{BinKey, PairKey, bin};
pub use config::{
    BinConfig, ConfigError, DashboardConfig, DatasetConfig, ValidationError, ViewConfig,
};
pub use derived::{
    CurveSeries, DerivedView, GlucoseResponse, GlucoseResponseView, StatsView, SummaryStats,
    ViewHandle,
};
pub use dimension::DimensionHandle;
pub use events::{CubeEvent, Observer, SubscriptionId, UpdateSummary};
pub use filter::{DimensionKey, Filter, FilterSummary};
pub use group::{Group, GroupHandle, GroupScope};
pub use reduce::{Count, FnReducer, MeasureSums, MeasureTotals, Reducer, Sum, shares};

// Re-export the data layer for convenience
pub use glucoscope_store::{CurveTable, Dataset, RecordStore};
pub use glucoscope_types::{CurveSample, MealRecord, Measure};
