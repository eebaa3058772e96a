//! Dataset loading and in-memory tables for glucoscope.
//!
//! This crate turns the dashboard's source files into immutable tables:
//! a [`RecordStore`] of meals and a [`CurveTable`] of glucose samples.
//!
//! # Features
//!
//! - CSV, TSV and JSON loaders sharing one set of row models
//! - Lenient numeric coercion (absent or malformed numbers read as zero)
//! - Row-level recovery: rows with bad timestamps are skipped and reported
//! - Curve samples indexed by meal group and sorted for line rendering
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use glucoscope_store::Dataset;
//!
//! let dataset = Dataset::load(
//!     Path::new("all_glu_food.csv"),
//!     Some(Path::new("glucose_curves.csv")),
//! )?;
//! println!("{} meals, {} rows skipped", dataset.records.len(), dataset.skipped_records.len());
//! # Ok::<(), glucoscope_store::Error>(())
//! ```

mod error;
mod load;
mod models;
mod store;

pub use error::{Error, Result};
pub use load::{
    DataFormat, parse_curves_csv, parse_curves_json, parse_meals_csv, parse_meals_json,
    read_curves, read_meals,
};
pub use models::{LoadReport, SkipReason, SkippedRow};
pub use store::{CurveTable, Dataset, RecordStore};
