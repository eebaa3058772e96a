//! Record types for glucoscope meal and glucose-response dashboards.
//!
//! This crate holds the plain data shared by the loader (glucoscope-store)
//! and the aggregation engine (glucoscope-core).
//!
//! # Features
//!
//! - [`MealRecord`]: one meal with nutrients and its glucose rise
//! - [`CurveSample`]: one point of a post-meal glucose curve
//! - [`Measure`]: the numeric record attributes, with default bin widths
//! - Timestamp and date parsing for the dataset's text formats
//!
//! # Example
//!
//! ```
//! use glucoscope_types::{MealRecord, Measure, parse_timestamp, minute_of_day};
//!
//! let ts = parse_timestamp("2021-06-01 12:15:00")?;
//! let mut record = MealRecord::new("subject-1");
//! record.minute_in_day = minute_of_day(&ts);
//! record.total_carb = 42.0;
//!
//! assert_eq!(record.measure(Measure::MinuteOfDay), 735.0);
//! # Ok::<(), glucoscope_types::ParseError>(())
//! ```

pub mod error;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{
    CurveSample, MealRecord, Measure, minute_of_day, parse_date, parse_timestamp,
};
