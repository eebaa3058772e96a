//! Core types for meal and glucose-curve data.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{Date, PrimitiveDateTime};

use crate::error::{ParseError, ParseResult};

/// A numeric attribute of a [`MealRecord`].
///
/// Dimensions, reducers and configuration refer to record fields through
/// this enum rather than through ad hoc closures, so one binning policy and
/// one set of reducers covers every chart.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new measures
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[non_exhaustive]
pub enum Measure {
    /// Total carbohydrate in grams.
    Carbohydrate,
    /// Protein in grams.
    Protein,
    /// Total fat in grams.
    Fat,
    /// Sugar in grams.
    Sugar,
    /// Dietary fiber in grams.
    Fiber,
    /// Energy in kcal.
    Calorie,
    /// Glucose rise after the meal in mg/dL (signed).
    DeltaGlucose,
    /// Minutes since midnight at the start of the meal.
    MinuteOfDay,
    /// Decimal hours since midnight at the start of the meal.
    HourOfDay,
}

impl Measure {
    /// Every measure, in display order.
    pub const ALL: [Measure; 9] = [
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

    /// The histogram bin width used when no configuration overrides it.
    ///
    /// ```
    /// use glucoscope_types::Measure;
    ///
    /// assert_eq!(Measure::Carbohydrate.default_bin_width(), 10.0);
    /// assert_eq!(Measure::Fiber.default_bin_width(), 2.0);
    /// assert_eq!(Measure::Calorie.default_bin_width(), 100.0);
    /// ```
    #[must_use]
    pub fn default_bin_width(&self) -> f64 {
        match self {
            Measure::Carbohydrate => 10.0,
            Measure::Protein | Measure::Fat | Measure::Sugar => 5.0,
            Measure::Fiber => 2.0,
            Measure::Calorie => 100.0,
            Measure::DeltaGlucose => 10.0,
            Measure::MinuteOfDay => 60.0,
            Measure::HourOfDay => 1.0,
        }
    }

    /// Unit label for axis titles.
    #[must_use]
    pub fn unit(&self) -> &'static str {
        match self {
            Measure::Carbohydrate
            | Measure::Protein
            | Measure::Fat
            | Measure::Sugar
            | Measure::Fiber => "g",
            Measure::Calorie => "kcal",
            Measure::DeltaGlucose => "mg/dL",
            Measure::MinuteOfDay => "min",
            Measure::HourOfDay => "h",
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measure::Carbohydrate => write!(f, "Carbohydrate"),
            Measure::Protein => write!(f, "Protein"),
            Measure::Fat => write!(f, "Fat"),
            Measure::Sugar => write!(f, "Sugar"),
            Measure::Fiber => write!(f, "Fiber"),
            Measure::Calorie => write!(f, "Calories"),
            Measure::DeltaGlucose => write!(f, "ΔGlucose"),
            Measure::MinuteOfDay => write!(f, "Minute of day"),
            Measure::HourOfDay => write!(f, "Hour of day"),
        }
    }
}

/// One meal event with its nutrients and glucose response.
///
/// Records are built once at load time and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MealRecord {
    /// Subject identifier.
    pub person: String,
    /// Meal start, when the source carried a timestamp.
    pub time_begin: Option<PrimitiveDateTime>,
    /// Calendar day of the meal.
    pub date: Option<Date>,
    /// Minutes since midnight at the start of the meal.
    pub minute_in_day: f64,
    /// Total carbohydrate in grams.
    pub total_carb: f64,
    /// Protein in grams.
    pub protein: f64,
    /// Total fat in grams.
    pub total_fat: f64,
    /// Sugar in grams.
    pub sugar: f64,
    /// Dietary fiber in grams.
    pub fiber: f64,
    /// Energy in kcal.
    pub calorie: f64,
    /// Glucose rise after the meal in mg/dL.
    pub delta_glucose: f64,
    /// Link to the meal's glucose curve samples.
    pub group_id: Option<String>,
    /// Food category label.
    pub food_class: Option<String>,
}

impl MealRecord {
    /// Create a record for `person` with every numeric field at zero.
    pub fn new(person: impl Into<String>) -> Self {
        Self {
            person: person.into(),
            ..Default::default()
        }
    }

    /// Decimal hours since midnight.
    #[must_use]
    pub fn time_of_day_hours(&self) -> f64 {
        self.minute_in_day / 60.0
    }

    /// Read a numeric attribute.
    ///
    /// ```
    /// use glucoscope_types::{MealRecord, Measure};
    ///
    /// let mut record = MealRecord::new("A");
    /// record.total_carb = 12.0;
    /// record.minute_in_day = 90.0;
    ///
    /// assert_eq!(record.measure(Measure::Carbohydrate), 12.0);
    /// assert_eq!(record.measure(Measure::HourOfDay), 1.5);
    /// ```
    #[must_use]
    pub fn measure(&self, measure: Measure) -> f64 {
        match measure {
            Measure::Carbohydrate => self.total_carb,
            Measure::Protein => self.protein,
            Measure::Fat => self.total_fat,
            Measure::Sugar => self.sugar,
            Measure::Fiber => self.fiber,
            Measure::Calorie => self.calorie,
            Measure::DeltaGlucose => self.delta_glucose,
            Measure::MinuteOfDay => self.minute_in_day,
            Measure::HourOfDay => self.time_of_day_hours(),
        }
    }
}

/// One point of a post-meal glucose curve.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CurveSample {
    /// The meal group this sample belongs to.
    pub group_id: String,
    /// Minutes relative to the meal start (negative before the meal).
    pub minutes_from_meal: f64,
    /// Glucose reading in mg/dL.
    pub glucose: f64,
}

/// Parse a meal timestamp in `YYYY-MM-DD HH:MM:SS` form.
///
/// Surrounding whitespace is ignored.
///
/// ```
/// use glucoscope_types::parse_timestamp;
///
/// let ts = parse_timestamp("2021-03-04 07:30:00").unwrap();
/// assert_eq!(ts.hour(), 7);
/// assert!(parse_timestamp("2021-03-04T07:30:00").is_err());
/// ```
pub fn parse_timestamp(value: &str) -> ParseResult<PrimitiveDateTime> {
    let trimmed = value.trim();
    PrimitiveDateTime::parse(
        trimmed,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    )
    .map_err(|_| ParseError::InvalidTimestamp(trimmed.to_string()))
}

/// Parse a calendar date in `YYYY-MM-DD` form.
pub fn parse_date(value: &str) -> ParseResult<Date> {
    let trimmed = value.trim();
    Date::parse(trimmed, format_description!("[year]-[month]-[day]"))
        .map_err(|_| ParseError::InvalidDate(trimmed.to_string()))
}

/// Minutes since midnight for a timestamp, with seconds as a fraction.
#[must_use]
pub fn minute_of_day(timestamp: &PrimitiveDateTime) -> f64 {
    f64::from(timestamp.hour()) * 60.0
        + f64::from(timestamp.minute())
        + f64::from(timestamp.second()) / 60.0
}
