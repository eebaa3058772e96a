//! Source row models and their conversion into records.
//!
//! The same row structs back both the CSV and JSON loaders. Numeric cells
//! are read leniently: numbers, numeric strings, blanks, `null` and garbage
//! are all accepted, and anything that is not a finite number becomes zero.

use std::fmt;

use serde::de::{self, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};

use glucoscope_types::{
    CurveSample, MealRecord, ParseError, minute_of_day, parse_date, parse_timestamp,
};

/// Why a source row was left out of the dataset.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    /// `time_begin` was present but unparseable.
    #[error(transparent)]
    InvalidTimestamp(#[from] ParseError),
    /// Neither `time_begin` nor `minute_in_day` was usable.
    #[error("row has no time_begin or minute_in_day")]
    MissingTime,
    /// A curve sample without a `group_id`.
    #[error("curve sample has no group_id")]
    MissingGroupId,
    /// The row could not be decoded at all (wrong shape).
    #[error("malformed row: {0}")]
    Malformed(String),
}

/// A source row that was skipped during load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    /// 1-based data row number (the CSV header is not counted).
    pub row: usize,
    /// Human-readable reason.
    pub reason: String,
}

/// Rows accepted by a loader plus the rows it had to skip.
#[derive(Debug, Clone)]
pub struct LoadReport<T> {
    /// Successfully converted rows, in source order.
    pub rows: Vec<T>,
    /// Rows that were left out, in source order.
    pub skipped: Vec<SkippedRow>,
}

impl<T> Default for LoadReport<T> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

impl<T> LoadReport<T> {
    /// True when no row was skipped.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    pub(crate) fn accept(&mut self, row: usize, converted: Result<T, SkipReason>) {
        match converted {
            Ok(value) => self.rows.push(value),
            Err(reason) => self.skip(row, reason),
        }
    }

    pub(crate) fn skip(&mut self, row: usize, reason: SkipReason) {
        self.skipped.push(SkippedRow {
            row,
            reason: reason.to_string(),
        });
    }
}

/// One meal row as it appears in the source file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct MealRow {
    #[serde(deserialize_with = "lenient_opt_string")]
    time_begin: Option<String>,
    #[serde(deserialize_with = "lenient_f64")]
    total_carb: f64,
    #[serde(deserialize_with = "lenient_f64")]
    protein: f64,
    #[serde(deserialize_with = "lenient_f64")]
    total_fat: f64,
    #[serde(deserialize_with = "lenient_f64")]
    sugar: f64,
    #[serde(deserialize_with = "lenient_f64")]
    dietary_fiber: f64,
    #[serde(deserialize_with = "lenient_f64")]
    calorie: f64,
    #[serde(deserialize_with = "lenient_f64")]
    grow_in_glu: f64,
    #[serde(alias = "subject_id", deserialize_with = "lenient_string")]
    person: String,
    #[serde(deserialize_with = "lenient_opt_string")]
    group_id: Option<String>,
    #[serde(deserialize_with = "lenient_opt_string")]
    date: Option<String>,
    #[serde(deserialize_with = "lenient_opt_f64")]
    minute_in_day: Option<f64>,
    #[serde(deserialize_with = "lenient_opt_string")]
    food_class: Option<String>,
}

impl MealRow {
    pub(crate) fn into_record(self) -> Result<MealRecord, SkipReason> {
        let time_begin = match self.time_begin.as_deref() {
            Some(text) => Some(parse_timestamp(text)?),
            None => None,
        };

        let minute_in_day = self
            .minute_in_day
            .or_else(|| time_begin.as_ref().map(minute_of_day))
            .ok_or(SkipReason::MissingTime)?;

        // A bad `date` column is not worth dropping the meal over.
        let date = self
            .date
            .as_deref()
            .and_then(|text| parse_date(text).ok())
            .or_else(|| time_begin.map(|ts| ts.date()));

        Ok(MealRecord {
            person: self.person,
            time_begin,
            date,
            minute_in_day,
            total_carb: self.total_carb,
            protein: self.protein,
            total_fat: self.total_fat,
            sugar: self.sugar,
            fiber: self.dietary_fiber,
            calorie: self.calorie,
            delta_glucose: self.grow_in_glu,
            group_id: self.group_id,
            food_class: self.food_class,
        })
    }
}

/// One glucose-curve row as it appears in the source file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct CurveRow {
    #[serde(deserialize_with = "lenient_opt_string")]
    group_id: Option<String>,
    #[serde(alias = "minutes_from_meal", deserialize_with = "lenient_f64")]
    min_from_meal: f64,
    #[serde(alias = "glucose", deserialize_with = "lenient_f64")]
    glu: f64,
}

impl CurveRow {
    pub(crate) fn into_sample(self) -> Result<CurveSample, SkipReason> {
        let group_id = self.group_id.ok_or(SkipReason::MissingGroupId)?;
        Ok(CurveSample {
            group_id,
            minutes_from_meal: self.min_from_meal,
            glucose: self.glu,
        })
    }
}

// --- Lenient cell deserializers ---

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(lenient_opt_f64(deserializer)?.unwrap_or(0.0))
}

fn lenient_opt_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    deserializer.deserialize_any(NumberCell)
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    deserializer.deserialize_any(TextCell)
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Drain a nested JSON array or object and report it as "no value".
fn skip_seq<'de, A: SeqAccess<'de>, T>(mut seq: A) -> Result<Option<T>, A::Error> {
    while seq.next_element::<IgnoredAny>()?.is_some() {}
    Ok(None)
}

fn skip_map<'de, A: MapAccess<'de>, T>(mut map: A) -> Result<Option<T>, A::Error> {
    while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
    Ok(None)
}

struct NumberCell;

impl<'de> Visitor<'de> for NumberCell {
    type Value = Option<f64>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number or numeric text")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(finite(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Ok(v.trim().parse::<f64>().ok().and_then(finite))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<Self::Value, A::Error> {
        skip_seq(seq)
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
        skip_map(map)
    }
}

struct TextCell;

impl<'de> Visitor<'de> for TextCell {
    type Value = Option<String>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("text or a number")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        // JSON exports often write integral ids as 12.0
        if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
            Ok(Some(format!("{}", v as i64)))
        } else {
            Ok(Some(v.to_string()))
        }
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        let trimmed = v.trim();
        Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Self::Value, D::Error> {
        deserializer.deserialize_any(self)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<Self::Value, A::Error> {
        skip_seq(seq)
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<Self::Value, A::Error> {
        skip_map(map)
    }
}
