//! CSV and JSON dataset loaders.
//!
//! Both formats go through the same row models, so a column behaves the
//! same whether it came from `all_glu_food.csv` or `meal_daily.json`.
//!
//! # Example
//!
//! ```
//! use glucoscope_store::parse_meals_csv;
//!
//! let csv = "time_begin,total_carb,person\n2021-01-01 08:00:00,30,A\nbad,10,B\n";
//! let report = parse_meals_csv(csv.as_bytes(), b',')?;
//!
//! assert_eq!(report.rows.len(), 1);
//! assert_eq!(report.skipped.len(), 1);
//! # Ok::<(), glucoscope_store::Error>(())
//! ```

use std::io::Read;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use glucoscope_types::{CurveSample, MealRecord};

use crate::error::{Error, Result};
use crate::models::{CurveRow, LoadReport, MealRow, SkipReason};

/// On-disk dataset format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    /// Delimited text with a header row.
    Csv { delimiter: u8 },
    /// A JSON array of row objects.
    Json,
}

impl DataFormat {
    /// Pick a format from a file extension (`.csv`, `.tsv`, `.json`).
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("csv") => Ok(DataFormat::Csv { delimiter: b',' }),
            Some("tsv") => Ok(DataFormat::Csv { delimiter: b'\t' }),
            Some("json") => Ok(DataFormat::Json),
            _ => Err(Error::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Load meal records from a `.csv`, `.tsv` or `.json` file.
pub fn read_meals<P: AsRef<Path>>(path: P) -> Result<LoadReport<MealRecord>> {
    let path = path.as_ref();
    let report = read_with(path, parse_meals_csv, parse_meals_json)?;
    log_report("meal", path, &report);
    Ok(report)
}

/// Load glucose curve samples from a `.csv`, `.tsv` or `.json` file.
pub fn read_curves<P: AsRef<Path>>(path: P) -> Result<LoadReport<CurveSample>> {
    let path = path.as_ref();
    let report = read_with(path, parse_curves_csv, parse_curves_json)?;
    log_report("curve", path, &report);
    Ok(report)
}

/// Parse meal records from delimited text with a header row.
pub fn parse_meals_csv<R: Read>(reader: R, delimiter: u8) -> Result<LoadReport<MealRecord>> {
    parse_csv(reader, delimiter, MealRow::into_record)
}

/// Parse meal records from a JSON array of objects.
pub fn parse_meals_json(text: &str) -> Result<LoadReport<MealRecord>> {
    parse_json(text, MealRow::into_record)
}

/// Parse curve samples from delimited text with a header row.
pub fn parse_curves_csv<R: Read>(reader: R, delimiter: u8) -> Result<LoadReport<CurveSample>> {
    parse_csv(reader, delimiter, CurveRow::into_sample)
}

/// Parse curve samples from a JSON array of objects.
pub fn parse_curves_json(text: &str) -> Result<LoadReport<CurveSample>> {
    parse_json(text, CurveRow::into_sample)
}

fn read_with<T>(
    path: &Path,
    csv: impl FnOnce(std::fs::File, u8) -> Result<LoadReport<T>>,
    json: impl FnOnce(&str) -> Result<LoadReport<T>>,
) -> Result<LoadReport<T>> {
    let format = DataFormat::from_path(path)?;
    let io_error = |source| Error::Io {
        path: path.to_path_buf(),
        source,
    };

    debug!("Reading {:?} dataset from {}", format, path.display());
    match format {
        DataFormat::Csv { delimiter } => {
            let file = std::fs::File::open(path).map_err(io_error)?;
            csv(file, delimiter)
        }
        DataFormat::Json => {
            let text = std::fs::read_to_string(path).map_err(io_error)?;
            json(&text)
        }
    }
}

fn parse_csv<R, Row, T>(
    reader: R,
    delimiter: u8,
    convert: impl Fn(Row) -> std::result::Result<T, SkipReason>,
) -> Result<LoadReport<T>>
where
    R: Read,
    Row: DeserializeOwned,
{
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut report = LoadReport::default();
    for (index, row) in reader.deserialize::<Row>().enumerate() {
        let number = index + 1;
        match row {
            Ok(row) => report.accept(number, convert(row)),
            Err(e) if e.is_io_error() => return Err(Error::Csv(e)),
            Err(e) => report.skip(number, SkipReason::Malformed(e.to_string())),
        }
    }

    Ok(report)
}

fn parse_json<Row, T>(
    text: &str,
    convert: impl Fn(Row) -> std::result::Result<T, SkipReason>,
) -> Result<LoadReport<T>>
where
    Row: DeserializeOwned,
{
    let values: Vec<serde_json::Value> = serde_json::from_str(text)?;

    let mut report = LoadReport::default();
    for (index, value) in values.into_iter().enumerate() {
        let number = index + 1;
        match serde_json::from_value::<Row>(value) {
            Ok(row) => report.accept(number, convert(row)),
            Err(e) => report.skip(number, SkipReason::Malformed(e.to_string())),
        }
    }

    Ok(report)
}

fn log_report<T>(kind: &str, path: &Path, report: &LoadReport<T>) {
    info!(
        "Loaded {} {} rows from {}",
        report.rows.len(),
        kind,
        path.display()
    );
    if let Some(first) = report.skipped.first() {
        warn!(
            "Skipped {} {} rows in {} (first: row {}: {})",
            report.skipped.len(),
            kind,
            path.display(),
            first.row,
            first.reason
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEALS_CSV: &str = "\
time_begin,total_carb,protein,total_fat,sugar,dietary_fiber,calorie,grow_in_glu,person,group_id
2021-01-04 07:45:00,42,12,8,10,3,310,35,A,1
2021-01-04 12:30:00,,20,abc,5,1,550,-4,A,2
not-a-time,10,1,1,1,1,100,5,B,3
2021-01-05 19:00:00,60,25,15,12,4,700,48,B,
";

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            DataFormat::from_path(Path::new("a.csv")).unwrap(),
            DataFormat::Csv { delimiter: b',' }
        );
        assert_eq!(
            DataFormat::from_path(Path::new("a.TSV")).unwrap(),
            DataFormat::Csv { delimiter: b'\t' }
        );
        assert_eq!(
            DataFormat::from_path(Path::new("meal_daily.json")).unwrap(),
            DataFormat::Json
        );
        assert!(matches!(
            DataFormat::from_path(Path::new("data.xlsx")),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(DataFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_parse_meals_csv() {
        let report = parse_meals_csv(MEALS_CSV.as_bytes(), b',').unwrap();

        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].row, 3);

        let first = &report.rows[0];
        assert_eq!(first.person, "A");
        assert_eq!(first.minute_in_day, 465.0);
        assert_eq!(first.total_carb, 42.0);
        assert_eq!(first.fiber, 3.0);
        assert_eq!(first.group_id.as_deref(), Some("1"));

        // Blank and malformed numbers coerce to zero.
        let second = &report.rows[1];
        assert_eq!(second.total_carb, 0.0);
        assert_eq!(second.total_fat, 0.0);
        assert_eq!(second.delta_glucose, -4.0);

        assert!(report.rows[2].group_id.is_none());
    }

    #[test]
    fn test_parse_meals_csv_missing_columns() {
        let csv = "minute_in_day,subject_id\n90,S1\n";
        let report = parse_meals_csv(csv.as_bytes(), b',').unwrap();
        assert!(report.is_clean());
        assert_eq!(report.rows[0].person, "S1");
        assert_eq!(report.rows[0].calorie, 0.0);
    }

    #[test]
    fn test_parse_meals_tsv() {
        let tsv = "time_begin\ttotal_carb\tperson\n2021-01-01 10:00:00\t15\tC\n";
        let report = parse_meals_csv(tsv.as_bytes(), b'\t').unwrap();
        assert_eq!(report.rows[0].total_carb, 15.0);
        assert_eq!(report.rows[0].person, "C");
    }

    #[test]
    fn test_parse_meals_json() {
        let json = r#"[
            {"person": "A", "minute_in_day": 480, "total_carb": 12, "grow_in_glu": 40},
            {"person": "B", "time_begin": "yesterday", "total_carb": 5},
            "not an object",
            {"person": "C", "time_begin": "2021-02-01 18:00:00", "total_carb": "7.5"}
        ]"#;

        let report = parse_meals_json(json).unwrap();
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.skipped[0].row, 2);
        assert_eq!(report.skipped[1].row, 3);
        assert_eq!(report.rows[1].total_carb, 7.5);
        assert_eq!(report.rows[1].minute_in_day, 1080.0);
    }

    #[test]
    fn test_parse_meals_json_not_an_array() {
        assert!(matches!(
            parse_meals_json(r#"{"person": "A"}"#),
            Err(Error::Json(_))
        ));
        assert!(parse_meals_json("[").is_err());
    }

    #[test]
    fn test_parse_curves_csv() {
        let csv = "group_id,min_from_meal,glu\n1,-15,95\n1,0,98\n,15,120\n2,30,abc\n";
        let report = parse_curves_csv(csv.as_bytes(), b',').unwrap();

        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.rows[2].group_id, "2");
        assert_eq!(report.rows[2].glucose, 0.0);
    }

    #[test]
    fn test_parse_curves_json() {
        let json = r#"[{"group_id": 7, "min_from_meal": 60, "glu": 140.5}]"#;
        let report = parse_curves_json(json).unwrap();
        assert_eq!(report.rows[0].group_id, "7");
        assert_eq!(report.rows[0].glucose, 140.5);
    }
}
