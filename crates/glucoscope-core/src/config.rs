//! Dashboard configuration.
//!
//! ```toml
//! [dataset]
//! records = "all_glu_food.csv"
//! curves = "glucose_curves.csv"
//!
//! [bins]
//! carbohydrate = 10.0
//! calorie = 100.0
//!
//! [view]
//! histogram_scope = "ignore_own_filter"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use glucoscope_types::Measure;

use crate::group::GroupScope;

/// Dashboard configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Dataset files.
    pub dataset: DatasetConfig,
    /// Histogram bin widths.
    pub bins: BinConfig,
    /// Chart behavior.
    pub view: ViewConfig,
}

impl DashboardConfig {
    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - The record file path is not empty
    /// - The curve file path, when given, is not empty
    /// - Every bin width is a positive finite number
    ///
    /// # Example
    ///
    /// ```
    /// use glucoscope_core::DashboardConfig;
    ///
    /// let config = DashboardConfig::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.dataset.validate());
        errors.extend(self.bins.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Dataset file locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Meal table (`.csv`, `.tsv` or `.json`).
    pub records: PathBuf,
    /// Glucose curve table, if any.
    pub curves: Option<PathBuf>,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            records: PathBuf::from("all_glu_food.csv"),
            curves: None,
        }
    }
}

impl DatasetConfig {
    /// Validate dataset configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.records.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "dataset.records".to_string(),
                message: "record file path cannot be empty".to_string(),
            });
        }

        if let Some(curves) = &self.curves
            && curves.as_os_str().is_empty()
        {
            errors.push(ValidationError {
                field: "dataset.curves".to_string(),
                message: "curve file path cannot be empty (omit it instead)".to_string(),
            });
        }

        errors
    }
}

/// Histogram bin width per measure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinConfig {
    pub carbohydrate: f64,
    pub protein: f64,
    pub fat: f64,
    pub sugar: f64,
    pub fiber: f64,
    pub calorie: f64,
    pub delta_glucose: f64,
    pub minute_of_day: f64,
    pub hour_of_day: f64,
}

impl Default for BinConfig {
    fn default() -> Self {
        Self {
            carbohydrate: Measure::Carbohydrate.default_bin_width(),
            protein: Measure::Protein.default_bin_width(),
            fat: Measure::Fat.default_bin_width(),
            sugar: Measure::Sugar.default_bin_width(),
            fiber: Measure::Fiber.default_bin_width(),
            calorie: Measure::Calorie.default_bin_width(),
            delta_glucose: Measure::DeltaGlucose.default_bin_width(),
            minute_of_day: Measure::MinuteOfDay.default_bin_width(),
            hour_of_day: Measure::HourOfDay.default_bin_width(),
        }
    }
}

impl BinConfig {
    /// Width for a measure; measures without a setting use their default.
    pub fn width(&self, measure: Measure) -> f64 {
        match measure {
            Measure::Carbohydrate => self.carbohydrate,
            Measure::Protein => self.protein,
            Measure::Fat => self.fat,
            Measure::Sugar => self.sugar,
            Measure::Fiber => self.fiber,
            Measure::Calorie => self.calorie,
            Measure::DeltaGlucose => self.delta_glucose,
            Measure::MinuteOfDay => self.minute_of_day,
            Measure::HourOfDay => self.hour_of_day,
            other => other.default_bin_width(),
        }
    }

    fn entries(&self) -> [(&'static str, f64); 9] {
        [
            ("carbohydrate", self.carbohydrate),
            ("protein", self.protein),
            ("fat", self.fat),
            ("sugar", self.sugar),
            ("fiber", self.fiber),
            ("calorie", self.calorie),
            ("delta_glucose", self.delta_glucose),
            ("minute_of_day", self.minute_of_day),
            ("hour_of_day", self.hour_of_day),
        ]
    }

    /// Validate bin widths.
    pub fn validate(&self) -> Vec<ValidationError> {
        self.entries()
            .into_iter()
            .filter(|(_, width)| !(width.is_finite() && *width > 0.0))
            .map(|(name, width)| ValidationError {
                field: format!("bins.{}", name),
                message: format!("bin width {} must be a positive number", width),
            })
            .collect()
    }
}

/// Chart behavior.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Subset the measure histograms aggregate.
    pub histogram_scope: GroupScope,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field path (e.g., `bins.calorie`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}
