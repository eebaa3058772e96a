//! Error types for glucoscope-core.
//!
//! Filter and query operations on a cube fail only when handed a handle the
//! cube does not recognize: one created by another cube, or one whose key or
//! value type does not match the stored object. Loading and configuration
//! errors from the layers below are wrapped so dashboard construction has a
//! single error type.

use thiserror::Error;

use crate::config::ConfigError;

/// Result type for glucoscope-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the cube and the dashboard preset.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Every exclusion bit is taken.
    #[error("Cannot add dimension '{name}': a cube holds at most {max} dimensions")]
    DimensionLimit {
        /// Name of the rejected dimension.
        name: String,
        /// The per-cube limit.
        max: usize,
    },

    /// A dimension handle does not belong to this cube.
    #[error("Unknown dimension: {0}")]
    UnknownDimension(String),

    /// A group handle does not belong to this cube.
    #[error("Unknown group: {0}")]
    UnknownGroup(String),

    /// A view handle does not belong to this cube.
    #[error("Unknown view: {0}")]
    UnknownView(String),

    /// Loading the dataset failed.
    #[error(transparent)]
    Store(#[from] glucoscope_store::Error),

    /// Loading or validating the configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
