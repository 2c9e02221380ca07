use crate::figure::SurfaceId;
use thiserror::Error;

/// Invalid configuration values. Raised when a configuration is built or
/// loaded, never from inside a resolution pass.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("max_iterations must be at least 1, got {0}")]
    NonPositiveIterations(i64),
    #[error("{field} must be a finite, non-negative number of pixels, got {value}")]
    InvalidPixels { field: &'static str, value: f64 },
    #[error("unknown movement policy `{0}` (expected `x`, `y` or `xy`)")]
    UnknownMovement(String),
    #[error("unknown theme `{0}` (expected `standard`, `light` or `dark`)")]
    UnknownTheme(String),
    #[error("connector alpha must be within 0..=1, got {0}")]
    InvalidAlpha(f64),
    #[error("environment variable {name} has an invalid value `{value}`")]
    InvalidEnv { name: String, value: String },
}

/// Errors raised while building a chart.
#[derive(Debug, Error, PartialEq)]
pub enum ChartError {
    #[error("unknown surface {0:?}")]
    UnknownSurface(SurfaceId),
    #[error("series `{name}` has {values} values for {categories} x positions")]
    LengthMismatch {
        name: String,
        values: usize,
        categories: usize,
    },
    #[error("invalid date `{0}` (expected YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)")]
    InvalidDate(String),
    #[error("unknown category `{0}`")]
    UnknownCategory(String),
    #[error("x value `{0}` does not match the x axis kind")]
    MismatchedX(String),
    #[error("chart has no series to plot")]
    Empty,
}
