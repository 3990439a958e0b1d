//! Error types for dr-screen operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for dr-screen operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Image shape as `(width, height, channels)`.
pub type Shape = (usize, usize, usize);

/// Errors that can occur while filtering, scoring or reporting.
///
/// Scorer failures are deliberately absent: they are reported through
/// [`crate::classify::ScorerError`] and never leave the classifier.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Image is missing, undecodable, or has no pixels.
    #[error("Invalid image: {path}: {reason}")]
    InvalidImage {
        /// Path of the offending image (empty for in-memory buffers).
        path: PathBuf,
        /// Reason for the failure.
        reason: String,
    },

    /// Reference and candidate images differ in size or channel count.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Reference shape (width, height, channels).
        expected: Shape,
        /// Candidate shape (width, height, channels).
        actual: Shape,
    },

    /// Failed to calculate a quality metric.
    #[error("Metric calculation failed: {metric}: {reason}")]
    MetricCalculation {
        /// Name of the metric that failed.
        metric: String,
        /// Reason for the failure.
        reason: String,
    },

    /// A filter or hybrid variant name did not match any known entry.
    #[error("Unknown filter: {0}")]
    UnknownFilter(String),

    /// Invalid configuration value or file.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error writing report files.
    #[error("Report error: {0}")]
    Report(String),

    /// Image encode error while writing filter outputs.
    #[error("Image encode error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error wrapper.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Build an [`Error::InvalidImage`] for an in-memory buffer or a path.
    pub(crate) fn invalid_image(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidImage {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
