//! Severity classification of fundus images.
//!
//! [`Classifier`] prefers a learned [`Scorer`] and falls back to an
//! intensity-statistics heuristic whenever the scorer is disabled, missing,
//! failed to load or fails at inference time. It never returns an error:
//! unreadable images come back as the `Unknown` sentinel with confidence
//! 0.0.
//!
//! ```rust,ignore
//! use dr_screen::classify::classify;
//!
//! let result = classify("fundus.jpg");
//! println!("{} ({:.2}, {})", result.label(), result.confidence, result.provenance);
//! ```

pub mod dispatcher;
pub mod heuristic;
pub mod linear;
pub mod scorer;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

pub use dispatcher::{Classifier, MODEL_INPUT_SIZE, Preprocessing, classify};
pub use heuristic::{IntensityStats, classify_heuristic, intensity_stats};
pub use linear::{LinearModel, LinearScorer, LinearScorerLoader};
pub use scorer::{
    ModelInput, Scorer, ScorerError, ScorerHandle, ScorerLoader, ScorerStatus,
};

/// Label used when an image cannot be read at all.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Diabetic-retinopathy severity grades, in scorer output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "No_DR")]
    NoDr,
    #[serde(rename = "Mild_DR")]
    MildDr,
    #[serde(rename = "Moderate_DR")]
    ModerateDr,
    #[serde(rename = "Severe_DR")]
    SevereDr,
}

impl Severity {
    /// Every class, indexed like scorer outputs.
    pub const ALL: [Self; 4] = [Self::NoDr, Self::MildDr, Self::ModerateDr, Self::SevereDr];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::NoDr => "No_DR",
            Self::MildDr => "Mild_DR",
            Self::ModerateDr => "Moderate_DR",
            Self::SevereDr => "Severe_DR",
        }
    }

    /// Class for a scorer output index.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|sev| sev.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::Config(format!("unknown severity label: {s}")))
    }
}

/// Where a classification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Argmax of the learned scorer.
    Model,
    /// Intensity-statistics approximation.
    Heuristic,
    /// The image could not be decoded.
    Unreadable,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Model => "model",
            Self::Heuristic => "heuristic",
            Self::Unreadable => "unreadable",
        })
    }
}

/// Outcome of one classification call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Severity, or `None` for the `Unknown` sentinel.
    #[serde(rename = "label", with = "label_serde")]
    pub severity: Option<Severity>,

    /// Confidence in [0, 1].
    pub confidence: f32,

    pub provenance: Provenance,
}

impl ClassificationResult {
    /// Build a result, clamping the confidence into [0, 1].
    #[must_use]
    pub fn new(severity: Severity, confidence: f32, provenance: Provenance) -> Self {
        let confidence = if confidence.is_nan() { 0.0 } else { confidence.clamp(0.0, 1.0) };
        Self {
            severity: Some(severity),
            confidence,
            provenance,
        }
    }

    /// The `Unknown / 0.0` sentinel for unreadable images.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            severity: None,
            confidence: 0.0,
            provenance: Provenance::Unreadable,
        }
    }

    /// Severity label, or `"Unknown"`.
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.severity.map_or(UNKNOWN_LABEL, Severity::label)
    }
}

mod label_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    use super::{Severity, UNKNOWN_LABEL};

    pub fn serialize<S>(severity: &Option<Severity>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(severity.map_or(UNKNOWN_LABEL, Severity::label))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Severity>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s == UNKNOWN_LABEL {
            return Ok(None);
        }
        s.parse().map(Some).map_err(serde::de::Error::custom)
    }
}
