//! Model-first classification with heuristic fallback.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::heuristic::classify_heuristic;
use super::scorer::{ModelInput, Scorer, ScorerError, ScorerHandle, guarded};
use super::{ClassificationResult, Provenance, Severity};
use crate::config::ScreenConfig;
use crate::error::Error;
use crate::pipeline::HybridFilter;
use crate::raster::Image;

/// Default side length of the square scorer input.
pub const MODEL_INPUT_SIZE: usize = 224;

/// How an image is turned into a [`ModelInput`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preprocessing {
    /// Hybrid enhancement filter, then resize and normalize.
    #[default]
    Hybrid,
    /// Grayscale resize and normalize only.
    Direct,
}

impl fmt::Display for Preprocessing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Hybrid => "hybrid",
            Self::Direct => "direct",
        })
    }
}

impl FromStr for Preprocessing {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hybrid" => Ok(Self::Hybrid),
            "direct" => Ok(Self::Direct),
            other => Err(Error::Config(format!("unknown preprocessing: {other}"))),
        }
    }
}

/// Where a single classification call currently stands.
enum DispatchState {
    NotAttempted,
    ScorerAvailable(Arc<dyn Scorer>),
    ScorerUnavailable,
    Resolved(ClassificationResult),
}

impl DispatchState {
    fn name(&self) -> &'static str {
        match self {
            Self::NotAttempted => "not_attempted",
            Self::ScorerAvailable(_) => "scorer_available",
            Self::ScorerUnavailable => "scorer_unavailable",
            Self::Resolved(_) => "resolved",
        }
    }
}

/// Severity classifier.
///
/// Cheap to share across threads; the scorer behind the handle is loaded
/// once no matter how many threads call [`Classifier::classify`].
#[derive(Debug, Clone)]
pub struct Classifier {
    preprocessing: Preprocessing,
    hybrid: HybridFilter,
    input_size: usize,
    handle: Arc<ScorerHandle>,
}

impl Classifier {
    /// Classifier with its own scorer handle built from `config`.
    #[must_use]
    pub fn new(config: &ScreenConfig) -> Self {
        Self::with_handle(config, Arc::new(ScorerHandle::from_config(config)))
    }

    /// Classifier using an existing (possibly shared) handle. The handle
    /// decides model path and low-memory mode.
    #[must_use]
    pub fn with_handle(config: &ScreenConfig, handle: Arc<ScorerHandle>) -> Self {
        Self {
            preprocessing: config.preprocessing,
            hybrid: HybridFilter::new(config.hybrid),
            input_size: config.model_input_size.max(1),
            handle,
        }
    }

    /// Environment-configured classifier on the process-wide handle.
    #[must_use]
    pub fn shared() -> Self {
        Self::with_handle(&ScreenConfig::from_env(), ScorerHandle::global())
    }

    #[must_use]
    pub fn handle(&self) -> &Arc<ScorerHandle> {
        &self.handle
    }

    /// Classify an image file.
    ///
    /// Never fails: an unreadable image yields the `Unknown / 0.0` sentinel.
    pub fn classify(&self, path: impl AsRef<Path>) -> ClassificationResult {
        let path = path.as_ref();
        match Image::open(path) {
            Ok(image) => self.classify_image(&image),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot read image");
                ClassificationResult::unknown()
            }
        }
    }

    /// Classify a decoded image.
    pub fn classify_image(&self, image: &Image) -> ClassificationResult {
        let mut state = DispatchState::NotAttempted;
        loop {
            let next = match state {
                DispatchState::NotAttempted => match self.handle.get_or_load() {
                    Some(scorer) => DispatchState::ScorerAvailable(scorer),
                    None => DispatchState::ScorerUnavailable,
                },
                DispatchState::ScorerAvailable(scorer) => match self.score(scorer.as_ref(), image) {
                    Ok(result) => DispatchState::Resolved(result),
                    Err(err) => {
                        warn!(error = %err, "scorer failed, falling back to heuristic");
                        DispatchState::ScorerUnavailable
                    }
                },
                DispatchState::ScorerUnavailable => DispatchState::Resolved(classify_heuristic(image)),
                DispatchState::Resolved(result) => {
                    debug!(
                        label = result.label(),
                        confidence = f64::from(result.confidence),
                        provenance = %result.provenance,
                        "classified"
                    );
                    return result;
                }
            };
            debug!(state = next.name(), "dispatch transition");
            state = next;
        }
    }

    fn score(&self, scorer: &dyn Scorer, image: &Image) -> Result<ClassificationResult, ScorerError> {
        let input = self.preprocess(image);
        let scores = guarded(|| scorer.score(&input))?;
        let (severity, confidence) = resolve_scores(&scores)?;
        Ok(ClassificationResult::new(severity, confidence, Provenance::Model))
    }

    /// Build the scorer input for `image`.
    #[must_use]
    pub fn preprocess(&self, image: &Image) -> ModelInput {
        let prepared = match self.preprocessing {
            Preprocessing::Hybrid => self.hybrid.apply(image),
            Preprocessing::Direct => image.to_luma(),
        };
        let size = self.input_size as u32;
        let resized = prepared.resize(size, size).into_luma();
        ModelInput {
            width: resized.width(),
            height: resized.height(),
            data: resized.samples().iter().map(|&v| f32::from(v) / 255.0).collect(),
        }
    }
}

/// Argmax over per-class scores.
fn resolve_scores(scores: &[f32]) -> Result<(Severity, f32), ScorerError> {
    if scores.len() != Severity::ALL.len() {
        return Err(ScorerError::OutputShape {
            expected: Severity::ALL.len(),
            actual: scores.len(),
        });
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(ScorerError::NonFinite);
    }

    let (index, &best) = scores
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1).then_with(|| b.0.cmp(&a.0)))
        .ok_or(ScorerError::OutputShape {
            expected: Severity::ALL.len(),
            actual: 0,
        })?;
    let severity = Severity::from_index(index).ok_or(ScorerError::OutputShape {
        expected: Severity::ALL.len(),
        actual: scores.len(),
    })?;
    Ok((severity, best))
}

/// Classify an image file with the process-wide classifier.
///
/// The scorer is configured from the environment (`DR_MODEL_PATH`,
/// `LOW_RAM_MODE`) and loaded at most once per process.
pub fn classify(path: impl AsRef<Path>) -> ClassificationResult {
    Classifier::shared().classify(path)
}
