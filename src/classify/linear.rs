//! JSON linear-softmax scorer.
//!
//! The artifact holds a per-class weight vector over an `input_size ×
//! input_size` average-pooled thumbnail of the model input:
//!
//! ```json
//! {
//!   "input_size": 8,
//!   "classes": ["No_DR", "Mild_DR", "Moderate_DR", "Severe_DR"],
//!   "weights": [[...64 values...], ...],
//!   "bias": [0.0, 0.0, 0.0, 0.0]
//! }
//! ```
//!
//! Scores are `softmax(weights · pooled + bias)`, so they sum to one.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::Severity;
use super::scorer::{ModelInput, Scorer, ScorerError, ScorerLoader};

/// Parsed linear model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    /// Side length of the pooled thumbnail.
    pub input_size: usize,
    /// Class labels, in output order.
    pub classes: Vec<Severity>,
    /// One row of `input_size²` weights per class.
    pub weights: Vec<Vec<f32>>,
    /// One bias per class.
    pub bias: Vec<f32>,
}

impl LinearModel {
    /// Check that the dimensions agree with each other and with [`Severity`].
    pub fn validate(&self) -> Result<(), ScorerError> {
        if self.input_size == 0 {
            return Err(ScorerError::Load("input_size must be positive".to_string()));
        }
        let features = self
            .input_size
            .checked_mul(self.input_size)
            .ok_or_else(|| ScorerError::Load(format!("input_size {} is too large", self.input_size)))?;
        if self.classes != Severity::ALL {
            return Err(ScorerError::Load(format!(
                "classes must be {:?}, got {:?}",
                Severity::ALL.map(Severity::label),
                self.classes.iter().map(|c| c.label()).collect::<Vec<_>>()
            )));
        }
        if self.weights.len() != self.classes.len() || self.bias.len() != self.classes.len() {
            return Err(ScorerError::Load(format!(
                "expected {} weight rows and biases, got {} and {}",
                self.classes.len(),
                self.weights.len(),
                self.bias.len()
            )));
        }
        if let Some(row) = self.weights.iter().find(|row| row.len() != features) {
            return Err(ScorerError::Load(format!(
                "weight row has {} entries, expected {features}",
                row.len()
            )));
        }
        Ok(())
    }
}

/// Scorer backed by a [`LinearModel`].
#[derive(Debug, Clone)]
pub struct LinearScorer {
    model: LinearModel,
}

impl LinearScorer {
    pub fn new(model: LinearModel) -> Result<Self, ScorerError> {
        model.validate()?;
        Ok(Self { model })
    }

    #[must_use]
    pub fn model(&self) -> &LinearModel {
        &self.model
    }

    /// Average-pool the input onto the model grid.
    fn pool(&self, input: &ModelInput) -> Result<Vec<f32>, ScorerError> {
        let size = self.model.input_size;
        let samples = input.width.checked_mul(input.height);
        if input.width < size || input.height < size || samples != Some(input.data.len()) {
            return Err(ScorerError::Inference(format!(
                "input {}x{} ({} samples) cannot be pooled to {size}x{size}",
                input.width,
                input.height,
                input.data.len()
            )));
        }

        let mut sums = vec![0.0f32; size * size];
        let mut counts = vec![0u32; size * size];
        for y in 0..input.height {
            let cell_y = y * size / input.height;
            for x in 0..input.width {
                let cell = cell_y * size + x * size / input.width;
                sums[cell] += input.data[y * input.width + x];
                counts[cell] += 1;
            }
        }
        Ok(sums
            .iter()
            .zip(&counts)
            .map(|(&s, &c)| s / c as f32)
            .collect())
    }
}

impl Scorer for LinearScorer {
    fn score(&self, input: &ModelInput) -> Result<Vec<f32>, ScorerError> {
        let pooled = self.pool(input)?;
        let logits: Vec<f32> = self
            .model
            .weights
            .iter()
            .zip(&self.model.bias)
            .map(|(row, bias)| row.iter().zip(&pooled).map(|(w, x)| w * x).sum::<f32>() + bias)
            .collect();
        Ok(softmax(&logits))
    }
}

fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    exps.iter().map(|&e| e / total).collect()
}

/// Reads [`LinearModel`] JSON artifacts.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearScorerLoader;

impl ScorerLoader for LinearScorerLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn Scorer>, ScorerError> {
        let file = File::open(path).map_err(|e| ScorerError::Load(format!("{}: {e}", path.display())))?;
        let model: LinearModel = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| ScorerError::Load(format!("{}: {e}", path.display())))?;
        Ok(Arc::new(LinearScorer::new(model)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Model that favours `Severe_DR` for bright inputs and `No_DR` for dark ones.
    fn brightness_model() -> LinearModel {
        LinearModel {
            input_size: 2,
            classes: Severity::ALL.to_vec(),
            weights: vec![
                vec![-4.0; 4],
                vec![0.0; 4],
                vec![0.0; 4],
                vec![4.0; 4],
            ],
            bias: vec![2.0, 0.0, 0.0, -2.0],
        }
    }

    fn flat_input(value: f32) -> ModelInput {
        ModelInput {
            width: 8,
            height: 8,
            data: vec![value; 64],
        }
    }

    #[test]
    fn test_scores_sum_to_one() {
        let scorer = LinearScorer::new(brightness_model()).unwrap();
        let scores = scorer.score(&flat_input(0.3)).unwrap();
        assert_eq!(scores.len(), 4);
        assert!((scores.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_brightness_drives_class() {
        let scorer = LinearScorer::new(brightness_model()).unwrap();
        let argmax = |scores: Vec<f32>| {
            scores
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i)
                .unwrap()
        };
        assert_eq!(argmax(scorer.score(&flat_input(0.0)).unwrap()), 0);
        assert_eq!(argmax(scorer.score(&flat_input(1.0)).unwrap()), 3);
    }

    #[test]
    fn test_pooling_averages_cells() {
        let model = LinearModel {
            input_size: 2,
            classes: Severity::ALL.to_vec(),
            weights: vec![vec![0.0; 4]; 4],
            bias: vec![0.0; 4],
        };
        let scorer = LinearScorer::new(model).unwrap();
        // Left half 0, right half 1.
        let data = (0..16).map(|i| if i % 4 < 2 { 0.0 } else { 1.0 }).collect();
        let pooled = scorer
            .pool(&ModelInput {
                width: 4,
                height: 4,
                data,
            })
            .unwrap();
        assert_eq!(pooled, vec![0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_validation() {
        let mut model = brightness_model();
        model.weights[2].pop();
        assert!(matches!(LinearScorer::new(model), Err(ScorerError::Load(_))));

        let mut model = brightness_model();
        model.classes.truncate(3);
        assert!(matches!(LinearScorer::new(model), Err(ScorerError::Load(_))));
    }

    #[test]
    fn test_oversized_input_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.json");
        let json = format!(
            r#"{{"input_size": {}, "classes": ["No_DR", "Mild_DR", "Moderate_DR", "Severe_DR"],
                "weights": [[], [], [], []], "bias": [0.0, 0.0, 0.0, 0.0]}}"#,
            usize::MAX / 2
        );
        std::fs::write(&path, json).unwrap();
        assert!(matches!(LinearScorerLoader.load(&path), Err(ScorerError::Load(_))));

        let mut model = brightness_model();
        model.input_size = 0;
        assert!(matches!(LinearScorer::new(model), Err(ScorerError::Load(_))));
    }

    #[test]
    fn test_input_too_small() {
        let scorer = LinearScorer::new(brightness_model()).unwrap();
        let input = ModelInput {
            width: 1,
            height: 1,
            data: vec![0.5],
        };
        assert!(matches!(scorer.score(&input), Err(ScorerError::Inference(_))));
    }

    #[test]
    fn test_loader_reads_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, serde_json::to_string(&brightness_model()).unwrap()).unwrap();
        let scorer = LinearScorerLoader.load(&path).unwrap();
        assert_eq!(scorer.score(&flat_input(0.5)).unwrap().len(), 4);

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(LinearScorerLoader.load(&path), Err(ScorerError::Load(_))));
    }
}
