//! Classifier configuration.
//!
//! [`ScreenConfig`] can be built in code, read from a JSON file and
//! overridden from the environment:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `DR_MODEL_PATH` | model artifact path |
//! | `LOW_RAM_MODE` | `true`/`1`/`yes` keeps the scorer unloaded |

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classify::{MODEL_INPUT_SIZE, Preprocessing};
use crate::error::{Error, Result};
use crate::pipeline::HybridVariant;

/// Default model artifact location, relative to the working directory.
pub const DEFAULT_MODEL_PATH: &str = "models/dr_classifier.json";

/// Environment variable overriding [`ScreenConfig::model_path`].
pub const ENV_MODEL_PATH: &str = "DR_MODEL_PATH";

/// Environment variable enabling [`ScreenConfig::low_memory`].
pub const ENV_LOW_MEMORY: &str = "LOW_RAM_MODE";

/// Settings for the classification dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    /// Scorer artifact.
    pub model_path: PathBuf,

    /// Never load the scorer; always use the heuristic.
    pub low_memory: bool,

    /// How images are prepared for the scorer.
    pub preprocessing: Preprocessing,

    /// Hybrid variant used by [`Preprocessing::Hybrid`].
    pub hybrid: HybridVariant,

    /// Side length of the square scorer input.
    pub model_input_size: usize,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            low_memory: false,
            preprocessing: Preprocessing::default(),
            hybrid: HybridVariant::default(),
            model_input_size: MODEL_INPUT_SIZE,
        }
    }
}

impl ScreenConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> ScreenConfigBuilder {
        ScreenConfigBuilder::default()
    }

    /// Defaults with environment overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_from(|key| std::env::var(key).ok());
        config
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(ENV_MODEL_PATH).filter(|p| !p.trim().is_empty()) {
            self.model_path = PathBuf::from(path.trim());
        }
        if let Some(flag) = lookup(ENV_LOW_MEMORY) {
            self.low_memory = parse_flag(&flag);
        }
    }

    /// Read a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the classifier cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.model_input_size == 0 {
            return Err(Error::Config("model_input_size must be positive".to_string()));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Builder for [`ScreenConfig`].
#[derive(Debug, Default)]
pub struct ScreenConfigBuilder {
    model_path: Option<PathBuf>,
    low_memory: Option<bool>,
    preprocessing: Option<Preprocessing>,
    hybrid: Option<HybridVariant>,
    model_input_size: Option<usize>,
}

impl ScreenConfigBuilder {
    /// Set the model artifact path.
    #[must_use]
    pub fn model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    /// Enable or disable low-memory mode.
    #[must_use]
    pub fn low_memory(mut self, enabled: bool) -> Self {
        self.low_memory = Some(enabled);
        self
    }

    /// Set the preprocessing path.
    #[must_use]
    pub fn preprocessing(mut self, preprocessing: Preprocessing) -> Self {
        self.preprocessing = Some(preprocessing);
        self
    }

    /// Set the hybrid variant.
    #[must_use]
    pub fn hybrid(mut self, variant: HybridVariant) -> Self {
        self.hybrid = Some(variant);
        self
    }

    /// Set the scorer input size.
    #[must_use]
    pub fn model_input_size(mut self, size: usize) -> Self {
        self.model_input_size = Some(size);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> ScreenConfig {
        let defaults = ScreenConfig::default();
        ScreenConfig {
            model_path: self.model_path.unwrap_or(defaults.model_path),
            low_memory: self.low_memory.unwrap_or(defaults.low_memory),
            preprocessing: self.preprocessing.unwrap_or(defaults.preprocessing),
            hybrid: self.hybrid.unwrap_or(defaults.hybrid),
            model_input_size: self.model_input_size.unwrap_or(defaults.model_input_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ScreenConfig::default();
        assert_eq!(config.model_path, PathBuf::from(DEFAULT_MODEL_PATH));
        assert!(!config.low_memory);
        assert_eq!(config.preprocessing, Preprocessing::Hybrid);
        assert_eq!(config.hybrid, HybridVariant::GaussianClaheSobel);
        assert_eq!(config.model_input_size, 224);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ScreenConfig::default();
        config.apply_env_from(env(&[("DR_MODEL_PATH", "/opt/model.json"), ("LOW_RAM_MODE", "True")]));
        assert_eq!(config.model_path, PathBuf::from("/opt/model.json"));
        assert!(config.low_memory);

        let mut config = ScreenConfig::builder().low_memory(true).build();
        config.apply_env_from(env(&[("LOW_RAM_MODE", "0"), ("DR_MODEL_PATH", "  ")]));
        assert!(!config.low_memory);
        assert_eq!(config.model_path, PathBuf::from(DEFAULT_MODEL_PATH));
    }

    #[test]
    fn test_builder() {
        let config = ScreenConfig::builder()
            .model_path("m.json")
            .preprocessing(Preprocessing::Direct)
            .hybrid(HybridVariant::MedianClaheSobel)
            .model_input_size(64)
            .build();
        assert_eq!(config.model_path, PathBuf::from("m.json"));
        assert_eq!(config.preprocessing, Preprocessing::Direct);
        assert_eq!(config.hybrid, HybridVariant::MedianClaheSobel);
        assert_eq!(config.model_input_size, 64);
    }

    #[test]
    fn test_load_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("screen.json");
        std::fs::write(&path, r#"{"low_memory": true, "hybrid": "median-clahe-gabor"}"#).unwrap();

        let config = ScreenConfig::load(&path).unwrap();
        assert!(config.low_memory);
        assert_eq!(config.hybrid, HybridVariant::MedianClaheGabor);
        assert_eq!(config.model_input_size, MODEL_INPUT_SIZE);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ScreenConfig::load(dir.path().join("missing.json")),
            Err(Error::Config(_))
        ));

        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"model_input_size": 0}"#).unwrap();
        assert!(matches!(ScreenConfig::load(&path), Err(Error::Config(_))));

        std::fs::write(&path, r#"{"hybrid": "sharpen"}"#).unwrap();
        assert!(matches!(ScreenConfig::load(&path), Err(Error::Config(_))));
    }
}
