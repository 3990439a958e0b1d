//! Classification command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use dr_screen::{Classifier, Preprocessing, ScreenConfig};

/// Command-line settings layered over the environment and config file.
pub struct Overrides {
    pub model: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub low_memory: bool,
    pub preprocess: Option<Preprocessing>,
}

impl Overrides {
    /// File (or defaults), then environment, then flags.
    fn resolve(&self) -> Result<ScreenConfig> {
        let mut config = match &self.config {
            Some(path) => ScreenConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ScreenConfig::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok());
        if let Some(model) = &self.model {
            config.model_path.clone_from(model);
        }
        if self.low_memory {
            config.low_memory = true;
        }
        if let Some(preprocess) = self.preprocess {
            config.preprocessing = preprocess;
        }
        Ok(config)
    }
}

pub fn run(images: &[PathBuf], overrides: &Overrides, json: bool) -> Result<()> {
    let config = overrides.resolve()?;
    let classifier = Classifier::new(&config);

    for path in images {
        let result = classifier.classify(path);
        if json {
            let line = serde_json::json!({
                "image": path,
                "label": result.label(),
                "confidence": result.confidence,
                "provenance": result.provenance,
            });
            println!("{line}");
        } else {
            println!(
                "{}: {} (confidence {:.2}, {})",
                path.display(),
                result.label(),
                result.confidence,
                result.provenance
            );
        }
    }

    Ok(())
}
