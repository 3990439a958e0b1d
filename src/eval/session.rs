//! Evaluation session with a registry of named filters.
//!
//! This module provides [`EvalSession`], the entry point for filter
//! comparison. Filters are registered as callbacks; the session applies all
//! of them to one reference image, scores each output against the
//! reference, ranks the results and writes images and reports.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::eval::report::{FilterReport, FilterResult, REPORT_COLUMNS};
use crate::filters::FilterKind;
use crate::metrics::QualityScore;
use crate::pipeline::{HybridFilter, HybridVariant};
use crate::raster::Image;

/// Working size used when none is configured.
pub const DEFAULT_WORKING_SIZE: u32 = 512;

/// Name of the unfiltered baseline entry.
pub const ORIGINAL_FILTER: &str = "original";

/// Filter callback type.
///
/// Takes the reference image and returns the filtered image, which must
/// have the same width and height.
pub type FilterFn = Box<dyn Fn(&Image) -> Image + Send + Sync>;

/// Configuration for an evaluation session.
#[derive(Debug, Clone)]
pub struct EvalConfig {
    /// Directory for filter outputs and reports.
    pub report_dir: PathBuf,

    /// Square size the reference is resized to before filtering
    /// (`None` keeps the original size).
    pub working_size: Option<u32>,

    /// Hybrid variants registered by [`EvalSession::with_standard_filters`].
    pub variants: Vec<HybridVariant>,

    /// Whether [`EvalSession::write_outputs`] stores filter images.
    pub write_images: bool,

    /// Rank the unfiltered image as an [`ORIGINAL_FILTER`] baseline row.
    pub include_original: bool,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            report_dir: PathBuf::from("results"),
            working_size: Some(DEFAULT_WORKING_SIZE),
            variants: vec![HybridVariant::default()],
            write_images: true,
            include_original: false,
        }
    }
}

impl EvalConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> EvalConfigBuilder {
        EvalConfigBuilder::default()
    }
}

/// Builder for [`EvalConfig`].
#[derive(Debug, Default)]
pub struct EvalConfigBuilder {
    report_dir: Option<PathBuf>,
    working_size: Option<Option<u32>>,
    variants: Option<Vec<HybridVariant>>,
    write_images: Option<bool>,
    include_original: Option<bool>,
}

impl EvalConfigBuilder {
    /// Set the output directory.
    #[must_use]
    pub fn report_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_dir = Some(path.into());
        self
    }

    /// Set the working size, or `None` to filter at the original size.
    /// `Some(0)` is treated as `None`.
    #[must_use]
    pub fn working_size(mut self, size: Option<u32>) -> Self {
        self.working_size = Some(size.filter(|&s| s > 0));
        self
    }

    /// Set the hybrid variants to include.
    #[must_use]
    pub fn variants(mut self, variants: Vec<HybridVariant>) -> Self {
        self.variants = Some(variants);
        self
    }

    /// Enable or disable writing filter images.
    #[must_use]
    pub fn write_images(mut self, enabled: bool) -> Self {
        self.write_images = Some(enabled);
        self
    }

    /// Include the unfiltered image as a baseline row.
    #[must_use]
    pub fn include_original(mut self, enabled: bool) -> Self {
        self.include_original = Some(enabled);
        self
    }

    /// Build the configuration, filling unset fields from the defaults.
    #[must_use]
    pub fn build(self) -> EvalConfig {
        let defaults = EvalConfig::default();
        EvalConfig {
            report_dir: self.report_dir.unwrap_or(defaults.report_dir),
            working_size: self.working_size.unwrap_or(defaults.working_size),
            variants: self.variants.unwrap_or(defaults.variants),
            write_images: self.write_images.unwrap_or(defaults.write_images),
            include_original: self.include_original.unwrap_or(defaults.include_original),
        }
    }
}

/// Registered filter entry.
struct FilterEntry {
    name: String,
    apply: FilterFn,
}

/// One evaluated image: the ranked report plus every filter output.
pub struct Evaluation {
    /// Ranked scores.
    pub report: FilterReport,

    /// Filter outputs in registration order.
    pub outputs: Vec<(String, Image)>,
}

/// Evaluation session for filter comparison.
///
/// # Example
///
/// ```rust,ignore
/// use dr_screen::{EvalConfig, EvalSession, Image};
///
/// let config = EvalConfig::builder().report_dir("./results").build();
/// let mut session = EvalSession::with_standard_filters(config);
///
/// session.add_filter("luma", Box::new(Image::to_luma));
///
/// let mut evaluation = session.evaluate_image("fundus", Image::open("fundus.jpg")?)?;
/// session.write_outputs(&mut evaluation)?;
/// println!("{}", evaluation.report.to_table());
/// ```
pub struct EvalSession {
    config: EvalConfig,
    filters: Vec<FilterEntry>,
}

impl EvalSession {
    /// Create a session with no filters registered.
    #[must_use]
    pub fn new(config: EvalConfig) -> Self {
        Self {
            config,
            filters: Vec::new(),
        }
    }

    /// Create a session with the whole filter bank followed by the
    /// configured hybrid variants, preceded by the [`ORIGINAL_FILTER`]
    /// baseline when `include_original` is set.
    #[must_use]
    pub fn with_standard_filters(config: EvalConfig) -> Self {
        let variants = config.variants.clone();
        let include_original = config.include_original;
        let mut session = Self::new(config);
        if include_original {
            session.add_filter(ORIGINAL_FILTER, Box::new(Image::clone));
        }
        for kind in FilterKind::ALL {
            session.add_filter(kind.name(), Box::new(move |image| kind.apply(image)));
        }
        for variant in variants {
            let hybrid = HybridFilter::new(variant);
            session.add_filter(hybrid.name(), Box::new(move |image| hybrid.apply(image)));
        }
        session
    }

    #[must_use]
    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Register a filter. A filter with the same name is replaced in place.
    pub fn add_filter(&mut self, name: &str, apply: FilterFn) -> &mut Self {
        if let Some(entry) = self.filters.iter_mut().find(|e| e.name == name) {
            entry.apply = apply;
        } else {
            self.filters.push(FilterEntry {
                name: name.to_string(),
                apply,
            });
        }
        self
    }

    /// Get the number of registered filters.
    #[must_use]
    pub fn filter_count(&self) -> usize {
        self.filters.len()
    }

    /// Registered filter names in registration order.
    #[must_use]
    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|e| e.name.as_str()).collect()
    }

    /// Apply every filter to `image` in parallel.
    ///
    /// Outputs come back in registration order.
    #[must_use]
    pub fn apply_filters(&self, image: &Image) -> Vec<(String, Image)> {
        self.filters
            .par_iter()
            .map(|entry| {
                let start = Instant::now();
                let output = (entry.apply)(image);
                debug!(filter = %entry.name, elapsed_ms = start.elapsed().as_millis() as u64, "filter applied");
                (entry.name.clone(), output)
            })
            .collect()
    }

    /// Evaluate a single image across all registered filters.
    ///
    /// # Arguments
    ///
    /// * `name` - Image name or identifier, also used for report file names.
    /// * `image` - The reference image.
    ///
    /// # Returns
    ///
    /// An [`Evaluation`] whose report is ranked best-first. Scores compare
    /// the grayscale projections of the reference and of each output.
    pub fn evaluate_image(&self, name: &str, image: Image) -> Result<Evaluation> {
        let reference = match self.config.working_size {
            Some(size) if size > 0 => image.resize(size, size),
            _ => image,
        };
        let width = reference.width() as u32;
        let height = reference.height() as u32;
        let mut report = FilterReport::new(name.to_string(), width, height);

        let outputs = self.apply_filters(&reference);
        let reference_gray = reference.to_luma();

        for (filter, output) in &outputs {
            let score = QualityScore::compute(&reference_gray, &output.to_luma())?;
            report.results.push(FilterResult::new(filter.clone(), score));
        }
        report.rank();

        info!(
            image = name,
            filters = outputs.len(),
            best = report.best().map_or("-", |r| r.filter.as_str()),
            "evaluation complete"
        );
        Ok(Evaluation { report, outputs })
    }

    /// Decode `path` and evaluate it under its file stem.
    ///
    /// The report records `path` as its source.
    pub fn evaluate_file(&self, path: impl AsRef<Path>) -> Result<Evaluation> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .map_or_else(|| "image".to_string(), |s| s.to_string_lossy().into_owned());
        let mut evaluation = self.evaluate_image(&name, Image::open(path)?)?;
        evaluation.report.source_path = Some(path.to_path_buf());
        Ok(evaluation)
    }

    /// Write every filter output as `<filter>.png` into the report
    /// directory and record the paths in the report.
    pub fn write_outputs(&self, evaluation: &mut Evaluation) -> Result<()> {
        if !self.config.write_images {
            return Ok(());
        }
        std::fs::create_dir_all(&self.config.report_dir)?;

        for (filter, output) in &evaluation.outputs {
            let path = self.config.report_dir.join(format!("{filter}.png"));
            output.save(&path)?;
            if let Some(result) = evaluation.report.results.iter_mut().find(|r| &r.filter == filter) {
                result.output_path = Some(path);
            }
        }
        Ok(())
    }

    /// Write `<image>.json` and `<image>.csv` to the report directory.
    pub fn write_image_report(&self, report: &FilterReport) -> Result<()> {
        if report.name.is_empty() {
            return Err(Error::Report("report has no name".to_string()));
        }
        std::fs::create_dir_all(&self.config.report_dir)?;

        let json_path = self.config.report_dir.join(format!("{}.json", report.name));
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(json_path, json)?;

        let csv_path = self.config.report_dir.join(format!("{}.csv", report.name));
        write_csv_summary(report, &csv_path)?;

        Ok(())
    }
}

/// Write the ranked scores as CSV.
fn write_csv_summary(report: &FilterReport, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(REPORT_COLUMNS)?;
    for result in &report.results {
        wtr.write_record(result.csv_record())?;
    }
    wtr.flush()?;
    Ok(())
}
