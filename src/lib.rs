//! # dr-screen
//!
//! Diabetic-retinopathy fundus screening: image enhancement filters, a
//! filter comparison harness, and severity classification.
//!
//! The learned model is a pluggable [`Scorer`] loaded lazily through a
//! [`ScorerHandle`]; whenever it is unavailable the classifier falls back
//! to an intensity-statistics heuristic, so classification always returns
//! a result.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dr_screen::{EvalConfig, EvalSession, Image, classify};
//!
//! // Compare every enhancement filter on one fundus photograph.
//! let config = EvalConfig::builder().report_dir("./results").build();
//! let session = EvalSession::with_standard_filters(config);
//! let mut evaluation = session.evaluate_image("fundus", Image::open("fundus.jpg")?)?;
//! session.write_outputs(&mut evaluation)?;
//! session.write_image_report(&evaluation.report)?;
//! println!("{}", evaluation.report.to_table());
//!
//! // Grade it.
//! let result = classify("fundus.jpg");
//! println!("{} {:.2}", result.label(), result.confidence);
//! ```
//!
//! ## Modules
//!
//! - [`error`]: Error types for the library
//! - [`raster`]: 8-bit image container and file I/O
//! - [`colorspace`]: sRGB ↔ L\*a\*b\* conversion
//! - [`filters`]: The filter bank (smoothing, edges, texture, CLAHE)
//! - [`pipeline`]: Hybrid enhancement filter and its variants
//! - [`metrics`]: MSE, PSNR, entropy and SSIM
//! - [`eval`]: Filter evaluation session and reports
//! - [`classify`]: Severity classification with scorer fallback
//! - [`config`]: Classifier configuration

pub mod classify;
pub mod colorspace;
pub mod config;
pub mod error;
pub mod eval;
pub mod filters;
pub mod metrics;
pub mod pipeline;
pub mod raster;

// Re-export commonly used types
pub use classify::{
    ClassificationResult, Classifier, Preprocessing, Provenance, Scorer, ScorerError,
    ScorerHandle, ScorerLoader, Severity, classify,
};
pub use config::ScreenConfig;
pub use error::{Error, Result};
pub use eval::{
    report::{FilterReport, FilterResult},
    session::{EvalConfig, EvalSession, Evaluation},
};
pub use filters::FilterKind;
pub use metrics::QualityScore;
pub use pipeline::{HybridFilter, HybridVariant};
pub use raster::Image;
