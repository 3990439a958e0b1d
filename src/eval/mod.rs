//! Filter evaluation session and report generation.
//!
//! - [`session::EvalSession`]: filter registry, scoring and output writing
//! - [`session::EvalConfig`]: configuration for evaluation
//! - [`report`]: ranked report types

pub mod report;
pub mod session;

pub use report::{FilterReport, FilterResult, REPORT_COLUMNS};
pub use session::{EvalConfig, EvalConfigBuilder, EvalSession, Evaluation, FilterFn};
