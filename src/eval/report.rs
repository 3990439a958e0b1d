//! Report types for filter evaluation results.
//!
//! This module defines the data structures for evaluation reports that can be
//! serialized to JSON or CSV.

use std::cmp::Ordering;
use std::fmt::Write as _;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::metrics::QualityScore;

/// Column order of the tabular report.
pub const REPORT_COLUMNS: [&str; 5] = ["filter", "mse", "psnr", "entropy", "ssim"];

/// Scores for one filter output against the reference image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterResult {
    /// Filter name, unique within a report.
    pub filter: String,

    /// 1-based position after ranking (0 until [`FilterReport::rank`] runs).
    #[serde(default)]
    pub rank: usize,

    /// Quality scores against the reference.
    #[serde(flatten)]
    pub score: QualityScore,

    /// Where the filter output was written, if it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
}

impl FilterResult {
    /// Create an unranked result.
    #[must_use]
    pub fn new(filter: impl Into<String>, score: QualityScore) -> Self {
        Self {
            filter: filter.into(),
            rank: 0,
            score,
            output_path: None,
        }
    }

    /// CSV record in [`REPORT_COLUMNS`] order.
    #[must_use]
    pub fn csv_record(&self) -> [String; 5] {
        [
            self.filter.clone(),
            format!("{:.4}", self.score.mse),
            format!("{:.4}", self.score.psnr),
            format!("{:.4}", self.score.entropy),
            format!("{:.6}", self.score.ssim),
        ]
    }
}

/// Ranking order: PSNR, then entropy, then SSIM, all descending.
fn compare_results(a: &FilterResult, b: &FilterResult) -> Ordering {
    b.score
        .psnr
        .total_cmp(&a.score.psnr)
        .then_with(|| b.score.entropy.total_cmp(&a.score.entropy))
        .then_with(|| b.score.ssim.total_cmp(&a.score.ssim))
}

/// Report for a single image evaluated across every registered filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterReport {
    /// Image name or identifier.
    pub name: String,

    /// Path to the source image.
    pub source_path: Option<PathBuf>,

    /// Dimensions the filters ran at.
    pub width: u32,
    pub height: u32,

    /// Results for each filter.
    pub results: Vec<FilterResult>,

    /// When this report was generated.
    #[serde(with = "chrono_serde")]
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl FilterReport {
    /// Create an empty report.
    #[must_use]
    pub fn new(name: String, width: u32, height: u32) -> Self {
        Self {
            name,
            source_path: None,
            width,
            height,
            results: Vec::new(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Sort results best-first and number them.
    ///
    /// The sort is stable, so results that tie on every score keep their
    /// registration order.
    pub fn rank(&mut self) {
        self.results.sort_by(compare_results);
        for (i, result) in self.results.iter_mut().enumerate() {
            result.rank = i + 1;
        }
    }

    /// Filter names in current order.
    #[must_use]
    pub fn ranking(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.filter.as_str()).collect()
    }

    /// Highest-ranked result.
    #[must_use]
    pub fn best(&self) -> Option<&FilterResult> {
        self.results.iter().min_by(|a, b| compare_results(a, b))
    }

    /// Result for a named filter.
    #[must_use]
    pub fn get(&self, filter: &str) -> Option<&FilterResult> {
        self.results.iter().find(|r| r.filter == filter)
    }

    /// Fixed-width table for terminal output.
    #[must_use]
    pub fn to_table(&self) -> String {
        let name_width = self
            .results
            .iter()
            .map(|r| r.filter.len())
            .chain(std::iter::once("Filter".len()))
            .max()
            .unwrap_or(6);

        let mut out = String::new();
        let _ = writeln!(
            out,
            "{:>4}  {:<name_width$}  {:>10}  {:>8}  {:>8}  {:>8}",
            "#", "Filter", "MSE", "PSNR", "Entropy", "SSIM"
        );
        let _ = writeln!(out, "{}", "-".repeat(name_width + 48));
        for result in &self.results {
            let _ = writeln!(
                out,
                "{:>4}  {:<name_width$}  {:>10.2}  {:>8.2}  {:>8.4}  {:>8.4}",
                result.rank,
                result.filter,
                result.score.mse,
                result.score.psnr,
                result.score.entropy,
                result.score.ssim
            );
        }
        out
    }
}

mod chrono_serde {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        dt.to_rfc3339().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(filter: &str, psnr: f64, entropy: f64, ssim: f64) -> FilterResult {
        FilterResult::new(
            filter,
            QualityScore {
                mse: 1.0,
                psnr,
                entropy,
                ssim,
            },
        )
    }

    #[test]
    fn test_rank_order_and_tie_breaks() {
        let mut report = FilterReport::new("fundus".to_string(), 64, 64);
        report.results = vec![
            result("a", 30.0, 5.0, 0.5),
            result("b", 35.0, 4.0, 0.4),
            result("c", 30.0, 6.0, 0.1),
            result("d", 30.0, 6.0, 0.9),
            result("e", 30.0, 6.0, 0.9),
        ];
        report.rank();

        assert_eq!(report.ranking(), vec!["b", "d", "e", "c", "a"]);
        let ranks: Vec<usize> = report.results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
        assert_eq!(report.best().map(|r| r.filter.as_str()), Some("b"));
    }

    #[test]
    fn test_best_before_ranking() {
        let mut report = FilterReport::new("x".to_string(), 8, 8);
        report.results = vec![result("low", 10.0, 1.0, 0.1), result("high", 100.0, 1.0, 1.0)];
        assert_eq!(report.best().unwrap().filter, "high");
        assert!(report.get("low").is_some());
        assert!(report.get("missing").is_none());
    }

    #[test]
    fn test_json_flattens_scores() {
        let mut report = FilterReport::new("img".to_string(), 4, 4);
        report.results.push(result("mean", 31.5, 6.2, 0.8));
        report.rank();

        let value = serde_json::to_value(&report).unwrap();
        let row = &value["results"][0];
        assert_eq!(row["filter"], "mean");
        assert_eq!(row["rank"], 1);
        assert_eq!(row["psnr"], 31.5);
        assert!(row.get("output_path").is_none());

        let back: FilterReport = serde_json::from_value(value).unwrap();
        assert_eq!(back.results[0].score.entropy, 6.2);
        assert_eq!(back.timestamp.timestamp(), report.timestamp.timestamp());
    }

    #[test]
    fn test_table_lists_every_filter() {
        let mut report = FilterReport::new("img".to_string(), 4, 4);
        report.results.push(result("gaussian", 40.0, 6.0, 0.9));
        report.results.push(result("novel_ahref", 8.0, 3.0, 0.05));
        report.rank();

        let table = report.to_table();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].contains("PSNR"));
        assert!(lines[2].contains("gaussian"));
        assert!(lines[3].contains("novel_ahref"));
    }

    #[test]
    fn test_csv_record_order() {
        let record = result("sobel", 12.3456, 2.0, 0.25).csv_record();
        assert_eq!(record[0], "sobel");
        assert_eq!(record[2], "12.3456");
        assert_eq!(record[4], "0.250000");
    }
}
