//! Filter comparison command.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dr_screen::{EvalConfig, EvalSession, HybridVariant};
use tracing::info;

pub fn run(
    image_path: &Path,
    output: PathBuf,
    size: u32,
    variants: Vec<HybridVariant>,
    write_images: bool,
    include_original: bool,
) -> Result<()> {
    let mut config = EvalConfig::builder()
        .report_dir(&output)
        .working_size((size > 0).then_some(size))
        .write_images(write_images)
        .include_original(include_original);
    if !variants.is_empty() {
        config = config.variants(variants);
    }
    let session = EvalSession::with_standard_filters(config.build());

    info!(image = %image_path.display(), filters = session.filter_count(), "evaluating filters");

    let mut evaluation = session
        .evaluate_file(image_path)
        .with_context(|| format!("Failed to evaluate {}", image_path.display()))?;
    session
        .write_outputs(&mut evaluation)
        .with_context(|| format!("Failed to write filter outputs to {}", output.display()))?;
    session
        .write_image_report(&evaluation.report)
        .with_context(|| format!("Failed to write report to {}", output.display()))?;

    print!("{}", evaluation.report.to_table());
    if let Some(best) = evaluation.report.best() {
        println!();
        println!("Best filter: {} (PSNR {:.2} dB)", best.filter, best.score.psnr);
    }
    println!("Results saved to: {}", output.display());

    Ok(())
}
