//! Single filter command.

use std::path::Path;

use anyhow::{Context, Result, bail};
use dr_screen::{FilterKind, HybridFilter, HybridVariant, Image};

pub fn run(image_path: &Path, filter: &str, output: &Path) -> Result<()> {
    let image = Image::open(image_path)
        .with_context(|| format!("Failed to read image {}", image_path.display()))?;

    let filtered = if let Ok(kind) = filter.parse::<FilterKind>() {
        kind.apply(&image)
    } else if let Ok(variant) = filter.parse::<HybridVariant>() {
        HybridFilter::new(variant).apply(&image)
    } else {
        let known: Vec<&str> = FilterKind::ALL
            .iter()
            .map(|k| k.name())
            .chain(HybridVariant::ALL.iter().map(|v| v.name()))
            .collect();
        bail!("Unknown filter '{}'. Known filters: {}", filter, known.join(", "));
    };

    filtered
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "{} -> {} ({}x{}, {} channel{})",
        filter,
        output.display(),
        filtered.width(),
        filtered.height(),
        filtered.channels(),
        if filtered.channels() == 1 { "" } else { "s" }
    );

    Ok(())
}
