//! dr-screen CLI - fundus enhancement, filter comparison and grading

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dr_screen::{HybridVariant, Preprocessing};

mod commands;

/// Diabetic-retinopathy fundus screening tool.
#[derive(Parser)]
#[command(name = "dr-screen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every filter on an image, score and rank the outputs
    Filters {
        /// Fundus image (JPEG or PNG)
        image: PathBuf,

        /// Directory for filter outputs and reports
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Square working size; 0 keeps the original size
        #[arg(long, default_value_t = 512)]
        size: u32,

        /// Hybrid variants to include (repeatable)
        #[arg(long = "variant", value_name = "VARIANT")]
        variants: Vec<HybridVariant>,

        /// Skip writing filter images
        #[arg(long)]
        no_images: bool,

        /// Rank the unfiltered image as an "original" baseline row
        #[arg(long)]
        original: bool,
    },

    /// Apply a single filter or hybrid variant
    Apply {
        /// Input image
        image: PathBuf,

        /// Filter name (e.g. clahe, gabor) or hybrid variant (e.g. novel_ahref)
        #[arg(short, long)]
        filter: String,

        /// Output image
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Grade one or more fundus images
    Classify {
        /// Images to classify
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Model artifact (overrides DR_MODEL_PATH)
        #[arg(long)]
        model: Option<PathBuf>,

        /// JSON configuration file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Never load the model; use the heuristic only
        #[arg(long)]
        low_memory: bool,

        /// Preprocessing before the model (hybrid, direct)
        #[arg(long)]
        preprocess: Option<Preprocessing>,

        /// Print results as JSON lines
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Filters {
            image,
            output,
            size,
            variants,
            no_images,
            original,
        } => commands::filters::run(&image, output, size, variants, !no_images, original),
        Commands::Apply { image, filter, output } => commands::apply::run(&image, &filter, &output),
        Commands::Classify {
            images,
            model,
            config,
            low_memory,
            preprocess,
            json,
        } => commands::classify::run(
            &images,
            &commands::classify::Overrides {
                model,
                config,
                low_memory,
                preprocess,
            },
            json,
        ),
    }
}
