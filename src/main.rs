use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use vegcover::{CoverageEstimator, ModelProvider};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input photograph
    #[arg(short, long)]
    image: PathBuf,

    /// Output path for the 0/255 vegetation mask
    #[arg(short, long)]
    fileout: PathBuf,

    /// Path to the pixel classifier (ONNX file)
    /// Conventional locations are tried after it
    #[arg(short, long, env = "VEGCOVER_MODEL_PATH")]
    model: Option<PathBuf>,

    /// Skip the trained model and use the green-dominance heuristic
    #[arg(long)]
    no_model: bool,

    /// Also write a green/yellow classification overlay
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let provider = if args.no_model {
        tracing::info!("Model disabled, using green-dominance heuristic");
        ModelProvider::disabled()
    } else {
        ModelProvider::new(args.model.clone())
    };
    let estimator = CoverageEstimator::new(Arc::new(provider));

    let start = Instant::now();
    let result = estimator
        .compute_coverage_with_overlay(&args.image, &args.fileout, args.overlay.as_deref())
        .context("Failed to compute coverage")?;
    tracing::debug!("Finished in {:.1}ms", start.elapsed().as_secs_f64() * 1000.0);

    println!("{}", result.ratio);

    Ok(())
}
