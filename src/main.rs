use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use wastesort::config::DetectorBackend;
use wastesort::pipeline::decode_image;
use wastesort::{annotate, Config, OutputOrder, Pipeline, PredictionResponse};

#[derive(Parser)]
#[command(name = "wastesort")]
#[command(about = "Locate waste objects in an image and classify their material")]
struct Cli {
    /// Path to input image file (JPEG or PNG)
    #[arg(value_name = "IMAGE")]
    image_path: PathBuf,

    /// TOML configuration file
    #[arg(long, env = "WASTESORT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Label map JSON (index -> category)
    #[arg(long, env = "WASTESORT_LABELS", value_name = "FILE")]
    labels: Option<PathBuf>,

    /// Detector backend
    #[arg(long, value_enum)]
    detector: Option<DetectorBackend>,

    /// Detector weights (.rten)
    #[arg(long, env = "WASTESORT_DETECTOR_MODEL", value_name = "FILE")]
    detector_model: Option<PathBuf>,

    /// Classifier weights (.rten)
    #[arg(long, env = "WASTESORT_CLASSIFIER_MODEL", value_name = "FILE")]
    classifier_model: Option<PathBuf>,

    /// Order of the reported predictions
    #[arg(long, value_enum)]
    order: Option<OutputOrder>,

    /// Write a copy of the image with predicted boxes drawn
    #[arg(long, value_name = "OUT")]
    annotate: Option<PathBuf>,

    /// Save classified crops to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Print JSON on a single line
    #[arg(long)]
    compact: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn resolve_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(labels) = &self.labels {
            config.labels = labels.clone();
        }
        if let Some(backend) = self.detector {
            config.detector.backend = backend;
        }
        if let Some(model) = &self.detector_model {
            config.detector.model = model.clone();
        }
        if let Some(model) = &self.classifier_model {
            config.classifier.model = model.clone();
        }
        if let Some(order) = self.order {
            config.pipeline.order = order;
        }

        Ok(config)
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "wastesort=debug" } else { "wastesort=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_tracing(args.verbose);

    // Startup: everything the pipeline needs is loaded before the image.
    let config = args.resolve_config()?;
    let mut pipeline = Pipeline::load(&config)?;
    if let Some(debug_dir) = args.debug_out.clone() {
        pipeline = pipeline.with_debug(debug_dir)?;
    }

    let predictions = pipeline.run(&args.image_path)?;

    if let Some(output) = &args.annotate {
        let image = decode_image(&args.image_path)?;
        annotate::save_annotated(&image, &predictions, output)?;
    }

    let response = PredictionResponse::from(&predictions);
    let json = if args.compact {
        serde_json::to_string(&response)
    } else {
        serde_json::to_string_pretty(&response)
    }
    .context("failed to serialize predictions")?;
    println!("{json}");

    Ok(())
}
