//! ctxai CLI for CT lung scan classification and Grad-CAM explanation.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ctxai_engine::{
    DevicePreference, EngineConfig, ExplainOptions, InferenceEngine,
};

#[derive(Parser)]
#[command(name = "ctxai")]
#[command(author, version)]
#[command(about = "Classify CT lung scans and render Grad-CAM heatmaps")]
#[command(long_about = "ctxai: CT lung scan classification with gradient-based explanations.

EXAMPLES:
  # Classify a scan
  ctxai predict --checkpoint checkpoints/ct_classifier.mpk --image scan.png

  # Render a Grad-CAM heatmap for the predicted class
  ctxai explain --checkpoint checkpoints/ct_classifier.mpk --image scan.png

  # Explain a specific class against a specific layer
  ctxai explain --checkpoint checkpoints/ct_classifier.mpk --image scan.png \\
      --target-layer layer3 --target-class 2 --output cam_class2.png

AVAILABLE LAYERS:
  stem, layer1, layer2, layer3, layer4 (default: layer4, the last stage)")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify a scan image
    Predict {
        /// Path to the trained checkpoint
        #[arg(long, value_name = "PATH")]
        checkpoint: PathBuf,

        /// Path to the scan image (PNG or JPEG)
        #[arg(long, value_name = "PATH")]
        image: PathBuf,

        /// Number of diagnostic classes
        #[arg(long, default_value = "4", value_name = "N")]
        classes: usize,

        /// Square input size scans are resized to
        #[arg(long, default_value = "224", value_name = "PX")]
        img_size: usize,

        /// Force CPU even when an accelerator backend is compiled in
        #[arg(long, default_value = "false")]
        cpu: bool,
    },
    /// Classify a scan and render a Grad-CAM heatmap overlay
    Explain {
        /// Path to the trained checkpoint
        #[arg(long, value_name = "PATH")]
        checkpoint: PathBuf,

        /// Path to the scan image (PNG or JPEG)
        #[arg(long, value_name = "PATH")]
        image: PathBuf,

        /// Number of diagnostic classes
        #[arg(long, default_value = "4", value_name = "N")]
        classes: usize,

        /// Square input size scans are resized to
        #[arg(long, default_value = "224", value_name = "PX")]
        img_size: usize,

        /// Layer to instrument
        #[arg(long, default_value = "layer4", value_name = "LAYER")]
        target_layer: String,

        /// Class to explain (defaults to the predicted class)
        #[arg(long, value_name = "CLASS")]
        target_class: Option<usize>,

        /// Heatmap blend weight in [0, 1]
        #[arg(long, default_value = "0.4", value_name = "ALPHA")]
        alpha: f32,

        /// Where to write the heatmap overlay PNG
        #[arg(long, default_value = "cam_output.png", value_name = "PATH")]
        output: PathBuf,

        /// Force CPU even when an accelerator backend is compiled in
        #[arg(long, default_value = "false")]
        cpu: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Predict {
            checkpoint,
            image,
            classes,
            img_size,
            cpu,
        } => handle_predict(checkpoint, image, classes, img_size, cpu),
        Commands::Explain {
            checkpoint,
            image,
            classes,
            img_size,
            target_layer,
            target_class,
            alpha,
            output,
            cpu,
        } => handle_explain(
            checkpoint,
            image,
            classes,
            img_size,
            target_layer,
            target_class,
            alpha,
            output,
            cpu,
        ),
    }
}

fn engine_config(
    checkpoint: PathBuf,
    classes: usize,
    img_size: usize,
    cpu: bool,
) -> EngineConfig {
    let mut config = EngineConfig::new(checkpoint);
    config.model.num_classes = classes;
    config.image_size = img_size;
    if cpu {
        config.device = DevicePreference::Cpu;
    }
    config
}

fn handle_predict(
    checkpoint: PathBuf,
    image: PathBuf,
    classes: usize,
    img_size: usize,
    cpu: bool,
) -> Result<()> {
    let config = engine_config(checkpoint, classes, img_size, cpu);
    let engine = InferenceEngine::initialize(&config)
        .with_context(|| "failed to initialize inference engine")?;

    let bytes = std::fs::read(&image)
        .with_context(|| format!("failed to read image {}", image.display()))?;
    let prediction = engine.predict_bytes(&bytes)?;

    println!("{}", serde_json::to_string_pretty(&prediction)?);
    Ok(())
}

fn handle_explain(
    checkpoint: PathBuf,
    image: PathBuf,
    classes: usize,
    img_size: usize,
    target_layer: String,
    target_class: Option<usize>,
    alpha: f32,
    output: PathBuf,
    cpu: bool,
) -> Result<()> {
    let config = engine_config(checkpoint, classes, img_size, cpu);
    let engine = InferenceEngine::initialize(&config)
        .with_context(|| "failed to initialize inference engine")?;

    let bytes = std::fs::read(&image)
        .with_context(|| format!("failed to read image {}", image.display()))?;
    let explanation = engine.explain_bytes(
        &bytes,
        ExplainOptions {
            target_layer: Some(&target_layer),
            target_class,
            alpha: Some(alpha),
        },
    )?;

    std::fs::write(&output, &explanation.heatmap_png)
        .with_context(|| format!("failed to write heatmap {}", output.display()))?;

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "predicted_class": explanation.class_index,
            "probabilities": explanation.probabilities,
            "heatmap": output,
        }))?
    );
    Ok(())
}
