//! Pixel MLP command-line tool.
//!
//! `train` fits a network to the intact pixels of an image and writes a snapshot;
//! `reconstruct` loads a snapshot and repaints the corrupt pixels.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use image::RgbImage;
use pixel_mlp::config::load_config;
use pixel_mlp::persist::load_any;
use pixel_mlp::pixels::{reconstruct, training_samples};
use pixel_mlp::{Blend, CorruptionMask, Format, NetworkConfig, Raster, TrainConfig};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

const CHANNELS: usize = 3;

#[derive(Parser)]
#[command(name = "pixel-mlp")]
#[command(about = "Train a pixel MLP and reconstruct corrupted images", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Train on the intact pixels of an image
    Train {
        /// Input image
        #[arg(short, long)]
        image: PathBuf,

        /// Parameter snapshot to write
        #[arg(short, long, default_value = "weights.bin")]
        weights: PathBuf,

        /// Number of passes over the pixels
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        epochs: u64,

        /// JSON network configuration
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Continue from the existing snapshot instead of a fresh network
        #[arg(long)]
        resume: bool,

        /// Write the headerless legacy format
        #[arg(long)]
        legacy: bool,

        /// First-channel value below which a pixel counts as corrupt
        #[arg(long, default_value_t = CorruptionMask::DEFAULT_THRESHOLD)]
        threshold: f32,
    },

    /// Repaint the corrupt pixels of an image
    Reconstruct {
        /// Input image
        #[arg(short, long)]
        image: PathBuf,

        /// Parameter snapshot to read
        #[arg(short, long, default_value = "weights.bin")]
        weights: PathBuf,

        /// Output image
        #[arg(short, long, default_value = "reconstructed_image.bmp")]
        output: PathBuf,

        /// JSON network configuration (needed for legacy snapshots)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Blend predictions with the neighbouring pixel, weighted by the fit error
        #[arg(long)]
        blend: bool,

        /// First-channel value below which a pixel counts as corrupt
        #[arg(long, default_value_t = CorruptionMask::DEFAULT_THRESHOLD)]
        threshold: f32,
    },
}

fn network_config(path: Option<&Path>) -> Result<NetworkConfig> {
    match path {
        Some(p) => load_config(p).with_context(|| format!("loading config {}", p.display())),
        None => Ok(NetworkConfig::default()),
    }
}

fn load_raster(path: &Path) -> Result<Raster> {
    let img = image::open(path)
        .with_context(|| format!("failed to load image {}", path.display()))?
        .to_rgb8();
    let raster = Raster::from_u8(
        img.width() as usize,
        img.height() as usize,
        CHANNELS,
        img.as_raw(),
    )?;
    Ok(raster)
}

fn save_raster(path: &Path, raster: &Raster) -> Result<()> {
    let img = RgbImage::from_raw(
        raster.width() as u32,
        raster.height() as u32,
        raster.to_u8(),
    )
    .context("raster does not fit an RGB image")?;
    img.save(path)
        .with_context(|| format!("failed to save image {}", path.display()))?;
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Train {
            image,
            weights,
            epochs,
            config,
            resume,
            legacy,
            threshold,
        } => {
            let cfg = network_config(config.as_deref())?;
            let mut mlp = if resume {
                load_any(&weights, &cfg)
                    .with_context(|| format!("resuming from {}", weights.display()))?
            } else {
                cfg.build()?
            };

            let raster = load_raster(&image)?;
            let samples = training_samples(&raster, CorruptionMask::Threshold(threshold));
            info!(
                pixels = raster.len(),
                samples = samples.len(),
                "loaded {}",
                image.display()
            );

            let report = mlp.train_with(
                &samples,
                TrainConfig {
                    epochs: epochs as usize,
                    ..TrainConfig::default()
                },
            )?;

            let format = if legacy { Format::Legacy } else { Format::Framed };
            mlp.save(&weights, format)?;
            info!(
                final_loss = report.final_loss,
                "training complete, weights saved as {}",
                weights.display()
            );
        }

        Commands::Reconstruct {
            image,
            weights,
            output,
            config,
            blend,
            threshold,
        } => {
            let cfg = network_config(config.as_deref())?;
            let mlp = load_any(&weights, &cfg)
                .with_context(|| format!("loading weights {}", weights.display()))?;

            let mut raster = load_raster(&image)?;
            let mask = CorruptionMask::Threshold(threshold);

            let blend = if blend {
                let fit = mlp.evaluate(&training_samples(&raster, mask))?;
                info!(fit_loss = fit, "blending enabled");
                Some(Blend::from_loss(fit))
            } else {
                None
            };

            let replaced = reconstruct(&mlp, &mut raster, mask, blend)?;
            save_raster(&output, &raster)?;
            info!(
                replaced,
                "reconstruction complete, saved as {}",
                output.display()
            );
        }
    }

    Ok(())
}
