use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use image_distill_wasm::{DistillOptions, KmeansOptions, distill_bytes};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Distill an image into blocks painted with its own dominant colours.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image to process
    input: PathBuf,

    /// Size of the square blocks in pixels (not the number of blocks)
    #[arg(short, long, default_value_t = 50)]
    block_size: u32,

    /// Number of dominant colours to extract
    #[arg(short = 'n', long = "max-dominant-colours", default_value_t = 8)]
    colors: usize,

    /// Output file, always written as PNG
    #[arg(short, long, default_value = "out.png")]
    output_path: PathBuf,

    /// Comma-separated list of hex colours to use as palette (skip extraction)
    #[arg(short = 'c', long)]
    palette: Option<String>,

    /// Seed for the k-means initialisation
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Also write the palette as JSON to this path
    #[arg(long)]
    palette_json: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "image_distill_wasm=info,distill_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let args = Args::parse();

    let palette_vec: Option<Vec<String>> = args
        .palette
        .as_ref()
        .map(|s| s.split(',').map(|x| x.trim().to_string()).collect());

    let options = DistillOptions {
        block_size: args.block_size,
        colors: args.colors,
        kmeans: KmeansOptions {
            seed: args.seed,
            ..KmeansOptions::default()
        },
    };

    let bytes = fs::read(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let (png, palette) = distill_bytes(&bytes, &options, palette_vec.as_deref())
        .with_context(|| format!("failed to distill {}", args.input.display()))?;

    if let Some(parent) = args.output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&args.output_path, png)
        .with_context(|| format!("failed to write {}", args.output_path.display()))?;
    tracing::info!(path = %args.output_path.display(), colors = palette.len(), "saved");

    if let Some(path) = &args.palette_json {
        let json = serde_json::json!({ "palette": palette });
        fs::write(path, serde_json::to_string_pretty(&json)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    Ok(())
}
