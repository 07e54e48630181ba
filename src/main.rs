use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use roster_data::JsonCatalog;
use tracing::info;

use roster_scan::{
    CloudVisionDetector, Detector, HttpFetcher, RecordedDetections, RosterScanner, ScanOptions,
    ScannerConfig,
};

/// Recognize the champions on a roster screenshot and print them as JSON
#[derive(Parser, Debug)]
#[command(name = "roster-scan", version)]
struct Cli {
    /// Roster screenshot (PNG or JPEG)
    screenshot: PathBuf,

    /// Use text detections recorded in this JSON file instead of calling the Vision API
    #[arg(long)]
    detections: Option<PathBuf>,

    /// Scanner configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the annotated debug image here
    #[arg(long)]
    debug_out: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    roster_scan::init_tracing();
    let cli = Cli::parse();

    let config = ScannerConfig::load(cli.config.as_deref())?;

    let detector = match &cli.detections {
        Some(path) => Detector::Recorded(RecordedDetections::load(path)?),
        None => {
            let Some(key) = config.vision_api_key() else {
                bail!(
                    "No Vision API key configured; set {} or pass --detections",
                    roster_scan::config::VISION_KEY_ENV
                );
            };
            Detector::Cloud(CloudVisionDetector::new(key, config.ocr_timeout())?)
        }
    };

    let catalog = JsonCatalog::load(&config.data_dir)?;
    let fetcher = HttpFetcher::new(config.download_timeout())?;
    let scanner = RosterScanner::initialize(&config, detector, catalog, fetcher).await?;

    let image_bytes = tokio::fs::read(&cli.screenshot)
        .await
        .with_context(|| format!("Failed to read {}", cli.screenshot.display()))?;

    let options = ScanOptions {
        debug_mode: cli.debug_out.is_some(),
    };
    let output = scanner.process(&image_bytes, options).await?;

    let json = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", json);

    if let (Some(path), Some(png)) = (&cli.debug_out, &output.debug_image) {
        tokio::fs::write(path, png)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Debug image written to {}", path.display());
    }

    Ok(())
}
