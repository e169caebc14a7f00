//! wildpath CLI - habitat corridors over multi-criteria cost surfaces

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use format_num::NumberFormat;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use wildpath_algorithms::statistics::zonal_statistics_by_features;
use wildpath_core::io::{read_geojson, read_geotiff};
use wildpath_core::{Grid, Raster, CRS};
use wildpath_pipeline::{Pipeline, PipelineConfig};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "wildpath")]
#[command(author, version, about = "Habitat corridors over multi-criteria cost surfaces", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a corridor analysis from a JSON configuration
    Run {
        /// Configuration file
        config: PathBuf,
        /// Write outputs here instead of the configured directory
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Statistics of a raster within polygon zones
    Zonal {
        /// Value raster
        raster: PathBuf,
        /// Zone polygons (GeoJSON)
        zones: PathBuf,
        /// Integer zone id attribute
        #[arg(short, long)]
        field: String,
        /// CRS of the zones when the file does not declare one (e.g. EPSG:26911)
        #[arg(long)]
        crs: Option<CRS>,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_raster(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> =
        read_geotiff(path).with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn print_info(input: &Path) -> Result<()> {
    let raster = read_raster(input)?;
    let (rows, cols) = raster.shape();
    let bounds = raster.bounds();
    let stats = raster.statistics();

    println!("File: {}", input.display());
    println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
    println!("Cell size: {}", raster.cell_size());
    println!(
        "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
        bounds.0, bounds.1, bounds.2, bounds.3
    );
    match raster.crs() {
        Some(crs) => println!("CRS: {} ({})", crs, crs.linear_unit()),
        None => println!("CRS: unknown"),
    }
    if let Some(nodata) = raster.nodata() {
        println!("NoData: {}", nodata);
    }
    println!("\nStatistics:");
    if let Some(min) = stats.min {
        println!("  Min: {:.4}", min);
    }
    if let Some(max) = stats.max {
        println!("  Max: {:.4}", max);
    }
    if let Some(mean) = stats.mean {
        println!("  Mean: {:.4}", mean);
    }
    println!(
        "  Valid cells: {} ({:.1}%)",
        stats.valid_count,
        100.0 * stats.valid_count as f64 / raster.len() as f64
    );
    Ok(())
}

fn print_zonal(raster: &Path, zones: &Path, field: &str, crs: Option<&CRS>) -> Result<()> {
    let values = read_raster(raster)?;
    let grid = Grid::from_raster(&values, "values").context("Raster cannot frame a grid")?;
    let zones = read_geojson(zones, crs)
        .with_context(|| format!("Failed to read zones {}", zones.display()))?;

    let start = Instant::now();
    let results = zonal_statistics_by_features(&values, &zones, field, &grid)
        .context("Failed to compute zonal statistics")?;
    info!("Zonal statistics in {:.2?}", start.elapsed());

    let num = NumberFormat::new();
    let fmt = ",.2f";
    println!(
        "{:>8} {:>10} {:>14} {:>14} {:>14} {:>14} {:>14}",
        "zone", "count", "mean", "min", "max", "std_dev", "median"
    );
    for (zone, r) in &results {
        println!(
            "{:>8} {:>10} {:>14} {:>14} {:>14} {:>14} {:>14}",
            zone,
            r.count,
            num.format(fmt, r.mean),
            num.format(fmt, r.min),
            num.format(fmt, r.max),
            num.format(fmt, r.std_dev),
            num.format(fmt, r.median)
        );
    }
    if results.is_empty() {
        println!("No zone holds a valid cell");
    }
    Ok(())
}

fn run(config: &Path, output_dir: Option<PathBuf>) -> Result<()> {
    let mut config = PipelineConfig::from_path(config)
        .with_context(|| format!("Failed to load configuration {}", config.display()))?;
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }

    let pb = spinner("Running corridor analysis...");
    let start = Instant::now();
    let result = Pipeline::new(config).run();
    pb.finish_and_clear();
    let report = result.context("Run failed")?;

    print!("{report}");
    println!("\nCost raster saved to: {}", report.outputs.cost.display());
    println!("Corridors saved to: {}", report.outputs.corridors.display());
    for score in &report.outputs.scores {
        println!("Score raster saved to: {}", score.display());
    }
    println!("  Processing time: {:.2?}", start.elapsed());
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Run { config, output_dir } => run(&config, output_dir),
        Commands::Info { input } => print_info(&input),
        Commands::Zonal {
            raster,
            zones,
            field,
            crs,
        } => print_zonal(&raster, &zones, &field, crs.as_ref()),
    }
}
