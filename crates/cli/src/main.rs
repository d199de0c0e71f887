//! rusle-ls: RUSLE LS-factor from a DEM

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rusle_algorithms::alignment::{align_raster, metric_grid_for, AlignParams, Resampling};
use rusle_algorithms::hydrology::{
    fill_depressions, flow_accumulation, flow_direction, DepressionMethod, EdgePolicy, FillParams,
    FlowDirectionParams,
};
use rusle_algorithms::pipeline::{read_aoi, run_files, LsConfig, PipelineReport};
use rusle_algorithms::statistics::summarize;
use rusle_algorithms::terrain::{slope, SlopeParams, SlopeUnits};
use rusle_colormap::{auto_params, write_png, ColorScheme};
use rusle_core::io::{read_geotiff, write_geotiff, GeoTiffOptions};
use rusle_core::{FlowDirectionGrid, Raster, RasterElement};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "rusle-ls")]
#[command(author, version, about = "RUSLE topographic (LS) factor from a DEM", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Compute the LS-factor raster from a DEM
    Ls {
        /// Input DEM file
        dem: PathBuf,
        /// Output LS raster
        output: PathBuf,
        /// Area of interest: GeoJSON boundary or GeoTIFF mask (cells > 0 inside)
        #[arg(short, long)]
        aoi: Option<PathBuf>,
        /// JSON config file; flags below override its fields
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Write the run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
        /// Write a PNG preview of the LS raster
        #[arg(long)]
        preview: Option<PathBuf>,
        /// Metric cell size in metres
        #[arg(long)]
        cell_size: Option<f64>,
        /// L exponent
        #[arg(short, long)]
        m_exponent: Option<f64>,
        /// S exponent
        #[arg(short, long)]
        n_exponent: Option<f64>,
        /// Slope floor in degrees
        #[arg(long)]
        min_slope: Option<f64>,
        /// Depression filling: neighbor-mean, priority-flood
        #[arg(long)]
        fill_method: Option<String>,
        /// Passes of the neighbour-mean filler
        #[arg(long)]
        fill_passes: Option<usize>,
        /// Border cells: exclude, in-bounds
        #[arg(long)]
        edge_policy: Option<String>,
        /// Upper bound of the preview colour ramp
        #[arg(long)]
        display_cap: Option<f64>,
        /// No-data sentinel for the output raster
        #[arg(long)]
        nodata: Option<f64>,
    },
    /// Fill single-cell depressions in a DEM
    Fill {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Method: neighbor-mean, priority-flood
        #[arg(long, default_value = "neighbor-mean")]
        method: String,
        /// Passes of the neighbour-mean filler
        #[arg(long, default_value = "2")]
        passes: usize,
    },
    /// Calculate slope from a DEM
    Slope {
        /// Input DEM file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Output units: degrees, percent, radians
        #[arg(short, long, default_value = "degrees")]
        units: String,
    },
    /// D8 flow direction from a DEM
    FlowDirection {
        /// Input DEM file
        input: PathBuf,
        /// Output file (codes: 1=E 2=NE 3=N 4=NW 5=W 6=SW 7=S 8=SE, 0=undefined)
        output: PathBuf,
        /// Border cells: exclude, in-bounds
        #[arg(long, default_value = "exclude")]
        edge_policy: String,
    },
    /// Flow accumulation from a flow direction raster
    FlowAccumulation {
        /// Input flow direction raster (D8 codes)
        input: PathBuf,
        /// Output file (contributing cell count)
        output: PathBuf,
    },
    /// Resample a raster onto the grid of a reference raster
    Align {
        /// Raster to resample
        input: PathBuf,
        /// Raster whose grid and CRS the output takes
        reference: PathBuf,
        /// Output file
        output: PathBuf,
        /// Resampling: nearest, bilinear
        #[arg(short, long, default_value = "bilinear")]
        resampling: String,
    },
    /// Rasterize an AOI boundary onto the grid of a reference raster
    Aoi {
        /// GeoJSON boundary or GeoTIFF mask
        boundary: PathBuf,
        /// Raster whose grid the mask takes
        reference: PathBuf,
        /// Output mask (1 inside, 0 outside)
        output: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to install logger")
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

fn read_raster<T: RasterElement>(path: &Path) -> Result<Raster<T>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<T> = read_geotiff(path)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn write_result<T: RasterElement>(
    raster: &Raster<T>,
    path: &Path,
    nodata: Option<f64>,
) -> Result<()> {
    let pb = spinner("Writing output...");
    write_geotiff(raster, path, Some(GeoTiffOptions { nodata }))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn parse_fill_method(s: &str) -> Result<DepressionMethod> {
    match s.to_lowercase().replace('_', "-").as_str() {
        "neighbor-mean" | "neighbour-mean" | "mean" => Ok(DepressionMethod::NeighborMean),
        "priority-flood" | "pf" => Ok(DepressionMethod::PriorityFlood),
        _ => anyhow::bail!("Unknown fill method: {}. Use neighbor-mean or priority-flood.", s),
    }
}

fn parse_edge_policy(s: &str) -> Result<EdgePolicy> {
    match s.to_lowercase().replace('_', "-").as_str() {
        "exclude" => Ok(EdgePolicy::Exclude),
        "in-bounds" | "inbounds" => Ok(EdgePolicy::InBounds),
        _ => anyhow::bail!("Unknown edge policy: {}. Use exclude or in-bounds.", s),
    }
}

fn parse_slope_units(s: &str) -> Result<SlopeUnits> {
    match s.to_lowercase().as_str() {
        "degrees" | "deg" | "d" => Ok(SlopeUnits::Degrees),
        "percent" | "pct" | "%" => Ok(SlopeUnits::Percent),
        "radians" | "rad" | "r" => Ok(SlopeUnits::Radians),
        _ => anyhow::bail!("Unknown units: {}. Use degrees, percent or radians.", s),
    }
}

fn parse_resampling(s: &str) -> Result<Resampling> {
    match s.to_lowercase().as_str() {
        "nearest" | "nn" => Ok(Resampling::Nearest),
        "bilinear" | "linear" => Ok(Resampling::Bilinear),
        _ => anyhow::bail!("Unknown resampling: {}. Use nearest or bilinear.", s),
    }
}

fn print_report(report: &PipelineReport) {
    let (rows, cols) = report.canonical_shape;
    let (mrows, mcols) = report.metric_shape;
    println!("  Grid: {} x {}", cols, rows);
    println!(
        "  Metric grid: {} x {} in {} at {:.2} m{}",
        mcols,
        mrows,
        report.metric_crs,
        report.metric_cell_size,
        if report.round_trip { " (reprojected)" } else { "" }
    );
    if let Some(aoi) = report.aoi_cells {
        println!("  AOI cells: {}", aoi);
    }
    println!(
        "  Pits: {} filled, {} residual",
        report.fill.initial_pits.saturating_sub(report.fill.residual_pits),
        report.fill.residual_pits
    );
    println!("  Max accumulation: {:.0} cells", report.max_accumulation);
    if let Some(s) = &report.summary {
        println!("\nLS statistics ({} cells):", s.count);
        println!("  Min: {:.4}  Max: {:.4}", s.min, s.max);
        println!("  Mean: {:.4}  Std: {:.4}", s.mean, s.std_dev);
        println!(
            "  P05 {:.4} | P25 {:.4} | Median {:.4} | P75 {:.4} | P95 {:.4}",
            s.p05, s.p25, s.median, s.p75, s.p95
        );
    }
    if report.total_corrections() > 0 {
        println!("  Corrected values: {}", report.total_corrections());
    }
    if report.above_display_cap > 0 {
        println!(
            "  {} cells above the display cap of {}",
            report.above_display_cap, report.display_cap
        );
    }
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let raster: Raster<f64> = read_raster(&input)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!(
                "Pixel size: {} x {}",
                raster.transform().spacing_x(),
                raster.transform().spacing_y()
            );
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            match raster.crs() {
                Some(crs) => println!("CRS: {}", crs),
                None => println!("CRS: none (EPSG:4326 assumed for LS)"),
            }
            println!("NoData: {}", raster.nodata());
            match metric_grid_for(&raster.spec(), None) {
                Ok(metric) => println!(
                    "Metric grid: {} at {:.2} m",
                    metric.spec.crs.as_ref().map(|c| c.identifier()).unwrap_or_default(),
                    metric.cell_size
                ),
                Err(e) => warn!("No metric grid: {}", e),
            }
            println!("\nStatistics:");
            if let Some(s) = summarize(&raster) {
                println!("  Min: {:.4}", s.min);
                println!("  Max: {:.4}", s.max);
                println!("  Mean: {:.4}", s.mean);
                println!("  Median: {:.4}", s.median);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / raster.len().max(1) as f64
            );
        }

        // ── LS pipeline ──────────────────────────────────────────────
        Commands::Ls {
            dem,
            output,
            aoi,
            config,
            report,
            preview,
            cell_size,
            m_exponent,
            n_exponent,
            min_slope,
            fill_method,
            fill_passes,
            edge_policy,
            display_cap,
            nodata,
        } => {
            let mut cfg = match &config {
                Some(path) => LsConfig::from_json_file(path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => LsConfig::default(),
            };
            if cell_size.is_some() {
                cfg.cell_size_override = cell_size;
            }
            if let Some(v) = m_exponent {
                cfg.m_exponent = v;
            }
            if let Some(v) = n_exponent {
                cfg.n_exponent = v;
            }
            if let Some(v) = min_slope {
                cfg.min_slope_floor_degrees = v;
            }
            if let Some(v) = fill_method {
                cfg.depression_method = parse_fill_method(&v)?;
            }
            if let Some(v) = fill_passes {
                cfg.depression_fill_passes = v;
            }
            if let Some(v) = edge_policy {
                cfg.edge_policy = parse_edge_policy(&v)?;
            }
            if let Some(v) = display_cap {
                cfg.display_cap_for_visualization = v;
            }
            if let Some(v) = nodata {
                cfg.nodata = v;
            }
            cfg.validate().context("Invalid configuration")?;

            let pb = spinner("Computing LS factor...");
            let start = Instant::now();
            let result = run_files(&dem, aoi.as_deref(), &output, &cfg);
            pb.finish_and_clear();
            let out = result.context("LS computation failed")?;
            let elapsed = start.elapsed();

            if let Some(path) = &report {
                let json = serde_json::to_string_pretty(&out.report)
                    .context("Failed to encode report")?;
                std::fs::write(path, json)
                    .with_context(|| format!("Failed to write report {}", path.display()))?;
                println!("Report saved to: {}", path.display());
            }
            if let Some(path) = &preview {
                let cap = Some(cfg.display_cap_for_visualization);
                let params = auto_params(&out.ls, ColorScheme::YlOrRd, cap);
                write_png(&out.ls, &params, path)
                    .with_context(|| format!("Failed to write preview {}", path.display()))?;
                println!("Preview saved to: {}", path.display());
            }
            done("LS factor", &output, elapsed);
            print_report(&out.report);
        }

        // ── Single stages ────────────────────────────────────────────
        Commands::Fill {
            input,
            output,
            method,
            passes,
        } => {
            let params = FillParams {
                method: parse_fill_method(&method)?,
                passes,
                ..FillParams::default()
            };
            let dem: Raster<f64> = read_raster(&input)?;
            let start = Instant::now();
            let (filled, report) =
                fill_depressions(&dem, &params).context("Failed to fill depressions")?;
            let elapsed = start.elapsed();
            write_result(&filled, &output, None)?;
            done("Filled DEM", &output, elapsed);
            println!(
                "  Pits: {} initial, {} residual, {} cell updates",
                report.initial_pits, report.residual_pits, report.cells_raised
            );
        }

        Commands::Slope { input, output, units } => {
            let units = parse_slope_units(&units)?;
            let dem: Raster<f64> = read_raster(&input)?;
            let start = Instant::now();
            let result = slope(&dem, SlopeParams { units }).context("Failed to calculate slope")?;
            let elapsed = start.elapsed();
            write_result(&result, &output, None)?;
            done("Slope", &output, elapsed);
        }

        Commands::FlowDirection {
            input,
            output,
            edge_policy,
        } => {
            let params = FlowDirectionParams {
                edge_policy: parse_edge_policy(&edge_policy)?,
            };
            let dem: Raster<f64> = read_raster(&input)?;
            let start = Instant::now();
            let dirs = flow_direction(&dem, &params).context("Failed to compute flow direction")?;
            let elapsed = start.elapsed();
            write_result(&dirs.to_codes(), &output, None)?;
            done("Flow direction", &output, elapsed);
            println!("  Defined directions: {} of {}", dirs.defined_count(), dirs.valid_count());
        }

        Commands::FlowAccumulation { input, output } => {
            let codes: Raster<u8> = read_raster(&input)?;
            let dirs =
                FlowDirectionGrid::from_codes(&codes).context("Invalid flow direction raster")?;
            let start = Instant::now();
            let acc = flow_accumulation(&dirs).context("Failed to accumulate flow")?;
            let elapsed = start.elapsed();
            write_result(&acc, &output, None)?;
            done("Flow accumulation", &output, elapsed);
        }

        Commands::Align {
            input,
            reference,
            output,
            resampling,
        } => {
            let params = AlignParams {
                resampling: parse_resampling(&resampling)?,
                aoi: None,
            };
            let src: Raster<f64> = read_raster(&input)?;
            let target: Raster<f64> = read_raster(&reference)?;
            let start = Instant::now();
            let aligned = align_raster(&src, &target.spec(), &params)
                .context("Failed to align raster")?;
            let elapsed = start.elapsed();
            write_result(&aligned, &output, None)?;
            done("Aligned raster", &output, elapsed);
        }

        Commands::Aoi {
            boundary,
            reference,
            output,
        } => {
            let target: Raster<f64> = read_raster(&reference)?;
            let start = Instant::now();
            let mask = read_aoi(&boundary, &target.spec())
                .with_context(|| format!("Failed to read AOI {}", boundary.display()))?;
            let mut flags = Raster::from_array(mask.cells().map(|&inside| u8::from(inside)));
            flags.set_transform(*mask.transform());
            flags.set_crs(mask.crs().cloned());
            let elapsed = start.elapsed();
            write_result(&flags, &output, Some(255.0))?;
            done("AOI mask", &output, elapsed);
            println!("  Cells inside: {}", mask.count());
        }
    }

    Ok(())
}
