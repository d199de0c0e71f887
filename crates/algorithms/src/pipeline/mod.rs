//! LS-factor pipeline
//!
//! ```text
//! DEM ─ align ─ metric grid ─ fill ─┬─ slope ──────────────┬─ LS
//!                                   └─ D8 ─ accumulation ──┘
//! LS ─ back to canonical grid ─ AOI ─ LS raster
//! ```
//!
//! The canonical grid is the input DEM's own grid. Slope and routing run on
//! a metric grid: the DEM's grid when it is already UTM, otherwise the UTM
//! zone containing its centre.

mod config;
mod report;

pub use config::LsConfig;
pub use report::PipelineReport;

use crate::alignment::{align_mask, align_raster, metric_grid_for, AlignParams, Resampling};
use crate::hydrology::{fill_depressions, flow_accumulation, flow_direction};
use crate::maybe_rayon::join;
use crate::statistics::summarize;
use crate::terrain::{clamp_negative, ls_factor, slope, SlopeParams};
use rusle_core::io::{read_geotiff, write_geotiff, GeoTiffOptions};
use rusle_core::raster::{GridSpec, Mask, Raster};
use rusle_core::{AoiBoundary, Error, Result, CRS};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of a pipeline run
#[derive(Debug, Clone)]
pub struct LsOutput {
    /// LS-factor on the canonical grid
    pub ls: Raster<f64>,
    pub report: PipelineReport,
}

/// AOI carried onto the metric grid, or `None` when nothing of it lands there
fn metric_aoi(aoi: &Mask, metric: &GridSpec) -> Result<Option<Mask>> {
    match align_mask(aoi, metric) {
        Ok(mask) if mask.count() > 0 => Ok(Some(mask)),
        Ok(_) | Err(Error::EmptyOutput(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Compute the LS-factor for `dem`.
///
/// `aoi` may be on any grid; it is carried onto the DEM grid with nearest
/// neighbour. The returned raster is on the DEM's grid and CRS, with every
/// valid value finite and non-negative.
///
/// # Errors
/// Fatal conditions abort the run: an invalid config, a DEM that cannot be
/// reprojected or does not overlap its metric grid (`EmptyOutput`,
/// `DegenerateTransform`, `UnsupportedCrs`), or a cyclic flow graph
/// (`FlowCycle`).
pub fn run(dem: &Raster<f64>, aoi: Option<&Mask>, config: &LsConfig) -> Result<LsOutput> {
    config.validate()?;
    let start = Instant::now();

    let mut canonical = dem.spec();
    let assumed_crs = canonical.crs.is_none();
    if assumed_crs {
        warn!("DEM has no CRS; assuming EPSG:4326");
        canonical.crs = Some(CRS::wgs84());
    }
    canonical.nodata = config.nodata;
    if canonical.transform.is_degenerate() {
        return Err(Error::DegenerateTransform(format!(
            "DEM pixel size {} x {}",
            canonical.transform.spacing_x(),
            canonical.transform.spacing_y()
        )));
    }
    if dem.valid_count() == 0 {
        return Err(Error::EmptyOutput("DEM has no valid cells".to_string()));
    }

    let mut dem_c = dem.clone();
    dem_c.set_crs(canonical.crs.clone());
    let aoi_c = aoi.map(|m| align_mask(m, &canonical)).transpose()?;
    info!(
        rows = canonical.rows,
        cols = canonical.cols,
        valid = dem_c.valid_count(),
        aoi = aoi_c.as_ref().map(Mask::count),
        "canonical grid"
    );

    // Metric working grid
    let metric = metric_grid_for(&canonical, config.cell_size_override)?;
    let metric_crs = metric
        .spec
        .crs
        .as_ref()
        .map(CRS::identifier)
        .unwrap_or_default();
    let mut dem_m = if metric.needs_round_trip() {
        align_raster(&dem_c, &metric.spec, &AlignParams::default())?
    } else {
        dem_c
    };
    if let Some(aoi) = &aoi_c {
        match metric_aoi(aoi, &metric.spec)? {
            Some(mask) => {
                let dropped = mask.apply(&mut dem_m)?;
                debug!(dropped, "applied AOI on metric grid");
            }
            None => warn!("AOI has no cells on the metric grid; masking only the final raster"),
        }
    }
    info!(
        crs = %metric_crs,
        rows = metric.spec.rows,
        cols = metric.spec.cols,
        cell_size = metric.cell_size,
        "metric grid"
    );

    // Hydrology and terrain
    let (filled, fill) = fill_depressions(&dem_m, &config.fill_params())?;
    drop(dem_m);

    let dir_params = config.flow_direction_params();
    let (slope_deg, dirs) = join(
        || slope(&filled, SlopeParams::default()),
        || flow_direction(&filled, &dir_params),
    );
    let slope_deg = slope_deg?;
    let dirs = dirs?;
    let acc = flow_accumulation(&dirs)?;
    let max_accumulation = acc.statistics().max.unwrap_or(0.0);
    info!(
        defined = dirs.defined_count(),
        max_accumulation,
        "routed flow"
    );

    let (ls_m, ls_corrections) = ls_factor(&acc, &slope_deg, &config.ls_params(metric.cell_size))?;

    // Back to the canonical grid
    let params = AlignParams {
        resampling: Resampling::Bilinear,
        aoi: aoi_c.clone(),
    };
    let mut ls = align_raster(&ls_m, &canonical, &params)?;
    let back_projection_clamped = clamp_negative(&mut ls)?;
    ls.set_nodata(config.nodata);

    let summary = summarize(&ls);
    let cap = config.display_cap_for_visualization;
    let above_display_cap = ls.iter_valid().filter(|&(_, v)| v > cap).count();
    if let Some(s) = &summary {
        info!(
            count = s.count,
            min = s.min,
            median = s.median,
            mean = s.mean,
            p95 = s.p95,
            max = s.max,
            "LS statistics"
        );
    } else {
        warn!("LS raster has no valid cells");
    }
    if above_display_cap > 0 {
        warn!(
            cells = above_display_cap,
            cap, "LS values above the display cap; preview colours saturate there"
        );
    }
    debug!(elapsed_ms = start.elapsed().as_millis() as u64, "pipeline finished");

    let report = PipelineReport {
        canonical_shape: canonical.shape(),
        metric_crs,
        metric_shape: metric.spec.shape(),
        metric_cell_size: metric.cell_size,
        round_trip: metric.needs_round_trip(),
        assumed_crs,
        aoi_cells: aoi_c.as_ref().map(Mask::count),
        fill,
        defined_directions: dirs.defined_count(),
        max_accumulation,
        ls_corrections,
        back_projection_clamped,
        summary,
        display_cap: cap,
        above_display_cap,
    };
    Ok(LsOutput { ls, report })
}

/// Read an AOI for `grid`: GeoJSON boundaries (`.geojson` / `.json`) are
/// rasterized onto it, anything else is read as a GeoTIFF mask where
/// valid cells greater than zero are inside.
pub fn read_aoi<P: AsRef<Path>>(path: P, grid: &GridSpec) -> Result<Mask> {
    let path = path.as_ref();
    let is_geojson = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("geojson") || e.eq_ignore_ascii_case("json"));

    if is_geojson {
        let mut spec = grid.clone();
        if spec.crs.is_none() {
            spec.crs = Some(CRS::wgs84());
        }
        AoiBoundary::read_geojson(path)?.to_mask(&spec)
    } else {
        let raster: Raster<f64> = read_geotiff(path)?;
        Ok(Mask::from_raster(&raster))
    }
}

/// Run the pipeline on files and write the LS raster as a GeoTIFF
pub fn run_files(
    dem_path: &Path,
    aoi_path: Option<&Path>,
    out_path: &Path,
    config: &LsConfig,
) -> Result<LsOutput> {
    let dem: Raster<f64> = read_geotiff(dem_path)?;
    let aoi = aoi_path.map(|p| read_aoi(p, &dem.spec())).transpose()?;

    let output = run(&dem, aoi.as_ref(), config)?;
    write_geotiff(
        &output.ls,
        out_path,
        Some(GeoTiffOptions {
            nodata: Some(config.nodata),
        }),
    )?;
    info!(path = %out_path.display(), "wrote LS raster");
    Ok(output)
}
