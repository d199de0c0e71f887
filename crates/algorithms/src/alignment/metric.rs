//! Metric working grid selection

use rusle_core::crs::{utm_epsg_for, CrsKind, UtmZone};
use rusle_core::raster::{GeoTransform, GridSpec};
use rusle_core::{CoordTransform, Error, Result, CRS};
use tracing::{debug, info};

/// Samples per edge when carrying a grid extent through a projection
pub const EDGE_DENSIFY_POINTS: usize = 21;

/// The grid slope, routing and LS are computed on
#[derive(Debug, Clone, PartialEq)]
pub struct MetricGrid {
    pub spec: GridSpec,
    /// UTM zone the grid was projected to; `None` when the canonical grid
    /// was already metric and no round trip is needed
    pub zone: Option<UtmZone>,
    /// Cell size in metres used for contributing length
    pub cell_size: f64,
}

impl MetricGrid {
    pub fn needs_round_trip(&self) -> bool {
        self.zone.is_some()
    }
}

fn degenerate(reason: impl Into<String>) -> Error {
    Error::DegenerateTransform(reason.into())
}

/// Pick the metric grid for a canonical grid.
///
/// UTM inputs are used as-is. Geographic inputs are projected to the UTM zone
/// containing the grid centre; the target extent is the envelope of the
/// densified source edge and the cell size is either `cell_size_override` or
/// the canonical pixel size measured on the ground at the centre.
pub fn metric_grid_for(
    canonical: &GridSpec,
    cell_size_override: Option<f64>,
) -> Result<MetricGrid> {
    let crs = canonical.crs.clone().unwrap_or_else(CRS::wgs84);

    match crs.kind() {
        CrsKind::Utm(_) => {
            let gt = canonical.transform;
            let cell_size =
                cell_size_override.unwrap_or((gt.spacing_x() + gt.spacing_y()) / 2.0);
            if gt.is_degenerate() || !(cell_size.is_finite() && cell_size > 0.0) {
                return Err(degenerate(format!("metric input grid has cell size {cell_size}")));
            }
            debug!(crs = %crs, cell_size, "canonical grid already metric");
            Ok(MetricGrid {
                spec: canonical.clone(),
                zone: None,
                cell_size,
            })
        }
        CrsKind::Geographic => project_to_utm(canonical, cell_size_override),
        CrsKind::Other => Err(Error::UnsupportedCrs {
            from: crs.identifier(),
            to: "UTM".to_string(),
        }),
    }
}

fn project_to_utm(canonical: &GridSpec, cell_size_override: Option<f64>) -> Result<MetricGrid> {
    let (lon, lat) = canonical.centroid();
    let zone = utm_epsg_for(lon, lat);
    let to_utm = CoordTransform::GeoToUtm(zone);

    let cell_size = match cell_size_override {
        Some(size) => size,
        None => {
            let gt = canonical.transform;
            let (x0, y0) = to_utm.transform(lon, lat);
            let (xe, ye) = to_utm.transform(lon + gt.spacing_x(), lat);
            let (xn, yn) = to_utm.transform(lon, lat + gt.spacing_y());
            let dx = (xe - x0).hypot(ye - y0);
            let dy = (xn - x0).hypot(yn - y0);
            (dx * dy).sqrt()
        }
    };
    if !(cell_size.is_finite() && cell_size > 0.0) {
        return Err(degenerate(format!("metric cell size {cell_size}")));
    }

    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for (x, y) in canonical.densified_edge(EDGE_DENSIFY_POINTS) {
        let (ux, uy) = to_utm.transform(x, y);
        min_x = min_x.min(ux);
        min_y = min_y.min(uy);
        max_x = max_x.max(ux);
        max_y = max_y.max(uy);
    }
    let width = max_x - min_x;
    let height = max_y - min_y;
    if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
        return Err(degenerate(format!(
            "projected extent {width} x {height} m in EPSG:{}",
            zone.epsg()
        )));
    }

    let cols = ((width / cell_size).ceil() as usize).max(1);
    let rows = ((height / cell_size).ceil() as usize).max(1);
    let transform = GeoTransform::new(min_x, max_y, cell_size, -cell_size);

    info!(
        epsg = zone.epsg(),
        rows,
        cols,
        cell_size,
        "selected metric grid"
    );

    Ok(MetricGrid {
        spec: GridSpec::new(Some(CRS::utm(zone)), transform, rows, cols, canonical.nodata),
        zone: Some(zone),
        cell_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pune_grid() -> GridSpec {
        // ~0.1 degree square near Pune at 1 arc-second
        let step = 1.0 / 3600.0;
        GridSpec::new(
            Some(CRS::wgs84()),
            GeoTransform::new(73.80, 18.56, step, -step),
            360,
            360,
            -9999.0,
        )
    }

    #[test]
    fn geographic_grid_goes_to_centre_zone() {
        let metric = metric_grid_for(&pune_grid(), None).unwrap();
        assert_eq!(metric.zone.map(|z| z.epsg()), Some(32643));
        assert!(metric.needs_round_trip());
        // 1 arc-second is roughly 30 m at this latitude
        assert!(metric.cell_size > 28.0 && metric.cell_size < 32.0, "{}", metric.cell_size);
        assert!(metric.spec.rows >= 360 && metric.spec.rows < 400);
    }

    #[test]
    fn override_sets_cell_size() {
        let metric = metric_grid_for(&pune_grid(), Some(90.0)).unwrap();
        assert_eq!(metric.cell_size, 90.0);
        assert_eq!(metric.spec.transform.pixel_width, 90.0);
        assert!(metric.spec.cols < 140);
    }

    #[test]
    fn utm_grid_is_kept() {
        let spec = GridSpec::new(
            Some(CRS::from_epsg(32643)),
            GeoTransform::new(370_000.0, 2_050_000.0, 30.0, -30.0),
            10,
            10,
            -9999.0,
        );
        let metric = metric_grid_for(&spec, None).unwrap();
        assert!(!metric.needs_round_trip());
        assert_eq!(metric.spec, spec);
        assert_eq!(metric.cell_size, 30.0);
    }

    #[test]
    fn zero_cell_size_is_degenerate() {
        let err = metric_grid_for(&pune_grid(), Some(0.0)).unwrap_err();
        assert!(matches!(err, Error::DegenerateTransform(_)));
    }

    #[test]
    fn unknown_crs_is_unsupported() {
        let mut spec = pune_grid();
        spec.crs = Some(CRS::from_epsg(3857));
        assert!(matches!(
            metric_grid_for(&spec, None),
            Err(Error::UnsupportedCrs { .. })
        ));
    }
}
