//! End-to-end LS runs on synthetic DEMs written to temporary GeoTIFFs.

use rusle_algorithms::pipeline::{read_aoi, run, run_files, LsConfig};
use rusle_core::io::{read_geotiff, write_geotiff};
use rusle_core::raster::Mask;
use rusle_core::{AoiBoundary, Error, GeoTransform, Raster, CRS};
use std::io::Write;

/// ~90 m geographic DEM near Pune sloping to the south-east, with ripples
fn pune_dem(rows: usize, cols: usize) -> Raster<f64> {
    let mut dem = Raster::new(rows, cols);
    dem.set_transform(GeoTransform::new(73.80, 18.55, 1.0 / 1200.0, -1.0 / 1200.0));
    dem.set_crs(Some(CRS::from_epsg(4326)));
    for row in 0..rows {
        for col in 0..cols {
            let ripple = ((row as f64 * 0.7).sin() + (col as f64 * 0.4).cos()) * 1.5;
            dem.set(row, col, 650.0 - 2.0 * row as f64 - 1.5 * col as f64 + ripple)
                .unwrap();
        }
    }
    dem
}

fn utm_dem(rows: usize, cols: usize) -> Raster<f64> {
    let mut dem = Raster::new(rows, cols);
    dem.set_transform(GeoTransform::new(370_000.0, 2_050_000.0, 30.0, -30.0));
    dem.set_crs(Some(CRS::from_epsg(32643)));
    for row in 0..rows {
        for col in 0..cols {
            let bowl = ((row as f64 - 10.0).powi(2) + (col as f64 - 25.0).powi(2)).sqrt();
            dem.set(row, col, 300.0 + bowl + 0.5 * row as f64).unwrap();
        }
    }
    dem
}

const AOI: &str = r#"{
  "type": "FeatureCollection",
  "features": [{
    "type": "Feature",
    "properties": {"name": "catchment"},
    "geometry": {"type": "Polygon", "coordinates": [[
      [73.81, 18.51], [73.84, 18.51], [73.84, 18.54], [73.81, 18.54], [73.81, 18.51]
    ]]}
  }]
}"#;

#[test]
fn geographic_dem_round_trips_through_utm() {
    let dir = tempfile::tempdir().unwrap();
    let dem_path = dir.path().join("dem.tif");
    let aoi_path = dir.path().join("catchment.geojson");
    let out_path = dir.path().join("ls_factor.tif");

    let dem = pune_dem(60, 60);
    write_geotiff(&dem, &dem_path, None).unwrap();
    std::fs::File::create(&aoi_path)
        .unwrap()
        .write_all(AOI.as_bytes())
        .unwrap();

    let config = LsConfig::default();
    let output = run_files(&dem_path, Some(aoi_path.as_path()), &out_path, &config).unwrap();
    let report = &output.report;

    assert!(report.round_trip);
    assert!(!report.assumed_crs);
    assert_eq!(report.metric_crs, "EPSG:32643");
    assert_eq!(report.canonical_shape, (60, 60));
    assert!(report.metric_cell_size > 80.0 && report.metric_cell_size < 100.0);
    assert!(report.max_accumulation >= 1.0);

    let aoi = read_aoi(&aoi_path, &dem.spec()).unwrap();
    let aoi_cells = report.aoi_cells.unwrap();
    assert_eq!(aoi_cells, aoi.count());
    assert!(aoi_cells > 0);

    let ls: Raster<f64> = read_geotiff(&out_path).unwrap();
    assert_eq!(ls.shape(), dem.shape());
    assert_eq!(ls.crs().map(CRS::epsg), Some(4326));
    assert!(ls.transform().approx_eq(dem.transform(), 1e-9));

    assert!(ls.valid_count() > 0);
    assert!(ls.valid_count() <= aoi_cells);
    for ((row, col), v) in ls.iter_valid() {
        assert!(v.is_finite() && v >= 0.0, "({row}, {col}) = {v}");
        assert!(aoi.contains(row, col), "({row}, {col}) lies outside the AOI");
    }

    let summary = report.summary.as_ref().unwrap();
    assert!(summary.min >= 0.0);
    assert!(summary.p05 <= summary.median && summary.median <= summary.p95);
    assert_eq!(summary.count, output.ls.valid_count());
}

#[test]
fn utm_dem_skips_the_round_trip() {
    let dem = utm_dem(30, 50);
    let output = run(&dem, None, &LsConfig::default()).unwrap();

    assert!(!output.report.round_trip);
    assert_eq!(output.report.metric_crs, "EPSG:32643");
    assert_eq!(output.report.metric_cell_size, 30.0);
    // no cell is lost when the grid stays put
    assert_eq!(output.ls.valid_count(), dem.valid_count());
    assert_eq!(output.report.back_projection_clamped, 0);
    for (_, v) in output.ls.iter_valid() {
        assert!(v >= 0.0);
    }
}

#[test]
fn cell_size_override_scales_ls() {
    let dem = utm_dem(20, 20);
    let base = run(&dem, None, &LsConfig::default()).unwrap();
    let config = LsConfig {
        cell_size_override: Some(60.0),
        ..LsConfig::default()
    };
    let coarse = run(&dem, None, &config).unwrap();

    // L scales with (2 × area)^m at every cell
    let factor = 2.0_f64.powf(0.4);
    for ((pos, a), (_, b)) in base.ls.iter_valid().zip(coarse.ls.iter_valid()) {
        assert!((b - a * factor).abs() < 1e-9 * b.max(1.0), "{pos:?}: {a} vs {b}");
    }
}

#[test]
fn aoi_lost_on_coarse_metric_grid_still_masks_output() {
    // 3x3 canonical cells in the north-west corner; every 2 km metric cell
    // centre lies at least ~1 km from that corner
    let corner = r#"{"type": "Polygon", "coordinates": [[
        [73.8001, 18.5476], [73.8024, 18.5476], [73.8024, 18.5499],
        [73.8001, 18.5499], [73.8001, 18.5476]
    ]]}"#;
    let dem = pune_dem(60, 60);
    let aoi = AoiBoundary::from_geojson_str(corner)
        .unwrap()
        .to_mask(&dem.spec())
        .unwrap();
    assert_eq!(aoi.count(), 9);

    let config = LsConfig {
        cell_size_override: Some(2000.0),
        ..LsConfig::default()
    };
    let output = run(&dem, Some(&aoi), &config).unwrap();

    let (metric_rows, metric_cols) = output.report.metric_shape;
    assert!(metric_rows <= 3 && metric_cols <= 3);
    assert_eq!(output.report.aoi_cells, Some(9));
    assert_eq!(output.ls.shape(), dem.shape());
    assert!(output.ls.valid_count() <= 9);
    for ((row, col), v) in output.ls.iter_valid() {
        assert!(aoi.contains(row, col), "({row}, {col}) lies outside the AOI");
        assert!(v.is_finite() && v >= 0.0);
    }
}

#[test]
fn missing_crs_assumes_wgs84() {
    let mut dem = pune_dem(20, 20);
    dem.set_crs(None);
    let output = run(&dem, None, &LsConfig::default()).unwrap();
    assert!(output.report.assumed_crs);
    assert!(output.report.round_trip);
    assert_eq!(output.ls.crs().map(CRS::epsg), Some(4326));
}

#[test]
fn disjoint_aoi_is_fatal() {
    let dem = pune_dem(20, 20);
    let mut far = Raster::filled(5, 5, 1u8);
    far.set_transform(GeoTransform::new(10.0, 50.0, 0.01, -0.01));
    far.set_crs(Some(CRS::wgs84()));
    let aoi = Mask::from_raster(&far);

    let err = run(&dem, Some(&aoi), &LsConfig::default()).unwrap_err();
    assert!(matches!(err, Error::EmptyOutput(_)));
}

#[test]
fn missing_dem_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let err = run_files(
        &dir.path().join("absent.tif"),
        None,
        &dir.path().join("out.tif"),
        &LsConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, Error::MissingInput(_)));
}

#[test]
fn invalid_config_is_rejected_before_work() {
    let dem = utm_dem(10, 10);
    let config = LsConfig {
        n_exponent: 0.0,
        ..LsConfig::default()
    };
    assert!(matches!(
        run(&dem, None, &config),
        Err(Error::InvalidParameter { name: "n_exponent", .. })
    ));
}
