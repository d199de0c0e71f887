//! Vector AOI boundaries
//!
//! Reads catchment polygons from GeoJSON and rasterizes them onto a grid.
//! Polygon and MultiPolygon geometries are kept, including those nested in
//! geometry collections; other geometry types are skipped. Coordinates are
//! WGS84 unless the document carries a legacy `crs` member naming an EPSG
//! code.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GridSpec, Mask};
use crate::CoordTransform;
use geo::MapCoords;
use geo_types::{Coord, MultiPolygon, Polygon};
use geojson::{GeoJson, JsonObject, Value as GeoValue};
use std::path::Path;
use tracing::{debug, warn};

/// Catchment boundary polygons with their CRS
#[derive(Debug, Clone)]
pub struct AoiBoundary {
    pub polygons: MultiPolygon<f64>,
    pub crs: CRS,
}

/// Polygons found so far and the number of geometries ignored
#[derive(Default)]
struct Collected {
    polygons: Vec<Polygon<f64>>,
    skipped: usize,
}

impl Collected {
    fn geometry(&mut self, value: GeoValue) -> Result<()> {
        match value {
            v @ GeoValue::Polygon(_) => self.polygons.push(Polygon::try_from(v)?),
            v @ GeoValue::MultiPolygon(_) => {
                self.polygons.extend(MultiPolygon::<f64>::try_from(v)?.0)
            }
            GeoValue::GeometryCollection(members) => {
                for member in members {
                    self.geometry(member.value)?;
                }
            }
            _ => self.skipped += 1,
        }
        Ok(())
    }

    fn feature(&mut self, feature: geojson::Feature) -> Result<()> {
        match feature.geometry {
            Some(geometry) => self.geometry(geometry.value),
            None => {
                self.skipped += 1;
                Ok(())
            }
        }
    }
}

/// Legacy `{"crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::32643"}}}`
fn named_crs(members: Option<&JsonObject>) -> Option<CRS> {
    let name = members?.get("crs")?.get("properties")?.get("name")?.as_str()?;
    if name.ends_with("CRS84") {
        return Some(CRS::wgs84());
    }
    let digits = name.rsplit(|c: char| !c.is_ascii_digit()).next()?;
    digits.parse().ok().map(CRS::from_epsg)
}

impl AoiBoundary {
    /// Parse a GeoJSON document
    pub fn from_geojson_str(text: &str) -> Result<Self> {
        let document: GeoJson = text.parse()?;
        let mut found = Collected::default();

        let crs = match document {
            GeoJson::FeatureCollection(collection) => {
                let crs = named_crs(collection.foreign_members.as_ref());
                for feature in collection.features {
                    found.feature(feature)?;
                }
                crs
            }
            GeoJson::Feature(feature) => {
                let crs = named_crs(feature.foreign_members.as_ref());
                found.feature(feature)?;
                crs
            }
            GeoJson::Geometry(geometry) => {
                let crs = named_crs(geometry.foreign_members.as_ref());
                found.geometry(geometry.value)?;
                crs
            }
        };

        if found.skipped > 0 {
            warn!(skipped = found.skipped, "non-polygon AOI features ignored");
        }
        if found.polygons.is_empty() {
            return Err(Error::EmptyOutput("AOI boundary has no polygons".to_string()));
        }

        let crs = crs.unwrap_or_else(CRS::wgs84);
        debug!(polygons = found.polygons.len(), crs = %crs, "parsed AOI boundary");
        Ok(Self {
            polygons: MultiPolygon::new(found.polygons),
            crs,
        })
    }

    /// Read a GeoJSON file
    pub fn read_geojson<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::MissingInput(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_geojson_str(&text)
    }

    /// Rasterize onto `spec` (cell centre inside a polygon), carrying the
    /// polygons into the grid's CRS first when it differs
    pub fn to_mask(&self, spec: &GridSpec) -> Result<Mask> {
        let polygons = match &spec.crs {
            Some(grid_crs) if !grid_crs.is_equivalent(&self.crs) => {
                let to_grid = CoordTransform::new(&self.crs, grid_crs)?;
                self.polygons.map_coords(|c| {
                    let (x, y) = to_grid.transform(c.x, c.y);
                    Coord { x, y }
                })
            }
            _ => self.polygons.clone(),
        };
        Ok(Mask::rasterize(&polygons, spec))
    }
}
