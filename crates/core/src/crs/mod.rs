//! Coordinate reference systems
//!
//! A CRS is identified by its EPSG code. Only WGS84 geographic (4326) and
//! WGS84 / UTM (326zz, 327zz) can be transformed between; other codes are
//! carried through I/O untouched.

mod transform;
mod utm;

pub use transform::CoordTransform;
pub use utm::{utm_epsg_for, utm_to_wgs84, wgs84_to_utm, UtmZone};

use serde::{Deserialize, Serialize};
use std::fmt;

/// What the engine knows how to do with a CRS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsKind {
    /// WGS84 longitude/latitude in degrees
    Geographic,
    /// UTM on WGS84, metres
    Utm(UtmZone),
    /// Anything else; only identity transforms are possible
    Other,
}

/// Coordinate reference system, by EPSG code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CRS {
    epsg: u32,
}

impl CRS {
    pub fn from_epsg(code: u32) -> Self {
        Self { epsg: code }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// WGS84 / UTM zone CRS (EPSG:326zz north, 327zz south)
    pub fn utm(zone: UtmZone) -> Self {
        Self::from_epsg(zone.epsg())
    }

    pub fn kind(&self) -> CrsKind {
        match self.epsg {
            4326 => CrsKind::Geographic,
            code => UtmZone::from_epsg(code).map_or(CrsKind::Other, CrsKind::Utm),
        }
    }

    /// Whether coordinates in this CRS are metres
    pub fn is_metric(&self) -> bool {
        matches!(self.kind(), CrsKind::Utm(_))
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    /// Same EPSG code. CRS84 is read as 4326, so axis order never differs here.
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        self.epsg == other.epsg
    }

    /// `EPSG:<code>`
    pub fn identifier(&self) -> String {
        format!("EPSG:{}", self.epsg)
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}
