//! Point transforms between the supported CRS pairs

use super::utm::{utm_to_wgs84, wgs84_to_utm, UtmZone};
use super::{CrsKind, CRS};
use crate::error::{Error, Result};

/// A resolved point transform between two CRSs.
///
/// Supported: identity (equivalent CRSs), WGS84 → UTM, UTM → WGS84 and
/// UTM → UTM (through WGS84).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordTransform {
    Identity,
    GeoToUtm(UtmZone),
    UtmToGeo(UtmZone),
    UtmToUtm { from: UtmZone, to: UtmZone },
}

impl CoordTransform {
    /// Resolve the transform from `src` to `dst`
    pub fn new(src: &CRS, dst: &CRS) -> Result<Self> {
        if src.is_equivalent(dst) {
            return Ok(Self::Identity);
        }
        match (src.kind(), dst.kind()) {
            (CrsKind::Geographic, CrsKind::Utm(zone)) => Ok(Self::GeoToUtm(zone)),
            (CrsKind::Utm(zone), CrsKind::Geographic) => Ok(Self::UtmToGeo(zone)),
            (CrsKind::Utm(from), CrsKind::Utm(to)) => Ok(Self::UtmToUtm { from, to }),
            _ => Err(Error::UnsupportedCrs {
                from: src.identifier(),
                to: dst.identifier(),
            }),
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }

    /// Transform one (x, y) point
    pub fn transform(&self, x: f64, y: f64) -> (f64, f64) {
        match *self {
            Self::Identity => (x, y),
            Self::GeoToUtm(zone) => wgs84_to_utm(x, y, zone),
            Self::UtmToGeo(zone) => utm_to_wgs84(x, y, zone),
            Self::UtmToUtm { from, to } => {
                let (lon, lat) = utm_to_wgs84(x, y, from);
                wgs84_to_utm(lon, lat, to)
            }
        }
    }

    /// Inverse direction
    pub fn inverse(&self) -> Self {
        match *self {
            Self::Identity => Self::Identity,
            Self::GeoToUtm(zone) => Self::UtmToGeo(zone),
            Self::UtmToGeo(zone) => Self::GeoToUtm(zone),
            Self::UtmToUtm { from, to } => Self::UtmToUtm { from: to, to: from },
        }
    }
}
