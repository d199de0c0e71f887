//! Pipeline configuration

use crate::hydrology::{DepressionMethod, EdgePolicy, FillParams, FlowDirectionParams};
use crate::terrain::LsParams;
use rusle_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for one LS-factor run.
///
/// Built once by the caller and passed by reference through the pipeline;
/// every field has a default so a config file only needs the overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LsConfig {
    /// Metric cell size in metres; derived from the canonical grid when absent
    pub cell_size_override: Option<f64>,
    pub m_exponent: f64,
    pub n_exponent: f64,
    pub min_slope_floor_degrees: f64,
    pub depression_fill_passes: usize,
    pub depression_method: DepressionMethod,
    pub edge_policy: EdgePolicy,
    /// Upper bound of the preview colour ramp; never applied to data
    pub display_cap_for_visualization: f64,
    /// Sentinel written for no-data cells
    pub nodata: f64,
}

impl Default for LsConfig {
    fn default() -> Self {
        Self {
            cell_size_override: None,
            m_exponent: 0.4,
            n_exponent: 1.3,
            min_slope_floor_degrees: 0.1,
            depression_fill_passes: 2,
            depression_method: DepressionMethod::NeighborMean,
            edge_policy: EdgePolicy::Exclude,
            display_cap_for_visualization: 50.0,
            nodata: -9999.0,
        }
    }
}

fn invalid(name: &'static str, value: impl ToString, reason: &str) -> Error {
    Error::InvalidParameter {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn positive(name: &'static str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(invalid(name, value, "must be positive"))
    }
}

impl LsConfig {
    /// Load a JSON config file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::MissingInput(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(cs) = self.cell_size_override {
            positive("cell_size_override", cs)?;
        }
        positive("m_exponent", self.m_exponent)?;
        positive("n_exponent", self.n_exponent)?;
        positive("display_cap_for_visualization", self.display_cap_for_visualization)?;
        let floor = self.min_slope_floor_degrees;
        if !(floor > 0.0 && floor < 90.0) {
            return Err(invalid("min_slope_floor_degrees", floor, "must be in (0, 90)"));
        }
        let mean_fill = self.depression_method == DepressionMethod::NeighborMean;
        if mean_fill && self.depression_fill_passes == 0 {
            return Err(invalid("depression_fill_passes", 0, "must be at least 1"));
        }
        if !self.nodata.is_finite() {
            return Err(invalid("nodata", self.nodata, "must be finite"));
        }
        // Outputs are stored as f32; the sentinel has to survive that
        if f64::from(self.nodata as f32) != self.nodata {
            return Err(invalid("nodata", self.nodata, "must be exactly representable as f32"));
        }
        Ok(())
    }

    pub fn fill_params(&self) -> FillParams {
        FillParams {
            method: self.depression_method,
            passes: self.depression_fill_passes,
            ..FillParams::default()
        }
    }

    pub fn flow_direction_params(&self) -> FlowDirectionParams {
        FlowDirectionParams {
            edge_policy: self.edge_policy,
        }
    }

    /// LS parameters for a metric grid with the given cell size
    pub fn ls_params(&self, cell_size: f64) -> LsParams {
        LsParams {
            m_exponent: self.m_exponent,
            n_exponent: self.n_exponent,
            min_slope_degrees: self.min_slope_floor_degrees,
            cell_size: Some(cell_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = LsConfig::default();
        config.validate().unwrap();
        assert_eq!(config.fill_params().passes, 2);
        assert_eq!(config.ls_params(90.0).cell_size, Some(90.0));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let text = r#"{"m_exponent": 0.5, "depression_method": "priority_flood"}"#;
        let config: LsConfig = serde_json::from_str(text).unwrap();
        assert_eq!(config.m_exponent, 0.5);
        assert_eq!(config.n_exponent, 1.3);
        assert_eq!(config.depression_method, DepressionMethod::PriorityFlood);
        assert_eq!(config.edge_policy, EdgePolicy::Exclude);
    }

    #[test]
    fn rejects_bad_values() {
        let cases = [
            LsConfig { m_exponent: 0.0, ..LsConfig::default() },
            LsConfig { cell_size_override: Some(-30.0), ..LsConfig::default() },
            LsConfig { min_slope_floor_degrees: -1.0, ..LsConfig::default() },
            LsConfig { min_slope_floor_degrees: 0.0, ..LsConfig::default() },
            LsConfig { min_slope_floor_degrees: 90.0, ..LsConfig::default() },
            LsConfig { depression_fill_passes: 0, ..LsConfig::default() },
            LsConfig { display_cap_for_visualization: 0.0, ..LsConfig::default() },
            LsConfig { nodata: 0.1, ..LsConfig::default() },
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(Error::InvalidParameter { .. })),
                "{config:?}"
            );
        }
    }

    #[test]
    fn f32_exact_sentinels_are_accepted() {
        for nodata in [-9999.0, 0.0, -3.4028234663852886e38, 0.5] {
            LsConfig { nodata, ..LsConfig::default() }.validate().unwrap();
        }
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"cell_size_override": 30.0, "edge_policy": "in_bounds"}}"#).unwrap();
        let config = LsConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.cell_size_override, Some(30.0));
        assert_eq!(config.edge_policy, EdgePolicy::InBounds);
    }

    #[test]
    fn invalid_file_contents_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"n_exponent": -2}}"#).unwrap();
        assert!(LsConfig::from_json_file(file.path()).is_err());
    }
}
