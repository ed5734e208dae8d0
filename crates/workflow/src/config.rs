//! Workflow configuration
//!
//! Loaded from a TOML file; `BASINKIT_*` environment variables override
//! the paths and the basin name.

use crate::error::{Result, WorkflowError};
use basinkit_algorithms::water::UnitConversion;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Inputs and outputs of a basin water-accounting run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Basin name, used as the prefix of every output
    pub basin_name: String,
    /// Root of the per-dataset GeoTIFF directories (`P/Monthly`, `ET`, ...)
    pub input_dir: PathBuf,
    /// Basin boundary (GeoJSON)
    pub boundary: PathBuf,
    /// Raster defining the output grid
    pub template: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_start_year")]
    pub start_year: i32,
    #[serde(default = "default_end_year")]
    pub end_year: i32,
    /// Depth-to-volume factor: 1e3 gives MCM, anything else km³
    #[serde(default = "default_unit_conversion")]
    pub unit_conversion: f64,
    /// Monthly inflow volumes (`date,value`)
    #[serde(default)]
    pub inflow: Option<PathBuf>,
    /// Monthly outflow volumes (`date,value`)
    #[serde(default)]
    pub outflow: Option<PathBuf>,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_start_year() -> i32 {
    2019
}

fn default_end_year() -> i32 {
    2022
}

fn default_unit_conversion() -> f64 {
    1e3
}

impl WorkflowConfig {
    /// Read a TOML file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let mut config = Self::from_toml(&text)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Override fields from `BASINKIT_*` variables resolved by `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(name) = lookup("BASINKIT_BASIN_NAME") {
            self.basin_name = name;
        }
        if let Some(dir) = lookup("BASINKIT_INPUT_DIR") {
            self.input_dir = dir.into();
        }
        if let Some(dir) = lookup("BASINKIT_OUTPUT_DIR") {
            self.output_dir = dir.into();
        }
    }

    /// Directory holding the data cubes
    pub fn cube_dir(&self) -> PathBuf {
        self.output_dir.join("cubes")
    }

    pub fn units(&self) -> UnitConversion {
        UnitConversion::from_factor(self.unit_conversion)
    }

    /// Check the year range and conversion factor
    pub fn validate(&self) -> Result<()> {
        if self.basin_name.trim().is_empty() {
            return Err(WorkflowError::invalid("basin_name is empty"));
        }
        if self.start_year > self.end_year {
            return Err(WorkflowError::invalid(format!(
                "start year {} is after end year {}",
                self.start_year, self.end_year
            )));
        }
        if self.unit_conversion.is_nan() || self.unit_conversion <= 0.0 {
            return Err(WorkflowError::invalid(format!(
                "unit_conversion must be positive, got {}",
                self.unit_conversion
            )));
        }
        Ok(())
    }
}
