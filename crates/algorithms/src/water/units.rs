//! Volume units for basin water accounts

use serde::{Deserialize, Serialize};
use std::fmt;

/// Volume unit of water-balance outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitConversion {
    /// Million cubic metres
    #[default]
    Mcm,
    /// Cubic kilometres
    Km3,
}

impl UnitConversion {
    /// Interpret a numeric conversion factor: 1e3 means MCM, anything
    /// else km³
    pub fn from_factor(factor: f64) -> Self {
        if (factor - 1e3).abs() < f64::EPSILON * 1e3 {
            UnitConversion::Mcm
        } else {
            UnitConversion::Km3
        }
    }

    pub fn factor(self) -> f64 {
        match self {
            UnitConversion::Mcm => 1e3,
            UnitConversion::Km3 => 1e6,
        }
    }

    /// Volume of a water depth (mm) over an area (m²)
    pub fn depth_to_volume(self, depth_mm: f64, area_m2: f64) -> f64 {
        let m3 = depth_mm * area_m2 / 1000.0;
        match self {
            UnitConversion::Mcm => m3 / 1e6,
            UnitConversion::Km3 => m3 / 1e9,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            UnitConversion::Mcm => "MCM",
            UnitConversion::Km3 => "km3",
        }
    }
}

impl fmt::Display for UnitConversion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
