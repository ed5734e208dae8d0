//! Dashboard server configuration
//!
//! Every field has a default, so the TOML file is optional. `BASINKIT_HOST`,
//! `BASINKIT_PORT`, `BASINKIT_DATA_DIR` and `BASINKIT_STATIC_DIR` override
//! the file.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory with `<basin>_timeseries.csv` and `<basin>.geojson` files
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Frontend assets served for every non-API path
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
    /// Volume unit label of the loaded series
    #[serde(default = "default_unit")]
    pub default_unit: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8050
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_unit() -> String {
    "MCM".to_string()
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            static_dir: default_static_dir(),
            default_unit: default_unit(),
        }
    }
}

impl DashboardConfig {
    /// Read `path` when given, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_toml(&std::fs::read_to_string(p)?)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("BASINKIT_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("BASINKIT_PORT") {
            match port.parse() {
                Ok(p) => self.port = p,
                Err(_) => warn!("ignoring BASINKIT_PORT={}", port),
            }
        }
        if let Some(dir) = lookup("BASINKIT_DATA_DIR") {
            self.data_dir = dir.into();
        }
        if let Some(dir) = lookup("BASINKIT_STATIC_DIR") {
            self.static_dir = dir.into();
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
