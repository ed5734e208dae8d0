//! In-memory basin data loaded from the workflow output directory

use crate::error::{DashboardError, Result};
use basinkit_core::timeseries::BasinSeries;
use basinkit_core::vector::{read_feature_collection, to_geojson_value};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Tables written next to the series that are not basins themselves
const NON_SERIES_MARKERS: [&str; 2] = ["_summary_", "_et_by_landuse_"];

/// One basin: its monthly series and, when present, its boundary
#[derive(Debug, Clone)]
pub struct Basin {
    pub name: String,
    pub series: BasinSeries,
    /// GeoJSON FeatureCollection
    pub boundary: Option<Value>,
}

/// Listing entry for a basin
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BasinSummary {
    pub name: String,
    pub unit: String,
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
    pub months: usize,
    pub has_boundary: bool,
}

impl Basin {
    pub fn summary(&self) -> BasinSummary {
        let years = self.series.years();
        BasinSummary {
            name: self.name.clone(),
            unit: self.series.unit.clone(),
            first_year: years.map(|(first, _)| first),
            last_year: years.map(|(_, last)| last),
            months: self.series.records.len(),
            has_boundary: self.boundary.is_some(),
        }
    }
}

/// Basins by name
#[derive(Debug, Clone, Default)]
pub struct BasinStore {
    basins: BTreeMap<String, Basin>,
}

fn basin_name(file_name: &str) -> Option<&str> {
    let stem = file_name.strip_suffix(".csv")?;
    if NON_SERIES_MARKERS.iter().any(|m| stem.contains(m)) {
        return None;
    }
    Some(stem.strip_suffix("_timeseries").unwrap_or(stem))
}

fn read_boundary(path: &Path) -> Option<Value> {
    if !path.is_file() {
        return None;
    }
    let value = read_feature_collection(path)
        .and_then(|(collection, crs)| to_geojson_value(&collection, crs.as_ref()));
    match value {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("ignoring boundary {}: {}", path.display(), e);
            None
        }
    }
}

impl BasinStore {
    /// Load every `<name>_timeseries.csv` / `<name>.csv` in `data_dir`.
    /// Unreadable series are logged and skipped.
    pub fn load<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        if !data_dir.is_dir() {
            return Err(DashboardError::not_found(format!(
                "data directory {}",
                data_dir.display()
            )));
        }

        let mut files: Vec<_> = std::fs::read_dir(data_dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        files.sort();

        let mut store = Self::default();
        for path in files {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(name) = basin_name(file_name) else {
                continue;
            };
            if store.basins.contains_key(name) {
                debug!("{} already loaded, ignoring {}", name, file_name);
                continue;
            }
            let series = match BasinSeries::read_csv(&path, name) {
                Ok(series) => series,
                Err(e) => {
                    warn!("skipping {}: {}", path.display(), e);
                    continue;
                }
            };
            let boundary = read_boundary(&data_dir.join(format!("{}.geojson", name)));
            store.insert(Basin {
                name: name.to_string(),
                series,
                boundary,
            });
        }
        info!(
            "loaded {} basins from {}",
            store.basins.len(),
            data_dir.display()
        );
        Ok(store)
    }

    pub fn insert(&mut self, basin: Basin) {
        self.basins.insert(basin.name.clone(), basin);
    }

    /// Label every series with `unit`
    pub fn with_unit(mut self, unit: &str) -> Self {
        for basin in self.basins.values_mut() {
            basin.series.unit = unit.to_string();
        }
        self
    }

    /// Basin names in sorted order
    pub fn names(&self) -> Vec<&str> {
        self.basins.keys().map(String::as_str).collect()
    }

    pub fn get(&self, name: &str) -> Result<&Basin> {
        self.basins
            .get(name)
            .ok_or_else(|| DashboardError::not_found(format!("unknown basin '{}'", name)))
    }

    pub fn summaries(&self) -> Vec<BasinSummary> {
        self.basins.values().map(Basin::summary).collect()
    }

    pub fn len(&self) -> usize {
        self.basins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.basins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basin_name() {
        assert_eq!(basin_name("Awash_timeseries.csv"), Some("Awash"));
        assert_eq!(basin_name("Jordan.csv"), Some("Jordan"));
        assert_eq!(basin_name("Awash_summary_2019.csv"), None);
        assert_eq!(basin_name("Awash_et_by_landuse_2019.csv"), None);
        assert_eq!(basin_name("Awash.geojson"), None);
    }

    #[test]
    fn test_load_skips_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Jordan.csv"),
            "date,precipitation,inflow,et,storage,outflow\n2019-01,10,1,6,4,1\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("Broken.csv"), "nothing,useful\n1,2\n").unwrap();

        let store = BasinStore::load(dir.path()).unwrap().with_unit("km3");
        assert_eq!(store.names(), vec!["Jordan"]);
        let jordan = store.get("Jordan").unwrap().summary();
        assert_eq!(jordan.first_year, Some(2019));
        assert_eq!(jordan.unit, "km3");
        assert!(!jordan.has_boundary);
        assert!(matches!(store.get("Nile"), Err(DashboardError::NotFound(_))));
    }

    #[test]
    fn test_missing_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(BasinStore::load(dir.path().join("absent")).is_err());
    }
}
