//! Input dataset catalog
//!
//! Each dataset lives in its own subdirectory of the input root as a set
//! of GeoTIFF files, one per time step, with the date embedded in the
//! file name. Built cubes are named `{basin}_{quantity}_{source}` and are
//! recognised again by substring patterns.

use crate::error::{Result, WorkflowError};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

/// Time step of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalResolution {
    Daily,
    Monthly,
    Static,
}

impl fmt::Display for TemporalResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TemporalResolution::Daily => "daily",
            TemporalResolution::Monthly => "monthly",
            TemporalResolution::Static => "static",
        };
        f.write_str(name)
    }
}

/// One input dataset of the water-accounting run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatasetSpec {
    pub key: &'static str,
    /// Directory under the input root, `/`-separated
    pub subdir: &'static str,
    pub quantity: &'static str,
    pub source: &'static str,
    pub units: &'static str,
    pub temporal_resolution: TemporalResolution,
}

impl DatasetSpec {
    pub fn cube_name(&self, basin: &str) -> String {
        format!("{}_{}_{}", basin, self.quantity, self.source)
    }

    pub fn dir(&self, input_dir: &Path) -> PathBuf {
        self.subdir
            .split('/')
            .fold(input_dir.to_path_buf(), |path, part| path.join(part))
    }
}

/// Built-in dataset table
pub const DATASETS: &[DatasetSpec] = &[
    DatasetSpec {
        key: "P",
        subdir: "P/Monthly",
        quantity: "P",
        source: "CHIRPS",
        units: "mm/month",
        temporal_resolution: TemporalResolution::Monthly,
    },
    DatasetSpec {
        key: "dailyP",
        subdir: "P/Daily",
        quantity: "dailyP",
        source: "CHIRPS",
        units: "mm/d",
        temporal_resolution: TemporalResolution::Daily,
    },
    DatasetSpec {
        key: "ET",
        subdir: "ET",
        quantity: "ETa",
        source: "V6",
        units: "mm/month",
        temporal_resolution: TemporalResolution::Monthly,
    },
    DatasetSpec {
        key: "LAI",
        subdir: "LAI",
        quantity: "LAI",
        source: "MOD15",
        units: "None",
        temporal_resolution: TemporalResolution::Monthly,
    },
    DatasetSpec {
        key: "SMsat",
        subdir: "ThetaSat",
        quantity: "SMsat",
        source: "HiHydroSoils",
        units: "None",
        temporal_resolution: TemporalResolution::Monthly,
    },
    DatasetSpec {
        key: "Ari",
        subdir: "Aridity",
        quantity: "Aridity",
        source: "CHIRPS_GLEAM",
        units: "None",
        temporal_resolution: TemporalResolution::Monthly,
    },
    DatasetSpec {
        key: "LU",
        subdir: "LUWA",
        quantity: "LU",
        source: "WA",
        units: "None",
        temporal_resolution: TemporalResolution::Static,
    },
    DatasetSpec {
        key: "ProbaV",
        subdir: "NDM",
        quantity: "NDM",
        source: "ProbaV",
        units: "None",
        temporal_resolution: TemporalResolution::Monthly,
    },
    DatasetSpec {
        key: "ETref",
        subdir: "ETref",
        quantity: "ETref",
        source: "L1_RET",
        units: "None",
        temporal_resolution: TemporalResolution::Monthly,
    },
];

/// Look up a dataset by key
pub fn dataset(key: &str) -> Option<&'static DatasetSpec> {
    DATASETS.iter().find(|d| d.key == key)
}

/// Suffix of the monthly interception cube
pub const INTERCEPTION_CUBE: &str = "i_monthly";
/// Suffix of the monthly rainy-days cube
pub const RAINY_DAYS_CUBE: &str = "nRD_monthly";

/// One input GeoTIFF
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub path: PathBuf,
    /// `None` for static layers
    pub timestamp: Option<NaiveDate>,
}

/// Files found for one dataset, ordered by timestamp then name
#[derive(Debug, Clone)]
pub struct DatasetFiles {
    pub spec: &'static DatasetSpec,
    pub files: Vec<InputFile>,
}

static FULL_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{4})[._-](\d{2})[._-](\d{2})").expect("full date pattern")
});
static COMPACT_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\D)(\d{4})(\d{2})(\d{2})(?:\D|$)").expect("compact date pattern"));
static YEAR_MONTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\D)(\d{4})[._-](\d{2})(?:\D|$)").expect("year-month pattern"));
static YEAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\D)(\d{4})(?:\D|$)").expect("year pattern"));

fn plausible_date(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let year: i32 = year.parse().ok()?;
    if !(1900..=2100).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}

/// Date embedded in a file name.
///
/// Recognises `YYYY.MM.DD`, `YYYY-MM-DD`, `YYYY_MM_DD`, `YYYYMMDD`,
/// `YYYY.MM` (first of the month) and `YYYY` (January 1st), in that order.
pub fn parse_timestamp(file_name: &str) -> Option<NaiveDate> {
    let stem = file_name
        .rsplit_once('.')
        .filter(|(_, ext)| ext.eq_ignore_ascii_case("tif") || ext.eq_ignore_ascii_case("tiff"))
        .map_or(file_name, |(stem, _)| stem);

    FULL_DATE
        .captures_iter(stem)
        .find_map(|c| plausible_date(&c[1], &c[2], &c[3]))
        .or_else(|| {
            COMPACT_DATE
                .captures_iter(stem)
                .find_map(|c| plausible_date(&c[1], &c[2], &c[3]))
        })
        .or_else(|| {
            YEAR_MONTH
                .captures_iter(stem)
                .find_map(|c| plausible_date(&c[1], &c[2], "01"))
        })
        .or_else(|| {
            YEAR.captures_iter(stem)
                .find_map(|c| plausible_date(&c[1], "01", "01"))
        })
}

fn is_tiff(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
}

/// GeoTIFF files of one directory, ordered by timestamp then name
pub fn list_rasters(dir: &Path) -> Result<Vec<InputFile>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || !is_tiff(&path) {
            continue;
        }
        let timestamp = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_timestamp);
        files.push(InputFile { path, timestamp });
    }
    files.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then_with(|| a.path.file_name().cmp(&b.path.file_name()))
    });
    Ok(files)
}

/// Find the input files of every built-in dataset.
///
/// Datasets without files are returned with an empty list; finding no
/// file at all is an error.
pub fn scan_inputs(input_dir: &Path) -> Result<Vec<DatasetFiles>> {
    if !input_dir.is_dir() {
        return Err(WorkflowError::missing(format!(
            "input directory {}",
            input_dir.display()
        )));
    }

    let mut found = Vec::with_capacity(DATASETS.len());
    for spec in DATASETS {
        let files = list_rasters(&spec.dir(input_dir))?;
        debug!("{}: {} files in {}", spec.key, files.len(), spec.subdir);
        found.push(DatasetFiles { spec, files });
    }

    let total: usize = found.iter().map(|d| d.files.len()).sum();
    if total == 0 {
        return Err(WorkflowError::missing(format!(
            "no TIFF files found in any input directory under {}",
            input_dir.display()
        )));
    }
    Ok(found)
}

/// Substring patterns mapping cube names to keys; first match wins
const CUBE_PATTERNS: &[(&str, &str)] = &[
    ("_dailyP_", "dailyP"),
    ("_P_", "P"),
    ("_ETa_", "ET"),
    ("_ETref_", "ETref"),
    ("_LAI_", "LAI"),
    ("_SMsat_", "SMsat"),
    ("_Aridity_", "Ari"),
    ("_LU_", "LU"),
    ("_NDM_", "ProbaV"),
    ("i_monthly", "I"),
    ("nRD_monthly", "NRD"),
];

/// Key of a cube directory name
pub fn classify_cube(name: &str) -> Option<&'static str> {
    CUBE_PATTERNS
        .iter()
        .find(|(pattern, _)| name.contains(pattern))
        .map(|&(_, key)| key)
}

/// Cube directories of a run, by key
#[derive(Debug, Clone, Default)]
pub struct CubeSet {
    pub cubes: BTreeMap<&'static str, PathBuf>,
}

impl CubeSet {
    pub fn get(&self, key: &str) -> Option<&Path> {
        self.cubes.get(key).map(PathBuf::as_path)
    }

    pub fn missing<'k>(&self, required: &[&'k str]) -> Vec<&'k str> {
        required
            .iter()
            .copied()
            .filter(|k| !self.cubes.contains_key(k))
            .collect()
    }

    /// Fail with [`WorkflowError::MissingInput`] naming every absent key
    pub fn require(&self, required: &[&str]) -> Result<()> {
        let missing = self.missing(required);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(WorkflowError::missing(format!(
                "cubes for keys: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Classify the cube directories (those holding a `manifest.json`) of `dir`
pub fn classify_cubes(dir: &Path) -> Result<CubeSet> {
    if !dir.is_dir() {
        return Err(WorkflowError::missing(format!(
            "cube directory {}",
            dir.display()
        )));
    }

    let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.join(crate::cube::MANIFEST_FILE).is_file())
        .collect();
    entries.sort();

    let mut set = CubeSet::default();
    for path in entries {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(key) = classify_cube(name) {
            debug!("cube {} -> {}", name, key);
            set.cubes.entry(key).or_insert(path);
        }
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cube_name() {
        let et = dataset("ET").unwrap();
        assert_eq!(et.cube_name("Awash"), "Awash_ETa_V6");
        assert_eq!(dataset("ProbaV").unwrap().cube_name("Awash"), "Awash_NDM_ProbaV");
        assert_eq!(
            dataset("dailyP").unwrap().dir(Path::new("in")),
            Path::new("in").join("P").join("Daily")
        );
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let d = |y, m, day| NaiveDate::from_ymd_opt(y, m, day);
        assert_eq!(parse_timestamp("chirps-v2.0.2019.03.17.tif"), d(2019, 3, 17));
        assert_eq!(parse_timestamp("ETa_2020-11-01.tif"), d(2020, 11, 1));
        assert_eq!(parse_timestamp("LAI_2018_07_04.tif"), d(2018, 7, 4));
        assert_eq!(parse_timestamp("L1_AETI_20210215.tif"), d(2021, 2, 15));
        assert_eq!(parse_timestamp("P_CHIRPS_mm_2019.06.tif"), d(2019, 6, 1));
        assert_eq!(parse_timestamp("ThetaSat_2015.tif"), d(2015, 1, 1));
        assert_eq!(parse_timestamp("landcover.tif"), None);
        assert_eq!(parse_timestamp("tile_0042.tif"), None);
    }

    #[test]
    fn test_classify_precedence() {
        assert_eq!(classify_cube("Awash_dailyP_CHIRPS"), Some("dailyP"));
        assert_eq!(classify_cube("Awash_P_CHIRPS"), Some("P"));
        assert_eq!(classify_cube("Awash_ETa_V6"), Some("ET"));
        assert_eq!(classify_cube("Awash_ETref_L1_RET"), Some("ETref"));
        assert_eq!(classify_cube("Awash_i_monthly"), Some("I"));
        assert_eq!(classify_cube("Awash_nRD_monthly"), Some("NRD"));
        assert_eq!(classify_cube("notes"), None);
    }

    #[test]
    fn test_scan_inputs_orders_files() {
        let dir = tempfile::tempdir().unwrap();
        let monthly = dir.path().join("P").join("Monthly");
        std::fs::create_dir_all(&monthly).unwrap();
        for name in ["P_2019.02.01.tif", "P_2019.01.01.tif", "readme.txt"] {
            std::fs::write(monthly.join(name), b"").unwrap();
        }

        let found = scan_inputs(dir.path()).unwrap();
        assert_eq!(found.len(), DATASETS.len());
        let p = found.iter().find(|d| d.spec.key == "P").unwrap();
        let names: Vec<_> = p
            .files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["P_2019.01.01.tif", "P_2019.02.01.tif"]);
        assert!(found.iter().find(|d| d.spec.key == "ET").unwrap().files.is_empty());
    }

    #[test]
    fn test_scan_inputs_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            scan_inputs(dir.path()),
            Err(WorkflowError::MissingInput(_))
        ));
        assert!(scan_inputs(&dir.path().join("absent")).is_err());
    }

    #[test]
    fn test_cube_set_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["Awash_P_CHIRPS", "Awash_ETa_V6", "stray"] {
            let cube = dir.path().join(name);
            std::fs::create_dir_all(&cube).unwrap();
            std::fs::write(cube.join(crate::cube::MANIFEST_FILE), b"{}").unwrap();
        }
        let set = classify_cubes(dir.path()).unwrap();
        assert!(set.get("P").is_some());
        assert_eq!(set.missing(&["P", "ET", "I"]), vec!["I"]);
        let err = set.require(&["P", "LAI", "I"]).unwrap_err();
        assert!(err.to_string().contains("LAI, I"));
    }
}
