//! Data cubes: a directory of masked GeoTIFF slices plus `manifest.json`
//!
//! ```text
//! Awash_P_CHIRPS/
//!   manifest.json
//!   t0000.tif
//!   t0001.tif
//!   ...
//! ```

use crate::catalog::{DatasetSpec, InputFile, TemporalResolution};
use crate::error::{Result, WorkflowError};
use basinkit_core::io::{read_geotiff, write_geotiff};
use basinkit_core::raster::{Raster, RasterElement};
use basinkit_core::{Error, CRS};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const MANIFEST_FILE: &str = "manifest.json";

/// Description of a cube and its slices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubeManifest {
    pub name: String,
    pub quantity: String,
    pub source: String,
    pub units: String,
    pub temporal_resolution: TemporalResolution,
    pub dims: Vec<String>,
    /// One per slice; `None` for static slices
    pub timestamps: Vec<Option<NaiveDate>>,
    /// Slice file names relative to the cube directory
    pub files: Vec<String>,
    /// GDAL coefficients of the shared grid
    pub transform: [f64; 6],
    pub rows: usize,
    pub cols: usize,
    #[serde(default)]
    pub crs: Option<CRS>,
}

impl CubeManifest {
    /// Empty manifest for a dataset cube on `grid`
    pub fn for_dataset<T: RasterElement>(
        spec: &DatasetSpec,
        basin: &str,
        grid: &Raster<T>,
    ) -> Self {
        Self::new(
            spec.cube_name(basin),
            spec.quantity,
            spec.source,
            spec.units,
            spec.temporal_resolution,
            grid,
        )
    }

    /// Empty manifest on `grid`
    pub fn new<T: RasterElement>(
        name: impl Into<String>,
        quantity: impl Into<String>,
        source: impl Into<String>,
        units: impl Into<String>,
        temporal_resolution: TemporalResolution,
        grid: &Raster<T>,
    ) -> Self {
        let (rows, cols) = grid.shape();
        Self {
            name: name.into(),
            quantity: quantity.into(),
            source: source.into(),
            units: units.into(),
            temporal_resolution,
            dims: vec!["time".into(), "y".into(), "x".into()],
            timestamps: Vec::new(),
            files: Vec::new(),
            transform: grid.transform().to_gdal(),
            rows,
            cols,
            crs: grid.crs().cloned(),
        }
    }
}

/// Incremental cube writer
pub struct CubeWriter {
    dir: PathBuf,
    manifest: CubeManifest,
    grid: Raster<u8>,
}

impl CubeWriter {
    /// Create (or replace) `parent/<manifest.name>`
    pub fn create<T: RasterElement>(
        parent: &Path,
        manifest: CubeManifest,
        grid: &Raster<T>,
    ) -> Result<Self> {
        let dir = parent.join(&manifest.name);
        if dir.join(MANIFEST_FILE).exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        std::fs::create_dir_all(&dir)?;
        let (rows, cols) = grid.shape();
        Ok(Self {
            dir,
            manifest,
            grid: grid.with_same_meta::<u8>(rows, cols),
        })
    }

    /// Append a slice; it must share the cube grid
    pub fn push(&mut self, timestamp: Option<NaiveDate>, slice: &Raster<f64>) -> Result<()> {
        check_grid(&self.grid, slice)?;
        let file = format!("t{:04}.tif", self.manifest.files.len());
        let mut slice = slice.clone();
        slice.set_crs(self.manifest.crs.clone());
        write_geotiff(&slice, self.dir.join(&file), None)?;
        self.manifest.timestamps.push(timestamp);
        self.manifest.files.push(file);
        Ok(())
    }

    /// Write the manifest and open the cube
    pub fn finish(self) -> Result<Cube> {
        let text = serde_json::to_string_pretty(&self.manifest)?;
        std::fs::write(self.dir.join(MANIFEST_FILE), text)?;
        debug!(
            "cube {}: {} slices",
            self.manifest.name,
            self.manifest.files.len()
        );
        Ok(Cube {
            dir: self.dir,
            manifest: self.manifest,
        })
    }
}

fn check_grid<T, U>(expected: &Raster<T>, actual: &Raster<U>) -> Result<()>
where
    T: RasterElement,
    U: RasterElement,
{
    if expected.same_grid(actual) {
        return Ok(());
    }
    let (er, ec) = expected.shape();
    let (ar, ac) = actual.shape();
    Err(Error::SizeMismatch { er, ec, ar, ac }.into())
}

/// Mask a slice to the basin: nodata and cells outside the mask become NaN
pub fn mask_slice(slice: &Raster<f64>, mask: &Raster<u8>) -> Result<Raster<f64>> {
    check_grid(mask, slice)?;
    let mut out = slice.clone();
    for (value, &inside) in out.data_mut().iter_mut().zip(mask.data().iter()) {
        if inside == 0 || slice.is_nodata(*value) {
            *value = f64::NAN;
        }
    }
    out.set_nodata(Some(f64::NAN));
    Ok(out)
}

/// An opened cube
#[derive(Debug, Clone)]
pub struct Cube {
    dir: PathBuf,
    manifest: CubeManifest,
}

impl Cube {
    /// Build a cube from input files. Every input must share the
    /// template grid; values outside `mask` become NaN.
    pub fn build(
        spec: &DatasetSpec,
        basin: &str,
        files: &[InputFile],
        template: &Raster<f64>,
        mask: &Raster<u8>,
        out_dir: &Path,
    ) -> Result<Cube> {
        check_grid(template, mask)?;
        let manifest = CubeManifest::for_dataset(spec, basin, template);
        let mut writer = CubeWriter::create(out_dir, manifest, template)?;

        for file in files {
            let raster: Raster<f64> = read_geotiff(&file.path, None)?;
            check_grid(template, &raster)
                .inspect_err(|_| warn!("{} is not on the template grid", file.path.display()))?;
            let masked = mask_slice(&raster, mask)?;
            writer.push(file.timestamp, &masked)?;
        }
        writer.finish()
    }

    /// Open a cube directory
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Cube> {
        let dir = dir.as_ref().to_path_buf();
        let path = dir.join(MANIFEST_FILE);
        let text = std::fs::read_to_string(&path).map_err(|e| {
            WorkflowError::missing(format!("{}: {}", path.display(), e))
        })?;
        let manifest: CubeManifest = serde_json::from_str(&text)?;
        if manifest.files.len() != manifest.timestamps.len() {
            return Err(WorkflowError::invalid(format!(
                "{}: {} files but {} timestamps",
                path.display(),
                manifest.files.len(),
                manifest.timestamps.len()
            )));
        }
        Ok(Cube { dir, manifest })
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn manifest(&self) -> &CubeManifest {
        &self.manifest
    }

    pub fn len(&self) -> usize {
        self.manifest.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.files.is_empty()
    }

    pub fn timestamps(&self) -> &[Option<NaiveDate>] {
        &self.manifest.timestamps
    }

    /// Read slice `index`
    pub fn slice(&self, index: usize) -> Result<Raster<f64>> {
        let file = self.manifest.files.get(index).ok_or_else(|| {
            WorkflowError::invalid(format!(
                "slice {} out of range for cube {} ({} slices)",
                index,
                self.name(),
                self.len()
            ))
        })?;
        let mut raster: Raster<f64> = read_geotiff(self.dir.join(file), None)?;
        if raster.crs().is_none() {
            raster.set_crs(self.manifest.crs.clone());
        }
        Ok(raster)
    }

    /// Slices dated in the given month
    pub fn month_indices(&self, year: i32, month: u32) -> Vec<usize> {
        self.timestamps()
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_some_and(|d| d.year() == year && d.month() == month))
            .map(|(i, _)| i)
            .collect()
    }

    /// First slice dated in the given month
    pub fn month_index(&self, year: i32, month: u32) -> Option<usize> {
        self.month_indices(year, month).into_iter().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::dataset;
    use basinkit_core::GeoTransform;

    fn grid(values: Vec<f64>) -> Raster<f64> {
        let mut r = Raster::from_vec(values, 2, 2).unwrap();
        r.set_transform(GeoTransform::new(0.0, 20.0, 10.0, -10.0));
        r.set_nodata(Some(-9999.0));
        r
    }

    fn mask() -> Raster<u8> {
        let mut m = Raster::from_vec(vec![1u8, 1, 0, 1], 2, 2).unwrap();
        m.set_transform(GeoTransform::new(0.0, 20.0, 10.0, -10.0));
        m
    }

    #[test]
    fn test_mask_slice() {
        let masked = mask_slice(&grid(vec![1.0, -9999.0, 3.0, 4.0]), &mask()).unwrap();
        let v = masked.data();
        assert_eq!(v[[0, 0]], 1.0);
        assert!(v[[0, 1]].is_nan());
        assert!(v[[1, 0]].is_nan());
        assert_eq!(v[[1, 1]], 4.0);
    }

    #[test]
    fn test_build_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = dir.path().join("in");
        std::fs::create_dir_all(&inputs).unwrap();
        let mut files = Vec::new();
        for (i, name) in ["P_2019.01.tif", "P_2019.02.tif"].iter().enumerate() {
            let path = inputs.join(name);
            write_geotiff(&grid(vec![i as f64; 4]), &path, None).unwrap();
            files.push(InputFile {
                path,
                timestamp: NaiveDate::from_ymd_opt(2019, i as u32 + 1, 1),
            });
        }

        let spec = dataset("P").unwrap();
        let template = grid(vec![0.0; 4]);
        let built = Cube::build(spec, "Awash", &files, &template, &mask(), dir.path()).unwrap();
        assert_eq!(built.name(), "Awash_P_CHIRPS");

        let cube = Cube::open(dir.path().join("Awash_P_CHIRPS")).unwrap();
        assert_eq!(cube.len(), 2);
        assert_eq!(cube.manifest().files, vec!["t0000.tif", "t0001.tif"]);
        assert_eq!(cube.month_index(2019, 2), Some(1));
        assert_eq!(cube.month_index(2020, 1), None);

        let second = cube.slice(1).unwrap();
        assert_eq!(second.get(0, 0).unwrap(), 1.0);
        assert!(second.get(1, 0).unwrap().is_nan());
        assert!(cube.slice(2).is_err());
    }

    #[test]
    fn test_build_rejects_other_grid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ET_2019.01.tif");
        write_geotiff(&Raster::<f64>::filled(3, 3, 1.0), &path, None).unwrap();
        let files = vec![InputFile {
            path,
            timestamp: None,
        }];
        let result = Cube::build(
            dataset("ET").unwrap(),
            "Awash",
            &files,
            &grid(vec![0.0; 4]),
            &mask(),
            dir.path(),
        );
        assert!(matches!(
            result,
            Err(WorkflowError::Core(Error::SizeMismatch { .. }))
        ));
    }

    #[test]
    fn test_open_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Cube::open(dir.path()),
            Err(WorkflowError::MissingInput(_))
        ));
    }
}
