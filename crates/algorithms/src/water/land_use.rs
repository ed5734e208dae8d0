//! Land-cover to land-use (LUWA) reclassification
//!
//! Land-cover classes (e.g. WaPOR LCC codes) are mapped to the four
//! water-accounting land-use categories. Protected areas and reservoirs
//! come from separate masks and override the table.

use basinkit_core::raster::{Raster, RasterElement};
use basinkit_core::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Protected land use
pub const PROTECTED: u8 = 1;
/// Utilized land use (natural, low management)
pub const UTILIZED: u8 = 2;
/// Modified land use (rainfed agriculture, plantations)
pub const MODIFIED: u8 = 3;
/// Managed water use (irrigation, urban, reservoirs)
pub const MANAGED: u8 = 4;

#[derive(Debug, Deserialize)]
struct TableRow {
    lcc: i64,
    luwa: u8,
}

/// Lookup from land-cover code to land-use class
#[derive(Debug, Clone, PartialEq)]
pub struct LandUseTable {
    classes: BTreeMap<i64, u8>,
    /// Class of codes missing from the table
    pub default_class: u8,
    pub protected_class: u8,
    pub reservoir_class: u8,
}

impl LandUseTable {
    pub fn new(classes: BTreeMap<i64, u8>) -> Self {
        Self {
            classes,
            default_class: UTILIZED,
            protected_class: PROTECTED,
            reservoir_class: MANAGED,
        }
    }

    /// Mapping of the WaPOR level-1 land-cover legend
    pub fn wapor() -> Self {
        let mut classes = BTreeMap::new();
        for code in [20, 30, 60, 70, 80, 90] {
            classes.insert(code, UTILIZED);
        }
        for code in 111..=126 {
            classes.insert(code, UTILIZED);
        }
        classes.insert(41, MODIFIED);
        classes.insert(43, MODIFIED);
        classes.insert(42, MANAGED);
        classes.insert(50, MANAGED);
        Self::new(classes)
    }

    /// Read an `lcc,luwa` CSV. Class 0 is reserved for nodata.
    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;

        let mut classes = BTreeMap::new();
        for (line, row) in reader.deserialize::<TableRow>().enumerate() {
            let row = row?;
            if row.luwa == 0 {
                return Err(Error::parse(
                    format!("{}:{}", path.display(), line + 2),
                    format!("land-use class 0 for code {} is reserved for nodata", row.lcc),
                ));
            }
            classes.insert(row.lcc, row.luwa);
        }
        debug!("land-use table {}: {} codes", path.display(), classes.len());

        Ok(Self::new(classes))
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Land-use class of a land-cover code
    pub fn class_of(&self, code: i64) -> u8 {
        self.classes.get(&code).copied().unwrap_or(self.default_class)
    }
}

/// Masks that override the table; non-zero cells win
#[derive(Debug, Clone, Copy, Default)]
pub struct LandUseOverrides<'a> {
    pub protected: Option<&'a Raster<u8>>,
    pub reservoir: Option<&'a Raster<u8>>,
}

/// Reclassify a land-cover raster to land-use classes.
///
/// Reservoir cells take precedence over protected cells, which take
/// precedence over the table. Land-cover nodata stays 0, the output nodata.
pub fn reclassify_land_use<T: RasterElement>(
    lcc: &Raster<T>,
    table: &LandUseTable,
    overrides: LandUseOverrides<'_>,
) -> Result<Raster<u8>> {
    for mask in [overrides.protected, overrides.reservoir].into_iter().flatten() {
        if !lcc.same_grid(mask) {
            let (er, ec) = lcc.shape();
            let (ar, ac) = mask.shape();
            return Err(Error::SizeMismatch { er, ec, ar, ac });
        }
    }

    let (rows, cols) = lcc.shape();
    let mut output = lcc.with_same_meta::<u8>(rows, cols);
    output.set_nodata(Some(0));

    let covers = |mask: Option<&Raster<u8>>, idx: (usize, usize)| {
        mask.is_some_and(|m| m.data()[idx] != 0)
    };

    for (idx, out) in output.data_mut().indexed_iter_mut() {
        let code = lcc.data()[idx];
        if lcc.is_nodata(code) {
            continue;
        }
        let Some(code) = code.to_f64() else { continue };
        *out = if covers(overrides.reservoir, idx) {
            table.reservoir_class
        } else if covers(overrides.protected, idx) {
            table.protected_class
        } else {
            table.class_of(code as i64)
        };
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "lcc,luwa\n42, 4\n41,3").unwrap();
        let table = LandUseTable::read_csv(file.path()).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.class_of(42), MANAGED);
        assert_eq!(table.class_of(999), UTILIZED);
    }

    #[test]
    fn test_zero_class_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "lcc,luwa\n42,0").unwrap();
        assert!(matches!(
            LandUseTable::read_csv(file.path()),
            Err(Error::Parse { .. })
        ));
    }

    #[test]
    fn test_overrides_and_nodata() {
        let mut lcc: Raster<u8> = Raster::from_vec(vec![42, 41, 20, 0], 2, 2).unwrap();
        lcc.set_nodata(Some(0));
        let protected = Raster::from_vec(vec![0u8, 1, 1, 1], 2, 2).unwrap();
        let reservoir = Raster::from_vec(vec![0u8, 0, 1, 1], 2, 2).unwrap();

        let luwa = reclassify_land_use(
            &lcc,
            &LandUseTable::wapor(),
            LandUseOverrides {
                protected: Some(&protected),
                reservoir: Some(&reservoir),
            },
        )
        .unwrap();

        assert_eq!(luwa.data().as_slice().unwrap(), &[MANAGED, PROTECTED, MANAGED, 0]);
        assert_eq!(luwa.nodata(), Some(0));
    }

    #[test]
    fn test_override_grid_mismatch() {
        let lcc: Raster<u8> = Raster::new(2, 2);
        let mask: Raster<u8> = Raster::new(3, 3);
        let overrides = LandUseOverrides {
            protected: Some(&mask),
            reservoir: None,
        };
        assert!(reclassify_land_use(&lcc, &LandUseTable::wapor(), overrides).is_err());
    }
}
