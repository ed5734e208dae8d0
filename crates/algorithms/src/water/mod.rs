//! Water-accounting kernels
//!
//! Per-cell building blocks of the basin water balance:
//! - Rainy days from daily precipitation
//! - Canopy interception (WA+ formulation)
//! - Green/blue evapotranspiration split
//! - Depth to volume unit conversion
//! - Land-cover to land-use reclassification

mod interception;
pub mod land_use;
mod units;

pub use interception::{et_split, interception, rainy_days};
pub use land_use::{reclassify_land_use, LandUseOverrides, LandUseTable};
pub use units::UnitConversion;

use crate::maybe_rayon::*;
use basinkit_core::raster::Raster;
use basinkit_core::{Error, Result};
use ndarray::Array2;

/// Apply `f` cell by cell to rasters sharing one grid. Output nodata is NaN.
pub(crate) fn cellwise<F>(inputs: &[&Raster<f64>], f: F) -> Result<Raster<f64>>
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    let first = inputs
        .first()
        .ok_or_else(|| Error::Algorithm("no input rasters".into()))?;
    let (rows, cols) = first.shape();
    for other in &inputs[1..] {
        if !first.same_grid(*other) {
            let (ar, ac) = other.shape();
            return Err(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar,
                ac,
            });
        }
    }

    let values: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut cell = vec![0.0; inputs.len()];
            (0..cols)
                .map(|col| {
                    for (slot, r) in cell.iter_mut().zip(inputs) {
                        let v = unsafe { r.get_unchecked(row, col) };
                        *slot = if r.is_nodata(v) { f64::NAN } else { v };
                    }
                    f(&cell)
                })
                .collect::<Vec<_>>()
        })
        .collect();

    let mut output = first.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(f64::NAN));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), values).map_err(|e| Error::Other(e.to_string()))?;
    Ok(output)
}
