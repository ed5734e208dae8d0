//! D8 flow direction
//!
//! Flow direction encoding:
//! ```text
//!   4  3  2
//!   5  0  1
//!   6  7  8
//! ```
//! 0 = pit, flat or nodata; 1-8 = direction to the steepest downslope neighbor

use super::{neighbor, D8_DIST};
use crate::maybe_rayon::*;
use basinkit_core::raster::Raster;
use basinkit_core::{Algorithm, Error, Result};
use ndarray::Array2;

/// Flow direction algorithm (D8)
#[derive(Debug, Clone, Default)]
pub struct FlowDirection;

impl Algorithm for FlowDirection {
    type Input = Raster<f64>;
    type Output = Raster<u8>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flow Direction (D8)"
    }

    fn description(&self) -> &'static str {
        "D8 flow direction from a DEM, used to trace reservoir outflow paths"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        flow_direction(&input)
    }
}

/// D8 flow direction of every cell.
///
/// The drop to each neighbor is divided by the step length (cell size, or
/// cell size · √2 on diagonals) and the steepest positive drop wins. Ties
/// keep the lowest code. Nodata neighbors are never targets.
pub fn flow_direction(dem: &Raster<f64>) -> Result<Raster<u8>> {
    let (rows, cols) = dem.shape();
    let cell_size = dem.cell_size();
    if cell_size.is_nan() || cell_size <= 0.0 {
        return Err(Error::invalid_parameter(
            "cell_size",
            cell_size,
            "DEM geotransform must have a positive pixel size",
        ));
    }

    let codes: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![0u8; cols];

            for (col, code) in row_data.iter_mut().enumerate() {
                let center = unsafe { dem.get_unchecked(row, col) };
                if dem.is_nodata(center) {
                    continue;
                }

                let mut max_drop = 0.0_f64;
                for idx in 0..8 {
                    let Some((nr, nc)) = neighbor(row, col, idx, rows, cols) else {
                        continue;
                    };
                    let z = unsafe { dem.get_unchecked(nr, nc) };
                    if dem.is_nodata(z) {
                        continue;
                    }

                    let drop = (center - z) / (D8_DIST[idx] * cell_size);
                    if drop > max_drop {
                        max_drop = drop;
                        *code = (idx + 1) as u8;
                    }
                }
            }

            row_data
        })
        .collect();

    let mut output = dem.with_same_meta::<u8>(rows, cols);
    output.set_nodata(Some(0));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), codes).map_err(|e| Error::Other(e.to_string()))?;

    Ok(output)
}
