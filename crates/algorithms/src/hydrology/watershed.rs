//! Watershed delineation
//!
//! Delineates catchments from a D8 flow direction raster, either upstream
//! of given pour points or for every outlet of the grid.

use super::{neighbor, opposite_dir, D8_OFFSETS};
use basinkit_core::raster::Raster;
use basinkit_core::{Algorithm, Error, Result};
use ndarray::Array2;
use std::collections::VecDeque;

/// Parameters for watershed delineation
#[derive(Debug, Clone, Default)]
pub struct WatershedParams {
    /// Pour points as (row, col). Empty means every outlet seeds a basin.
    pub pour_points: Vec<(usize, usize)>,
}

/// Watershed delineation algorithm
#[derive(Debug, Clone, Default)]
pub struct Watershed;

impl Algorithm for Watershed {
    type Input = Raster<u8>;
    type Output = Raster<i32>;
    type Params = WatershedParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Watershed"
    }

    fn description(&self) -> &'static str {
        "Delineate catchments from D8 flow direction"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        watershed(&input, params)
    }
}

/// Whether the cell drains to a pit or off the grid
fn is_outlet(dir: u8, row: usize, col: usize, rows: usize, cols: usize) -> bool {
    match dir {
        1..=8 => neighbor(row, col, (dir - 1) as usize, rows, cols).is_none(),
        _ => true,
    }
}

/// Label catchments on a D8 flow direction raster.
///
/// With pour points, basin `i + 1` holds every cell draining to pour point
/// `i`; pour points outside the grid are an error. Without pour points the
/// grid is partitioned, one basin per outlet. Returns `Raster<i32>` with
/// 0 for unassigned cells.
pub fn watershed(flow_dir: &Raster<u8>, params: WatershedParams) -> Result<Raster<i32>> {
    let (rows, cols) = flow_dir.shape();
    let mut basins = Array2::<i32>::zeros((rows, cols));
    let mut queue: VecDeque<(usize, usize)> = VecDeque::new();

    if params.pour_points.is_empty() {
        let mut basin_id: i32 = 0;
        for row in 0..rows {
            for col in 0..cols {
                let dir = unsafe { flow_dir.get_unchecked(row, col) };
                if is_outlet(dir, row, col, rows, cols) {
                    basin_id += 1;
                    basins[(row, col)] = basin_id;
                    queue.push_back((row, col));
                }
            }
        }
    } else {
        for (id, &(row, col)) in params.pour_points.iter().enumerate() {
            if row >= rows || col >= cols {
                return Err(Error::IndexOutOfBounds { row, col, rows, cols });
            }
            basins[(row, col)] = (id + 1) as i32;
            queue.push_back((row, col));
        }
    }

    // A neighbor flows INTO (row, col) when its code points back at us
    while let Some((row, col)) = queue.pop_front() {
        let basin_id = basins[(row, col)];

        for idx in 0..D8_OFFSETS.len() {
            let Some((nr, nc)) = neighbor(row, col, idx, rows, cols) else {
                continue;
            };
            if basins[(nr, nc)] != 0 {
                continue;
            }

            let neighbor_dir = unsafe { flow_dir.get_unchecked(nr, nc) };
            if neighbor_dir != 0 && neighbor_dir == opposite_dir((idx + 1) as u8) {
                basins[(nr, nc)] = basin_id;
                queue.push_back((nr, nc));
            }
        }
    }

    let mut output = flow_dir.with_same_meta::<i32>(rows, cols);
    output.set_nodata(Some(0));
    *output.data_mut() = basins;

    Ok(output)
}
