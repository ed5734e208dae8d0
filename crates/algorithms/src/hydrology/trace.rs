//! Downstream tracing along D8 pointers

use super::{neighbor, D8_DIST};
use basinkit_core::raster::Raster;
use basinkit_core::{Error, Result};
use std::collections::HashSet;

/// Cells visited while following flow directions downstream
#[derive(Debug, Clone, PartialEq)]
pub struct DownstreamPath {
    /// Ordered (row, col) cells, starting with the start cell
    pub cells: Vec<(usize, usize)>,
    /// Distance travelled in CRS units
    pub length: f64,
}

/// Follow D8 codes from `start` for at most `max_length` CRS units.
///
/// Each step adds `cell_size` (or `cell_size·√2` on diagonals). The walk
/// stops before a step that would exceed `max_length`, at a pit, at the
/// grid edge, or when a cell would be visited twice.
pub fn trace_downstream(
    flow_dir: &Raster<u8>,
    start: (usize, usize),
    max_length: f64,
) -> Result<DownstreamPath> {
    let (rows, cols) = flow_dir.shape();
    let (mut row, mut col) = start;
    if row >= rows || col >= cols {
        return Err(Error::IndexOutOfBounds { row, col, rows, cols });
    }
    if max_length.is_nan() || max_length < 0.0 {
        return Err(Error::invalid_parameter(
            "max_length",
            max_length,
            "must be zero or positive",
        ));
    }

    let cell_size = flow_dir.cell_size();
    let mut cells = vec![start];
    let mut seen: HashSet<(usize, usize)> = HashSet::from([start]);
    let mut length = 0.0;

    loop {
        let dir = flow_dir.get(row, col)?;
        if !(1..=8).contains(&dir) {
            break;
        }
        let idx = (dir - 1) as usize;
        let step = D8_DIST[idx] * cell_size;
        if length + step > max_length {
            break;
        }
        let Some(next) = neighbor(row, col, idx, rows, cols) else {
            break;
        };
        if !seen.insert(next) {
            break;
        }
        length += step;
        cells.push(next);
        (row, col) = next;
    }

    Ok(DownstreamPath { cells, length })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use basinkit_core::GeoTransform;

    fn grid(codes: Vec<u8>, rows: usize, cols: usize, cell: f64) -> Raster<u8> {
        let mut r = Raster::from_vec(codes, rows, cols).unwrap();
        r.set_transform(GeoTransform::new(0.0, rows as f64 * cell, cell, -cell));
        r
    }

    #[test]
    fn test_stops_at_max_length() {
        let fdir = grid(vec![1; 6], 1, 6, 10.0);
        let path = trace_downstream(&fdir, (0, 0), 25.0).unwrap();
        assert_eq!(path.cells, vec![(0, 0), (0, 1), (0, 2)]);
        assert_relative_eq!(path.length, 20.0);
    }

    #[test]
    fn test_stops_at_pit_and_edge() {
        let fdir = grid(vec![1, 1, 0, 1], 1, 4, 1.0);
        let path = trace_downstream(&fdir, (0, 0), 100.0).unwrap();
        assert_eq!(path.cells.len(), 3);

        let path = trace_downstream(&fdir, (0, 3), 100.0).unwrap();
        assert_eq!(path.cells, vec![(0, 3)]);
        assert_relative_eq!(path.length, 0.0);
    }

    #[test]
    fn test_diagonal_steps_and_loop_guard() {
        // (0,0) -> SE (1,1) -> W (1,0) -> N (0,0) loop
        let fdir = grid(vec![8, 0, 3, 5], 2, 2, 1.0);
        let path = trace_downstream(&fdir, (0, 0), 100.0).unwrap();
        assert_eq!(path.cells, vec![(0, 0), (1, 1), (1, 0)]);
        assert_relative_eq!(path.length, std::f64::consts::SQRT_2 + 1.0);
    }
}
