//! Hydrological analysis algorithms
//!
//! D8 routing on a DEM and the command-area heuristics built on it:
//! - Flow direction: D8 single flow direction
//! - Watershed: upstream catchments from pour points
//! - Downstream tracing along D8 pointers
//! - Command areas: downslope flood fill, fixed buffer, discharge-scaled buffer

mod command_area;
mod flow_direction;
mod trace;
mod watershed;

pub use command_area::{
    command_area_file_stem, discharge_buffer_area, downslope_area, fixed_buffer_area,
    upstream_area, CommandArea, CommandAreaMethod, DischargeBufferParams, DownslopeArea,
    DownslopeParams, FixedBufferParams,
};
pub use flow_direction::{flow_direction, FlowDirection};
pub use trace::{trace_downstream, DownstreamPath};
pub use watershed::{watershed, Watershed, WatershedParams};

/// D8 neighbor offsets: (row_offset, col_offset)
/// Indexed to match the direction encoding (1=E, 2=NE, ..., 8=SE)
pub(crate) const D8_OFFSETS: [(isize, isize); 8] = [
    (0, 1),   // 1: E
    (-1, 1),  // 2: NE
    (-1, 0),  // 3: N
    (-1, -1), // 4: NW
    (0, -1),  // 5: W
    (1, -1),  // 6: SW
    (1, 0),   // 7: S
    (1, 1),   // 8: SE
];

/// Step length of each D8 direction in cell units
pub(crate) const D8_DIST: [f64; 8] = [
    1.0,
    std::f64::consts::SQRT_2,
    1.0,
    std::f64::consts::SQRT_2,
    1.0,
    std::f64::consts::SQRT_2,
    1.0,
    std::f64::consts::SQRT_2,
];

/// Neighbor of (row, col) at offset index `idx`, if inside a rows x cols grid
#[inline]
pub(crate) fn neighbor(
    row: usize,
    col: usize,
    idx: usize,
    rows: usize,
    cols: usize,
) -> Option<(usize, usize)> {
    let (dr, dc) = D8_OFFSETS[idx];
    let nr = row as isize + dr;
    let nc = col as isize + dc;
    if nr < 0 || nc < 0 || nr >= rows as isize || nc >= cols as isize {
        return None;
    }
    Some((nr as usize, nc as usize))
}

/// Opposite D8 code (E <-> W, NE <-> SW, ...); 0 stays 0
pub(crate) fn opposite_dir(dir: u8) -> u8 {
    if dir == 0 {
        return 0;
    }
    ((dir - 1 + 4) % 8) + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opposite_direction() {
        assert_eq!(opposite_dir(1), 5); // E → W
        assert_eq!(opposite_dir(3), 7); // N → S
        assert_eq!(opposite_dir(2), 6); // NE → SW
        assert_eq!(opposite_dir(8), 4); // SE → NW
        assert_eq!(opposite_dir(0), 0);
    }

    #[test]
    fn test_neighbor_clips_to_grid() {
        assert_eq!(neighbor(0, 0, 0, 3, 3), Some((0, 1)));
        assert_eq!(neighbor(0, 0, 2, 3, 3), None);
        assert_eq!(neighbor(2, 2, 7, 3, 3), None);
        assert_eq!(neighbor(1, 1, 3, 3, 3), Some((0, 0)));
    }
}
