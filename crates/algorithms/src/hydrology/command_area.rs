//! Command-area delineation
//!
//! A command area is the land served by a reservoir or treatment-plant
//! outlet. Three heuristics are offered, from cheapest to most physical:
//!
//! - **Fixed buffer**: every cell within a distance of the outlet.
//! - **Discharge buffer**: a corridor around the D8 path leaving the
//!   outlet, with a length proportional to the discharge.
//! - **Downslope**: cells reachable from the outlet without climbing,
//!   optionally expanded by a flood level above the area's rim.
//!
//! All three mark a `Raster<u8>` mask on the input grid: 0 outside, 1 for
//! the command area and 2 for flood expansion.

use super::{neighbor, trace_downstream, watershed, WatershedParams, D8_OFFSETS};
use crate::vector::polygonize;
use basinkit_core::raster::{GeoTransform, Raster, RasterElement};
use basinkit_core::vector::{Feature, FeatureCollection};
use basinkit_core::{Algorithm, Error, Result};
use ndarray::Array2;
use std::collections::VecDeque;
use std::fmt;
use tracing::debug;

/// Upper bound accepted for the flood level, in DEM units
pub const MAX_FLOOD_LEVEL: f64 = 10.0;

/// Mask value of the downslope (default) area
const DEFAULT_AREA: u8 = 1;
/// Mask value of flood-expansion cells
const FLOOD_EXPANSION: u8 = 2;

/// How a command area was delineated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAreaMethod {
    Downslope,
    FixedBuffer,
    DischargeBuffer,
    Upstream,
}

impl fmt::Display for CommandAreaMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandAreaMethod::Downslope => "downslope",
            CommandAreaMethod::FixedBuffer => "fixed_buffer",
            CommandAreaMethod::DischargeBuffer => "discharge_buffer",
            CommandAreaMethod::Upstream => "upstream",
        };
        f.write_str(name)
    }
}

/// A delineated command area and its cell statistics
#[derive(Debug, Clone)]
pub struct CommandArea {
    pub method: CommandAreaMethod,
    /// 0 outside, 1 default area, 2 flood expansion; nodata 0
    pub mask: Raster<u8>,
    pub flood_level: f64,
    pub default_cells: usize,
    pub expansion_cells: usize,
    pub total_cells: usize,
    /// Area of one cell in CRS units squared
    pub cell_area: f64,
    pub total_area: f64,
    /// Length of the traced D8 path, for the discharge buffer
    pub traced_length: Option<f64>,
}

impl CommandArea {
    fn from_mask(method: CommandAreaMethod, mask: Raster<u8>, flood_level: f64) -> Self {
        let default_cells = mask.data().iter().filter(|&&v| v == DEFAULT_AREA).count();
        let expansion_cells = mask.data().iter().filter(|&&v| v == FLOOD_EXPANSION).count();
        let total_cells = default_cells + expansion_cells;
        let cell_area = mask.cell_area();

        Self {
            method,
            mask,
            flood_level,
            default_cells,
            expansion_cells,
            total_cells,
            cell_area,
            total_area: total_cells as f64 * cell_area,
            traced_length: None,
        }
    }

    /// Polygons of the mask with `value`, `flood_level`, `area_sq_units`
    /// and `type` properties. `area_sq_units` is the total command area.
    pub fn to_features(&self) -> Result<FeatureCollection> {
        let polygons = polygonize(&self.mask)?;
        Ok(polygons
            .into_iter()
            .map(|(value, polygon)| {
                let kind = if value == FLOOD_EXPANSION {
                    "flood_expansion"
                } else {
                    "default"
                };
                Feature::new(polygon)
                    .with_property("value", value as i64)
                    .with_property("flood_level", self.flood_level)
                    .with_property("area_sq_units", self.total_area)
                    .with_property("type", kind)
                    .with_property("method", self.method.to_string())
            })
            .collect())
    }
}

/// File stem for downslope outputs, e.g. `command_area_flood_2.0m`
pub fn command_area_file_stem(flood_level: f64) -> String {
    format!("command_area_flood_{:?}m", flood_level)
}

fn outlet_cell<T: RasterElement>(raster: &Raster<T>, x: f64, y: f64) -> Result<(usize, usize)> {
    raster.cell_of(x, y).ok_or_else(|| {
        Error::invalid_parameter(
            "outlet",
            format!("({}, {})", x, y),
            "outlet lies outside the raster",
        )
    })
}

fn check_distance(name: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::invalid_parameter(name, value, "must be a positive distance"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Downslope area with flood expansion
// ---------------------------------------------------------------------------

/// Parameters for the downslope command area
#[derive(Debug, Clone, Copy, Default)]
pub struct DownslopeParams {
    /// Outlet easting in DEM CRS units
    pub outlet_x: f64,
    /// Outlet northing in DEM CRS units
    pub outlet_y: f64,
    /// Height above the area's rim that may still be flooded, in [0, 10]
    pub flood_level: f64,
}

/// Downslope command area algorithm
#[derive(Debug, Clone, Default)]
pub struct DownslopeArea;

impl Algorithm for DownslopeArea {
    type Input = Raster<f64>;
    type Output = CommandArea;
    type Params = DownslopeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Downslope Command Area"
    }

    fn description(&self) -> &'static str {
        "Cells reachable downhill from a reservoir outlet, with optional flood expansion"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        downslope_area(&input, params)
    }
}

/// Command area reachable from the outlet without going uphill.
///
/// An 8-connected flood fill from the outlet cell accepts a neighbor when
/// it is valid and not higher than the current cell (value 1). With a
/// positive `flood_level`, every unmarked neighbor of the area's rim that
/// lies at most `flood_level` above its rim cell is added (value 2), and
/// the downhill fill continues from those cells, also as 2.
pub fn downslope_area(dem: &Raster<f64>, params: DownslopeParams) -> Result<CommandArea> {
    let flood_level = params.flood_level;
    if !(0.0..=MAX_FLOOD_LEVEL).contains(&flood_level) {
        return Err(Error::invalid_parameter(
            "flood_level",
            flood_level,
            format!("must be between 0 and {}", MAX_FLOOD_LEVEL),
        ));
    }

    let (rows, cols) = dem.shape();
    let (orow, ocol) = outlet_cell(dem, params.outlet_x, params.outlet_y)?;
    if dem.is_nodata_at(orow, ocol)? {
        return Err(Error::invalid_parameter(
            "outlet",
            format!("({}, {})", params.outlet_x, params.outlet_y),
            "outlet falls on a nodata cell",
        ));
    }

    let elev = |r: usize, c: usize| -> Option<f64> {
        let z = unsafe { dem.get_unchecked(r, c) };
        (!dem.is_nodata(z)).then_some(z)
    };

    let mut mask = Array2::<u8>::zeros((rows, cols));
    mask[(orow, ocol)] = DEFAULT_AREA;
    let mut queue = VecDeque::from([(orow, ocol)]);
    fill_downhill(&mut mask, &mut queue, DEFAULT_AREA, &elev);

    if flood_level > 0.0 {
        let boundary: Vec<(usize, usize)> = mask
            .indexed_iter()
            .filter(|&(_, &v)| v == DEFAULT_AREA)
            .map(|(idx, _)| idx)
            .filter(|&(r, c)| {
                (0..D8_OFFSETS.len())
                    .filter_map(|i| neighbor(r, c, i, rows, cols))
                    .any(|n| mask[n] == 0)
            })
            .collect();
        debug!("downslope area rim: {} cells", boundary.len());

        for &(r, c) in &boundary {
            let Some(rim) = elev(r, c) else { continue };
            for i in 0..D8_OFFSETS.len() {
                let Some(n) = neighbor(r, c, i, rows, cols) else {
                    continue;
                };
                if mask[n] != 0 {
                    continue;
                }
                if let Some(z) = elev(n.0, n.1) {
                    if z <= rim + flood_level {
                        mask[n] = FLOOD_EXPANSION;
                        queue.push_back(n);
                    }
                }
            }
        }
        fill_downhill(&mut mask, &mut queue, FLOOD_EXPANSION, &elev);
    }

    let mut raster = dem.with_same_meta::<u8>(rows, cols);
    raster.set_nodata(Some(0));
    *raster.data_mut() = mask;

    let area = CommandArea::from_mask(CommandAreaMethod::Downslope, raster, flood_level);
    debug!(
        "downslope area: {} default + {} expansion cells",
        area.default_cells, area.expansion_cells
    );
    Ok(area)
}

/// Breadth-first fill over unmarked valid cells not higher than their parent
fn fill_downhill<F>(mask: &mut Array2<u8>, queue: &mut VecDeque<(usize, usize)>, value: u8, elev: &F)
where
    F: Fn(usize, usize) -> Option<f64>,
{
    let (rows, cols) = mask.dim();
    while let Some((r, c)) = queue.pop_front() {
        let Some(current) = elev(r, c) else { continue };
        for i in 0..D8_OFFSETS.len() {
            let Some(n) = neighbor(r, c, i, rows, cols) else {
                continue;
            };
            if mask[n] != 0 {
                continue;
            }
            if let Some(z) = elev(n.0, n.1) {
                if z <= current {
                    mask[n] = value;
                    queue.push_back(n);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Buffers
// ---------------------------------------------------------------------------

/// Parameters for the fixed-distance buffer
#[derive(Debug, Clone, Copy)]
pub struct FixedBufferParams {
    pub outlet_x: f64,
    pub outlet_y: f64,
    /// Buffer radius in CRS units
    pub distance: f64,
}

impl Default for FixedBufferParams {
    fn default() -> Self {
        Self {
            outlet_x: 0.0,
            outlet_y: 0.0,
            distance: 500.0,
        }
    }
}

/// Parameters for the discharge-scaled buffer
#[derive(Debug, Clone, Copy)]
pub struct DischargeBufferParams {
    pub outlet_x: f64,
    pub outlet_y: f64,
    /// Outlet discharge in m³/s
    pub discharge: f64,
    /// Stream length per unit of discharge, in CRS units
    pub length_per_discharge: f64,
    /// Cap on the traced stream length
    pub max_length: f64,
    /// Half-width of the corridor around the traced path
    pub width: f64,
}

impl Default for DischargeBufferParams {
    fn default() -> Self {
        Self {
            outlet_x: 0.0,
            outlet_y: 0.0,
            discharge: 0.0,
            length_per_discharge: 1000.0,
            max_length: 50_000.0,
            width: 500.0,
        }
    }
}

/// Mark every cell whose centre lies within `distance` of (x, y)
fn mark_within(mask: &mut Array2<u8>, transform: &GeoTransform, x: f64, y: f64, distance: f64) {
    let (rows, cols) = mask.dim();
    let (col_f, row_f) = transform.geo_to_pixel(x, y);
    if !col_f.is_finite() || !row_f.is_finite() {
        return;
    }
    let reach_c = distance / transform.pixel_width.abs() + 1.0;
    let reach_r = distance / transform.pixel_height.abs() + 1.0;

    let window = |centre: f64, reach: f64, len: usize| {
        let lo = (centre - reach).floor().max(0.0);
        let hi = (centre + reach).ceil().min(len as f64);
        (lo as usize, hi.max(lo) as usize)
    };
    let (r0, r1) = window(row_f, reach_r, rows);
    let (c0, c1) = window(col_f, reach_c, cols);

    let d2 = distance * distance;
    for r in r0..r1 {
        for c in c0..c1 {
            let (cx, cy) = transform.pixel_to_geo(c, r);
            if (cx - x).powi(2) + (cy - y).powi(2) <= d2 {
                mask[(r, c)] = DEFAULT_AREA;
            }
        }
    }
}

fn buffer_mask<T: RasterElement>(template: &Raster<T>) -> Raster<u8> {
    let (rows, cols) = template.shape();
    let mut mask = template.with_same_meta::<u8>(rows, cols);
    mask.set_nodata(Some(0));
    mask
}

/// Cells whose centre lies within `distance` of the outlet.
///
/// The outlet may lie outside the template; only grid cells are marked.
pub fn fixed_buffer_area<T: RasterElement>(
    template: &Raster<T>,
    params: FixedBufferParams,
) -> Result<CommandArea> {
    check_distance("distance", params.distance)?;

    let mut mask = buffer_mask(template);
    let transform = *mask.transform();
    mark_within(
        mask.data_mut(),
        &transform,
        params.outlet_x,
        params.outlet_y,
        params.distance,
    );

    Ok(CommandArea::from_mask(CommandAreaMethod::FixedBuffer, mask, 0.0))
}

/// Corridor of half-width `width` around the D8 path leaving the outlet.
///
/// The path length is `discharge · length_per_discharge`, capped at
/// `max_length`; the trace also ends at pits and at the grid edge. A zero
/// discharge degenerates to a buffer of `width` around the outlet cell.
pub fn discharge_buffer_area(
    flow_dir: &Raster<u8>,
    params: DischargeBufferParams,
) -> Result<CommandArea> {
    if !params.discharge.is_finite() || params.discharge < 0.0 {
        return Err(Error::invalid_parameter(
            "discharge",
            params.discharge,
            "must be zero or positive",
        ));
    }
    check_distance("width", params.width)?;
    check_distance("length_per_discharge", params.length_per_discharge)?;
    check_distance("max_length", params.max_length)?;

    let start = outlet_cell(flow_dir, params.outlet_x, params.outlet_y)?;
    let length = (params.discharge * params.length_per_discharge).min(params.max_length);
    let path = trace_downstream(flow_dir, start, length)?;
    debug!(
        "discharge buffer: target length {:.1}, traced {:.1} over {} cells",
        length,
        path.length,
        path.cells.len()
    );

    let mut mask = buffer_mask(flow_dir);
    let transform = *mask.transform();
    for &(r, c) in &path.cells {
        let (x, y) = transform.pixel_to_geo(c, r);
        mark_within(mask.data_mut(), &transform, x, y, params.width);
    }

    let mut area = CommandArea::from_mask(CommandAreaMethod::DischargeBuffer, mask, 0.0);
    area.traced_length = Some(path.length);
    Ok(area)
}

/// Catchment draining to the outlet cell, marked 1
pub fn upstream_area(flow_dir: &Raster<u8>, outlet_x: f64, outlet_y: f64) -> Result<CommandArea> {
    let outlet = outlet_cell(flow_dir, outlet_x, outlet_y)?;
    let basins = watershed(
        flow_dir,
        WatershedParams {
            pour_points: vec![outlet],
        },
    )?;

    let (rows, cols) = flow_dir.shape();
    let mut mask = flow_dir.with_same_meta::<u8>(rows, cols);
    mask.set_nodata(Some(0));
    *mask.data_mut() = basins.data().mapv(|b| u8::from(b == 1));

    Ok(CommandArea::from_mask(CommandAreaMethod::Upstream, mask, 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hydrology::flow_direction;
    use approx::assert_relative_eq;
    use basinkit_core::vector::AttributeValue;

    /// 5x5 valley: a basin at (2,2) rising by 1 per ring, 10 m cells,
    /// origin (0, 50)
    fn bowl() -> Raster<f64> {
        let mut dem = Raster::new(5, 5);
        dem.set_transform(GeoTransform::new(0.0, 50.0, 10.0, -10.0));
        for r in 0..5 {
            for c in 0..5 {
                let ring = (r as isize - 2).abs().max((c as isize - 2).abs());
                dem.set(r, c, 100.0 + ring as f64).unwrap();
            }
        }
        dem
    }

    fn centre_of(r: usize, c: usize) -> (f64, f64) {
        (c as f64 * 10.0 + 5.0, 50.0 - r as f64 * 10.0 - 5.0)
    }

    #[test]
    fn test_downslope_from_rim_runs_to_the_bottom() {
        let (x, y) = centre_of(0, 2);
        let area = downslope_area(
            &bowl(),
            DownslopeParams {
                outlet_x: x,
                outlet_y: y,
                flood_level: 0.0,
            },
        )
        .unwrap();

        // Every cell is at most as high as the outer ring, so the whole bowl fills
        assert_eq!(area.default_cells, 25);
        assert_eq!(area.expansion_cells, 0);
        assert_relative_eq!(area.total_area, 2500.0);
    }

    #[test]
    fn test_downslope_from_bottom_and_flood_expansion() {
        let (x, y) = centre_of(2, 2);
        let mut params = DownslopeParams {
            outlet_x: x,
            outlet_y: y,
            flood_level: 0.0,
        };

        let area = downslope_area(&bowl(), params).unwrap();
        assert_eq!(area.default_cells, 1);
        assert_eq!(area.total_cells, 1);

        params.flood_level = 1.0;
        let area = downslope_area(&bowl(), params).unwrap();
        // Ring 1 joins through the rim (101 <= 100 + 1); ring 2 is higher still
        assert_eq!(area.default_cells, 1);
        assert_eq!(area.expansion_cells, 8);
        assert_eq!(area.mask.get(1, 1).unwrap(), 2);
        assert_eq!(area.mask.get(0, 0).unwrap(), 0);
    }

    #[test]
    fn test_downslope_rejects_bad_input() {
        let dem = bowl();
        let bad_level = DownslopeParams {
            outlet_x: 25.0,
            outlet_y: 25.0,
            flood_level: 10.5,
        };
        assert!(downslope_area(&dem, bad_level).is_err());

        let outside = DownslopeParams {
            outlet_x: -5.0,
            outlet_y: 25.0,
            flood_level: 0.0,
        };
        assert!(matches!(
            downslope_area(&dem, outside),
            Err(Error::InvalidParameter { name: "outlet", .. })
        ));

        let mut holed = bowl();
        holed.set(2, 2, f64::NAN).unwrap();
        let on_nodata = DownslopeParams {
            outlet_x: 25.0,
            outlet_y: 25.0,
            flood_level: 0.0,
        };
        assert!(downslope_area(&holed, on_nodata).is_err());
    }

    #[test]
    fn test_nodata_blocks_the_fill() {
        let mut dem = bowl();
        dem.set_nodata(Some(-9999.0));
        for c in 0..5 {
            dem.set(1, c, -9999.0).unwrap();
        }
        let (x, y) = centre_of(0, 2);
        let area = downslope_area(
            &dem,
            DownslopeParams {
                outlet_x: x,
                outlet_y: y,
                flood_level: 0.0,
            },
        )
        .unwrap();
        assert_eq!(area.default_cells, 5);
    }

    #[test]
    fn test_fixed_buffer() {
        let template = bowl();
        let (x, y) = centre_of(2, 2);
        let area = fixed_buffer_area(
            &template,
            FixedBufferParams {
                outlet_x: x,
                outlet_y: y,
                distance: 10.0,
            },
        )
        .unwrap();
        // Centre plus its four edge neighbors
        assert_eq!(area.total_cells, 5);

        let far = fixed_buffer_area(
            &template,
            FixedBufferParams {
                outlet_x: -5.0,
                outlet_y: 40.0,
                distance: 12.0,
            },
        )
        .unwrap();
        // Only (0,0) and (1,0) are within reach of a point west of the grid
        assert_eq!(far.total_cells, 2);

        let zero = FixedBufferParams {
            distance: 0.0,
            ..FixedBufferParams::default()
        };
        assert!(fixed_buffer_area(&template, zero).is_err());
    }

    #[test]
    fn test_discharge_buffer_follows_the_stream() {
        let mut dem: Raster<f64> = Raster::new(3, 10);
        dem.set_transform(GeoTransform::new(0.0, 30.0, 10.0, -10.0));
        for r in 0..3 {
            for c in 0..10 {
                let valley = if r == 1 { 0.0 } else { 5.0 };
                dem.set(r, c, 100.0 - c as f64 + valley).unwrap();
            }
        }
        let fdir = flow_direction(&dem).unwrap();

        let params = DischargeBufferParams {
            outlet_x: 5.0,
            outlet_y: 15.0,
            discharge: 0.5,
            length_per_discharge: 80.0,
            width: 1.0,
            ..DischargeBufferParams::default()
        };
        let area = discharge_buffer_area(&fdir, params).unwrap();
        assert_relative_eq!(area.traced_length.unwrap(), 40.0);
        assert_eq!(area.total_cells, 5);
        assert_eq!(area.mask.get(1, 4).unwrap(), 1);
        assert_eq!(area.mask.get(1, 5).unwrap(), 0);

        let still = DischargeBufferParams {
            discharge: 0.0,
            ..params
        };
        let area = discharge_buffer_area(&fdir, still).unwrap();
        assert_eq!(area.total_cells, 1);

        let negative = DischargeBufferParams {
            discharge: -1.0,
            ..params
        };
        assert!(discharge_buffer_area(&fdir, negative).is_err());
    }

    #[test]
    fn test_upstream_area() {
        let mut dem: Raster<f64> = Raster::new(5, 5);
        dem.set_transform(GeoTransform::new(0.0, 50.0, 10.0, -10.0));
        for r in 0..5 {
            for c in 0..5 {
                dem.set(r, c, (5 - r) as f64 * 10.0).unwrap();
            }
        }
        let fdir = flow_direction(&dem).unwrap();
        let (x, y) = centre_of(4, 2);
        let area = upstream_area(&fdir, x, y).unwrap();
        assert_eq!(area.total_cells, 5);
        assert_eq!(area.method, CommandAreaMethod::Upstream);
    }

    #[test]
    fn test_features_carry_area_properties() {
        let (x, y) = centre_of(2, 2);
        let area = downslope_area(
            &bowl(),
            DownslopeParams {
                outlet_x: x,
                outlet_y: y,
                flood_level: 1.0,
            },
        )
        .unwrap();

        let features = area.to_features().unwrap();
        assert_eq!(features.len(), 2);
        for f in features.iter() {
            assert_eq!(
                f.get_property("area_sq_units"),
                Some(&AttributeValue::Float(900.0))
            );
        }
        let kinds: Vec<_> = features
            .iter()
            .filter_map(|f| match f.get_property("type") {
                Some(AttributeValue::String(s)) => Some(s.as_str()),
                _ => None,
            })
            .collect();
        assert!(kinds.contains(&"default") && kinds.contains(&"flood_expansion"));
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(command_area_file_stem(2.0), "command_area_flood_2.0m");
        assert_eq!(command_area_file_stem(0.5), "command_area_flood_0.5m");
    }
}
