//! Polygon rasterization onto a template grid

use basinkit_core::raster::{Raster, RasterElement};
use basinkit_core::{Error, Result};
use geo::{BoundingRect, Coord, Intersects, Point, Polygon, Rect, Relate};

/// Parameters for rasterization
#[derive(Debug, Clone)]
pub struct RasterizeParams {
    /// Value written to covered cells
    pub burn_value: u8,
    /// Burn every cell the polygon touches instead of cells whose centre
    /// falls inside it
    pub all_touched: bool,
}

impl Default for RasterizeParams {
    fn default() -> Self {
        Self {
            burn_value: 1,
            all_touched: false,
        }
    }
}

/// Burn polygons into a `Raster<u8>` on the template's grid.
///
/// Uncovered cells are 0, which is also the nodata value. In centre mode a
/// cell centre on a polygon edge counts as inside. In all-touched mode a
/// cell counts when its square overlaps the polygon interior; sharing
/// only an edge or a corner does not.
pub fn rasterize<T: RasterElement>(
    polygons: &[Polygon<f64>],
    template: &Raster<T>,
    params: &RasterizeParams,
) -> Result<Raster<u8>> {
    if params.burn_value == 0 {
        return Err(Error::invalid_parameter(
            "burn_value",
            0,
            "0 is reserved for uncovered cells",
        ));
    }

    let (rows, cols) = template.shape();
    let transform = *template.transform();
    let mut output = template.with_same_meta::<u8>(rows, cols);
    output.set_nodata(Some(0));

    for polygon in polygons {
        let Some(bbox) = polygon.bounding_rect() else {
            continue;
        };
        let Some((r0, r1, c0, c1)) = cell_window(template, &bbox) else {
            continue;
        };

        let data = output.data_mut();
        for r in r0..r1 {
            for c in c0..c1 {
                if data[(r, c)] == params.burn_value {
                    continue;
                }
                let covered = if params.all_touched {
                    let (x0, y0) = transform.pixel_to_geo_corner(c, r);
                    let (x1, y1) = transform.pixel_to_geo_corner(c + 1, r + 1);
                    let cell = Rect::new(Coord { x: x0, y: y0 }, Coord { x: x1, y: y1 });
                    let relation = polygon.relate(&cell);
                    relation.is_intersects() && !relation.is_touches()
                } else {
                    let (x, y) = transform.pixel_to_geo(c, r);
                    polygon.intersects(&Point::new(x, y))
                };
                if covered {
                    data[(r, c)] = params.burn_value;
                }
            }
        }
    }

    Ok(output)
}

/// Row and column ranges (half-open) of the cells under a bounding box
fn cell_window<T: RasterElement>(
    template: &Raster<T>,
    bbox: &Rect<f64>,
) -> Option<(usize, usize, usize, usize)> {
    let (rows, cols) = template.shape();
    let (ca, ra) = template.geo_to_pixel(bbox.min().x, bbox.min().y);
    let (cb, rb) = template.geo_to_pixel(bbox.max().x, bbox.max().y);
    if ![ca, ra, cb, rb].iter().all(|v| v.is_finite()) {
        return None;
    }

    let clamp = |lo: f64, hi: f64, len: usize| -> Option<(usize, usize)> {
        let start = lo.min(hi).floor().max(0.0);
        let end = (lo.max(hi).floor() + 1.0).min(len as f64);
        (end > start).then_some((start as usize, end as usize))
    };
    let (r0, r1) = clamp(ra, rb, rows)?;
    let (c0, c1) = clamp(ca, cb, cols)?;
    Some((r0, r1, c0, c1))
}
