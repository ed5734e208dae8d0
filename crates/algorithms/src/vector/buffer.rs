//! Buffer operations
//!
//! Circles around points and corridors around polylines, approximated as
//! polygons. Used to draw buffer command areas as vectors.

use geo::{LineString, Point, Polygon};
use std::f64::consts::PI;

/// Parameters for buffer operations
#[derive(Debug, Clone)]
pub struct BufferParams {
    /// Buffer distance in CRS units
    pub distance: f64,
    /// Number of segments to approximate curves (default: 16)
    pub segments: usize,
}

impl Default for BufferParams {
    fn default() -> Self {
        Self {
            distance: 500.0,
            segments: 16,
        }
    }
}

/// Circular buffer around a point, with `segments` vertices (at least 4)
pub fn buffer_points(point: &Point<f64>, params: &BufferParams) -> Polygon<f64> {
    let n = params.segments.max(4);
    let r = params.distance.abs();
    let (cx, cy) = (point.x(), point.y());

    let mut coords: Vec<(f64, f64)> = (0..n)
        .map(|i| {
            let angle = 2.0 * PI * i as f64 / n as f64;
            (cx + r * angle.cos(), cy + r * angle.sin())
        })
        .collect();
    coords.push((cx + r, cy));

    Polygon::new(LineString::from(coords), vec![])
}

/// One circular buffer per input coordinate
pub fn buffer_geometry(points: &[(f64, f64)], params: &BufferParams) -> Vec<Polygon<f64>> {
    points
        .iter()
        .map(|&(x, y)| buffer_points(&Point::new(x, y), params))
        .collect()
}

/// Corridor around a polyline: a circle at every vertex plus a rectangle
/// of half-width `distance` along every segment. The parts overlap and are
/// not dissolved.
pub fn buffer_polyline(points: &[(f64, f64)], params: &BufferParams) -> Vec<Polygon<f64>> {
    let r = params.distance.abs();
    let mut parts = buffer_geometry(points, params);

    for pair in points.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        let len = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
        if len == 0.0 {
            continue;
        }
        // Unit normal scaled to the half-width
        let (nx, ny) = (-(y1 - y0) / len * r, (x1 - x0) / len * r);
        parts.push(Polygon::new(
            LineString::from(vec![
                (x0 - nx, y0 - ny),
                (x1 - nx, y1 - ny),
                (x1 + nx, y1 + ny),
                (x0 + nx, y0 + ny),
                (x0 - nx, y0 - ny),
            ]),
            vec![],
        ));
    }

    parts
}
