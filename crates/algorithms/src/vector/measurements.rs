//! Geometric measurements: area and perimeter

use geo::{Area as GeoArea, Euclidean, Geometry, Length, Polygon};

/// Unsigned area of a polygonal geometry in CRS units squared.
///
/// Geographic CRSs give square degrees; command areas should be computed
/// on a projected grid.
pub fn area(geom: &Geometry<f64>) -> f64 {
    match geom {
        Geometry::Polygon(p) => p.unsigned_area(),
        Geometry::MultiPolygon(mp) => mp.unsigned_area(),
        Geometry::Rect(r) => r.unsigned_area(),
        _ => 0.0,
    }
}

fn ring_lengths(p: &Polygon<f64>) -> f64 {
    let ext = p.exterior().length::<Euclidean>();
    let int: f64 = p.interiors().iter().map(|r| r.length::<Euclidean>()).sum();
    ext + int
}

/// Total length of exterior and interior rings
pub fn perimeter(geom: &Geometry<f64>) -> f64 {
    match geom {
        Geometry::Polygon(p) => ring_lengths(p),
        Geometry::MultiPolygon(mp) => mp.0.iter().map(ring_lengths).sum(),
        Geometry::Rect(r) => ring_lengths(&r.to_polygon()),
        _ => 0.0,
    }
}
