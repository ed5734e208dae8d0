//! Vector algorithms
//!
//! - Buffer: circles around points, corridors around polylines
//! - Rasterize: burn polygons onto a template grid
//! - Polygonize: trace mask regions back to polygons
//! - Area / perimeter: geometric measurements

mod buffer;
mod measurements;
mod polygonize;
mod rasterize;

pub use buffer::{buffer_geometry, buffer_points, buffer_polyline, BufferParams};
pub use measurements::{area, perimeter};
pub use polygonize::polygonize;
pub use rasterize::{rasterize, RasterizeParams};
