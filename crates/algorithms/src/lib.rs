//! # basinkit algorithms
//!
//! Raster and vector algorithms for basin water accounting.
//!
//! ## Categories
//!
//! - **hydrology**: D8 flow direction, watersheds, downstream tracing,
//!   command areas
//! - **vector**: buffers, rasterization, polygonization, measurements
//! - **statistics**: zonal and masked aggregates
//! - **water**: rainy days, interception, green/blue ET, units, land use

pub mod hydrology;
pub(crate) mod maybe_rayon;
pub mod statistics;
pub mod vector;
pub mod water;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::hydrology::{
        command_area_file_stem, discharge_buffer_area, downslope_area, fixed_buffer_area,
        flow_direction, trace_downstream, upstream_area, watershed, CommandArea,
        CommandAreaMethod, DischargeBufferParams, DownslopeArea, DownslopeParams,
        FixedBufferParams, FlowDirection, Watershed, WatershedParams,
    };
    pub use crate::statistics::{masked_mean, masked_sum, zonal_statistics, ZonalResult};
    pub use crate::vector::{
        area, buffer_geometry, buffer_points, buffer_polyline, perimeter, polygonize, rasterize,
        BufferParams, RasterizeParams,
    };
    pub use crate::water::{
        et_split, interception, rainy_days, reclassify_land_use, LandUseOverrides, LandUseTable,
        UnitConversion,
    };
    pub use basinkit_core::prelude::*;
}
