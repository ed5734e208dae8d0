//! Statistical analysis algorithms for raster data
//!
//! - **zonal**: statistics per zone of a class raster
//! - **masked**: sums and means inside a basin mask

mod masked;
mod zonal;

pub use masked::{masked_mean, masked_sum};
pub use zonal::{zonal_statistics, ZonalResult};
