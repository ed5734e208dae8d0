//! Zonal statistics
//!
//! Statistics of a value raster per zone of an integer-valued zone raster,
//! e.g. evapotranspiration per land-use class.

use basinkit_core::raster::{Raster, RasterElement};
use basinkit_core::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// Statistics of one zone
#[derive(Debug, Clone, Serialize)]
pub struct ZonalResult {
    pub zone_id: i64,
    pub count: usize,
    pub sum: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub median: f64,
}

pub(crate) fn check_same_shape<A: RasterElement, B: RasterElement>(
    a: &Raster<A>,
    b: &Raster<B>,
) -> Result<()> {
    let (er, ec) = a.shape();
    let (ar, ac) = b.shape();
    if (er, ec) != (ar, ac) {
        return Err(Error::SizeMismatch { er, ec, ar, ac });
    }
    Ok(())
}

/// Statistics per zone, keyed and ordered by zone id.
///
/// Zone 0, zone nodata and value nodata cells are skipped. Zone values are
/// truncated to integers.
pub fn zonal_statistics<Z: RasterElement>(
    values: &Raster<f64>,
    zones: &Raster<Z>,
) -> Result<BTreeMap<i64, ZonalResult>> {
    check_same_shape(values, zones)?;

    let mut zone_values: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
    for (&z, &v) in zones.data().iter().zip(values.data().iter()) {
        if zones.is_nodata(z) || values.is_nodata(v) {
            continue;
        }
        let Some(zone) = z.to_f64().map(|z| z as i64) else {
            continue;
        };
        if zone == 0 {
            continue;
        }
        zone_values.entry(zone).or_default().push(v);
    }

    let results = zone_values
        .into_iter()
        .map(|(zone_id, mut vals)| {
            let count = vals.len();
            let sum: f64 = vals.iter().sum();
            let mean = sum / count as f64;
            let var = vals.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / count as f64;

            vals.sort_by(|a, b| a.total_cmp(b));
            let median = if count % 2 == 0 {
                (vals[count / 2 - 1] + vals[count / 2]) / 2.0
            } else {
                vals[count / 2]
            };

            let result = ZonalResult {
                zone_id,
                count,
                sum,
                mean,
                std_dev: var.sqrt(),
                min: vals[0],
                max: vals[count - 1],
                median,
            };
            (zone_id, result)
        })
        .collect();

    Ok(results)
}
