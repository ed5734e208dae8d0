//! Rainy days, canopy interception and the green/blue ET split

use super::cellwise;
use basinkit_core::raster::Raster;
use basinkit_core::{Error, Result};

/// Number of days with precipitation above zero, per cell.
///
/// Nodata days are ignored; a cell that is nodata on every day stays NaN.
pub fn rainy_days(daily: &[Raster<f64>]) -> Result<Raster<f64>> {
    if daily.is_empty() {
        return Err(Error::invalid_parameter(
            "daily",
            0,
            "at least one daily precipitation raster is required",
        ));
    }
    let inputs: Vec<&Raster<f64>> = daily.iter().collect();
    cellwise(&inputs, |days| {
        let mut valid = false;
        let mut wet = 0.0;
        for &p in days {
            if p.is_nan() {
                continue;
            }
            valid = true;
            if p > 0.0 {
                wet += 1.0;
            }
        }
        if valid {
            wet
        } else {
            f64::NAN
        }
    })
}

/// Interception for one cell, in the units of `p`.
///
/// `I = LAI · (1 − 1 / (1 + (P/nRD) · (1 − e^(−0.5·LAI)) / LAI)) · nRD`,
/// which never exceeds P.
pub(crate) fn interception_depth(lai: f64, p: f64, nrd: f64) -> f64 {
    if lai.is_nan() || p.is_nan() || nrd.is_nan() {
        return f64::NAN;
    }
    if nrd <= 0.0 || lai <= 0.0 || p <= 0.0 {
        return 0.0;
    }
    let cover = (1.0 - (-0.5 * lai).exp()) / lai;
    lai * (1.0 - 1.0 / (1.0 + (p / nrd) * cover)) * nrd
}

/// Monthly canopy interception from LAI, monthly precipitation and the
/// number of rainy days in the month
pub fn interception(
    lai: &Raster<f64>,
    p: &Raster<f64>,
    nrd: &Raster<f64>,
) -> Result<Raster<f64>> {
    cellwise(&[lai, p, nrd], |v| interception_depth(v[0], v[1], v[2]))
}

/// Split ET into green and blue components.
///
/// Green ET is what effective rainfall (`P − I`) can supply,
/// `green = min(ET, max(P − I, 0))`; blue is the remainder.
pub fn et_split(
    et: &Raster<f64>,
    p: &Raster<f64>,
    i: &Raster<f64>,
) -> Result<(Raster<f64>, Raster<f64>)> {
    let green = cellwise(&[et, p, i], |v| {
        if v.iter().any(|x| x.is_nan()) {
            return f64::NAN;
        }
        v[0].min((v[1] - v[2]).max(0.0))
    })?;
    let blue = cellwise(&[et, &green], |v| {
        if v.iter().any(|x| x.is_nan()) {
            return f64::NAN;
        }
        (v[0] - v[1]).max(0.0)
    })?;
    Ok((green, blue))
}
