//! Aggregates over a basin mask

use super::zonal::check_same_shape;
use basinkit_core::raster::Raster;
use basinkit_core::Result;

fn masked_values<'a>(
    values: &'a Raster<f64>,
    mask: &'a Raster<u8>,
) -> Result<impl Iterator<Item = f64> + 'a> {
    check_same_shape(values, mask)?;
    Ok(values
        .data()
        .iter()
        .zip(mask.data().iter())
        .filter(move |&(&v, &m)| m != 0 && !values.is_nodata(v))
        .map(|(&v, _)| v))
}

/// Sum of valid values where the mask is non-zero
pub fn masked_sum(values: &Raster<f64>, mask: &Raster<u8>) -> Result<f64> {
    Ok(masked_values(values, mask)?.sum())
}

/// Mean of valid values where the mask is non-zero, `None` when there are none
pub fn masked_mean(values: &Raster<f64>, mask: &Raster<u8>) -> Result<Option<f64>> {
    let (sum, count) = masked_values(values, mask)?.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    Ok((count > 0).then(|| sum / count as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_masked_aggregates() {
        let values = Raster::from_vec(vec![1.0, 2.0, f64::NAN, 4.0], 2, 2).unwrap();
        let mask = Raster::from_vec(vec![1u8, 0, 1, 1], 2, 2).unwrap();

        assert_relative_eq!(masked_sum(&values, &mask).unwrap(), 5.0);
        assert_relative_eq!(masked_mean(&values, &mask).unwrap().unwrap(), 2.5);
    }

    #[test]
    fn test_empty_mask_and_mismatch() {
        let values = Raster::filled(2, 2, 3.0);
        let empty: Raster<u8> = Raster::new(2, 2);
        assert_eq!(masked_mean(&values, &empty).unwrap(), None);
        assert_relative_eq!(masked_sum(&values, &empty).unwrap(), 0.0);

        let other: Raster<u8> = Raster::new(3, 2);
        assert!(masked_sum(&values, &other).is_err());
    }
}
