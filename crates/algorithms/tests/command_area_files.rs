//! End-to-end command-area and land-use runs through GeoTIFF and GeoJSON
//! files, the way the CLI drives them.

use basinkit_algorithms::hydrology::{command_area_file_stem, downslope_area, DownslopeParams};
use basinkit_algorithms::vector::{area, polygonize, rasterize, RasterizeParams};
use basinkit_algorithms::water::{reclassify_land_use, LandUseOverrides, LandUseTable};
use basinkit_core::io::{read_geotiff, write_geotiff, GeoTiffOptions};
use basinkit_core::vector::{read_feature_collection, write_feature_collection, AttributeValue};
use basinkit_core::{GeoTransform, Raster, CRS};
use geo::{LineString, Polygon};

/// 20x20 DEM, 30 m cells in UTM 37N, draining west to east with a 2 m
/// bank along row 5
fn valley() -> Raster<f64> {
    let mut dem = Raster::new(20, 20);
    dem.set_transform(GeoTransform::new(500_000.0, 1_000_600.0, 30.0, -30.0));
    dem.set_crs(Some(CRS::from_epsg(32637)));
    for row in 0..20 {
        for col in 0..20 {
            let bank = if row == 5 { 2.0 } else { 0.0 };
            dem.set(row, col, 200.0 - col as f64 + bank).unwrap();
        }
    }
    dem
}

#[test]
fn downslope_area_survives_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let dem_path = dir.path().join("dem.tif");
    write_geotiff(&valley(), &dem_path, None).unwrap();
    let dem: Raster<f64> = read_geotiff(&dem_path, None).unwrap();

    // Outlet at row 10, col 2
    let params = DownslopeParams {
        outlet_x: 500_000.0 + 2.5 * 30.0,
        outlet_y: 1_000_600.0 - 10.5 * 30.0,
        flood_level: 0.0,
    };
    let plain = downslope_area(&dem, params).unwrap();
    // South of the bank, from col 2 eastwards: 14 rows x 18 cols
    assert_eq!(plain.default_cells, 14 * 18);

    let flooded = downslope_area(
        &dem,
        DownslopeParams {
            flood_level: 2.0,
            ..params
        },
    )
    .unwrap();
    assert!(flooded.expansion_cells > 0);
    assert_eq!(flooded.mask.get(0, 19).unwrap(), 2, "flood crosses the bank");

    let stem = command_area_file_stem(2.0);
    let tif = dir.path().join(format!("{}.tif", stem));
    let geojson = dir.path().join(format!("{}.geojson", stem));
    write_geotiff(&flooded.mask, &tif, Some(GeoTiffOptions::mask())).unwrap();
    write_feature_collection(&geojson, &flooded.to_features().unwrap(), dem.crs()).unwrap();

    let mask: Raster<u8> = read_geotiff(&tif, None).unwrap();
    assert_eq!(mask.data(), flooded.mask.data());

    let (features, crs) = read_feature_collection(&geojson).unwrap();
    assert_eq!(crs.and_then(|c| c.epsg()), Some(32637));
    let polygon_area: f64 = features.iter().filter_map(|f| f.geometry.as_ref()).map(area).sum();
    assert!((polygon_area - flooded.total_area).abs() < 1e-6 * flooded.total_area);
    assert!(features
        .iter()
        .all(|f| f.get_property("flood_level") == Some(&AttributeValue::Float(2.0))));
}

#[test]
fn land_use_from_rasterized_masks() {
    let mut lcc: Raster<u8> = Raster::filled(10, 10, 41);
    lcc.set_transform(GeoTransform::new(0.0, 100.0, 10.0, -10.0));
    lcc.set_nodata(Some(0));
    lcc.set(9, 9, 0).unwrap();

    // Reservoir over the top-left 3x3 cells, protected area over the top rows
    let mut reservoir_mask: Raster<u8> = Raster::from_vec(
        (0..100).map(|i| u8::from(i / 10 < 3 && i % 10 < 3)).collect(),
        10,
        10,
    )
    .unwrap();
    reservoir_mask.set_transform(*lcc.transform());
    let reservoir_polys: Vec<Polygon<f64>> = polygonize(&reservoir_mask)
        .unwrap()
        .into_iter()
        .map(|(_, p)| p)
        .collect();
    let protected_polys = vec![Polygon::new(
        LineString::from(vec![
            (0.0, 100.0),
            (100.0, 100.0),
            (100.0, 80.0),
            (0.0, 80.0),
            (0.0, 100.0),
        ]),
        vec![],
    )];

    let touched = RasterizeParams {
        burn_value: 1,
        all_touched: true,
    };
    let reservoir = rasterize(&reservoir_polys, &lcc, &touched).unwrap();
    let protected = rasterize(&protected_polys, &lcc, &touched).unwrap();
    assert_eq!(reservoir.data().iter().filter(|&&v| v == 1).count(), 9);
    assert_eq!(protected.data().iter().filter(|&&v| v == 1).count(), 20);

    let luwa = reclassify_land_use(
        &lcc,
        &LandUseTable::wapor(),
        LandUseOverrides {
            protected: Some(&protected),
            reservoir: Some(&reservoir),
        },
    )
    .unwrap();

    assert_eq!(luwa.get(0, 0).unwrap(), 4);
    assert_eq!(luwa.get(0, 5).unwrap(), 1);
    assert_eq!(luwa.get(5, 5).unwrap(), 3);
    assert_eq!(luwa.get(9, 9).unwrap(), 0);
}
