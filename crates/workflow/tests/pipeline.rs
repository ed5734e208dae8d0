//! Full workflow over a small synthetic basin: 4x4 grid of 1 km cells,
//! basin covering the two western columns.

use approx::assert_relative_eq;
use basinkit_core::io::write_geotiff;
use basinkit_core::timeseries::BasinSeries;
use basinkit_core::{GeoTransform, Raster, CRS};
use basinkit_workflow::cube::Cube;
use basinkit_workflow::runner::NoProgress;
use basinkit_workflow::{Pipeline, TaskRunner, WorkflowConfig, WorkflowError};
use std::path::Path;
use std::sync::Mutex;

fn grid(value: f64) -> Raster<f64> {
    let mut r = Raster::filled(4, 4, value);
    r.set_transform(GeoTransform::new(500_000.0, 1_004_000.0, 1000.0, -1000.0));
    r.set_crs(Some(CRS::from_epsg(32637)));
    r.set_nodata(Some(-9999.0));
    r
}

fn put(dir: &Path, subdir: &str, name: &str, raster: &Raster<f64>) {
    let target = subdir.split('/').fold(dir.to_path_buf(), |p, s| p.join(s));
    std::fs::create_dir_all(&target).unwrap();
    write_geotiff(raster, target.join(name), None).unwrap();
}

const BOUNDARY: &str = r#"{
  "type": "FeatureCollection",
  "features": [{
    "type": "Feature",
    "properties": {"name": "Awash"},
    "geometry": {"type": "Polygon", "coordinates": [[
      [500100.0, 1000100.0], [501900.0, 1000100.0], [501900.0, 1003900.0],
      [500100.0, 1003900.0], [500100.0, 1000100.0]
    ]]}
  }]
}"#;

fn setup(root: &Path) -> WorkflowConfig {
    let input = root.join("input");
    put(&input, "P/Monthly", "P_2019.01.tif", &grid(100.0));
    put(&input, "P/Monthly", "P_2019.02.tif", &grid(100.0));
    put(&input, "P/Daily", "dailyP_2019.01.01.tif", &grid(10.0));
    put(&input, "P/Daily", "dailyP_2019.01.02.tif", &grid(0.0));
    put(&input, "P/Daily", "dailyP_2019.01.03.tif", &grid(5.0));
    put(&input, "LAI", "LAI_2019.01.tif", &grid(2.0));
    put(&input, "ET", "ET_2019-01.tif", &grid(50.0));
    put(&input, "ET", "ET_2019-02.tif", &grid(50.0));

    let mut lu = grid(2.0);
    for row in 0..4 {
        lu.set(row, 1, 3.0).unwrap();
    }
    put(&input, "LUWA", "lu_wa.tif", &lu);

    let template = root.join("template.tif");
    write_geotiff(&grid(0.0), &template, None).unwrap();
    let boundary = root.join("awash.geojson");
    std::fs::write(&boundary, BOUNDARY).unwrap();
    let inflow = root.join("inflow.csv");
    std::fs::write(&inflow, "date,value\n2019-01,0.1\n").unwrap();

    let text = format!(
        "basin_name = \"Awash\"\ninput_dir = {:?}\nboundary = {:?}\ntemplate = {:?}\noutput_dir = {:?}\nstart_year = 2019\nend_year = 2019\ninflow = {:?}\n",
        input,
        boundary,
        template,
        root.join("output"),
        inflow
    );
    WorkflowConfig::from_toml(&text).unwrap()
}

#[test]
fn full_pipeline_writes_balance_and_summaries() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(dir.path());

    let updates = Mutex::new(Vec::new());
    let sink = |p: u8, _m: Option<&str>| updates.lock().unwrap().push(p);
    let runner = TaskRunner::new();
    let report = Pipeline::full(config.clone()).run(&runner, &sink).unwrap();

    assert!(report
        .messages
        .iter()
        .any(|m| m.ends_with("No TIFFs found for SMsat, skipping")));
    assert!(report
        .messages
        .iter()
        .any(|m| m.ends_with("No LAI for 2019-02, interception set to 0")));
    let updates = updates.into_inner().unwrap();
    assert_eq!(updates.last(), Some(&100));
    assert!(updates.windows(2).all(|w| w[0] <= w[1]));

    // 8 cells of 1 km²: 100 mm is 0.8 MCM
    let series =
        BasinSeries::read_csv(config.output_dir.join("Awash_timeseries.csv"), "Awash").unwrap();
    assert_eq!(series.records.len(), 2);
    let jan = &series.records[0];
    assert_relative_eq!(jan.precipitation, 0.8, epsilon = 1e-9);
    assert_relative_eq!(jan.et, 0.4, epsilon = 1e-9);
    assert_relative_eq!(jan.inflow, 0.1, epsilon = 1e-9);
    assert_relative_eq!(jan.storage, 0.5, epsilon = 1e-9);
    assert_relative_eq!(jan.et_green.unwrap(), 0.4, epsilon = 1e-9);
    assert_relative_eq!(series.records[1].storage, 0.4, epsilon = 1e-9);

    let cubes = config.cube_dir();
    let nrd = Cube::open(cubes.join("Awash_nRD_monthly")).unwrap();
    assert_eq!(nrd.len(), 2);
    assert_relative_eq!(nrd.slice(0).unwrap().get(0, 0).unwrap(), 2.0);
    assert!(nrd.slice(0).unwrap().get(0, 3).unwrap().is_nan());

    assert!(config.output_dir.join("Awash.geojson").is_file());
    let summary =
        std::fs::read_to_string(config.output_dir.join("Awash_summary_2019.csv")).unwrap();
    assert!(summary.starts_with("variable,value,unit"));
    assert!(summary.contains("precipitation,1.6"));

    let by_class =
        std::fs::read_to_string(config.output_dir.join("Awash_et_by_landuse_2019.csv")).unwrap();
    let lines: Vec<&str> = by_class.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("2,4,100,"));
    assert!(lines[2].starts_with("3,4,100,"));
}

#[test]
fn km3_run_labels_summary_rows() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = setup(dir.path());
    config.unit_conversion = 1e6;

    Pipeline::full(config.clone())
        .run(&TaskRunner::new(), &NoProgress)
        .unwrap();

    let summary =
        std::fs::read_to_string(config.output_dir.join("Awash_summary_2019.csv")).unwrap();
    let mut rows = summary.lines().skip(1).map(|l| l.split(',').collect::<Vec<_>>());
    let precipitation = rows.find(|r| r[0] == "precipitation").unwrap();
    assert_relative_eq!(precipitation[1].parse::<f64>().unwrap(), 0.0016, epsilon = 1e-12);
    assert_eq!(precipitation[2], "km3");

    for row in summary.lines().skip(1).map(|l| l.split(',').collect::<Vec<_>>()) {
        match row[0] {
            "closure_error" => assert_eq!(row[2], "%"),
            "months" => assert_eq!(row[2], "count"),
            _ => assert_eq!(row[2], "km3", "{}", row[0]),
        }
    }
}

#[test]
fn missing_boundary_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = setup(dir.path());
    config.boundary = dir.path().join("nowhere.geojson");

    let err = Pipeline::full(config)
        .run(&TaskRunner::new(), &NoProgress)
        .unwrap_err();
    match err {
        WorkflowError::Step { source, messages, .. } => {
            assert!(matches!(*source, WorkflowError::MissingInput(_)));
            assert!(messages.iter().any(|m| m.contains("Starting cube creation")));
        }
        other => panic!("unexpected error: {other}"),
    }
}
