//! Router tests against a temporary data directory

use axum::body::Body;
use axum::http::{Request, StatusCode};
use basinkit_dashboard::{create_router, AppState, BasinStore};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::util::ServiceExt;

const SERIES: &str = "\
date,precipitation,inflow,et,storage,outflow,et_green,et_blue
2019-01,10,2,6,5,1,4,2
2019-02,20,0,8,12,0,8,0
2020-01,5,1,4,1,1,3,1
";

const BOUNDARY: &str = r#"{
  "type": "FeatureCollection",
  "features": [{
    "type": "Feature",
    "properties": {"name": "Jordan"},
    "geometry": {"type": "Polygon", "coordinates": [[[35.0, 31.0], [36.0, 31.0], [36.0, 32.0], [35.0, 31.0]]]}
  }]
}"#;

fn app(with_static: bool) -> (tempfile::TempDir, axum::Router) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("Jordan_timeseries.csv"), SERIES).unwrap();
    std::fs::write(dir.path().join("Jordan.geojson"), BOUNDARY).unwrap();
    std::fs::write(dir.path().join("Awash.csv"), SERIES).unwrap();
    std::fs::write(dir.path().join("Jordan_summary_2019.csv"), "variable,value,unit\n").unwrap();

    let static_dir = dir.path().join("static");
    if with_static {
        std::fs::create_dir(&static_dir).unwrap();
        std::fs::write(static_dir.join("index.html"), "<h1>basins</h1>").unwrap();
    }

    let store = BasinStore::load(dir.path()).unwrap().with_unit("MCM");
    let router = create_router(AppState::new(store), Some(static_dir.as_path()));
    (dir, router)
}

async fn get(router: axum::Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

async fn get_json(router: axum::Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get(router, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn health_is_ok() {
    let (_dir, router) = app(false);
    let (status, body) = get_json(router, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn lists_basins_sorted() {
    let (_dir, router) = app(false);
    let (status, body) = get_json(router, "/api/basins").await;
    assert_eq!(status, StatusCode::OK);
    let basins = body.as_array().unwrap();
    assert_eq!(basins.len(), 2);
    assert_eq!(basins[0]["name"], "Awash");
    assert_eq!(basins[0]["has_boundary"], false);
    assert_eq!(basins[1]["name"], "Jordan");
    assert_eq!(basins[1]["has_boundary"], true);
    assert_eq!(basins[1]["first_year"], 2019);
    assert_eq!(basins[1]["last_year"], 2020);
    assert_eq!(basins[1]["unit"], "MCM");
}

#[tokio::test]
async fn unknown_basin_is_404() {
    let (_dir, router) = app(false);
    let (status, body) = get_json(router, "/api/basins/Nile").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("Nile"));
}

#[tokio::test]
async fn boundary_present_and_absent() {
    let (_dir, router) = app(false);
    let (status, body) = get_json(router.clone(), "/api/basins/Jordan/boundary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["type"], "FeatureCollection");
    assert_eq!(body["features"].as_array().unwrap().len(), 1);

    let (status, _) = get_json(router, "/api/basins/Awash/boundary").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn timeseries_year_filtering() {
    let (_dir, router) = app(false);
    let (status, body) = get_json(router.clone(), "/api/basins/Jordan/timeseries").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);

    let (_, body) = get_json(router.clone(), "/api/basins/Jordan/timeseries?start_year=2020").await;
    let records = body.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["date"], "2020-01-01");

    let (status, body) = get_json(
        router.clone(),
        "/api/basins/Jordan/timeseries?start_year=2030&end_year=2031",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());

    let (status, body) = get_json(
        router,
        "/api/basins/Jordan/timeseries?start_year=2021&end_year=2019",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn malformed_year_is_json_400() {
    let (_dir, router) = app(false);
    for uri in [
        "/api/basins/Jordan/timeseries?start_year=abc",
        "/api/basins/Jordan/annual?end_year=2019.5",
        "/api/basins/Jordan/charts/balance?start_year=x",
    ] {
        let (status, body) = get_json(router.clone(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert!(body["error"].is_string(), "{}", uri);
    }
}

#[tokio::test]
async fn annual_balance() {
    let (_dir, router) = app(false);
    let (status, body) = get_json(router, "/api/basins/Jordan/annual?end_year=2019").await;
    assert_eq!(status, StatusCode::OK);
    let years = body.as_array().unwrap();
    assert_eq!(years.len(), 1);
    assert_eq!(years[0]["year"], 2019);
    assert_eq!(years[0]["months"], 2);
    assert_eq!(years[0]["precipitation"].as_f64(), Some(30.0));
    assert_eq!(years[0]["et_green"].as_f64(), Some(12.0));
}

#[tokio::test]
async fn chart_figures() {
    let (_dir, router) = app(false);
    let (status, body) = get_json(router.clone(), "/api/basins/Jordan/charts/balance").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 5);
    assert_eq!(body["layout"]["barmode"], "group");

    let (status, body) =
        get_json(router.clone(), "/api/basins/Jordan/charts/et-split?start_year=2030").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"][0]["x"].as_array().unwrap().is_empty());

    let (status, _) = get_json(router, "/api/basins/Jordan/charts/pie").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn static_fallback() {
    let (_dir, router) = app(true);
    let (status, body) = get(router, "/index.html").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"<h1>basins</h1>");

    let (_dir, router) = app(false);
    let (status, _) = get(router, "/index.html").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
