//! HTTP routes: JSON API under `/api`, static frontend everywhere else

use crate::charts::{figure, ChartKind};
use crate::error::{DashboardError, Result};
use crate::store::{BasinStore, BasinSummary};
use axum::{
    extract::{FromRequestParts, Path, Query, State},
    http::request::Parts,
    routing::get,
    Json, Router,
};
use basinkit_core::timeseries::{AnnualBalance, BasinSeries, MonthlyRecord};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path as FsPath;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<BasinStore>,
}

impl AppState {
    pub fn new(store: BasinStore) -> Self {
        Self {
            store: Arc::new(store),
        }
    }
}

/// `?start_year=&end_year=`, both optional
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct YearRange {
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
}

/// Malformed query strings are answered with the JSON error body
impl<S: Send + Sync> FromRequestParts<S> for YearRange {
    type Rejection = DashboardError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let Query(range) = Query::<YearRange>::from_request_parts(parts, state).await?;
        Ok(range)
    }
}

impl YearRange {
    /// Fill missing bounds from the series. `None` when the series is empty.
    pub fn resolve(&self, series: &BasinSeries) -> Result<Option<(i32, i32)>> {
        if let (Some(start), Some(end)) = (self.start_year, self.end_year) {
            if start > end {
                return Err(DashboardError::bad_request(format!(
                    "start_year {} is after end_year {}",
                    start, end
                )));
            }
        }
        let Some((first, last)) = series.years() else {
            return Ok(None);
        };
        let start = self.start_year.unwrap_or(first);
        let end = self.end_year.unwrap_or(last);
        // One bound given and outside the data
        if start > end {
            return Ok(None);
        }
        Ok(Some((start, end)))
    }
}

pub fn create_router(state: AppState, static_dir: Option<&FsPath>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/health", get(health))
        .route("/basins", get(list_basins))
        .route("/basins/{name}", get(get_basin))
        .route("/basins/{name}/boundary", get(get_boundary))
        .route("/basins/{name}/timeseries", get(get_timeseries))
        .route("/basins/{name}/annual", get(get_annual))
        .route("/basins/{name}/charts/{kind}", get(get_chart));

    let mut router = Router::new().nest("/api", api);
    if let Some(dir) = static_dir.filter(|d| d.is_dir()) {
        router = router.fallback_service(ServeDir::new(dir));
    }
    router
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_basins(State(state): State<AppState>) -> Json<Vec<BasinSummary>> {
    Json(state.store.summaries())
}

async fn get_basin(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<BasinSummary>> {
    Ok(Json(state.store.get(&name)?.summary()))
}

async fn get_boundary(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>> {
    let basin = state.store.get(&name)?;
    basin
        .boundary
        .clone()
        .map(Json)
        .ok_or_else(|| DashboardError::not_found(format!("no boundary for basin '{}'", name)))
}

async fn get_timeseries(
    State(state): State<AppState>,
    Path(name): Path<String>,
    range: YearRange,
) -> Result<Json<Vec<MonthlyRecord>>> {
    let series = &state.store.get(&name)?.series;
    let records = match range.resolve(series)? {
        Some((start, end)) => series
            .filter_years(start, end)?
            .into_iter()
            .cloned()
            .collect(),
        None => Vec::new(),
    };
    Ok(Json(records))
}

async fn get_annual(
    State(state): State<AppState>,
    Path(name): Path<String>,
    range: YearRange,
) -> Result<Json<Vec<AnnualBalance>>> {
    let series = &state.store.get(&name)?.series;
    let annual = match range.resolve(series)? {
        Some((start, end)) => series.annual(start, end)?,
        None => Vec::new(),
    };
    Ok(Json(annual))
}

async fn get_chart(
    State(state): State<AppState>,
    Path((name, kind)): Path<(String, String)>,
    range: YearRange,
) -> Result<Json<Value>> {
    let kind: ChartKind = kind.parse()?;
    let series = &state.store.get(&name)?.series;
    // Year 0 never has data, so an empty range gives empty traces
    let (start, end) = range.resolve(series)?.unwrap_or((0, 0));
    Ok(Json(figure(kind, series, start, end)?))
}
