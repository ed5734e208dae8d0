//! # basinkit dashboard
//!
//! HTTP API over the workflow output directory: basin listing, monthly
//! series, annual balances, boundaries and Plotly chart figures. A static
//! frontend, when present, is served for every non-API path.

pub mod charts;
pub mod config;
pub mod error;
pub mod routes;
pub mod store;

pub use charts::ChartKind;
pub use config::DashboardConfig;
pub use error::{DashboardError, Result};
pub use routes::{create_router, AppState, YearRange};
pub use store::{Basin, BasinStore, BasinSummary};

use tracing::info;

/// Load the basins and serve until the process is stopped
pub async fn run(config: DashboardConfig) -> Result<()> {
    let store = BasinStore::load(&config.data_dir)?.with_unit(&config.default_unit);
    if store.is_empty() {
        tracing::warn!("no basin series found in {}", config.data_dir.display());
    }
    let app = create_router(AppState::new(store), Some(config.static_dir.as_path()));

    let listener = tokio::net::TcpListener::bind(config.address()).await?;
    info!("dashboard listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
