//! REST API over a fitted model and its simulated ensemble.
//!
//! Provides three GET endpoints:
//! - `/model`: fitted model summary
//! - `/report`: descriptive statistics, densities and autocorrelation points
//! - `/simulation`: simulated records with optional replicate and date filters

mod handlers;
mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tracing::info;

use crate::model::FittedModel;
use crate::report::ModelReport;
use crate::sim::SimulatedSeries;

/// Immutable application state shared across all request handlers.
///
/// Constructed once after analysis and simulation complete and wrapped in
/// `Arc`; all data is read-only.
pub struct AppState {
    /// Model fitted from the historical series.
    pub model: FittedModel,
    /// Report views of `model`.
    pub report: ModelReport,
    /// Simulated replicates, empty when no simulation was needed.
    pub ensemble: Vec<SimulatedSeries>,
}

impl AppState {
    /// Builds the state, deriving the report from `model`.
    pub fn new(model: FittedModel, ensemble: Vec<SimulatedSeries>) -> Self {
        let report = ModelReport::from_model(&model);
        Self {
            model,
            report,
            ensemble,
        }
    }
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/model", get(handlers::get_model))
        .route("/report", get(handlers::get_report))
        .route("/simulation", get(handlers::get_simulation))
        .with_state(state)
}

/// Binds to the given address and serves the API.
///
/// # Errors
///
/// Returns an error if the listener cannot bind to `addr` or the server
/// stops abnormally.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(listener, app).await
}
