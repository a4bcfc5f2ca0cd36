//! Seasonal Gaussian-copula autoregressive analysis and simulation of
//! solar radiation series.
//!
//! [`analyze`] fits per-season marginals, autocorrelation structures and
//! correlation transforms from a historical series; [`sim::run_ensemble`]
//! draws synthetic continuations from the fitted model.

pub mod analysis;
#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod error;
pub mod io;
pub mod model;
pub mod report;
/// Observed series, frequencies and season schemes.
pub mod series;
/// Ensemble simulation from a fitted model.
pub mod sim;
/// Numerical building blocks of the fitting phase.
pub mod stats;

pub use analysis::{AnalysisOptions, analyze, analyze_with};
pub use error::{Error, Result};
pub use model::FittedModel;
