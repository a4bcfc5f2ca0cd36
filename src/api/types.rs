//! API response and query types.
//!
//! Simulation records use the same field names as the CSV export
//! (`date`, `value`, `id`).

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::model::{FittedModel, SeasonFit};
use crate::stats::{ActfCoefficients, FittedMarginal};
use crate::sim::SimulatedRecord;

/// Compact summary of the fitted model.
#[derive(Debug, Serialize)]
pub struct ModelResponse {
    pub scheme: String,
    pub family: String,
    pub acs_model: String,
    pub max_lag: usize,
    /// First historical timestamp.
    pub first: NaiveDateTime,
    /// Last historical timestamp; simulation starts after it.
    pub last: NaiveDateTime,
    /// Sampling step in seconds.
    pub step_seconds: i64,
    /// Number of replicates held by the server.
    pub replicates: usize,
    pub seasons: Vec<SeasonEntry>,
}

/// Fitted parameters of one season.
#[derive(Debug, Serialize)]
pub struct SeasonEntry {
    pub season: u32,
    pub count: usize,
    pub marginal: FittedMarginal,
    pub acs_params: Vec<f64>,
    pub actf: ActfCoefficients,
}

impl From<&SeasonFit> for SeasonEntry {
    fn from(fit: &SeasonFit) -> Self {
        Self {
            season: fit.season,
            count: fit.stats.count,
            marginal: fit.marginal,
            acs_params: fit.acs.params.clone(),
            actf: fit.actf,
        }
    }
}

impl ModelResponse {
    /// Summarizes `model` for a server holding `replicates` simulated series.
    pub fn new(model: &FittedModel, replicates: usize) -> Self {
        Self {
            scheme: model.scheme.as_str().to_string(),
            family: model.family.as_str().to_string(),
            acs_model: model.acs_model.as_str().to_string(),
            max_lag: model.max_lag,
            first: model.history.first,
            last: model.history.last,
            step_seconds: model.history.frequency.seconds(),
            replicates,
            seasons: model.seasons.values().map(SeasonEntry::from).collect(),
        }
    }
}

/// One simulated value using the CSV export field names.
#[derive(Debug, Serialize)]
pub struct SimulationRecord {
    pub date: NaiveDateTime,
    pub value: f64,
    pub id: usize,
}

impl From<&SimulatedRecord> for SimulationRecord {
    fn from(r: &SimulatedRecord) -> Self {
        Self {
            date: r.timestamp,
            value: r.value,
            id: r.id,
        }
    }
}

/// Optional filters for the simulation endpoint.
#[derive(Debug, Deserialize)]
pub struct SimulationQuery {
    /// Replicate identifier.
    pub id: Option<usize>,
    /// First date (inclusive), `YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`.
    pub from: Option<String>,
    /// Last date (inclusive).
    pub to: Option<String>,
}

/// Error response body for 400-class errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}
