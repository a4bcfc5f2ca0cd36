//! Simulation output types.

use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// What to do with requested dates whose season was never observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingSeasonPolicy {
    /// Reject the request with `InvalidDateRange`.
    #[default]
    Fail,
    /// Omit those dates from the output and log a warning.
    Skip,
}

impl FromStr for MissingSeasonPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "fail" => Ok(Self::Fail),
            "skip" => Ok(Self::Skip),
            other => Err(Error::InvalidParameter(format!(
                "unknown missing-season policy \"{other}\" (expected fail or skip)"
            ))),
        }
    }
}

/// One simulated value of one replicate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulatedRecord {
    pub timestamp: NaiveDateTime,
    pub value: f64,
    /// Replicate identifier.
    pub id: usize,
}

/// One Monte Carlo replicate in timestamp order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedSeries {
    pub id: usize,
    pub records: Vec<SimulatedRecord>,
}

impl SimulatedSeries {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.value).collect()
    }
}

/// Result of a simulation request.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationOutcome {
    /// A new replicate covering the requested range.
    Simulated(SimulatedSeries),
    /// The requested range ends at or before the last historical timestamp;
    /// no simulation is needed.
    AlreadyCovered { last_historical: NaiveDateTime },
}

impl SimulationOutcome {
    pub fn is_already_covered(&self) -> bool {
        matches!(self, Self::AlreadyCovered { .. })
    }

    /// The simulated series, if any.
    pub fn into_series(self) -> Option<SimulatedSeries> {
        match self {
            Self::Simulated(series) => Some(series),
            Self::AlreadyCovered { .. } => None,
        }
    }
}
