//! Observed series, sampling frequency, and input aggregation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Longest sampling step accepted when inferring frequency (one year).
const MAX_STEP_SECONDS: i64 = 366 * 86_400;

/// One timestamped observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Observation timestamp.
    pub timestamp: NaiveDateTime,
    /// Observed value (e.g. daily shortwave radiation).
    pub value: f64,
}

impl Observation {
    /// Creates an observation at midnight of `date`.
    pub fn on_date(date: NaiveDate, value: f64) -> Self {
        Self {
            timestamp: date.and_time(NaiveTime::MIN),
            value,
        }
    }
}

/// Fixed sampling step of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frequency {
    seconds: i64,
}

impl Frequency {
    /// One observation per day.
    pub const DAILY: Self = Self { seconds: 86_400 };
    /// One observation per hour.
    pub const HOURLY: Self = Self { seconds: 3_600 };

    /// Creates a frequency from a step length in seconds.
    ///
    /// # Errors
    ///
    /// Returns `FrequencyInference` if the step is not in `(0, 366 days]`.
    pub fn from_seconds(seconds: i64) -> Result<Self> {
        if seconds <= 0 || seconds > MAX_STEP_SECONDS {
            return Err(Error::FrequencyInference(format!(
                "step of {seconds}s is outside (0, {MAX_STEP_SECONDS}]"
            )));
        }
        Ok(Self { seconds })
    }

    /// Step length in seconds.
    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    /// Step length as a chrono duration.
    pub fn step(&self) -> TimeDelta {
        TimeDelta::seconds(self.seconds)
    }

    /// Number of whole steps between `from` and `to` (`to - from`), floored.
    pub fn steps_between(&self, from: NaiveDateTime, to: NaiveDateTime) -> i64 {
        (to - from).num_seconds().div_euclid(self.seconds)
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.seconds {
            86_400 => write!(f, "daily"),
            3_600 => write!(f, "hourly"),
            s => write!(f, "every {s}s"),
        }
    }
}

/// Optional pre-analysis resampling of the raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Use the series as loaded.
    #[default]
    None,
    /// Sum all observations of a calendar day (hourly radiation → daily total).
    DailySum,
    /// Average all observations of a calendar day.
    DailyMean,
}

impl FromStr for Aggregation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "daily_sum" => Ok(Self::DailySum),
            "daily_mean" => Ok(Self::DailyMean),
            other => Err(Error::InvalidParameter(format!(
                "unknown aggregation \"{other}\" (expected none, daily_sum or daily_mean)"
            ))),
        }
    }
}

/// An ordered historical series with strictly increasing timestamps.
///
/// Loaded once per analysis session and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedSeries {
    observations: Vec<Observation>,
}

impl ObservedSeries {
    /// Creates a validated series.
    ///
    /// # Errors
    ///
    /// * `EmptySeries` if `observations` is empty
    /// * `UnorderedTimestamps` on a duplicate or decreasing timestamp
    /// * `InvalidParameter` on a non-finite value
    pub fn new(observations: Vec<Observation>) -> Result<Self> {
        if observations.is_empty() {
            return Err(Error::EmptySeries);
        }
        for pair in observations.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(Error::UnorderedTimestamps {
                    at: pair[1].timestamp,
                });
            }
        }
        if let Some(bad) = observations.iter().find(|o| !o.value.is_finite()) {
            return Err(Error::InvalidParameter(format!(
                "non-finite value at {}",
                bad.timestamp
            )));
        }
        Ok(Self { observations })
    }

    /// Builds a daily series from parallel date and value slices.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the slices differ in length, plus every
    /// error of [`ObservedSeries::new`].
    pub fn from_daily(dates: &[NaiveDate], values: &[f64]) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(Error::InvalidParameter(format!(
                "{} dates but {} values",
                dates.len(),
                values.len()
            )));
        }
        let observations = dates
            .iter()
            .zip(values)
            .map(|(&d, &v)| Observation::on_date(d, v))
            .collect();
        Self::new(observations)
    }

    /// All observations in timestamp order.
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Always false for a validated series; provided for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Values in timestamp order.
    pub fn values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.value).collect()
    }

    /// Earliest timestamp.
    pub fn first_timestamp(&self) -> NaiveDateTime {
        self.observations[0].timestamp
    }

    /// Latest timestamp.
    pub fn last_timestamp(&self) -> NaiveDateTime {
        self.observations[self.observations.len() - 1].timestamp
    }

    /// Infers the nominal sampling step as the most frequent spacing.
    ///
    /// Ties resolve to the shorter step so that gaps in the record do not
    /// coarsen the grid.
    ///
    /// # Errors
    ///
    /// Returns `FrequencyInference` for series shorter than two observations.
    pub fn infer_frequency(&self) -> Result<Frequency> {
        if self.observations.len() < 2 {
            return Err(Error::FrequencyInference(
                "need at least two observations".to_string(),
            ));
        }
        let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
        for pair in self.observations.windows(2) {
            let secs = (pair[1].timestamp - pair[0].timestamp).num_seconds();
            *counts.entry(secs).or_insert(0) += 1;
        }
        let mut best = (0_i64, 0_usize);
        for (&secs, &count) in &counts {
            if count > best.1 {
                best = (secs, count);
            }
        }
        Frequency::from_seconds(best.0)
    }

    /// Resamples the series according to `aggregation`.
    ///
    /// # Errors
    ///
    /// Propagates validation errors of the resampled series.
    pub fn aggregate(&self, aggregation: Aggregation) -> Result<Self> {
        if aggregation == Aggregation::None {
            return Ok(self.clone());
        }

        let mut days: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
        for o in &self.observations {
            let entry = days.entry(o.timestamp.date()).or_insert((0.0, 0));
            entry.0 += o.value;
            entry.1 += 1;
        }

        let observations = days
            .into_iter()
            .map(|(date, (sum, count))| {
                let value = match aggregation {
                    Aggregation::DailyMean => sum / count as f64,
                    _ => sum,
                };
                Observation::on_date(date, value)
            })
            .collect();
        Self::new(observations)
    }
}
