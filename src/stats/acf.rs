//! Empirical autocorrelation, for the whole series or per season.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::series::{Frequency, ObservedSeries, SeasonScheme};

/// Lag → autocorrelation sequence, lag 0 fixed at 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmpiricalAcf {
    values: Vec<f64>,
}

impl EmpiricalAcf {
    /// Wraps a sequence that starts at lag 0.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParameter` if the sequence is empty or lag 0 is not 1.
    pub fn new(values: Vec<f64>) -> Result<Self> {
        match values.first() {
            Some(&v) if (v - 1.0).abs() < 1e-9 => Ok(Self { values }),
            _ => Err(Error::InvalidParameter(
                "autocorrelation sequence must start with 1 at lag 0".to_string(),
            )),
        }
    }

    /// Autocorrelation at `lag`, if estimated.
    pub fn at(&self, lag: usize) -> Option<f64> {
        self.values.get(lag).copied()
    }

    /// Highest estimated lag.
    pub fn max_lag(&self) -> usize {
        self.values.len() - 1
    }

    /// The sequence from lag 0.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Truncates to at most `lag` lags.
    pub fn truncated(&self, lag: usize) -> Self {
        Self {
            values: self.values[..=lag.min(self.max_lag())].to_vec(),
        }
    }
}

/// Biased sample-autocorrelation estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutocorrelationEstimator {
    lag_max: usize,
}

impl Default for AutocorrelationEstimator {
    fn default() -> Self {
        Self {
            lag_max: Self::DEFAULT_LAG_MAX,
        }
    }
}

impl AutocorrelationEstimator {
    pub const DEFAULT_LAG_MAX: usize = 30;

    pub fn new(lag_max: usize) -> Self {
        Self { lag_max }
    }

    pub fn lag_max(&self) -> usize {
        self.lag_max
    }

    /// ACF of a contiguous sequence up to `min(lag_max, n - 1)`.
    ///
    /// `r(k) = Σ (x_t − x̄)(x_{t+k} − x̄) / Σ (x_t − x̄)²`
    ///
    /// # Errors
    ///
    /// * `EmptySeries` for an empty input
    /// * `DegenerateSample` (season 0) when the input has no variance
    pub fn estimate(&self, values: &[f64]) -> Result<EmpiricalAcf> {
        if values.is_empty() {
            return Err(Error::EmptySeries);
        }
        let n = values.len();
        let mean = values.iter().sum::<f64>() / n as f64;
        let centred: Vec<f64> = values.iter().map(|v| v - mean).collect();
        let denom: f64 = centred.iter().map(|v| v * v).sum();
        if denom <= 0.0 {
            return Err(Error::DegenerateSample {
                season: 0,
                reason: "series has zero variance".to_string(),
            });
        }

        let max_lag = self.lag_max.min(n - 1);
        let acf = (0..=max_lag)
            .map(|k| {
                if k == 0 {
                    return 1.0;
                }
                centred[..n - k]
                    .iter()
                    .zip(&centred[k..])
                    .map(|(a, b)| a * b)
                    .sum::<f64>()
                    / denom
            })
            .collect();
        EmpiricalAcf::new(acf)
    }

    /// ACF of the season-standardised series.
    ///
    /// Every value is standardised by its own season's mean and standard
    /// deviation and placed on the regular `frequency` grid. Empty slots and
    /// seasons without spread contribute zeros, so gaps never pair unrelated
    /// observations. The biased estimator of that zero-filled sequence is a
    /// valid (positive semi-definite) correlation sequence at every lag.
    ///
    /// # Errors
    ///
    /// Returns `DegenerateSample` (season 0) when no season has variance.
    pub fn estimate_seasonal(
        &self,
        series: &ObservedSeries,
        frequency: Frequency,
        scheme: SeasonScheme,
    ) -> Result<EmpiricalAcf> {
        let first = series.first_timestamp();
        let slots = frequency.steps_between(first, series.last_timestamp()) as usize + 1;

        let mut sums: BTreeMap<u32, (f64, f64, usize)> = BTreeMap::new();
        for o in series.observations() {
            let e = sums.entry(scheme.label(o.timestamp)).or_insert((0.0, 0.0, 0));
            e.0 += o.value;
            e.1 += o.value * o.value;
            e.2 += 1;
        }
        let standardisers: BTreeMap<u32, (f64, f64)> = sums
            .into_iter()
            .filter_map(|(season, (sum, sum_sq, count))| {
                let n = count as f64;
                let mean = sum / n;
                let sd = (sum_sq / n - mean * mean).max(0.0).sqrt();
                (sd > 1e-12 * mean.abs().max(1.0)).then_some((season, (mean, sd)))
            })
            .collect();

        let mut grid = vec![0.0; slots];
        for o in series.observations() {
            let Some(&(mean, sd)) = standardisers.get(&scheme.label(o.timestamp)) else {
                continue;
            };
            let slot = frequency.steps_between(first, o.timestamp) as usize;
            if let Some(cell) = grid.get_mut(slot) {
                *cell = (o.value - mean) / sd;
            }
        }

        let denom: f64 = grid.iter().map(|z| z * z).sum();
        if denom <= 0.0 {
            return Err(Error::DegenerateSample {
                season: 0,
                reason: "no season has variance".to_string(),
            });
        }
        let lag_max = self.lag_max.min(slots - 1);
        let acf = (0..=lag_max)
            .map(|k| {
                if k == 0 {
                    return 1.0;
                }
                grid[..slots - k]
                    .iter()
                    .zip(&grid[k..])
                    .map(|(a, b)| a * b)
                    .sum::<f64>()
                    / denom
            })
            .collect();
        EmpiricalAcf::new(acf)
    }
}
