//! Post-hoc comparison of an ensemble against the fitted model.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use super::types::SimulatedSeries;
use crate::model::FittedModel;
use crate::stats::MomentCalculator;

/// Fitted versus simulated statistics of one season.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonSummary {
    pub season: u32,
    /// Number of simulated values in the season across replicates.
    pub count: usize,
    pub fitted_mean: f64,
    pub simulated_mean: f64,
    pub fitted_sd: f64,
    pub simulated_sd: f64,
    /// Lag-1 autocorrelation of the target-domain structure.
    pub fitted_lag1: f64,
    pub simulated_lag1: f64,
}

/// Aggregate indicators of how well an ensemble reproduces the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleSummary {
    pub replicates: usize,
    pub records: usize,
    pub seasons: Vec<SeasonSummary>,
}

#[derive(Default)]
struct Accumulator {
    count: usize,
    sum: f64,
    sum_sq: f64,
    values: Vec<(usize, usize, f64)>,
}

impl EnsembleSummary {
    /// Computes per-season statistics over all replicates.
    ///
    /// Lag-1 autocorrelation pairs consecutive records of the same replicate
    /// whose first member lies in the season, standardized with the
    /// season's simulated mean and standard deviation.
    pub fn from_replicates(model: &FittedModel, replicates: &[SimulatedSeries]) -> Self {
        let scheme = model.scheme;
        let mut acc: BTreeMap<u32, Accumulator> = BTreeMap::new();
        for (r, series) in replicates.iter().enumerate() {
            for (i, rec) in series.records.iter().enumerate() {
                let a = acc.entry(scheme.label(rec.timestamp)).or_default();
                a.count += 1;
                a.sum += rec.value;
                a.sum_sq += rec.value * rec.value;
                a.values.push((r, i, rec.value));
            }
        }

        let mut seasons = Vec::with_capacity(acc.len());
        let mut records = 0;
        for (season, a) in acc {
            records += a.count;
            let n = a.count as f64;
            let mean = a.sum / n;
            let sd = (a.sum_sq / n - mean * mean).max(0.0).sqrt();

            let step = model.history.frequency.step();
            let mut lag_sum = 0.0;
            for &(r, i, v) in &a.values {
                let records = &replicates[r].records;
                if let Some(next) = records.get(i + 1) {
                    if next.timestamp - records[i].timestamp == step {
                        lag_sum += (v - mean) * (next.value - mean);
                    }
                }
            }
            let simulated_lag1 = if sd > 0.0 { lag_sum / (n * sd * sd) } else { 0.0 };

            let (fitted_mean, fitted_sd, fitted_lag1) = match model.season(season) {
                Some(fit) => {
                    let m = MomentCalculator::zero_inflated_moments(&fit.marginal.marginal, fit.marginal.p0);
                    (m.mean, m.variance().max(0.0).sqrt(), fit.acs.at(1))
                }
                None => (f64::NAN, f64::NAN, f64::NAN),
            };

            seasons.push(SeasonSummary {
                season,
                count: a.count,
                fitted_mean,
                simulated_mean: mean,
                fitted_sd,
                simulated_sd: sd,
                fitted_lag1,
                simulated_lag1,
            });
        }

        Self {
            replicates: replicates.len(),
            records,
            seasons,
        }
    }
}

impl fmt::Display for EnsembleSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Ensemble Summary ---")?;
        writeln!(f, "Replicates:            {}", self.replicates)?;
        writeln!(f, "Records:               {}", self.records)?;
        write!(
            f,
            "{:>6} {:>8} {:>10} {:>10} {:>9} {:>9} {:>8} {:>8}",
            "season", "count", "mean fit", "mean sim", "sd fit", "sd sim", "r1 fit", "r1 sim"
        )?;
        for s in &self.seasons {
            write!(
                f,
                "\n{:>6} {:>8} {:>10.3} {:>10.3} {:>9.3} {:>9.3} {:>8.3} {:>8.3}",
                s.season,
                s.count,
                s.fitted_mean,
                s.simulated_mean,
                s.fitted_sd,
                s.simulated_sd,
                s.fitted_lag1,
                s.simulated_lag1
            )?;
        }
        Ok(())
    }
}
