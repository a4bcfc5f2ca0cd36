//! The fitted model: the immutable artifact passed from analysis to
//! simulation and reporting.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::series::{Frequency, SeasonScheme};
use crate::stats::{
    AcsModel, ActfCoefficients, ActfPoint, ArStructure, DensityBin, DescriptiveStats,
    DistributionFamily, EmpiricalAcf, FittedAcs, FittedMarginal, YuleWalkerSolver,
};

/// Date range and sampling step of the historical record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistorySpan {
    pub first: NaiveDateTime,
    pub last: NaiveDateTime,
    pub frequency: Frequency,
}

/// Everything fitted for one season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonFit {
    pub season: u32,
    pub stats: DescriptiveStats,
    /// Empirical density of the season's observed values.
    pub histogram: Vec<DensityBin>,
    pub marginal: FittedMarginal,
    /// Target-domain autocorrelation structure.
    pub acs: FittedAcs,
    /// Integrator output the transform was fitted to.
    pub actf_points: Vec<ActfPoint>,
    pub actf: ActfCoefficients,
}

impl SeasonFit {
    /// Gaussian-domain ACF for lags `0..=max_lag`: the fitted transform
    /// applied to the target-domain structure.
    pub fn gaussian_acf(&self, max_lag: usize) -> Vec<f64> {
        self.acs
            .sequence(max_lag)
            .into_iter()
            .map(|r| self.actf.to_gaussian(r))
            .collect()
    }

    /// Yule–Walker AR structure driving this season's Gaussian process.
    ///
    /// The order is `max_lag`, reduced to the highest lag at which the
    /// Gaussian ACF is still a valid (positive definite) correlation
    /// sequence.
    ///
    /// # Errors
    ///
    /// Returns `NonStationaryStructure` if not even lag 1 is admissible.
    pub fn ar_structure(&self, max_lag: usize) -> Result<ArStructure> {
        let acf = self.gaussian_acf(max_lag);
        let order = YuleWalkerSolver::admissible_order(&acf);
        if order == 0 && max_lag > 0 {
            return Err(Error::NonStationaryStructure {
                season: self.season,
                variance: 1.0 - acf[1] * acf[1],
            });
        }
        YuleWalkerSolver::solve(&acf[..=order], self.season)
    }
}

/// Seasonal marginal and autocorrelation model of a historical series.
///
/// Constructed once by [`crate::analysis::analyze`]; read-only afterwards and
/// safe to share across simulation replicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub scheme: SeasonScheme,
    pub family: DistributionFamily,
    pub acs_model: AcsModel,
    pub max_lag: usize,
    pub history: HistorySpan,
    /// ACF of the whole series, ignoring seasons.
    pub overall_acf: EmpiricalAcf,
    pub seasons: BTreeMap<u32, SeasonFit>,
}

impl FittedModel {
    /// Fit of season `label`, if the history contained it.
    pub fn season(&self, label: u32) -> Option<&SeasonFit> {
        self.seasons.get(&label)
    }

    /// Labels of the fitted seasons in ascending order.
    pub fn labels(&self) -> Vec<u32> {
        self.seasons.keys().copied().collect()
    }

    /// AR structures of every fitted season, keyed by label.
    ///
    /// # Errors
    ///
    /// See [`SeasonFit::ar_structure`].
    pub fn ar_structures(&self) -> Result<BTreeMap<u32, ArStructure>> {
        self.seasons
            .iter()
            .map(|(&label, fit)| Ok((label, fit.ar_structure(self.max_lag)?)))
            .collect()
    }
}
