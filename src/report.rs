//! Read-only views of a fitted model for plotting and tabular reports.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::FittedModel;
use crate::stats::{ActfPoint, DescriptiveStats};

/// Which part of a report to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportKind {
    /// Descriptive statistics per season.
    #[default]
    Stat,
    /// Fitted versus empirical densities.
    Dist,
    /// Fitted versus empirical autocorrelation.
    Acs,
}

impl FromStr for ReportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stat" => Ok(Self::Stat),
            "dist" => Ok(Self::Dist),
            "acs" => Ok(Self::Acs),
            other => Err(Error::InvalidParameter(format!(
                "unknown report kind \"{other}\" (expected stat, dist or acs)"
            ))),
        }
    }
}

/// Density of the fitted marginal and of the observations at one value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DensityPoint {
    pub x: f64,
    pub fitted: f64,
    pub empirical: f64,
}

/// Autocorrelation at one lag.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AcfPoint {
    pub lag: usize,
    /// Season's empirical ACF (`None` beyond the estimated lags).
    pub empirical: Option<f64>,
    /// Target-domain structure used for simulation.
    pub fitted: f64,
    /// Gaussian-domain value after the correlation transform.
    pub gaussian: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonReport {
    pub season: u32,
    pub p0: f64,
    pub stats: DescriptiveStats,
    pub density: Vec<DensityPoint>,
    pub acf: Vec<AcfPoint>,
    pub actf_points: Vec<ActfPoint>,
}

/// Report of a whole model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelReport {
    pub scheme: String,
    pub family: String,
    pub acs_model: String,
    pub seasons: Vec<SeasonReport>,
    #[serde(skip)]
    kind: ReportKind,
}

impl ModelReport {
    /// Builds the report of `model`.
    pub fn from_model(model: &FittedModel) -> Self {
        let seasons = model
            .seasons
            .values()
            .map(|fit| {
                let density = fit
                    .histogram
                    .iter()
                    .map(|bin| {
                        let x = bin.midpoint();
                        DensityPoint {
                            x,
                            fitted: fit.marginal.density(x),
                            empirical: bin.density,
                        }
                    })
                    .collect();
                let gaussian = fit.gaussian_acf(model.max_lag);
                let acf = gaussian
                    .iter()
                    .enumerate()
                    .map(|(lag, &g)| AcfPoint {
                        lag,
                        empirical: fit.acs.empirical.at(lag),
                        fitted: fit.acs.at(lag),
                        gaussian: g,
                    })
                    .collect();
                SeasonReport {
                    season: fit.season,
                    p0: fit.marginal.p0,
                    stats: fit.stats.clone(),
                    density,
                    acf,
                    actf_points: fit.actf_points.clone(),
                }
            })
            .collect();

        Self {
            scheme: model.scheme.to_string(),
            family: model.family.to_string(),
            acs_model: model.acs_model.to_string(),
            seasons,
            kind: ReportKind::default(),
        }
    }

    /// Selects the section rendered by `Display`.
    pub fn with_kind(mut self, kind: ReportKind) -> Self {
        self.kind = kind;
        self
    }
}

impl fmt::Display for ModelReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Model Report ---")?;
        writeln!(
            f,
            "Seasons: {} ({}), marginal: {}, structure: {}",
            self.seasons.len(),
            self.scheme,
            self.family,
            self.acs_model
        )?;
        match self.kind {
            ReportKind::Stat => {
                write!(
                    f,
                    "{:>6} {:>6} {:>10} {:>10} {:>10} {:>8} {:>8} {:>10} {:>10} {:>6}",
                    "season", "n", "mean", "median", "sd", "skew", "kurt", "min", "max", "p0"
                )?;
                for s in &self.seasons {
                    let st = &s.stats;
                    write!(
                        f,
                        "\n{:>6} {:>6} {:>10.3} {:>10.3} {:>10.3} {:>8.3} {:>8.3} {:>10.3} {:>10.3} {:>6.3}",
                        s.season,
                        st.count,
                        st.mean,
                        st.median,
                        st.sd,
                        st.skewness,
                        st.kurtosis,
                        st.min,
                        st.max,
                        s.p0
                    )?;
                }
            }
            ReportKind::Dist => {
                write!(f, "{:>6} {:>12} {:>12} {:>12}", "season", "x", "fitted", "empirical")?;
                for s in &self.seasons {
                    for p in &s.density {
                        write!(
                            f,
                            "\n{:>6} {:>12.4} {:>12.6} {:>12.6}",
                            s.season, p.x, p.fitted, p.empirical
                        )?;
                    }
                }
            }
            ReportKind::Acs => {
                write!(
                    f,
                    "{:>6} {:>4} {:>10} {:>10} {:>10}",
                    "season", "lag", "empirical", "fitted", "gaussian"
                )?;
                for s in &self.seasons {
                    for p in &s.acf {
                        let empirical = p.empirical.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"));
                        write!(
                            f,
                            "\n{:>6} {:>4} {:>10} {:>10.4} {:>10.4}",
                            s.season, p.lag, empirical, p.fitted, p.gaussian
                        )?;
                    }
                }
            }
        }
        Ok(())
    }
}
